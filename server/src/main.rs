use std::sync::Arc;

use patient_dashboard::backend::HttpBackend;
use patient_dashboard::cache::CacheStore;
use patient_dashboard::config::DashboardConfig;
use patient_dashboard::service::{PatientService, PATIENTS_TTL};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DashboardConfig::from_env().map_err(anyhow::Error::msg)?;
    let backend = HttpBackend::new(&config)?;

    let mut cache = CacheStore::new(PATIENTS_TTL);
    if let Some(capacity) = config.cache_capacity {
        cache = cache.with_capacity_limit(capacity);
    }
    let service = Arc::new(PatientService::new(Arc::new(backend), Arc::new(cache)));

    let app = patient_dashboard::router(service.clone());

    // Run the server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        backend = %config.api_base_url,
        "Patient dashboard running on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down, cancelling in-flight loads");
            service.shutdown();
        })
        .await?;

    Ok(())
}
