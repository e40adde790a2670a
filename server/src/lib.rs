pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod join;
pub mod models;
pub mod sanitize;
pub mod service;
pub mod stats;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::PatientService;

pub type AppState = Arc<PatientService>;

/// Dashboard routes over a shared patient service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/state", get(handlers::view_state))
        .route("/api/session/logout", post(handlers::logout))
        .route("/api/patients", get(handlers::list_patients))
        .route("/api/patients/refresh", post(handlers::refresh_patients))
        .route("/api/patients/stats", get(handlers::patient_stats))
        .route(
            "/api/patients/:id",
            get(handlers::get_patient)
                .patch(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .route(
            "/api/patients/:id/appointments",
            get(handlers::list_appointments),
        )
        .route(
            "/api/appointments/:id/reschedule",
            post(handlers::reschedule_appointment),
        )
        .route(
            "/api/appointments/:id/cancel",
            post(handlers::cancel_appointment),
        )
        .route(
            "/api/appointments/:id/complete",
            post(handlers::complete_appointment),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
