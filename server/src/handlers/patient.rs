use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DashboardError;
use crate::filter::PatientFilter;
use crate::models::{PatientRecord, RecordId};
use crate::stats::PatientStats;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive substring over name and diagnosis
    pub search: Option<String>,
    /// Age bracket label: All, 0-18, 19-40, 41-65, 65+
    pub age: Option<String>,
    /// Male, Female, Other, Unknown or All
    pub sex: Option<String>,
    /// undiagnosed, diagnosed, recovered, deceased or All
    pub status: Option<String>,
    /// Bypass the cache
    pub refresh: Option<bool>,
}

/// Borrows the cached records; serialized straight into the response body.
#[derive(Debug, Serialize)]
pub struct PatientList<'a> {
    pub count: usize,
    pub results: &'a [PatientRecord],
}

impl<'a> PatientList<'a> {
    fn new(results: &'a [PatientRecord]) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}

/// GET /api/patients
/// Joined patient records matching every supplied predicate
pub async fn list_patients(
    State(service): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Response, DashboardError> {
    let filter = PatientFilter::from_labels(
        params.search.as_deref(),
        params.age.as_deref(),
        params.sex.as_deref(),
        params.status.as_deref(),
    )?;

    let results = service
        .filtered(&filter, params.refresh.unwrap_or(false))
        .await?;

    tracing::debug!("✓ Patient list served: {} results", results.len());
    Ok(Json(PatientList::new(&results)).into_response())
}

/// POST /api/patients/refresh
/// Reload both collections from the backend, replacing the cached view
pub async fn refresh_patients(
    State(service): State<AppState>,
) -> Result<Response, DashboardError> {
    let snapshot = service.load_patients(true).await?;
    Ok(Json(PatientList::new(&snapshot.records)).into_response())
}

/// GET /api/patients/stats
pub async fn patient_stats(
    State(service): State<AppState>,
) -> Result<Json<PatientStats>, DashboardError> {
    Ok(Json(service.stats().await?))
}

/// GET /api/patients/:id
pub async fn get_patient(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientRecord>, DashboardError> {
    let id = RecordId::from(id.as_str());
    Ok(Json(service.patient(&id).await?))
}

/// PATCH /api/patients/:id
/// Apply a partial edit; answers with the record as re-read from the backend
pub async fn update_patient(
    State(service): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<PatientRecord>, DashboardError> {
    let id = RecordId::from(id.as_str());
    let record = service.update_patient(&id, &fields).await?;

    tracing::info!("✓ Patient updated: {}", id);
    Ok(Json(record))
}

/// DELETE /api/patients/:id
pub async fn delete_patient(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, DashboardError> {
    let id = RecordId::from(id.as_str());
    service.delete_patient(&id).await?;

    tracing::info!("✓ Patient deleted: {}", id);
    Ok(StatusCode::NO_CONTENT)
}
