use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::DashboardError;
use crate::models::{AppointmentRecord, RecordId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM or HH:MM:SS
    pub time: String,
}

/// GET /api/patients/:id/appointments
/// Always read from the backend, never cached
pub async fn list_appointments(
    State(service): State<AppState>,
    Path(patient): Path<String>,
) -> Result<Json<Vec<AppointmentRecord>>, DashboardError> {
    let patient = RecordId::from(patient.as_str());
    Ok(Json(service.appointments(&patient).await?))
}

/// POST /api/appointments/:id/reschedule
/// Answers with the owning patient's refreshed appointment list
pub async fn reschedule_appointment(
    State(service): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Vec<AppointmentRecord>>, DashboardError> {
    let id = RecordId::from(id.as_str());
    let appointments = service
        .reschedule_appointment(&id, &request.date, &request.time)
        .await?;

    tracing::info!("✓ Appointment rescheduled: {}", id);
    Ok(Json(appointments))
}

/// POST /api/appointments/:id/cancel
pub async fn cancel_appointment(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AppointmentRecord>>, DashboardError> {
    let id = RecordId::from(id.as_str());
    Ok(Json(service.cancel_appointment(&id).await?))
}

/// POST /api/appointments/:id/complete
pub async fn complete_appointment(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AppointmentRecord>>, DashboardError> {
    let id = RecordId::from(id.as_str());
    Ok(Json(service.complete_appointment(&id).await?))
}
