use axum::{extract::State, http::StatusCode, Json};

use crate::service::ViewState;
use crate::AppState;

/// GET /api/state
pub async fn view_state(State(service): State<AppState>) -> Json<ViewState> {
    Json(service.view_state())
}

/// POST /api/session/logout
/// Cancel in-flight loads and drop every cached dataset
pub async fn logout(State(service): State<AppState>) -> StatusCode {
    service.logout();
    StatusCode::NO_CONTENT
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
