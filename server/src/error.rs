use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::models::{ErrorReport, FieldErrors, RecordId};

/// Message shown when a load fails; details go to the log, not the user.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to load patient data. Please try again.";
pub const NETWORK_FAILED_MESSAGE: &str = "Could not reach the clinical backend. Please try again.";

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Either collection read failed; nothing was cached.
    #[error("failed to load patient data: {0}")]
    Fetch(#[source] BackendError),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("network error: {0}")]
    Network(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: RecordId },

    #[error("backend rejected the credentials")]
    Unauthorized,

    #[error("invalid filter: {0}")]
    BadFilter(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("backend error: {0}")]
    Backend(#[source] BackendError),
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

impl DashboardError {
    /// Map a failed write or uncached read onto the user-facing taxonomy.
    pub fn from_backend(err: BackendError, kind: &'static str, id: &RecordId) -> Self {
        match err {
            BackendError::Validation(fields) => DashboardError::Validation(fields),
            BackendError::NotFound => DashboardError::NotFound {
                kind,
                id: id.clone(),
            },
            BackendError::Unauthorized => DashboardError::Unauthorized,
            BackendError::Network(message) => DashboardError::Network(message),
            other => DashboardError::Backend(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DashboardError::Fetch(BackendError::Unauthorized) | DashboardError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            DashboardError::Fetch(_) | DashboardError::Network(_) | DashboardError::Backend(_) => {
                StatusCode::BAD_GATEWAY
            }
            DashboardError::Validation(_) | DashboardError::BadFilter(_) => StatusCode::BAD_REQUEST,
            DashboardError::NotFound { .. } => StatusCode::NOT_FOUND,
            DashboardError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn report(&self) -> ErrorReport {
        match self {
            DashboardError::Fetch(BackendError::Unauthorized) | DashboardError::Unauthorized => {
                ErrorReport::error("unauthorized", "The clinical backend rejected the credentials.")
            }
            DashboardError::Fetch(_) => ErrorReport::error("fetch-failed", FETCH_FAILED_MESSAGE),
            DashboardError::Network(_) => ErrorReport::error("network", NETWORK_FAILED_MESSAGE),
            DashboardError::Validation(fields) => {
                ErrorReport::validation("Some fields are invalid.", fields.clone())
            }
            DashboardError::NotFound { .. } => ErrorReport::error("not-found", self.to_string()),
            DashboardError::BadFilter(message) => ErrorReport::error("bad-filter", message.clone()),
            DashboardError::Cancelled => ErrorReport::error("cancelled", "The request was cancelled."),
            DashboardError::Backend(BackendError::Status { status, .. }) => ErrorReport::error(
                "backend",
                format!("The clinical backend answered with status {}.", status),
            ),
            DashboardError::Backend(_) => {
                ErrorReport::error("backend", "The clinical backend sent an unexpected response.")
            }
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.report())).into_response()
    }
}
