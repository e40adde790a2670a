use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name -> messages, as returned by the backend's validators.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// JSON body of every error answered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fields: Option<FieldErrors>,
}

impl ErrorReport {
    /// Create a new error report
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fields: None,
        }
    }

    /// Create validation report carrying per-field messages
    pub fn validation(message: impl Into<String>, fields: FieldErrors) -> Self {
        Self {
            code: "invalid".to_string(),
            message: message.into(),
            fields: Some(fields),
        }
    }
}

/// Build a single-entry field error map.
pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> FieldErrors {
    let mut fields = FieldErrors::new();
    fields.insert(field.into(), vec![message.into()]);
    fields
}
