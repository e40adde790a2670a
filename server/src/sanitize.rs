//! Typed normalization of patient edits before they reach the backend.
//!
//! The backend's numeric columns reject empty strings and its boolean columns
//! are strict, so every edited field is coerced according to its type tag.

use serde_json::{Map, Number, Value};

use crate::models::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Decimal,
    Boolean,
    Text,
}

/// Editable patient fields and their type tags.
pub const PATIENT_FIELDS: &[(&str, FieldKind)] = &[
    ("age", FieldKind::Integer),
    ("blood_pressure_systolic", FieldKind::Integer),
    ("blood_pressure_diastolic", FieldKind::Integer),
    ("heart_rate", FieldKind::Integer),
    ("respiratory_rate", FieldKind::Integer),
    ("temperature", FieldKind::Decimal),
    ("diabetes", FieldKind::Boolean),
    ("hypertension", FieldKind::Boolean),
    ("asthma", FieldKind::Boolean),
    ("heart_disease", FieldKind::Boolean),
    ("full_name", FieldKind::Text),
    ("first_name", FieldKind::Text),
    ("last_name", FieldKind::Text),
    ("gender", FieldKind::Text),
    ("phone", FieldKind::Text),
    ("email", FieldKind::Text),
    ("status", FieldKind::Text),
    ("additional_notes", FieldKind::Text),
    ("family_history", FieldKind::Text),
    ("allergies", FieldKind::Text),
    ("smoking_status", FieldKind::Text),
    ("profile_image_url", FieldKind::Text),
    ("xray_image_url", FieldKind::Text),
];

pub fn patient_field_kind(name: &str) -> Option<FieldKind> {
    PATIENT_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, kind)| *kind)
}

/// Coerce every field of a partial patient edit, collecting all errors.
pub fn sanitize_patient_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, FieldErrors> {
    let mut clean = Map::new();
    let mut errors = FieldErrors::new();

    for (name, value) in fields {
        let outcome = match patient_field_kind(name) {
            Some(kind) => coerce(kind, value),
            None => Err("Unknown or read-only field.".to_string()),
        };
        match outcome {
            Ok(value) => {
                clean.insert(name.clone(), value);
            }
            Err(message) => {
                errors.insert(name.clone(), vec![message]);
            }
        }
    }

    if errors.is_empty() {
        Ok(clean)
    } else {
        Err(errors)
    }
}

pub fn coerce(kind: FieldKind, value: &Value) -> Result<Value, String> {
    match kind {
        FieldKind::Integer => coerce_integer(value),
        FieldKind::Decimal => coerce_decimal(value),
        FieldKind::Boolean => Ok(Value::Bool(truthy(value))),
        FieldKind::Text => coerce_text(value),
    }
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    const MESSAGE: &str = "A valid integer is required.";
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::from(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
                _ => Err(MESSAGE.to_string()),
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            s.parse::<i64>()
                .map(Value::from)
                .map_err(|_| MESSAGE.to_string())
        }
        _ => Err(MESSAGE.to_string()),
    }
}

fn coerce_decimal(value: &Value) -> Result<Value, String> {
    const MESSAGE: &str = "A valid number is required.";
    let parsed = match value {
        Value::Null => return Ok(Value::Null),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| MESSAGE.to_string())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        _ => false,
    }
}

fn coerce_text(value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err("A plain text value is required.".to_string()),
    }
}
