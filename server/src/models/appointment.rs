use serde::{Deserialize, Serialize};

use super::de;
use super::RecordId;

/// Appointment row as served by `GET /dashboard/api/appointments/?patient={id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: RecordId,
    pub patient: RecordId,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub time: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "de::opt_text")]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
    #[serde(other)]
    Other,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Other => "other",
        }
    }
}
