use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::de;
use super::RecordId;

/// Clinical case row as served by `GET /dashboard/api/cases/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: RecordId,
    pub patient: RecordId,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub diagnosis_date: Option<String>,
    #[serde(default)]
    pub disease_detail: Option<DiseaseDetail>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseDetail {
    #[serde(default, deserialize_with = "de::opt_text")]
    pub name: Option<String>,
}

impl CaseRecord {
    /// Diagnosis instant used for recency ordering; `None` when missing or unreadable.
    pub fn diagnosed_at(&self) -> Option<NaiveDateTime> {
        self.diagnosis_date.as_deref().and_then(parse_clinical_date)
    }

    pub fn disease_name(&self) -> Option<&str> {
        self.disease_detail
            .as_ref()
            .and_then(|detail| detail.name.as_deref())
    }
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS[.f]` and plain dates.
pub fn parse_clinical_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date-only portion of a backend timestamp, e.g. `2024-03-01T09:30:00Z` -> `2024-03-01`.
pub fn date_only(raw: &str) -> String {
    let raw = raw.trim();
    let head = raw.split(['T', ' ']).next().unwrap_or(raw);
    match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => head.to_string(),
    }
}
