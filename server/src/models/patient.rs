use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::de;
use super::RecordId;

/// Rendered for any optional display field the backend left empty.
pub const NOT_AVAILABLE: &str = "N/A";
pub const PROFILE_IMAGE_PLACEHOLDER: &str = "/static/images/default-profile.png";
pub const XRAY_IMAGE_PLACEHOLDER: &str = "/static/images/xray-placeholder.png";

/// Patient row as served by `GET /dashboard/api/patients/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPatient {
    pub id: RecordId,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub blood_pressure_systolic: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub blood_pressure_diastolic: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub heart_rate: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub respiratory_rate: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub profile_image_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub xray_image_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub additional_notes: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub diabetes: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub hypertension: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub asthma: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub heart_disease: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub allergies: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub smoking_status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub family_history: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
    Unknown,
}

impl Sex {
    /// Normalize the backend's coded gender (`M`, `F`, `O`) or a spelled-out value.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            Some("m") | Some("male") => Sex::Male,
            Some("f") | Some("female") => Sex::Female,
            Some("o") | Some("other") => Sex::Other,
            _ => Sex::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other",
            Sex::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Sex::from_code(Some(s)) {
            Sex::Unknown if !s.trim().eq_ignore_ascii_case("unknown") => {
                Err(format!("unknown sex '{}'", s))
            }
            sex => Ok(sex),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    #[default]
    Undiagnosed,
    Diagnosed,
    Recovered,
    Deceased,
}

impl PatientStatus {
    pub const ALL: [PatientStatus; 4] = [
        PatientStatus::Undiagnosed,
        PatientStatus::Diagnosed,
        PatientStatus::Recovered,
        PatientStatus::Deceased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Undiagnosed => "undiagnosed",
            PatientStatus::Diagnosed => "diagnosed",
            PatientStatus::Recovered => "recovered",
            PatientStatus::Deceased => "deceased",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PatientStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// Vital signs as display strings, `"N/A"` when not recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub blood_pressure: String,
    pub temperature: String,
    pub heart_rate: String,
    pub respiratory_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistory {
    pub diabetes: bool,
    pub hypertension: bool,
    pub asthma: bool,
    pub heart_disease: bool,
    pub allergies: String,
    pub smoking_status: String,
}

/// Joined display record: one patient folded with its latest clinical case.
///
/// Every field carries a concrete value. Only `age` and `diagnosis` may be
/// null, meaning "not recorded" and "no case on file" respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: RecordId,
    pub name: String,
    pub age: Option<u32>,
    pub sex: Sex,
    pub phone: String,
    pub email: String,
    pub diagnosis: Option<String>,
    pub status: PatientStatus,
    pub date: String,
    pub vitals: VitalSigns,
    pub history: MedicalHistory,
    pub notes: String,
    pub family_history: String,
    pub profile_image_url: String,
    pub xray_image_url: String,
}
