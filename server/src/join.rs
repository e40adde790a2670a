//! Fold patients with their clinical cases into display records.

use std::collections::HashMap;

use crate::models::{
    date_only, CaseRecord, MedicalHistory, PatientRecord, RawPatient, RecordId, Sex, VitalSigns,
    NOT_AVAILABLE, PROFILE_IMAGE_PLACEHOLDER, XRAY_IMAGE_PLACEHOLDER,
};

/// Join every patient with its latest case, preserving patient order.
pub fn join_patients(patients: &[RawPatient], cases: &[CaseRecord]) -> Vec<PatientRecord> {
    let mut by_patient: HashMap<&RecordId, Vec<&CaseRecord>> = HashMap::new();
    for case in cases {
        by_patient.entry(&case.patient).or_default().push(case);
    }

    patients
        .iter()
        .map(|patient| {
            let latest = by_patient
                .get(&patient.id)
                .and_then(|cases| latest_case(cases.iter().copied()));
            build_record(patient, latest)
        })
        .collect()
}

/// The case with the greatest diagnosis date.
///
/// Equal dates go to the highest case id. Cases without a readable date rank
/// below every dated case.
pub fn latest_case<'a>(cases: impl IntoIterator<Item = &'a CaseRecord>) -> Option<&'a CaseRecord> {
    cases
        .into_iter()
        .max_by(|a, b| (a.diagnosed_at(), &a.id).cmp(&(b.diagnosed_at(), &b.id)))
}

pub fn build_record(patient: &RawPatient, latest: Option<&CaseRecord>) -> PatientRecord {
    let date = latest
        .and_then(|case| case.diagnosis_date.as_deref())
        .or(patient.created_at.as_deref())
        .map(date_only)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let notes = latest
        .and_then(|case| case.notes.clone())
        .or_else(|| patient.additional_notes.clone())
        .unwrap_or_default();

    PatientRecord {
        id: patient.id.clone(),
        name: display_name(patient),
        age: patient.age,
        sex: Sex::from_code(patient.gender.as_deref()),
        phone: or_not_available(&patient.phone),
        email: or_not_available(&patient.email),
        diagnosis: latest.and_then(|case| case.disease_name()).map(str::to_string),
        status: patient
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        date,
        vitals: vital_signs(patient),
        history: MedicalHistory {
            diabetes: patient.diabetes.unwrap_or(false),
            hypertension: patient.hypertension.unwrap_or(false),
            asthma: patient.asthma.unwrap_or(false),
            heart_disease: patient.heart_disease.unwrap_or(false),
            allergies: patient.allergies.clone().unwrap_or_else(|| "None".to_string()),
            smoking_status: patient
                .smoking_status
                .clone()
                .unwrap_or_else(|| "None".to_string()),
        },
        notes,
        family_history: patient.family_history.clone().unwrap_or_default(),
        profile_image_url: patient
            .profile_image_url
            .clone()
            .unwrap_or_else(|| PROFILE_IMAGE_PLACEHOLDER.to_string()),
        xray_image_url: patient
            .xray_image_url
            .clone()
            .unwrap_or_else(|| XRAY_IMAGE_PLACEHOLDER.to_string()),
    }
}

fn display_name(patient: &RawPatient) -> String {
    if let Some(full) = &patient.full_name {
        return full.clone();
    }
    let joined = [patient.first_name.as_deref(), patient.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        "Unknown".to_string()
    } else {
        joined
    }
}

fn vital_signs(patient: &RawPatient) -> VitalSigns {
    let blood_pressure = match (patient.blood_pressure_systolic, patient.blood_pressure_diastolic) {
        (Some(sys), Some(dia)) => format!("{}/{}", sys, dia),
        _ => NOT_AVAILABLE.to_string(),
    };
    VitalSigns {
        blood_pressure,
        temperature: patient
            .temperature
            .map(|t| format!("{:.1}", t))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        heart_rate: display_number(patient.heart_rate),
        respiratory_rate: display_number(patient.respiratory_rate),
    }
}

fn display_number(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn or_not_available(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
