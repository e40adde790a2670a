//! In-memory stand-in for the clinical backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use crate::backend::{BackendError, ClinicBackend};
use crate::models::{
    AppointmentRecord, AppointmentStatus, CaseRecord, DiseaseDetail, FieldErrors, RawPatient,
    RecordId,
};

pub(crate) fn patient(id: i64, name: &str, age: u32) -> RawPatient {
    RawPatient {
        id: RecordId::Number(id),
        full_name: Some(name.to_string()),
        age: Some(age),
        gender: Some(if id % 2 == 0 { "M" } else { "F" }.to_string()),
        status: Some("diagnosed".to_string()),
        created_at: Some("2023-06-15T08:00:00Z".to_string()),
        ..Default::default()
    }
}

pub(crate) fn case(id: i64, patient: i64, date: &str, disease: &str) -> CaseRecord {
    CaseRecord {
        id: RecordId::Number(id),
        patient: RecordId::Number(patient),
        diagnosis_date: Some(date.to_string()),
        disease_detail: Some(DiseaseDetail {
            name: Some(disease.to_string()),
        }),
        notes: None,
    }
}

/// Holds backend calls open until the test lets them through.
pub(crate) struct Gate {
    entered: Semaphore,
    release: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
        }
    }

    /// Wait until one more call has reached the gate.
    pub(crate) async fn entered(&self) {
        self.entered.acquire().await.unwrap().forget();
    }

    /// Calls that reached the gate but were not yet awaited with `entered`.
    pub(crate) fn waiting(&self) -> usize {
        self.entered.available_permits()
    }

    /// Let one held call continue.
    pub(crate) fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.add_permits(1);
        self.release.acquire().await.unwrap().forget();
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    patients: Mutex<Vec<RawPatient>>,
    cases: Mutex<Vec<CaseRecord>>,
    appointments: Mutex<Vec<AppointmentRecord>>,
    fail_patients: AtomicBool,
    fail_cases: AtomicBool,
    reject_updates: Mutex<Option<FieldErrors>>,
    last_patch: Mutex<Option<Map<String, Value>>>,
    patches: Mutex<Vec<(RecordId, Map<String, Value>)>>,
    patient_reads: AtomicUsize,
    read_gate: Mutex<Option<Arc<Gate>>>,
    update_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeBackend {
    pub(crate) fn new(patients: Vec<RawPatient>, cases: Vec<CaseRecord>) -> Self {
        Self {
            patients: Mutex::new(patients),
            cases: Mutex::new(cases),
            ..Default::default()
        }
    }

    pub(crate) fn fail_patients(&self, fail: bool) {
        self.fail_patients.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_cases(&self, fail: bool) {
        self.fail_cases.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn reject_updates_with(&self, errors: FieldErrors) {
        *self.reject_updates.lock().unwrap() = Some(errors);
    }

    pub(crate) fn add_appointment(&self, id: i64, patient: i64, date: &str, time: &str) {
        self.appointments.lock().unwrap().push(AppointmentRecord {
            id: RecordId::Number(id),
            patient: RecordId::Number(patient),
            date: Some(date.to_string()),
            time: Some(time.to_string()),
            appointment_type: Some("follow-up".to_string()),
            status: AppointmentStatus::Scheduled,
            notes: None,
        });
    }

    /// Number of full patient collection reads so far.
    pub(crate) fn collection_reads(&self) -> usize {
        self.patient_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn last_patch(&self) -> Option<Map<String, Value>> {
        self.last_patch.lock().unwrap().clone()
    }

    /// Patient patches in the order the backend applied them.
    pub(crate) fn patch_log(&self) -> Vec<(RecordId, Map<String, Value>)> {
        self.patches.lock().unwrap().clone()
    }

    /// Hold every patient collection read after it has taken its data.
    pub(crate) fn gate_reads(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        *self.read_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn open_reads(&self) {
        *self.read_gate.lock().unwrap() = None;
    }

    /// Hold every patient update before it is applied.
    pub(crate) fn gate_updates(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        *self.update_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl ClinicBackend for FakeBackend {
    async fn list_patients(&self) -> Result<Vec<RawPatient>, BackendError> {
        self.patient_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_patients.load(Ordering::SeqCst) {
            return Err(BackendError::Network("patients unavailable".to_string()));
        }
        let patients = self.patients.lock().unwrap().clone();
        let gate = self.read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(patients)
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, BackendError> {
        if self.fail_cases.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: Value::Null,
            });
        }
        Ok(self.cases.lock().unwrap().clone())
    }

    async fn update_patient(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<RawPatient, BackendError> {
        if let Some(errors) = self.reject_updates.lock().unwrap().clone() {
            return Err(BackendError::Validation(errors));
        }
        let gate = self.update_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        *self.last_patch.lock().unwrap() = Some(fields.clone());
        self.patches
            .lock()
            .unwrap()
            .push((id.clone(), fields.clone()));

        let mut patients = self.patients.lock().unwrap();
        let current = patients
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or(BackendError::NotFound)?;
        let mut merged = serde_json::to_value(&*current)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut merged {
            for (key, value) in fields {
                map.insert(key.clone(), value.clone());
            }
        }
        *current = serde_json::from_value(merged).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(current.clone())
    }

    async fn delete_patient(&self, id: &RecordId) -> Result<(), BackendError> {
        let mut patients = self.patients.lock().unwrap();
        let before = patients.len();
        patients.retain(|p| &p.id != id);
        if patients.len() == before {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }

    async fn list_appointments(
        &self,
        patient: &RecordId,
    ) -> Result<Vec<AppointmentRecord>, BackendError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| &a.patient == patient)
            .cloned()
            .collect())
    }

    async fn update_appointment(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<AppointmentRecord, BackendError> {
        let mut appointments = self.appointments.lock().unwrap();
        let current = appointments
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or(BackendError::NotFound)?;
        let mut merged = serde_json::to_value(&*current)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut merged {
            for (key, value) in fields {
                map.insert(key.clone(), value.clone());
            }
        }
        *current = serde_json::from_value(merged).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(current.clone())
    }
}
