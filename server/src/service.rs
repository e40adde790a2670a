//! Patient list orchestration: cached loads, filtered views and mutations.
//!
//! Loads go through a single gate so the view state machine never interleaves.
//! Writes are serialized per record id, then invalidate the patient cache and
//! force a reload; nothing is edited in memory ahead of the backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ClinicBackend;
use crate::cache::{CacheStore, Lookup};
use crate::error::{DashboardError, Result};
use crate::filter::{FilterMemo, PatientFilter};
use crate::join::{build_record, join_patients, latest_case};
use crate::models::{
    field_error, AppointmentRecord, AppointmentStatus, CaseRecord, PatientRecord, RawPatient,
    RecordId,
};
use crate::sanitize::sanitize_patient_fields;
use crate::stats::PatientStats;

pub const PATIENTS_CACHE_KEY: &str = "patients_data";
pub const PATIENTS_TTL: Duration = Duration::from_secs(5 * 60);

/// Cached result of one successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSnapshot {
    pub records: Arc<Vec<PatientRecord>>,
    pub cases: Arc<Vec<CaseRecord>>,
}

impl PatientSnapshot {
    pub fn find(&self, id: &RecordId) -> Option<&PatientRecord> {
        self.records.iter().find(|record| &record.id == id)
    }
}

/// Lifecycle of the patient list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ViewState {
    Idle,
    Loading,
    Ready { count: usize },
    Error { message: String },
}

impl ViewState {
    fn can_move_to(&self, next: &ViewState) -> bool {
        matches!(
            (self, next),
            (ViewState::Idle, ViewState::Loading)
                | (ViewState::Ready { .. }, ViewState::Loading)
                | (ViewState::Error { .. }, ViewState::Loading)
                | (ViewState::Loading, ViewState::Ready { .. })
                | (ViewState::Loading, ViewState::Error { .. })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Patient(RecordId),
    Appointment(RecordId),
}

/// One async mutex per record id, created on demand.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            // Drop locks nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct PatientService {
    backend: Arc<dyn ClinicBackend>,
    cache: Arc<CacheStore<PatientSnapshot>>,
    memo: FilterMemo,
    state: Mutex<ViewState>,
    load_gate: tokio::sync::Mutex<()>,
    mutations: KeyedLocks,
    session: Mutex<CancellationToken>,
}

impl PatientService {
    pub fn new(backend: Arc<dyn ClinicBackend>, cache: Arc<CacheStore<PatientSnapshot>>) -> Self {
        Self {
            backend,
            cache,
            memo: FilterMemo::new(),
            state: Mutex::new(ViewState::Idle),
            load_gate: tokio::sync::Mutex::new(()),
            mutations: KeyedLocks::default(),
            session: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore<PatientSnapshot>> {
        &self.cache
    }

    pub fn view_state(&self) -> ViewState {
        self.state().clone()
    }

    /// Token cancelled when the session ends; one per operation.
    pub fn session_token(&self) -> CancellationToken {
        self.session
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .child_token()
    }

    pub async fn load_patients(&self, force_refresh: bool) -> Result<PatientSnapshot> {
        let cancel = self.session_token();
        self.load_patients_with(force_refresh, &cancel).await
    }

    /// Serve from cache unless forced; otherwise read both collections and join them.
    pub async fn load_patients_with(
        &self,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<PatientSnapshot> {
        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DashboardError::Cancelled),
            gate = self.load_gate.lock() => gate,
        };
        self.begin_loading();

        if !force_refresh {
            match self.cache.get(PATIENTS_CACHE_KEY) {
                Lookup::Hit(snapshot) => {
                    debug!(count = snapshot.records.len(), "patient cache hit");
                    self.settle(ViewState::Ready {
                        count: snapshot.records.len(),
                    });
                    return Ok(snapshot);
                }
                Lookup::Expired => debug!("patient cache expired"),
                Lookup::Missing => debug!("patient cache empty"),
            }
        }

        let generation = self.cache.generation();
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DashboardError::Cancelled),
            result = self.fetch_snapshot() => result,
        };

        match fetched {
            Ok(_) if cancel.is_cancelled() => {
                self.settle(ViewState::Error {
                    message: "Loading was cancelled.".to_string(),
                });
                Err(DashboardError::Cancelled)
            }
            Ok(snapshot) => {
                if !self
                    .cache
                    .set_if_generation(PATIENTS_CACHE_KEY, snapshot.clone(), generation)
                {
                    debug!("patient cache invalidated during load, result not cached");
                }
                info!(
                    patients = snapshot.records.len(),
                    cases = snapshot.cases.len(),
                    forced = force_refresh,
                    "patient data loaded"
                );
                self.settle(ViewState::Ready {
                    count: snapshot.records.len(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "patient data load failed");
                self.settle(ViewState::Error {
                    message: e.report().message,
                });
                Err(e)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<PatientSnapshot> {
        let (patients, cases) =
            tokio::try_join!(self.backend.list_patients(), self.backend.list_cases())
                .map_err(DashboardError::Fetch)?;
        let records = join_patients(&patients, &cases);
        Ok(PatientSnapshot {
            records: Arc::new(records),
            cases: Arc::new(cases),
        })
    }

    pub async fn filtered(
        &self,
        filter: &PatientFilter,
        force_refresh: bool,
    ) -> Result<Arc<Vec<PatientRecord>>> {
        let snapshot = self.load_patients(force_refresh).await?;
        Ok(self.memo.apply(&snapshot.records, filter))
    }

    pub async fn patient(&self, id: &RecordId) -> Result<PatientRecord> {
        let snapshot = self.load_patients(false).await?;
        snapshot
            .find(id)
            .cloned()
            .ok_or_else(|| not_found("patient", id))
    }

    pub async fn stats(&self) -> Result<PatientStats> {
        let snapshot = self.load_patients(false).await?;
        Ok(PatientStats::from_records(&snapshot.records))
    }

    /// Sanitize and apply a partial edit, then resynchronize from the backend.
    ///
    /// Once the backend accepts the write the edit counts as done. A failed
    /// resync only leaves the view in `Error`; the record is then built from
    /// the backend's answer and the last known cases.
    pub async fn update_patient(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<PatientRecord> {
        let clean = sanitize_patient_fields(fields).map_err(DashboardError::Validation)?;
        let _guard = self.mutations.acquire(LockKey::Patient(id.clone())).await;

        let known_cases = self
            .cache
            .get(PATIENTS_CACHE_KEY)
            .into_option()
            .map(|snapshot| snapshot.cases);
        let updated = self.write_patient(id, &clean).await?;

        match self.load_patients(true).await {
            Ok(snapshot) => Ok(snapshot
                .find(id)
                .cloned()
                .unwrap_or_else(|| build_record(&updated, None))),
            Err(e) => {
                warn!(patient = %id, error = %e, "resync after update failed");
                let latest = known_cases
                    .as_deref()
                    .and_then(|cases| latest_case(cases.iter().filter(|c| &c.patient == id)));
                Ok(build_record(&updated, latest))
            }
        }
    }

    /// Backend write followed by invalidation. The cache is untouched on failure.
    async fn write_patient(&self, id: &RecordId, clean: &Map<String, Value>) -> Result<RawPatient> {
        let updated = self
            .backend
            .update_patient(id, clean)
            .await
            .map_err(|e| {
                warn!(patient = %id, error = %e, "patient update rejected");
                DashboardError::from_backend(e, "patient", id)
            })?;
        self.cache.invalidate(PATIENTS_CACHE_KEY);
        info!(patient = %id, fields = clean.len(), "patient updated");
        Ok(updated)
    }

    pub async fn delete_patient(&self, id: &RecordId) -> Result<()> {
        let _guard = self.mutations.acquire(LockKey::Patient(id.clone())).await;

        self.backend.delete_patient(id).await.map_err(|e| {
            warn!(patient = %id, error = %e, "patient delete rejected");
            DashboardError::from_backend(e, "patient", id)
        })?;
        self.cache.invalidate(PATIENTS_CACHE_KEY);
        info!(patient = %id, "patient deleted");

        if let Err(e) = self.load_patients(true).await {
            warn!(patient = %id, error = %e, "resync after delete failed");
        }
        Ok(())
    }

    /// Appointments are read fresh on every call.
    pub async fn appointments(&self, patient: &RecordId) -> Result<Vec<AppointmentRecord>> {
        self.backend
            .list_appointments(patient)
            .await
            .map_err(|e| DashboardError::from_backend(e, "patient", patient))
    }

    pub async fn reschedule_appointment(
        &self,
        id: &RecordId,
        date: &str,
        time: &str,
    ) -> Result<Vec<AppointmentRecord>> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| DashboardError::Validation(field_error("date", "Use the YYYY-MM-DD format.")))?;
        let time = parse_time(time.trim())
            .ok_or_else(|| DashboardError::Validation(field_error("time", "Use the HH:MM format.")))?;

        let mut fields = Map::new();
        fields.insert("date".to_string(), json!(date.format("%Y-%m-%d").to_string()));
        fields.insert("time".to_string(), json!(time.format("%H:%M:%S").to_string()));
        fields.insert(
            "status".to_string(),
            json!(AppointmentStatus::Rescheduled.as_str()),
        );
        self.write_appointment(id, fields).await
    }

    pub async fn cancel_appointment(&self, id: &RecordId) -> Result<Vec<AppointmentRecord>> {
        self.set_appointment_status(id, AppointmentStatus::Cancelled).await
    }

    pub async fn complete_appointment(&self, id: &RecordId) -> Result<Vec<AppointmentRecord>> {
        self.set_appointment_status(id, AppointmentStatus::Completed).await
    }

    async fn set_appointment_status(
        &self,
        id: &RecordId,
        status: AppointmentStatus,
    ) -> Result<Vec<AppointmentRecord>> {
        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(status.as_str()));
        self.write_appointment(id, fields).await
    }

    /// Patch one appointment, then re-read its patient's appointments.
    async fn write_appointment(
        &self,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<Vec<AppointmentRecord>> {
        let _guard = self.mutations.acquire(LockKey::Appointment(id.clone())).await;

        let updated = self
            .backend
            .update_appointment(id, &fields)
            .await
            .map_err(|e| {
                warn!(appointment = %id, error = %e, "appointment update rejected");
                DashboardError::from_backend(e, "appointment", id)
            })?;
        info!(appointment = %id, status = updated.status.as_str(), "appointment updated");

        self.appointments(&updated.patient).await
    }

    /// End the session: abort in-flight loads and drop cached data.
    pub fn logout(&self) {
        let previous = {
            let mut session = self.session.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *session, CancellationToken::new())
        };
        previous.cancel();
        self.cache.clear();
        *self.state() = ViewState::Idle;
        info!("session closed, patient cache cleared");
    }

    /// Cancel every in-flight load; used on server shutdown.
    pub fn shutdown(&self) {
        self.session
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .cancel();
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn begin_loading(&self) {
        let mut state = self.state();
        if *state == ViewState::Loading {
            return;
        }
        if state.can_move_to(&ViewState::Loading) {
            *state = ViewState::Loading;
        } else {
            warn!("rejected view state transition {:?} -> loading", *state);
        }
    }

    /// Leave `Loading`; ignored if the view was reset in the meantime.
    fn settle(&self, next: ViewState) {
        let mut state = self.state();
        if state.can_move_to(&next) {
            *state = next;
        } else {
            debug!("ignored view state transition {:?} -> {:?}", *state, next);
        }
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn not_found(kind: &'static str, id: &RecordId) -> DashboardError {
    DashboardError::NotFound {
        kind,
        id: id.clone(),
    }
}
