//! Predicate filtering over joined patient records.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::models::{PatientRecord, PatientStatus, Sex};

const ALL: &str = "All";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBracket {
    #[default]
    #[serde(rename = "All")]
    All,
    #[serde(rename = "0-18")]
    Child,
    #[serde(rename = "19-40")]
    YoungAdult,
    #[serde(rename = "41-65")]
    MiddleAged,
    #[serde(rename = "65+")]
    Senior,
}

impl AgeBracket {
    pub const BRACKETS: [AgeBracket; 4] = [
        AgeBracket::Child,
        AgeBracket::YoungAdult,
        AgeBracket::MiddleAged,
        AgeBracket::Senior,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeBracket::All => ALL,
            AgeBracket::Child => "0-18",
            AgeBracket::YoungAdult => "19-40",
            AgeBracket::MiddleAged => "41-65",
            AgeBracket::Senior => "65+",
        }
    }

    /// `0-18` is `age <= 18`, `65+` is `age > 65`; the middle brackets are closed.
    /// A patient without a recorded age only falls under `All`.
    pub fn contains(&self, age: Option<u32>) -> bool {
        match (self, age) {
            (AgeBracket::All, _) => true,
            (_, None) => false,
            (AgeBracket::Child, Some(age)) => age <= 18,
            (AgeBracket::YoungAdult, Some(age)) => (19..=40).contains(&age),
            (AgeBracket::MiddleAged, Some(age)) => (41..=65).contains(&age),
            (AgeBracket::Senior, Some(age)) => age > 65,
        }
    }

    /// The single bracket an age falls into.
    pub fn of(age: u32) -> AgeBracket {
        Self::BRACKETS
            .into_iter()
            .find(|bracket| bracket.contains(Some(age)))
            .unwrap_or(AgeBracket::Senior)
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgeBracket {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        std::iter::once(AgeBracket::All)
            .chain(Self::BRACKETS)
            .find(|bracket| bracket.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DashboardError::BadFilter(format!("unknown age bracket '{}'", s)))
    }
}

/// Conjunction of the dashboard's list predicates. `None` means "All".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub search: String,
    pub age: AgeBracket,
    pub sex: Option<Sex>,
    pub status: Option<PatientStatus>,
}

impl PatientFilter {
    /// Build from raw UI labels; blank or `All` leaves a predicate open.
    pub fn from_labels(
        search: Option<&str>,
        age: Option<&str>,
        sex: Option<&str>,
        status: Option<&str>,
    ) -> Result<Self, DashboardError> {
        let age = match open_label(age) {
            Some(label) => label.parse()?,
            None => AgeBracket::All,
        };
        let sex = open_label(sex)
            .map(|label| label.parse::<Sex>().map_err(DashboardError::BadFilter))
            .transpose()?;
        let status = open_label(status)
            .map(|label| label.parse::<PatientStatus>().map_err(DashboardError::BadFilter))
            .transpose()?;

        Ok(Self {
            search: search.map(str::trim).unwrap_or_default().to_string(),
            age,
            sex,
            status,
        })
    }

    pub fn matches(&self, record: &PatientRecord) -> bool {
        self.matches_search(record)
            && self.age.contains(record.age)
            && self.sex.map_or(true, |sex| record.sex == sex)
            && self.status.map_or(true, |status| record.status == status)
    }

    fn matches_search(&self, record: &PatientRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        record.name.to_lowercase().contains(&needle)
            || record
                .diagnosis
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
                .contains(&needle)
    }

    pub fn apply(&self, records: &[PatientRecord]) -> Vec<PatientRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

fn open_label(label: Option<&str>) -> Option<&str> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case(ALL))
}

struct MemoSlot {
    source: Arc<Vec<PatientRecord>>,
    filter: PatientFilter,
    result: Arc<Vec<PatientRecord>>,
}

/// Remembers the last filtered view and reuses it while neither the record
/// set (by identity) nor the predicates change.
#[derive(Default)]
pub struct FilterMemo {
    slot: Mutex<Option<MemoSlot>>,
}

impl FilterMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &self,
        records: &Arc<Vec<PatientRecord>>,
        filter: &PatientFilter,
    ) -> Arc<Vec<PatientRecord>> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(memo) = slot.as_ref() {
            if Arc::ptr_eq(&memo.source, records) && &memo.filter == filter {
                return memo.result.clone();
            }
        }

        let result = Arc::new(filter.apply(records));
        *slot = Some(MemoSlot {
            source: records.clone(),
            filter: filter.clone(),
            result: result.clone(),
        });
        result
    }
}
