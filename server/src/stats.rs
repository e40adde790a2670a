use std::collections::BTreeMap;

use serde::Serialize;

use crate::filter::AgeBracket;
use crate::models::{PatientRecord, PatientStatus, Sex};

/// Aggregates behind the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientStats {
    pub total: usize,
    pub by_status: BTreeMap<PatientStatus, usize>,
    pub by_sex: BTreeMap<Sex, usize>,
    pub by_age_bracket: BTreeMap<AgeBracket, usize>,
    pub unknown_age: usize,
}

impl PatientStats {
    pub fn from_records(records: &[PatientRecord]) -> Self {
        let mut stats = PatientStats {
            total: records.len(),
            ..Default::default()
        };
        // Zero rows keep every chart series present.
        for status in PatientStatus::ALL {
            stats.by_status.insert(status, 0);
        }
        for bracket in AgeBracket::BRACKETS {
            stats.by_age_bracket.insert(bracket, 0);
        }

        for record in records {
            *stats.by_status.entry(record.status).or_default() += 1;
            *stats.by_sex.entry(record.sex).or_default() += 1;
            match record.age {
                Some(age) => *stats.by_age_bracket.entry(AgeBracket::of(age)).or_default() += 1,
                None => stats.unknown_age += 1,
            }
        }
        stats
    }
}
