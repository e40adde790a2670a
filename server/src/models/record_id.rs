use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a backend record.
///
/// The clinical backend keys its tables by integer primary keys, but some
/// deployments expose UUIDs or slugs instead. All three decode into this type
/// and compare with a total order: numbers first, then UUIDs, then text.
///
/// Decoding is canonical: `42` and `"42"` are the same id, whether they come
/// from a JSON body, a foreign key or a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Uuid(Uuid),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Uuid(u) => write!(f, "{}", u),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return RecordId::Number(n);
        }
        if let Ok(u) = Uuid::parse_str(s) {
            return RecordId::Uuid(u);
        }
        RecordId::Text(s.to_string())
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RecordId::from(s))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RecordIdVisitor)
    }
}

struct RecordIdVisitor;

impl<'de> Visitor<'de> for RecordIdVisitor {
    type Value = RecordId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or string record id")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RecordId, E> {
        Ok(RecordId::Number(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RecordId, E> {
        match i64::try_from(v) {
            Ok(n) => Ok(RecordId::Number(n)),
            Err(_) => Ok(RecordId::Text(v.to_string())),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RecordId, E> {
        if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Ok(RecordId::Number(v as i64))
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RecordId, E> {
        Ok(RecordId::from(v))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::Number(0)
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}
