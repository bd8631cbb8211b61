//! Strongly-typed identifiers.
//!
//! Ids are ULIDs wrapped in `Id<T>`, where `T` is a zero-sized marker that
//! keeps different id kinds from being mixed up at compile time. The textual
//! form carries a prefix (`job-01H...`) and that same form is what clients
//! send back, so `FromStr` insists on the prefix.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use ulid::Ulid;

/// Marker trait providing the display prefix for an id kind.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("expected prefix `{expected}` in `{input}`")]
    MissingPrefix {
        expected: &'static str,
        input: String,
    },

    #[error("invalid ulid `{input}`: {reason}")]
    InvalidUlid { input: String, reason: String },
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(T::prefix())
            .ok_or_else(|| IdParseError::MissingPrefix {
                expected: T::prefix(),
                input: s.to_string(),
            })?;
        let ulid = Ulid::from_string(raw).map_err(|e| IdParseError::InvalidUlid {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_ulid(ulid))
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Marker for job ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// Identifier of a Job (the submit / progress / result unit).
pub type JobId = Id<Job>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix() {
        let ulid = Ulid::new();
        let job = JobId::from_ulid(ulid);
        assert_eq!(job.to_string(), format!("job-{ulid}"));
    }

    #[test]
    fn parses_its_own_display_form() {
        let job = JobId::from_ulid(Ulid::new());
        let parsed: JobId = job.to_string().parse().unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn rejects_missing_prefix() {
        let raw = Ulid::new().to_string();
        let err = raw.parse::<JobId>().unwrap_err();
        assert!(matches!(err, IdParseError::MissingPrefix { expected: "job-", .. }));
    }

    #[test]
    fn rejects_garbage_after_prefix() {
        let err = "job-not-a-ulid".parse::<JobId>().unwrap_err();
        assert!(matches!(err, IdParseError::InvalidUlid { .. }));
    }

    #[test]
    fn serializes_as_display_string() {
        let job = JobId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(json, format!("\"{job}\""));

        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = JobId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = JobId::from_ulid(Ulid::new());
        assert!(id1 < id2);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<JobId>(), std::mem::size_of::<Ulid>());
    }
}
