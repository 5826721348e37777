use crate::availability::{AvailabilityParseError, Person, parse_interval_string};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<AvailabilityParseError> for PersistenceError {
    fn from(value: AvailabilityParseError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Per-person-per-cohort scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStatus {
    AwaitingGrouping,
    Grouped,
    Ungroupable,
}

/// Role a person enrolled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortRole {
    Participant,
    Facilitator,
}

/// Role a person holds inside a persisted group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Participant,
    Facilitator,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = PersistenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(PersistenceError::InvalidData(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(GroupingStatus {
    AwaitingGrouping => "awaiting_grouping",
    Grouped => "grouped",
    Ungroupable => "ungroupable",
});

string_enum!(CohortRole {
    Participant => "participant",
    Facilitator => "facilitator",
});

string_enum!(GroupRole {
    Participant => "participant",
    Facilitator => "facilitator",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRecord {
    pub cohort_id: i64,
    pub cohort_name: String,
    pub course_id: i64,
    pub cohort_start_date: Option<NaiveDate>,
    pub number_of_group_meetings: Option<u32>,
}

/// A user enrolled in a cohort and still waiting for a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMemberRow {
    pub user_id: i64,
    pub discord_id: String,
    pub nickname: Option<String>,
    pub discord_username: Option<String>,
    pub timezone: Option<String>,
    pub availability_utc: Option<String>,
    pub if_needed_availability_utc: Option<String>,
    pub cohort_role: CohortRole,
}

impl CohortMemberRow {
    pub fn display_name(&self) -> String {
        self.nickname
            .clone()
            .or_else(|| self.discord_username.clone())
            .unwrap_or_else(|| format!("User {}", self.user_id))
    }

    /// `None` when the user has no usable availability.
    pub fn to_person(&self) -> Option<Person> {
        person_from_stored(
            &self.discord_id,
            self.display_name(),
            self.timezone.as_deref(),
            self.availability_utc.as_deref(),
            self.if_needed_availability_utc.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group_id: i64,
    pub cohort_id: i64,
    pub group_name: String,
    pub recurring_meeting_time_utc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberRecord {
    pub user_id: i64,
    pub role: GroupRole,
}

/// Builds a schedulable person from stored interval strings.
///
/// Unparseable availability is logged and treated as missing so one bad profile cannot abort
/// a whole run.
pub(crate) fn person_from_stored(
    id: &str,
    name: String,
    timezone: Option<&str>,
    availability: Option<&str>,
    if_needed: Option<&str>,
) -> Option<Person> {
    let parse = |raw: Option<&str>, column: &str| match parse_interval_string(raw.unwrap_or("")) {
        Ok(intervals) => intervals,
        Err(err) => {
            warn!(user = id, column, error = %err, "ignoring unparseable availability");
            Vec::new()
        }
    };
    let mut person = Person::new(id, name)
        .with_intervals(parse(availability, "availability_utc"))
        .with_if_needed(parse(if_needed, "if_needed_availability_utc"))
        .with_timezone(timezone.filter(|tz| !tz.trim().is_empty()).unwrap_or("UTC"));
    if let Err(err) = person.normalize() {
        warn!(user = id, error = %err, "ignoring out-of-range availability");
        return None;
    }
    person.has_availability().then_some(person)
}

/// Database operations available inside one cohort-scheduling transaction.
pub trait CohortTransaction {
    fn cohort_by_id(&mut self, cohort_id: i64) -> PersistenceResult<Option<CohortRecord>>;
    fn awaiting_members(&mut self, cohort_id: i64) -> PersistenceResult<Vec<CohortMemberRow>>;
    fn create_group(
        &mut self,
        cohort_id: i64,
        group_name: &str,
        meeting_time: &str,
    ) -> PersistenceResult<GroupRecord>;
    fn add_user_to_group(
        &mut self,
        group_id: i64,
        user_id: i64,
        role: GroupRole,
    ) -> PersistenceResult<()>;
    /// Bulk update keyed by `(cohort_id, user_id in user_ids)`; returns rows touched.
    fn set_grouping_status(
        &mut self,
        cohort_id: i64,
        user_ids: &[i64],
        status: GroupingStatus,
    ) -> PersistenceResult<usize>;
}

/// Storage that can run work atomically: everything `work` writes commits on `Ok` and is
/// rolled back on `Err`.
pub trait CohortStore {
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CohortTransaction) -> Result<T, E>,
        E: From<PersistenceError>;
}

impl<S: CohortStore> CohortStore for Arc<S> {
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CohortTransaction) -> Result<T, E>,
        E: From<PersistenceError>,
    {
        (**self).in_transaction(work)
    }
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{load_people_from_csv, load_people_from_json, save_result_to_json};
