use crate::persistence::PersistenceError;
use thiserror::Error;

/// Failures surfaced by a scheduling run.
///
/// Per-course shortfalls (too few people, no facilitator enrolled in that course) are not
/// errors; they are reported inside the course's result instead.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("no users have set their availability yet")]
    NoUsers,
    #[error("facilitator mode is enabled but no facilitators are marked")]
    NoFacilitators,
    #[error("cohort {0} not found")]
    CohortNotFound(i64),
    #[error("invalid scheduling options: {0}")]
    InvalidOptions(String),
    #[error("scheduling was cancelled")]
    Cancelled,
    #[error("group optimizer failed: {0}")]
    Optimizer(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;
