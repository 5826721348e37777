use crate::availability::MINUTES_PER_WEEK;
use crate::error::SchedulingError;
use crate::persistence::PersistenceResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Knobs for one scheduling run. Every field has a default so partial JSON files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingOptions {
    /// Meeting duration in minutes.
    pub meeting_length: u32,
    pub min_size: usize,
    pub max_size: usize,
    /// Optimizer iterations per course.
    pub iterations: usize,
    /// Step between candidate meeting starts, in minutes.
    pub time_increment: u32,
    /// Weight handed to the optimizer for randomized choices, 0..=1.
    pub randomness: f64,
    pub balance: bool,
    pub use_if_needed: bool,
    /// Require a facilitator in every group.
    pub facilitator_mode: bool,
    /// Per-facilitator cap on the number of groups they may lead. Absent means unlimited.
    pub facilitator_max_groups: HashMap<String, usize>,
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self {
            meeting_length: 60,
            min_size: 4,
            max_size: 8,
            iterations: 1000,
            time_increment: 30,
            randomness: 0.5,
            balance: true,
            use_if_needed: true,
            facilitator_mode: false,
            facilitator_max_groups: HashMap::new(),
        }
    }
}

impl SchedulingOptions {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        let invalid = |message: String| Err(SchedulingError::InvalidOptions(message));
        if self.meeting_length == 0 || self.meeting_length > MINUTES_PER_WEEK {
            return invalid(format!(
                "meeting_length must be between 1 and {MINUTES_PER_WEEK} minutes (got {})",
                self.meeting_length
            ));
        }
        if self.time_increment == 0 {
            return invalid("time_increment must be positive".to_string());
        }
        if self.min_size == 0 {
            return invalid("min_size must be at least 1".to_string());
        }
        if self.min_size > self.max_size {
            return invalid(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            ));
        }
        if self.iterations == 0 {
            return invalid("iterations must be at least 1".to_string());
        }
        if !self.randomness.is_finite() || !(0.0..=1.0).contains(&self.randomness) {
            return invalid(format!(
                "randomness must be between 0 and 1 (got {})",
                self.randomness
            ));
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> PersistenceResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Updates one field from its textual form, as typed at the CLI.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SchedulingError> {
        let bad_value =
            || SchedulingError::InvalidOptions(format!("cannot parse '{value}' for {key}"));
        match key {
            "meeting_length" => self.meeting_length = value.parse().map_err(|_| bad_value())?,
            "min_size" => self.min_size = value.parse().map_err(|_| bad_value())?,
            "max_size" => self.max_size = value.parse().map_err(|_| bad_value())?,
            "iterations" => self.iterations = value.parse().map_err(|_| bad_value())?,
            "time_increment" => self.time_increment = value.parse().map_err(|_| bad_value())?,
            "randomness" => self.randomness = value.parse().map_err(|_| bad_value())?,
            "balance" => self.balance = value.parse().map_err(|_| bad_value())?,
            "use_if_needed" => self.use_if_needed = value.parse().map_err(|_| bad_value())?,
            "facilitator_mode" => self.facilitator_mode = value.parse().map_err(|_| bad_value())?,
            other => {
                return Err(SchedulingError::InvalidOptions(format!(
                    "unknown option '{other}'"
                )));
            }
        }
        Ok(())
    }
}
