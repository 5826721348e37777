//! Contract with the group-formation optimizer and the size balancer.
//!
//! The orchestrator only depends on the traits here. [`greedy`] ships simple deterministic
//! implementations so the crate runs end to end; production deployments can plug in a
//! stronger search.

use crate::availability::{Interval, Person};
use crate::error::SchedulingResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod greedy;

pub use greedy::{GreedyOptimizer, SizeBalancer};

/// A proposed cohort: members, the weekly meeting slot if one was found, and a fitness score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub people: Vec<Person>,
    pub selected_time: Option<Interval>,
    pub score: f64,
}

impl Group {
    pub fn new(people: Vec<Person>, selected_time: Option<Interval>) -> Self {
        Self {
            people,
            selected_time,
            score: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.people.iter().map(|p| p.id.as_str())
    }
}

/// Inputs for one optimizer call.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerRequest<'a> {
    pub people: &'a [Person],
    pub meeting_length: u32,
    pub min_size: usize,
    pub max_size: usize,
    pub iterations: usize,
    pub time_increment: u32,
    pub randomness: f64,
    /// Facilitators among `people`; `None` disables facilitator mode.
    pub facilitator_ids: Option<&'a HashSet<String>>,
    pub facilitator_max_groups: Option<&'a HashMap<String, usize>>,
    pub use_if_needed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOutcome {
    pub groups: Vec<Group>,
    /// People successfully placed.
    pub score: usize,
    pub best_iteration: usize,
    pub iterations_run: usize,
}

/// Reported once per optimizer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerProgress {
    pub iteration: usize,
    pub total: usize,
    pub best_score: usize,
    pub population: usize,
}

/// Per-iteration hook. Returning `Break` asks the optimizer to stop.
pub type ProgressFn<'a> = dyn FnMut(OptimizerProgress) -> ControlFlow<()> + 'a;

pub trait GroupOptimizer {
    /// Proposes groups for `request.people`. Must return `SchedulingError::Cancelled` when the
    /// progress hook breaks.
    fn optimize(
        &self,
        request: &OptimizerRequest<'_>,
        progress: &mut ProgressFn<'_>,
    ) -> SchedulingResult<OptimizerOutcome>;
}

pub trait Balancer {
    /// Evens out group sizes in place without breaking anyone's availability. Returns how many
    /// people were moved.
    fn balance(
        &self,
        groups: &mut [Group],
        meeting_length: u32,
        use_if_needed: bool,
        facilitator_ids: Option<&HashSet<String>>,
    ) -> SchedulingResult<usize>;
}

/// Course-aware progress sink handed to the orchestrator.
///
/// Implementations must not block; they run on the scheduling thread between iterations.
pub trait ProgressObserver: Send + Sync {
    fn on_iteration(&self, course: &str, progress: &OptimizerProgress) -> ControlFlow<()>;
}

/// Observer that never cancels and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_iteration(&self, _course: &str, _progress: &OptimizerProgress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Shared flag that cancels an in-flight run at the next iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl ProgressObserver for CancellationFlag {
    fn on_iteration(&self, _course: &str, _progress: &OptimizerProgress) -> ControlFlow<()> {
        if self.is_cancelled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}
