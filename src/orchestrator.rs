//! Multi-course scheduling pass.
//!
//! Courses are processed strictly in the order the course grouper yields them. A person in
//! several courses has the meeting times committed by earlier courses removed from their
//! availability before later courses are scheduled, so earlier courses get first claim on that
//! person's week. This is a fairness trade-off, not an accident of implementation.

use crate::availability::{Interval, Person};
use crate::blocking::remove_blocked_intervals;
use crate::config::SchedulingOptions;
use crate::course::group_people_by_course;
use crate::error::{SchedulingError, SchedulingResult};
use crate::optimizer::{
    Balancer, GreedyOptimizer, Group, GroupOptimizer, OptimizerProgress, OptimizerRequest,
    ProgressObserver, SizeBalancer,
};
use crate::persistence::PersistenceResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, info_span};

/// Why a course produced no groups without the optimizer being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum CourseSkipReason {
    BelowMinimum { population: usize, min_size: usize },
    NoFacilitator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSchedulingResult {
    pub course: String,
    pub groups: Vec<Group>,
    /// People placed into groups.
    pub score: usize,
    pub unassigned: Vec<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<CourseSkipReason>,
}

impl CourseSchedulingResult {
    fn skipped(course: &str, people: &[&Person], reason: CourseSkipReason) -> Self {
        Self {
            course: course.to_string(),
            groups: Vec::new(),
            score: 0,
            unassigned: people.iter().map(|p| (*p).clone()).collect(),
            skipped: Some(reason),
        }
    }

    pub fn assigned_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiCourseSchedulingResult {
    /// One entry per course, in processing order.
    pub course_results: Vec<CourseSchedulingResult>,
    pub total_scheduled: usize,
    pub total_cohorts: usize,
    pub total_balance_moves: usize,
    /// Size of the input population before course partitioning.
    pub total_people: usize,
}

impl MultiCourseSchedulingResult {
    pub fn course(&self, course: &str) -> Option<&CourseSchedulingResult> {
        self.course_results.iter().find(|r| r.course == course)
    }

    pub fn summary(&self) -> String {
        format!(
            "people={}, scheduled={}, cohorts={}, balance_moves={}, courses={}",
            self.total_people,
            self.total_scheduled,
            self.total_cohorts,
            self.total_balance_moves,
            self.course_results.len()
        )
    }
}

/// A fresh read of everyone eligible for scheduling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeopleSnapshot {
    pub people: Vec<Person>,
    pub facilitator_ids: HashSet<String>,
}

/// Where the orchestrator loads people from.
pub trait PeopleSource {
    fn load_people(&self) -> PersistenceResult<PeopleSnapshot>;
}

impl PeopleSource for PeopleSnapshot {
    fn load_people(&self) -> PersistenceResult<PeopleSnapshot> {
        Ok(self.clone())
    }
}

/// Applies `options.facilitator_mode` to the people marked as facilitators.
///
/// With the mode off the marks are ignored and the run has no facilitator constraint. With
/// it on, an empty set is `NoFacilitators`.
pub fn facilitators_for_run<'a>(
    options: &SchedulingOptions,
    marked: &'a HashSet<String>,
) -> SchedulingResult<Option<&'a HashSet<String>>> {
    if !options.facilitator_mode {
        return Ok(None);
    }
    if marked.is_empty() {
        return Err(SchedulingError::NoFacilitators);
    }
    Ok(Some(marked))
}

/// Drives scheduling passes with an injected optimizer and balancer.
#[derive(Debug, Clone, Default)]
pub struct Scheduler<O = GreedyOptimizer, B = SizeBalancer> {
    optimizer: O,
    balancer: B,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O, B> Scheduler<O, B>
where
    O: GroupOptimizer,
    B: Balancer,
{
    pub fn with_components(optimizer: O, balancer: B) -> Self {
        Self {
            optimizer,
            balancer,
        }
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn balancer(&self) -> &B {
        &self.balancer
    }

    /// Loads a snapshot from `source` and schedules every course in it.
    ///
    /// Fails with `NoUsers` when nobody has availability, and with `NoFacilitators` when
    /// `options.facilitator_mode` is set but the snapshot marks nobody as a facilitator.
    pub fn schedule(
        &self,
        source: &dyn PeopleSource,
        options: &SchedulingOptions,
        observer: &dyn ProgressObserver,
    ) -> SchedulingResult<MultiCourseSchedulingResult> {
        let snapshot = source.load_people()?;
        if snapshot.people.is_empty() {
            return Err(SchedulingError::NoUsers);
        }
        let facilitator_ids = facilitators_for_run(options, &snapshot.facilitator_ids)?;
        self.schedule_people(&snapshot.people, options, facilitator_ids, observer)
    }

    /// Schedules each course in turn, carrying committed meeting times across courses.
    ///
    /// `facilitator_ids` switches facilitator mode on; an empty set counts as off. Courses that
    /// are too small or lack a facilitator are reported as skipped, not as errors. Optimizer
    /// and balancer failures abort the whole pass.
    pub fn schedule_people(
        &self,
        people: &[Person],
        options: &SchedulingOptions,
        facilitator_ids: Option<&HashSet<String>>,
        observer: &dyn ProgressObserver,
    ) -> SchedulingResult<MultiCourseSchedulingResult> {
        options.validate()?;
        if people.is_empty() {
            return Err(SchedulingError::NoUsers);
        }
        let facilitator_ids = facilitator_ids.filter(|ids| !ids.is_empty());
        let facilitator_max_groups = (!options.facilitator_max_groups.is_empty())
            .then_some(&options.facilitator_max_groups);

        let buckets = group_people_by_course(people);
        let mut blocked: HashMap<&str, Vec<Interval>> = HashMap::new();
        let mut result = MultiCourseSchedulingResult {
            course_results: Vec::with_capacity(buckets.len()),
            total_people: people.len(),
            ..MultiCourseSchedulingResult::default()
        };

        for (course, members) in buckets.iter() {
            let span = info_span!("course", course, population = members.len());
            let _entered = span.enter();

            if members.len() < options.min_size {
                info!(min_size = options.min_size, "not enough people, skipping course");
                result.course_results.push(CourseSchedulingResult::skipped(
                    course,
                    members,
                    CourseSkipReason::BelowMinimum {
                        population: members.len(),
                        min_size: options.min_size,
                    },
                ));
                continue;
            }

            let course_facilitators: Option<HashSet<String>> = match facilitator_ids {
                Some(ids) => {
                    let present: HashSet<String> = members
                        .iter()
                        .filter(|p| ids.contains(&p.id))
                        .map(|p| p.id.clone())
                        .collect();
                    if present.is_empty() {
                        info!("no facilitator enrolled, skipping course");
                        result.course_results.push(CourseSchedulingResult::skipped(
                            course,
                            members,
                            CourseSkipReason::NoFacilitator,
                        ));
                        continue;
                    }
                    Some(present)
                }
                None => None,
            };

            let adjusted: Vec<Person> = members
                .iter()
                .map(|person| {
                    let taken = blocked.get(person.id.as_str()).map_or(&[][..], Vec::as_slice);
                    remove_blocked_intervals(person, taken).into_owned()
                })
                .collect();

            let request = OptimizerRequest {
                people: &adjusted,
                meeting_length: options.meeting_length,
                min_size: options.min_size,
                max_size: options.max_size,
                iterations: options.iterations,
                time_increment: options.time_increment,
                randomness: options.randomness,
                facilitator_ids: course_facilitators.as_ref(),
                facilitator_max_groups,
                use_if_needed: options.use_if_needed,
            };
            let mut report = |progress: OptimizerProgress| observer.on_iteration(course, &progress);
            let outcome = self.optimizer.optimize(&request, &mut report)?;

            let mut groups = outcome.groups;
            let mut moves = 0;
            if options.balance && groups.len() >= 2 {
                moves = self.balancer.balance(
                    &mut groups,
                    options.meeting_length,
                    options.use_if_needed,
                    course_facilitators.as_ref(),
                )?;
            }

            for group in &groups {
                let Some(time) = group.selected_time else {
                    continue;
                };
                for member in &group.people {
                    // Key by the bucket's borrowed id so the map outlives `groups`.
                    if let Some(original) = members.iter().find(|p| p.id == member.id) {
                        blocked.entry(original.id.as_str()).or_default().push(time);
                    }
                }
            }

            let assigned: HashSet<&str> = groups.iter().flat_map(Group::member_ids).collect();
            let unassigned: Vec<Person> = members
                .iter()
                .filter(|p| !assigned.contains(p.id.as_str()))
                .map(|p| (*p).clone())
                .collect();
            let score = if groups.is_empty() { 0 } else { outcome.score };

            info!(
                groups = groups.len(),
                scheduled = score,
                unassigned = unassigned.len(),
                balance_moves = moves,
                best_iteration = outcome.best_iteration,
                iterations_run = outcome.iterations_run,
                "course scheduled"
            );

            result.total_scheduled += score;
            result.total_cohorts += groups.len();
            result.total_balance_moves += moves;
            result.course_results.push(CourseSchedulingResult {
                course: course.to_string(),
                groups,
                score,
                unassigned,
                skipped: None,
            });
        }

        info!(
            people = result.total_people,
            scheduled = result.total_scheduled,
            cohorts = result.total_cohorts,
            balance_moves = result.total_balance_moves,
            "scheduling pass finished"
        );
        Ok(result)
    }
}
