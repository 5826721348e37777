//! Scheduling a single persisted cohort and writing the groups back.

use crate::availability::{Person, format_time_range};
use crate::config::SchedulingOptions;
use crate::error::{SchedulingError, SchedulingResult};
use crate::optimizer::{Balancer, GreedyOptimizer, GroupOptimizer, ProgressObserver, SizeBalancer};
use crate::orchestrator::Scheduler;
use crate::persistence::{
    CohortMemberRow, CohortRole, CohortStore, CohortTransaction, GroupRole, GroupingStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, info_span, warn};

/// Meeting time recorded for a group the optimizer could not place in the week.
pub const UNSCHEDULED_MEETING_TIME: &str = "TBD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortGroupSummary {
    pub group_id: i64,
    pub group_name: String,
    pub member_count: usize,
    pub meeting_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSchedulingResult {
    pub cohort_id: i64,
    pub cohort_name: String,
    pub groups_created: usize,
    pub users_grouped: usize,
    pub users_ungroupable: usize,
    pub groups: Vec<CohortGroupSummary>,
}

impl CohortSchedulingResult {
    fn empty(cohort_id: i64, cohort_name: String) -> Self {
        Self {
            cohort_id,
            cohort_name,
            groups_created: 0,
            users_grouped: 0,
            users_ungroupable: 0,
            groups: Vec::new(),
        }
    }
}

/// Something that can run a whole cohort scheduling pass on request.
pub trait SchedulingInvoker: Send + Sync {
    fn schedule_cohort(
        &self,
        cohort_id: i64,
        options: &SchedulingOptions,
        observer: &dyn ProgressObserver,
    ) -> SchedulingResult<CohortSchedulingResult>;
}

impl<O, B> Scheduler<O, B>
where
    O: GroupOptimizer,
    B: Balancer,
{
    /// Schedules everyone awaiting grouping in `cohort_id` and persists the outcome.
    ///
    /// The awaiting members are read in one short transaction and the groups are written in
    /// another, so the store stays available to other callers while the optimizer runs. The
    /// write is all-or-nothing: any failure leaves every status at `awaiting_grouping`.
    /// Concurrent runs against the same cohort must be serialized by the caller.
    pub fn schedule_cohort<S: CohortStore>(
        &self,
        store: &S,
        cohort_id: i64,
        options: &SchedulingOptions,
        observer: &dyn ProgressObserver,
    ) -> SchedulingResult<CohortSchedulingResult> {
        let span = info_span!("cohort", cohort_id);
        let _entered = span.enter();

        let (cohort_name, rows) =
            store.in_transaction(|tx| -> SchedulingResult<(String, Vec<CohortMemberRow>)> {
                let cohort = tx
                    .cohort_by_id(cohort_id)?
                    .ok_or(SchedulingError::CohortNotFound(cohort_id))?;
                Ok((cohort.cohort_name, tx.awaiting_members(cohort_id)?))
            })?;
        if rows.is_empty() {
            info!("no members awaiting grouping");
            return Ok(CohortSchedulingResult::empty(cohort_id, cohort_name));
        }

        let mut people = Vec::with_capacity(rows.len());
        let mut facilitator_ids = HashSet::new();
        for row in &rows {
            let Some(person) = row.to_person() else {
                continue;
            };
            if row.cohort_role == CohortRole::Facilitator {
                facilitator_ids.insert(person.id.clone());
            }
            people.push(person);
        }
        if people.is_empty() {
            // Nobody can be scheduled; leave statuses as they are.
            warn!(members = rows.len(), "no member has availability set");
            let mut result = CohortSchedulingResult::empty(cohort_id, cohort_name);
            result.users_ungroupable = rows.len();
            return Ok(result);
        }

        let facilitators = (!facilitator_ids.is_empty()).then_some(&facilitator_ids);
        let scheduled = self.schedule_people(&people, options, facilitators, observer)?;

        store.in_transaction(|tx| -> SchedulingResult<CohortSchedulingResult> {
            let user_ids: HashMap<&str, i64> = rows
                .iter()
                .map(|row| (row.discord_id.as_str(), row.user_id))
                .collect();
            let mut result = CohortSchedulingResult::empty(cohort_id, cohort_name);
            let mut grouped: Vec<i64> = Vec::new();

            let groups = scheduled
                .course_results
                .iter()
                .flat_map(|course| course.groups.iter());
            for (index, group) in groups.enumerate() {
                let group_name = format!("Group {}", index + 1);
                let meeting_time = group
                    .selected_time
                    .as_ref()
                    .map(format_time_range)
                    .unwrap_or_else(|| UNSCHEDULED_MEETING_TIME.to_string());
                let record = tx.create_group(cohort_id, &group_name, &meeting_time)?;
                add_members(
                    tx,
                    record.group_id,
                    &group.people,
                    &user_ids,
                    &facilitator_ids,
                    &mut grouped,
                )?;

                result.groups.push(CohortGroupSummary {
                    group_id: record.group_id,
                    group_name,
                    member_count: group.len(),
                    meeting_time,
                });
            }

            let grouped_set: HashSet<i64> = grouped.iter().copied().collect();
            let ungroupable: Vec<i64> = rows
                .iter()
                .map(|row| row.user_id)
                .filter(|id| !grouped_set.contains(id))
                .collect();
            tx.set_grouping_status(cohort_id, &grouped, GroupingStatus::Grouped)?;
            tx.set_grouping_status(cohort_id, &ungroupable, GroupingStatus::Ungroupable)?;

            result.groups_created = result.groups.len();
            result.users_grouped = grouped.len();
            result.users_ungroupable = ungroupable.len();
            info!(
                groups = result.groups_created,
                grouped = result.users_grouped,
                ungroupable = result.users_ungroupable,
                "cohort scheduled"
            );
            Ok(result)
        })
    }
}

fn add_members(
    tx: &mut dyn CohortTransaction,
    group_id: i64,
    people: &[Person],
    user_ids: &HashMap<&str, i64>,
    facilitator_ids: &HashSet<String>,
    grouped: &mut Vec<i64>,
) -> SchedulingResult<()> {
    for person in people {
        let Some(&user_id) = user_ids.get(person.id.as_str()) else {
            warn!(person = %person.id, "grouped person has no cohort row");
            continue;
        };
        let role = if facilitator_ids.contains(&person.id) {
            GroupRole::Facilitator
        } else {
            GroupRole::Participant
        };
        tx.add_user_to_group(group_id, user_id, role)?;
        grouped.push(user_id);
    }
    Ok(())
}

/// Binds a store and a scheduler so surfaces can trigger cohort runs by id.
pub struct CohortScheduler<S, O = GreedyOptimizer, B = SizeBalancer> {
    store: S,
    scheduler: Scheduler<O, B>,
}

impl<S, O, B> CohortScheduler<S, O, B>
where
    S: CohortStore,
    O: GroupOptimizer,
    B: Balancer,
{
    pub fn new(store: S, scheduler: Scheduler<O, B>) -> Self {
        Self { store, scheduler }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler<O, B> {
        &self.scheduler
    }
}

impl<S, O, B> SchedulingInvoker for CohortScheduler<S, O, B>
where
    S: CohortStore + Send + Sync,
    O: GroupOptimizer + Send + Sync,
    B: Balancer + Send + Sync,
{
    fn schedule_cohort(
        &self,
        cohort_id: i64,
        options: &SchedulingOptions,
        observer: &dyn ProgressObserver,
    ) -> SchedulingResult<CohortSchedulingResult> {
        self.scheduler
            .schedule_cohort(&self.store, cohort_id, options, observer)
    }
}
