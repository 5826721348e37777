use super::{
    Balancer, Group, GroupOptimizer, OptimizerOutcome, OptimizerProgress, OptimizerRequest,
    ProgressFn,
};
use crate::availability::{AvailabilityCoverage, Interval, MINUTES_PER_WEEK, Person, SlotPreference};
use crate::error::{SchedulingError, SchedulingResult};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Deterministic first-fit packer.
///
/// Each iteration rotates the order people are considered in, then repeatedly opens the group
/// whose meeting start admits the most remaining people. The best iteration by placed count
/// wins. `randomness` is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyOptimizer;

struct Candidate {
    slot: Interval,
    members: Vec<(usize, SlotPreference)>,
    fully_available: usize,
}

struct Packing {
    groups: Vec<Group>,
    placed: usize,
}

impl GreedyOptimizer {
    /// Meetings never wrap from Sunday night into Monday morning.
    fn candidate_slots(meeting_length: u32, time_increment: u32) -> Vec<Interval> {
        if meeting_length == 0 || meeting_length > MINUTES_PER_WEEK {
            return Vec::new();
        }
        (0..=MINUTES_PER_WEEK - meeting_length)
            .step_by(time_increment.max(1) as usize)
            .map(|start| Interval::new(start, start + meeting_length))
            .collect()
    }

    fn pack(
        request: &OptimizerRequest<'_>,
        coverages: &[AvailabilityCoverage],
        slots: &[Interval],
        rotation: usize,
    ) -> Packing {
        let population = request.people.len();
        let mut remaining: Vec<usize> = (0..population)
            .map(|offset| (offset + rotation) % population)
            .collect();
        let mut groups_led: HashMap<&str, usize> = HashMap::new();
        let mut groups = Vec::new();
        let mut placed = 0;

        while remaining.len() >= request.min_size {
            let best = slots
                .par_iter()
                .filter_map(|slot| {
                    Self::evaluate(request, coverages, &remaining, &groups_led, *slot)
                })
                .max_by_key(|c| (c.members.len(), c.fully_available, Reverse(c.slot.start)));

            let Some(candidate) = best else {
                break;
            };

            let chosen: HashSet<usize> = candidate.members.iter().map(|(idx, _)| *idx).collect();
            remaining.retain(|idx| !chosen.contains(idx));

            let mut people = Vec::with_capacity(candidate.members.len());
            let mut score = 0.0;
            for (idx, preference) in &candidate.members {
                let person = &request.people[*idx];
                if Self::is_facilitator(request, person) {
                    *groups_led.entry(person.id.as_str()).or_default() += 1;
                }
                score += match preference {
                    SlotPreference::Available => 1.0,
                    _ => 0.5,
                };
                people.push(person.clone());
            }
            placed += people.len();
            groups.push(Group {
                people,
                selected_time: Some(candidate.slot),
                score,
            });
        }

        Packing { groups, placed }
    }

    fn evaluate(
        request: &OptimizerRequest<'_>,
        coverages: &[AvailabilityCoverage],
        remaining: &[usize],
        groups_led: &HashMap<&str, usize>,
        slot: Interval,
    ) -> Option<Candidate> {
        let mut facilitators = Vec::new();
        let mut participants = Vec::new();
        for &idx in remaining {
            let preference = coverages[idx].preference_for(&slot, request.use_if_needed);
            if preference == SlotPreference::Unavailable {
                continue;
            }
            let person = &request.people[idx];
            if Self::is_facilitator(request, person) {
                let led = groups_led.get(person.id.as_str()).copied().unwrap_or(0);
                if led < Self::facilitator_cap(request, person) {
                    facilitators.push((idx, preference));
                }
            } else {
                participants.push((idx, preference));
            }
        }

        // Stable sort keeps rotation order among equally available people.
        participants.sort_by_key(|(_, preference)| Reverse(*preference));
        facilitators.sort_by_key(|(_, preference)| Reverse(*preference));

        let mut members = Vec::with_capacity(request.max_size);
        if request.facilitator_ids.is_some() {
            members.push(*facilitators.first()?);
        } else {
            participants.extend(facilitators);
            participants.sort_by_key(|(_, preference)| Reverse(*preference));
        }
        let room = request.max_size.saturating_sub(members.len());
        members.extend(participants.into_iter().take(room));

        if members.len() < request.min_size {
            return None;
        }
        let fully_available = members
            .iter()
            .filter(|(_, preference)| *preference == SlotPreference::Available)
            .count();
        Some(Candidate {
            slot,
            members,
            fully_available,
        })
    }

    fn is_facilitator(request: &OptimizerRequest<'_>, person: &Person) -> bool {
        request
            .facilitator_ids
            .is_some_and(|ids| ids.contains(&person.id))
    }

    fn facilitator_cap(request: &OptimizerRequest<'_>, person: &Person) -> usize {
        request
            .facilitator_max_groups
            .and_then(|caps| caps.get(&person.id))
            .copied()
            .unwrap_or(usize::MAX)
    }
}

impl GroupOptimizer for GreedyOptimizer {
    fn optimize(
        &self,
        request: &OptimizerRequest<'_>,
        progress: &mut ProgressFn<'_>,
    ) -> SchedulingResult<OptimizerOutcome> {
        let population = request.people.len();
        let coverages: Vec<AvailabilityCoverage> =
            request.people.par_iter().map(Person::coverage).collect();
        let slots = Self::candidate_slots(request.meeting_length, request.time_increment);

        let mut best: Option<OptimizerOutcome> = None;
        let mut iterations_run = 0;
        // Rotations repeat after `population` iterations.
        let distinct = population.max(1);

        for iteration in 0..request.iterations {
            let packing = if population == 0 {
                Packing {
                    groups: Vec::new(),
                    placed: 0,
                }
            } else {
                Self::pack(request, &coverages, &slots, iteration)
            };
            iterations_run = iteration + 1;
            trace!(iteration, placed = packing.placed, "greedy iteration finished");

            if best.as_ref().is_none_or(|b| packing.placed > b.score) {
                best = Some(OptimizerOutcome {
                    groups: packing.groups,
                    score: packing.placed,
                    best_iteration: iteration,
                    iterations_run: 0,
                });
            }

            let best_score = best.as_ref().map_or(0, |b| b.score);
            let report = OptimizerProgress {
                iteration: iterations_run,
                total: request.iterations,
                best_score,
                population,
            };
            if progress(report).is_break() {
                debug!(iteration = iterations_run, "optimizer cancelled by caller");
                return Err(SchedulingError::Cancelled);
            }
            if best_score == population || iterations_run >= distinct {
                break;
            }
        }

        let mut outcome = best.unwrap_or_default();
        outcome.iterations_run = iterations_run;
        Ok(outcome)
    }
}

/// Moves people from the largest to the smallest timed group while the gap exceeds one and
/// someone in the larger group can attend the smaller group's slot. Facilitators stay put.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeBalancer;

impl Balancer for SizeBalancer {
    fn balance(
        &self,
        groups: &mut [Group],
        _meeting_length: u32,
        use_if_needed: bool,
        facilitator_ids: Option<&HashSet<String>>,
    ) -> SchedulingResult<usize> {
        let mut moves = 0;
        loop {
            let timed = groups
                .iter()
                .enumerate()
                .filter(|(_, group)| group.selected_time.is_some());
            let Some((largest, _)) = timed.clone().max_by_key(|(idx, g)| (g.len(), Reverse(*idx)))
            else {
                break;
            };
            let Some((smallest, _)) = timed.min_by_key(|(idx, g)| (g.len(), *idx)) else {
                break;
            };
            if groups[largest].len() <= groups[smallest].len() + 1 {
                break;
            }
            let Some(target) = groups[smallest].selected_time else {
                break;
            };

            let movable = groups[largest].people.iter().position(|person| {
                !facilitator_ids.is_some_and(|ids| ids.contains(&person.id))
                    && person.preference_for(&target, use_if_needed) != SlotPreference::Unavailable
            });
            let Some(position) = movable else {
                break;
            };
            let person = groups[largest].people.remove(position);
            trace!(person = %person.id, from = largest, to = smallest, "balancing move");
            groups[smallest].people.push(person);
            moves += 1;
        }
        Ok(moves)
    }
}
