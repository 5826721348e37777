//! Weekly availability expressed as UTC minute ranges.
//!
//! A week starts Monday 00:00 UTC (minute 0) and ends at minute 10080. Ranges are half-open,
//! so `[60, 120)` and `[120, 180)` touch without conflicting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;
pub const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

/// Day codes used by the stored interval-string format, Monday first.
const DAY_CODES: [char; 7] = ['M', 'T', 'W', 'R', 'F', 'S', 'U'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid availability entry {entry:?}: {reason}")]
pub struct AvailabilityParseError {
    pub entry: String,
    pub reason: String,
}

impl AvailabilityParseError {
    fn new(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

/// Half-open minute range `[start, end)` within one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub const fn new(start: u32, end: u32) -> Self {
        debug_assert!(start < end && end <= MINUTES_PER_WEEK);
        Self { start, end }
    }

    /// Builds an interval, rejecting empty, reversed or out-of-week ranges.
    pub fn checked(start: u32, end: u32) -> Result<Self, AvailabilityParseError> {
        if start >= end {
            return Err(AvailabilityParseError::new(
                format!("({start}, {end})"),
                "start must precede end",
            ));
        }
        if end > MINUTES_PER_WEEK {
            return Err(AvailabilityParseError::new(
                format!("({start}, {end})"),
                format!("end exceeds the week ({MINUTES_PER_WEEK} minutes)"),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn minutes(&self) -> u32 {
        self.end - self.start
    }

    pub fn conflicts_with(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<(u32, u32)> for Interval {
    fn from((start, end): (u32, u32)) -> Self {
        Self { start, end }
    }
}

impl From<Interval> for (u32, u32) {
    fn from(value: Interval) -> Self {
        (value.start, value.end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_time_range(self))
    }
}

/// How well a person fits a candidate meeting interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPreference {
    Unavailable,
    IfNeeded,
    Available,
}

/// A person as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub if_needed_intervals: Vec<Interval>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub experience: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            intervals: Vec::new(),
            if_needed_intervals: Vec::new(),
            timezone: default_timezone(),
            courses: Vec::new(),
            experience: String::new(),
        }
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_if_needed(mut self, intervals: Vec<Interval>) -> Self {
        self.if_needed_intervals = intervals;
        self
    }

    pub fn with_courses<I, S>(mut self, courses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.courses = courses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        self.experience = experience.into();
        self
    }

    pub fn has_availability(&self) -> bool {
        !self.intervals.is_empty() || !self.if_needed_intervals.is_empty()
    }

    /// Confirmed plus if-needed minutes.
    pub fn total_available_minutes(&self) -> u32 {
        self.intervals
            .iter()
            .chain(&self.if_needed_intervals)
            .map(Interval::minutes)
            .sum()
    }

    pub fn coverage(&self) -> AvailabilityCoverage {
        AvailabilityCoverage::of(self)
    }

    pub fn preference_for(&self, slot: &Interval, use_if_needed: bool) -> SlotPreference {
        self.coverage().preference_for(slot, use_if_needed)
    }

    /// Rejects out-of-week ranges, then sorts both sets, merges overlaps and removes
    /// if-needed time already covered by confirmed time.
    pub fn normalize(&mut self) -> Result<(), AvailabilityParseError> {
        for interval in self.intervals.iter().chain(&self.if_needed_intervals) {
            Interval::checked(interval.start, interval.end)?;
        }
        self.intervals = normalize_intervals(std::mem::take(&mut self.intervals));
        let if_needed = normalize_intervals(std::mem::take(&mut self.if_needed_intervals));
        self.if_needed_intervals = subtract_intervals(&if_needed, &self.intervals);
        Ok(())
    }
}

/// Merged, contiguous view of a person's time used for containment checks.
///
/// Touching stored ranges are coalesced here so a meeting may straddle two adjacent entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailabilityCoverage {
    confirmed: Vec<Interval>,
    with_if_needed: Vec<Interval>,
}

impl AvailabilityCoverage {
    pub fn of(person: &Person) -> Self {
        Self {
            confirmed: coalesce(person.intervals.iter().copied()),
            with_if_needed: coalesce(
                person
                    .intervals
                    .iter()
                    .chain(&person.if_needed_intervals)
                    .copied(),
            ),
        }
    }

    pub fn preference_for(&self, slot: &Interval, use_if_needed: bool) -> SlotPreference {
        if covers(&self.confirmed, slot) {
            SlotPreference::Available
        } else if use_if_needed && covers(&self.with_if_needed, slot) {
            SlotPreference::IfNeeded
        } else {
            SlotPreference::Unavailable
        }
    }
}

fn covers(coverage: &[Interval], slot: &Interval) -> bool {
    coverage.iter().any(|range| range.contains(slot))
}

fn coalesce(ranges: impl Iterator<Item = Interval>) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = ranges.collect();
    sorted.sort_unstable();
    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Sorts ranges and merges the ones that overlap. Touching ranges stay separate.
pub fn normalize_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_unstable();
    let mut normalized: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match normalized.last_mut() {
            Some(last) if interval.start < last.end => last.end = last.end.max(interval.end),
            _ => normalized.push(interval),
        }
    }
    normalized
}

/// Removes every minute of `removed` from `ranges`. Both inputs must be normalized.
fn subtract_intervals(ranges: &[Interval], removed: &[Interval]) -> Vec<Interval> {
    let mut out = Vec::with_capacity(ranges.len());
    for range in ranges {
        let mut cursor = range.start;
        for cut in removed.iter().filter(|cut| cut.conflicts_with(range)) {
            if cut.start > cursor {
                out.push(Interval::new(cursor, cut.start));
            }
            cursor = cursor.max(cut.end);
        }
        if cursor < range.end {
            out.push(Interval::new(cursor, range.end));
        }
    }
    out
}

/// Parses the stored availability format: comma separated `"<D><HH:MM> <D><HH:MM>"` entries
/// with day codes `M T W R F S U`, e.g. `"M09:00 M11:00, R18:30 R20:00"`.
///
/// An end of `M00:00` after a later start wraps to the end of the week. Blank input yields no
/// intervals.
pub fn parse_interval_string(input: &str) -> Result<Vec<Interval>, AvailabilityParseError> {
    let mut intervals = Vec::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut tokens = entry.split_whitespace();
        let (Some(start), Some(end), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(AvailabilityParseError::new(
                entry,
                "expected '<start> <end>' such as 'M09:00 M10:00'",
            ));
        };
        let start = parse_week_minute(start).map_err(|reason| AvailabilityParseError::new(entry, reason))?;
        let mut end = parse_week_minute(end).map_err(|reason| AvailabilityParseError::new(entry, reason))?;
        if end == 0 && start > 0 {
            end = MINUTES_PER_WEEK;
        }
        if start >= end {
            return Err(AvailabilityParseError::new(entry, "start must precede end"));
        }
        intervals.push(Interval::new(start, end));
    }
    Ok(normalize_intervals(intervals))
}

fn parse_week_minute(token: &str) -> Result<u32, String> {
    let mut chars = token.chars();
    let day = chars.next().ok_or_else(|| "empty time".to_string())?;
    let day_index = DAY_CODES
        .iter()
        .position(|code| *code == day.to_ascii_uppercase())
        .ok_or_else(|| format!("unknown day code '{day}'"))?;
    let (hours, minutes) = chars
        .as_str()
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM after the day code in '{token}'"))?;
    let hours: u32 = hours
        .parse()
        .map_err(|_| format!("invalid hour in '{token}'"))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| format!("invalid minute in '{token}'"))?;
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(format!("time out of range in '{token}'"));
    }
    Ok(day_index as u32 * MINUTES_PER_DAY + hours * MINUTES_PER_HOUR + minutes)
}

fn format_week_minute(minute: u32) -> String {
    if minute >= MINUTES_PER_WEEK {
        return "U24:00".to_string();
    }
    let day = DAY_CODES[(minute / MINUTES_PER_DAY) as usize];
    let within_day = minute % MINUTES_PER_DAY;
    format!(
        "{day}{:02}:{:02}",
        within_day / MINUTES_PER_HOUR,
        within_day % MINUTES_PER_HOUR
    )
}

/// Renders one interval in the stored format, e.g. `"M14:00 M15:00"`.
pub fn format_time_range(interval: &Interval) -> String {
    format!(
        "{} {}",
        format_week_minute(interval.start),
        format_week_minute(interval.end)
    )
}

/// Inverse of [`parse_interval_string`].
pub fn format_interval_string(intervals: &[Interval]) -> String {
    intervals
        .iter()
        .map(format_time_range)
        .collect::<Vec<_>>()
        .join(", ")
}
