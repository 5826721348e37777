//! Ad-hoc overlap search for a hand-picked set of people.
//!
//! Availability here is hour-granular (`"Monday" -> ["14:00", ...]`), as captured at signup,
//! rather than the minute ranges used by the optimizer.

use crate::availability::{Interval, MINUTES_PER_DAY, MINUTES_PER_HOUR, Person, SlotPreference};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Highest valid `hour` of an [`HourSlot`].
pub const LAST_HOUR: u32 = 23;

/// One UTC hour of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawHourSlot")]
pub struct HourSlot {
    #[serde(with = "weekday_name")]
    day: Weekday,
    hour: u32,
}

#[derive(Deserialize)]
struct RawHourSlot {
    #[serde(with = "weekday_name")]
    day: Weekday,
    hour: u32,
}

impl TryFrom<RawHourSlot> for HourSlot {
    type Error = String;

    fn try_from(raw: RawHourSlot) -> Result<Self, Self::Error> {
        HourSlot::new(raw.day, raw.hour).ok_or_else(|| format!("hour {} is out of range", raw.hour))
    }
}

impl HourSlot {
    /// Returns `None` unless `hour` is in `0..=23`.
    pub fn new(day: Weekday, hour: u32) -> Option<Self> {
        (hour <= LAST_HOUR).then_some(Self { day, hour })
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn day_name(&self) -> &'static str {
        weekday_name::full(self.day)
    }

    pub fn interval(&self) -> Interval {
        let start = self.day.num_days_from_monday() * MINUTES_PER_DAY + self.hour * MINUTES_PER_HOUR;
        Interval::new(start, start + MINUTES_PER_HOUR)
    }

    /// The UTC instant this slot falls on during the week containing `reference`.
    fn instant_in_week_of(&self, reference: DateTime<Utc>) -> DateTime<Utc> {
        let date = reference.date_naive();
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        let day = monday + Duration::days(i64::from(self.day.num_days_from_monday()));
        day.and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(self.hour))
    }

    /// Renders this slot in `tz_name` for the current week.
    ///
    /// See [`HourSlot::to_local_at`].
    pub fn to_local(&self, tz_name: &str) -> LocalMeetingTime {
        self.to_local_at(tz_name, Utc::now())
    }

    /// Renders this slot in `tz_name`, resolving daylight saving as of the week containing
    /// `reference`.
    ///
    /// An unknown IANA name leaves the time in UTC and uses the raw name as the abbreviation.
    pub fn to_local_at(&self, tz_name: &str, reference: DateTime<Utc>) -> LocalMeetingTime {
        let instant = self.instant_in_week_of(reference);
        let (day, minute_of_day, abbreviation) = match tz_name.parse::<Tz>() {
            Ok(tz) => {
                let local = instant.with_timezone(&tz);
                (
                    local.weekday(),
                    local.hour() * MINUTES_PER_HOUR + local.minute(),
                    local.format("%Z").to_string(),
                )
            }
            Err(_) => {
                debug!(timezone = tz_name, "unknown timezone, showing UTC");
                (self.day, self.hour * MINUTES_PER_HOUR, tz_name.to_string())
            }
        };
        let day_name = weekday_name::full(day);
        LocalMeetingTime {
            day,
            description: format!(
                "{day_name}s {} {abbreviation}",
                format_clock_range(minute_of_day, minute_of_day + MINUTES_PER_HOUR)
            ),
        }
    }
}

impl fmt::Display for HourSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:00 UTC", self.day_name(), self.hour)
    }
}

/// A matched slot as one member sees it, e.g. `"Wednesdays 3:00-4:00pm EST"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalMeetingTime {
    #[serde(with = "weekday_name")]
    pub day: Weekday,
    pub description: String,
}

impl fmt::Display for LocalMeetingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Current abbreviation for an IANA timezone (`"EST"`, `"CEST"`), or the name itself when it
/// is not a known zone.
pub fn timezone_abbreviation(tz_name: &str) -> String {
    timezone_abbreviation_at(tz_name, Utc::now())
}

pub fn timezone_abbreviation_at(tz_name: &str, reference: DateTime<Utc>) -> String {
    match tz_name.parse::<Tz>() {
        Ok(tz) => reference.with_timezone(&tz).format("%Z").to_string(),
        Err(_) => tz_name.to_string(),
    }
}

/// `"3:00-4:00pm"`; the first suffix is only written when the range crosses noon or midnight.
fn format_clock_range(start_minute: u32, end_minute: u32) -> String {
    let (start, start_suffix) = twelve_hour(start_minute);
    let (end, end_suffix) = twelve_hour(end_minute);
    if start_suffix == end_suffix {
        format!("{start}-{end}{end_suffix}")
    } else {
        format!("{start}{start_suffix}-{end}{end_suffix}")
    }
}

fn twelve_hour(minute_of_day: u32) -> (String, &'static str) {
    let minute_of_day = minute_of_day % MINUTES_PER_DAY;
    let hour = minute_of_day / MINUTES_PER_HOUR;
    let suffix = if hour < 12 { "am" } else { "pm" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    (format!("{display}:{:02}", minute_of_day % MINUTES_PER_HOUR), suffix)
}

mod weekday_name {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn full(day: Weekday) -> &'static str {
        match day {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(full(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Weekday>()
            .map_err(|_| D::Error::custom(format!("unknown weekday '{name}'")))
    }
}

/// Hour-granular weekly availability keyed by day name, with `"HH:MM"` slot strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySlots {
    #[serde(default)]
    pub available: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub if_needed: HashMap<String, Vec<String>>,
}

impl WeeklySlots {
    pub fn available_slots(&self) -> Vec<HourSlot> {
        parse_slots(&self.available)
    }

    pub fn if_needed_slots(&self) -> Vec<HourSlot> {
        parse_slots(&self.if_needed)
    }

    pub fn add_available(&mut self, slot: HourSlot) {
        push_slot(&mut self.available, slot);
    }

    pub fn add_if_needed(&mut self, slot: HourSlot) {
        push_slot(&mut self.if_needed, slot);
    }

    /// Hours fully inside confirmed time become available; hours that need if-needed time to
    /// be fully covered become if-needed.
    pub fn from_person(person: &Person) -> Self {
        let coverage = person.coverage();
        let mut slots = Self::default();
        for day in WEEKDAYS {
            for hour in 0..24 {
                let slot = HourSlot { day, hour };
                match coverage.preference_for(&slot.interval(), true) {
                    SlotPreference::Available => slots.add_available(slot),
                    SlotPreference::IfNeeded => slots.add_if_needed(slot),
                    SlotPreference::Unavailable => {}
                }
            }
        }
        slots
    }
}

fn push_slot(map: &mut HashMap<String, Vec<String>>, slot: HourSlot) {
    map.entry(slot.day_name().to_string())
        .or_default()
        .push(format!("{:02}:00", slot.hour));
}

fn parse_slots(map: &HashMap<String, Vec<String>>) -> Vec<HourSlot> {
    let mut out = Vec::new();
    for (day_name, slots) in map {
        let Ok(day) = day_name.parse::<Weekday>() else {
            warn!(day = %day_name, "skipping availability for unknown day");
            continue;
        };
        for slot in slots {
            let parsed = slot
                .split(':')
                .next()
                .and_then(|h| h.trim().parse::<u32>().ok())
                .and_then(|hour| HourSlot::new(day, hour));
            match parsed {
                Some(hour_slot) => out.push(hour_slot),
                None => warn!(day = %day_name, slot = %slot, "skipping malformed availability slot"),
            }
        }
    }
    out
}

/// Resolves a member's hour-granular availability.
pub trait AvailabilityLookup {
    fn weekly_slots(&self, member_id: &str) -> Option<WeeklySlots>;
}

impl AvailabilityLookup for HashMap<String, WeeklySlots> {
    fn weekly_slots(&self, member_id: &str) -> Option<WeeklySlots> {
        self.get(member_id).cloned()
    }
}

impl<F> AvailabilityLookup for F
where
    F: Fn(&str) -> Option<WeeklySlots>,
{
    fn weekly_slots(&self, member_id: &str) -> Option<WeeklySlots> {
        self(member_id)
    }
}

/// Finds one UTC hour where every member can meet.
///
/// A slot where everyone is fully available always wins over one that needs an if-needed
/// participant. Among equally good slots the first one encountered is returned; map iteration
/// order is unspecified, so callers must not rely on which of several qualifying slots comes
/// back.
pub fn find_availability_overlap<S, L>(member_ids: &[S], lookup: &L) -> Option<HourSlot>
where
    S: AsRef<str>,
    L: AvailabilityLookup + ?Sized,
{
    let mut available: HashMap<HourSlot, HashSet<&str>> = HashMap::new();
    let mut if_needed: HashMap<HourSlot, HashSet<&str>> = HashMap::new();

    for member_id in member_ids.iter().map(AsRef::as_ref) {
        let Some(slots) = lookup.weekly_slots(member_id) else {
            debug!(member = member_id, "no availability on record");
            continue;
        };
        for slot in slots.available_slots() {
            available.entry(slot).or_default().insert(member_id);
        }
        for slot in slots.if_needed_slots() {
            if_needed.entry(slot).or_default().insert(member_id);
        }
    }

    let requested: HashSet<&str> = member_ids.iter().map(AsRef::as_ref).collect();

    for (slot, ids) in &available {
        if *ids == requested {
            return Some(*slot);
        }
    }

    let candidates: HashSet<HourSlot> = available.keys().chain(if_needed.keys()).copied().collect();
    for slot in candidates {
        let mut combined: HashSet<&str> = available.get(&slot).cloned().unwrap_or_default();
        if let Some(ids) = if_needed.get(&slot) {
            combined.extend(ids.iter().copied());
        }
        if combined == requested {
            return Some(slot);
        }
    }

    None
}
