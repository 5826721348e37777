use std::collections::HashMap;

use chrono::{TimeZone, Utc, Weekday};
use cohort_scheduling::availability::{Interval, Person};
use cohort_scheduling::overlap::{
    HourSlot, WeeklySlots, find_availability_overlap, timezone_abbreviation_at,
};

fn slots(available: Vec<(&str, Vec<&str>)>, if_needed: Vec<(&str, Vec<&str>)>) -> WeeklySlots {
    WeeklySlots {
        available: to_map(available),
        if_needed: to_map(if_needed),
    }
}

fn to_map(entries: Vec<(&str, Vec<&str>)>) -> HashMap<String, Vec<String>> {
    entries
        .into_iter()
        .map(|(day, hours)| (day.to_string(), hours.into_iter().map(str::to_string).collect()))
        .collect()
}

fn at(day: Weekday, hour: u32) -> HourSlot {
    HourSlot::new(day, hour).unwrap()
}

#[test]
fn finds_hour_where_everyone_is_available() {
    let mut lookup = HashMap::new();
    lookup.insert("a".to_string(), slots(vec![("Monday", vec!["14:00", "15:00"])], vec![]));
    lookup.insert("b".to_string(), slots(vec![("Monday", vec!["14:00"])], vec![]));
    lookup.insert(
        "c".to_string(),
        slots(vec![("Monday", vec!["14:00"]), ("Friday", vec!["09:00"])], vec![]),
    );

    let slot = find_availability_overlap(&["a", "b", "c"], &lookup);
    assert_eq!(slot, Some(at(Weekday::Mon, 14)));
    assert_eq!(slot.map(|s| s.to_string()).as_deref(), Some("Monday 14:00 UTC"));
}

#[test]
fn falls_back_to_if_needed_time() {
    let mut lookup = HashMap::new();
    lookup.insert("a".to_string(), slots(vec![("Tuesday", vec!["10:00"])], vec![]));
    lookup.insert("b".to_string(), slots(vec![], vec![("Tuesday", vec!["10:00"])]));

    let slot = find_availability_overlap(&["a", "b"], &lookup);
    assert_eq!(slot, Some(at(Weekday::Tue, 10)));
}

#[test]
fn fully_available_slot_beats_if_needed_slot() {
    let mut lookup = HashMap::new();
    lookup.insert(
        "a".to_string(),
        slots(vec![("Tuesday", vec!["10:00"]), ("Wednesday", vec!["08:00"])], vec![]),
    );
    lookup.insert(
        "b".to_string(),
        slots(vec![("Wednesday", vec!["08:00"])], vec![("Tuesday", vec!["10:00"])]),
    );

    let slot = find_availability_overlap(&["a", "b"], &lookup);
    assert_eq!(slot, Some(at(Weekday::Wed, 8)));
}

#[test]
fn member_without_availability_prevents_overlap() {
    let mut lookup = HashMap::new();
    lookup.insert("a".to_string(), slots(vec![("Monday", vec!["14:00"])], vec![]));

    assert_eq!(find_availability_overlap(&["a", "ghost"], &lookup), None);
}

#[test]
fn no_members_means_no_overlap() {
    let lookup: HashMap<String, WeeklySlots> = HashMap::new();
    let members: [&str; 0] = [];
    assert_eq!(find_availability_overlap(&members, &lookup), None);
}

#[test]
fn malformed_slots_are_skipped() {
    let mut lookup = HashMap::new();
    lookup.insert(
        "a".to_string(),
        slots(vec![("Someday", vec!["14:00"]), ("Monday", vec!["late", "16:00"])], vec![]),
    );
    lookup.insert("b".to_string(), slots(vec![("Monday", vec!["16:00"])], vec![]));

    let slot = find_availability_overlap(&["a", "b"], &lookup);
    assert_eq!(slot, Some(at(Weekday::Mon, 16)));
}

#[test]
fn closure_lookup_and_person_conversion() {
    let alice = Person::new("alice", "Alice").with_intervals(vec![Interval::new(540, 660)]);
    let bob = Person::new("bob", "Bob")
        .with_intervals(vec![Interval::new(600, 630)])
        .with_if_needed(vec![Interval::new(630, 660)]);

    let alice_slots = WeeklySlots::from_person(&alice);
    assert_eq!(alice_slots.available_slots().len(), 2);
    let bob_slots = WeeklySlots::from_person(&bob);
    assert_eq!(bob_slots.available_slots().len(), 0);
    assert_eq!(bob_slots.if_needed_slots(), vec![at(Weekday::Mon, 10)]);

    let lookup = |id: &str| match id {
        "alice" => Some(alice_slots.clone()),
        "bob" => Some(bob_slots.clone()),
        _ => None,
    };
    assert_eq!(
        find_availability_overlap(&["alice", "bob"], &lookup),
        Some(at(Weekday::Mon, 10))
    );
}

#[test]
fn hour_slot_serializes_with_day_name() {
    let slot = at(Weekday::Thu, 18);
    let json = serde_json::to_value(slot).unwrap();
    assert_eq!(json["day"], "Thursday");
    assert_eq!(json["hour"], 18);
    assert_eq!(slot.interval(), Interval::new(3 * 1440 + 18 * 60, 3 * 1440 + 19 * 60));
}

#[test]
fn hour_slot_rejects_hours_past_the_day() {
    assert!(HourSlot::new(Weekday::Sun, 24).is_none());
    assert!(HourSlot::new(Weekday::Mon, 99).is_none());
    assert_eq!(at(Weekday::Sun, 23).interval(), Interval::new(10020, 10080));

    let parsed: Result<HourSlot, _> =
        serde_json::from_value(serde_json::json!({ "day": "Sunday", "hour": 24 }));
    assert!(parsed.is_err());
    let parsed: HourSlot =
        serde_json::from_value(serde_json::json!({ "day": "Sunday", "hour": 23 })).unwrap();
    assert_eq!(parsed, at(Weekday::Sun, 23));
}

#[test]
fn slot_strings_past_the_day_are_skipped() {
    let weekly = slots(vec![("Monday", vec!["24:00", "23:00"])], vec![]);
    assert_eq!(weekly.available_slots(), vec![at(Weekday::Mon, 23)]);
}

#[test]
fn local_time_rolls_back_to_the_previous_day() {
    let winter = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();
    let local = at(Weekday::Mon, 2).to_local_at("America/New_York", winter);
    assert_eq!(local.day, Weekday::Sun);
    assert_eq!(local.to_string(), "Sundays 9:00-10:00pm EST");

    let summer = Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap();
    let local = at(Weekday::Mon, 2).to_local_at("America/New_York", summer);
    assert_eq!(local.to_string(), "Sundays 10:00-11:00pm EDT");
}

#[test]
fn local_time_rolls_forward_into_the_next_week() {
    let reference = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();
    let local = at(Weekday::Sun, 23).to_local_at("Asia/Tokyo", reference);
    assert_eq!(local.day, Weekday::Mon);
    assert_eq!(local.description, "Mondays 8:00-9:00am JST");
}

#[test]
fn local_time_handles_midnight_and_noon() {
    let reference = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();
    let ny = |day, hour| at(day, hour).to_local_at("America/New_York", reference).description;

    assert_eq!(ny(Weekday::Wed, 5), "Wednesdays 12:00-1:00am EST");
    assert_eq!(ny(Weekday::Wed, 17), "Wednesdays 12:00-1:00pm EST");
    assert_eq!(ny(Weekday::Wed, 16), "Wednesdays 11:00am-12:00pm EST");
    assert_eq!(ny(Weekday::Thu, 4), "Wednesdays 11:00pm-12:00am EST");
    assert_eq!(ny(Weekday::Wed, 20), "Wednesdays 3:00-4:00pm EST");
}

#[test]
fn local_time_keeps_half_hour_offsets() {
    let reference = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();
    let local = at(Weekday::Wed, 14).to_local_at("Asia/Kolkata", reference);
    assert_eq!(local.description, "Wednesdays 7:30-8:30pm IST");
}

#[test]
fn unknown_timezone_falls_back_to_utc_and_raw_name() {
    let reference = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();
    let local = at(Weekday::Wed, 15).to_local_at("Mars/Olympus", reference);
    assert_eq!(local.day, Weekday::Wed);
    assert_eq!(local.description, "Wednesdays 3:00-4:00pm Mars/Olympus");

    assert_eq!(timezone_abbreviation_at("Mars/Olympus", reference), "Mars/Olympus");
    let summer = Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap();
    assert_eq!(timezone_abbreviation_at("Europe/Berlin", summer), "CEST");
    assert_eq!(timezone_abbreviation_at("Europe/Berlin", reference), "CET");
}
