use cohort_scheduling::availability::{
    Interval, MINUTES_PER_WEEK, Person, SlotPreference, format_interval_string, format_time_range,
    normalize_intervals, parse_interval_string,
};

#[test]
fn parses_stored_interval_strings() {
    let intervals = parse_interval_string("M09:00 M10:00, R18:30 R20:00").unwrap();
    assert_eq!(
        intervals,
        vec![Interval::new(540, 600), Interval::new(5430, 5520)]
    );
}

#[test]
fn blank_interval_string_yields_nothing() {
    assert!(parse_interval_string("").unwrap().is_empty());
    assert!(parse_interval_string("  ,  ").unwrap().is_empty());
}

#[test]
fn midnight_monday_end_wraps_to_end_of_week() {
    let intervals = parse_interval_string("U22:00 M00:00").unwrap();
    assert_eq!(intervals, vec![Interval::new(6 * 1440 + 1320, MINUTES_PER_WEEK)]);
}

#[test]
fn rejects_malformed_entries() {
    let err = parse_interval_string("X09:00 X10:00").unwrap_err();
    assert!(err.reason.contains("unknown day code"), "{err}");

    assert!(parse_interval_string("M10:00 M09:00").is_err());
    assert!(parse_interval_string("M09:00").is_err());
    assert!(parse_interval_string("M09:75 M10:00").is_err());
}

#[test]
fn formats_meeting_times_in_stored_format() {
    assert_eq!(format_time_range(&Interval::new(840, 900)), "M14:00 M15:00");
    assert_eq!(
        format_time_range(&Interval::new(MINUTES_PER_WEEK - 60, MINUTES_PER_WEEK)),
        "U23:00 U24:00"
    );

    let intervals = vec![Interval::new(540, 600), Interval::new(1440 + 600, 1440 + 690)];
    let text = format_interval_string(&intervals);
    assert_eq!(text, "M09:00 M10:00, T10:00 T11:30");
    assert_eq!(parse_interval_string(&text).unwrap(), intervals);
}

#[test]
fn checked_interval_rejects_out_of_week_ranges() {
    assert!(Interval::checked(100, 100).is_err());
    assert!(Interval::checked(200, 100).is_err());
    assert!(Interval::checked(0, MINUTES_PER_WEEK + 1).is_err());
    assert_eq!(Interval::checked(0, 30).unwrap(), Interval::new(0, 30));
}

#[test]
fn half_open_intervals_touch_without_conflict() {
    let morning = Interval::new(540, 600);
    assert!(!morning.conflicts_with(&Interval::new(600, 660)));
    assert!(morning.conflicts_with(&Interval::new(599, 660)));
    assert!(morning.contains(&Interval::new(550, 600)));
}

#[test]
fn normalize_merges_overlaps_but_keeps_touching_ranges() {
    let merged = normalize_intervals(vec![
        Interval::new(600, 700),
        Interval::new(540, 620),
        Interval::new(700, 760),
    ]);
    assert_eq!(merged, vec![Interval::new(540, 700), Interval::new(700, 760)]);
}

#[test]
fn person_normalize_removes_if_needed_time_already_confirmed() {
    let mut person = Person::new("p1", "Pat")
        .with_intervals(vec![Interval::new(600, 660)])
        .with_if_needed(vec![Interval::new(540, 720)]);
    person.normalize().unwrap();

    assert_eq!(person.intervals, vec![Interval::new(600, 660)]);
    assert_eq!(
        person.if_needed_intervals,
        vec![Interval::new(540, 600), Interval::new(660, 720)]
    );
    assert_eq!(person.total_available_minutes(), 180);
}

#[test]
fn slot_preference_prefers_confirmed_time() {
    let person = Person::new("p1", "Pat")
        .with_intervals(vec![Interval::new(540, 600), Interval::new(600, 660)])
        .with_if_needed(vec![Interval::new(660, 720)]);

    // Touching confirmed ranges count as one block.
    assert_eq!(
        person.preference_for(&Interval::new(570, 630), true),
        SlotPreference::Available
    );
    assert_eq!(
        person.preference_for(&Interval::new(630, 690), true),
        SlotPreference::IfNeeded
    );
    assert_eq!(
        person.preference_for(&Interval::new(630, 690), false),
        SlotPreference::Unavailable
    );
    assert_eq!(
        person.preference_for(&Interval::new(0, 60), true),
        SlotPreference::Unavailable
    );
}

#[test]
fn person_deserializes_with_defaults() {
    let person: Person =
        serde_json::from_str(r#"{"id": "p9", "name": "Sam", "intervals": [[540, 600]]}"#).unwrap();
    assert_eq!(person.timezone, "UTC");
    assert!(person.courses.is_empty());
    assert_eq!(person.intervals, vec![Interval::new(540, 600)]);
    assert!(person.has_availability());
}
