use std::io::Write;

use cohort_scheduling::availability::{Interval, Person};
use cohort_scheduling::persistence::PersistenceError;
use cohort_scheduling::persistence::file::{
    load_people_from_csv, load_people_from_json, save_people_to_csv, save_people_to_json,
    save_result_to_json,
};
use cohort_scheduling::{NoProgress, Scheduler, SchedulingOptions};
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_people_from_csv() {
    let file = write_temp(
        "id,name,availability,if_needed,timezone,courses,experience\n\
         u1,Ada,\"M09:00 M11:00, R18:30 R20:00\",,Europe/London,rust;go,senior\n\
         u2,Linus,M09:00 M10:00,M10:00 M12:00,,rust,\n",
    );
    let people = load_people_from_csv(file.path()).unwrap();

    assert_eq!(people.len(), 2);
    assert_eq!(
        people[0].intervals,
        vec![Interval::new(540, 660), Interval::new(5430, 5520)]
    );
    assert_eq!(people[0].timezone, "Europe/London");
    assert_eq!(people[0].courses, vec!["rust", "go"]);
    assert_eq!(people[0].experience, "senior");
    assert_eq!(people[1].timezone, "UTC");
    assert_eq!(people[1].if_needed_intervals, vec![Interval::new(600, 720)]);
}

#[test]
fn csv_with_bad_availability_is_rejected() {
    let file = write_temp("id,name,availability\nu1,Ada,Q09:00 Q10:00\n");
    let err = load_people_from_csv(file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)), "{err}");
}

#[test]
fn duplicate_ids_are_rejected() {
    let file = write_temp(
        r#"[{"id": "u1", "name": "Ada"}, {"id": "u1", "name": "Ada again"}]"#,
    );
    let err = load_people_from_json(file.path()).unwrap_err();
    assert!(err.to_string().contains("duplicate person id u1"));
}

#[test]
fn json_import_normalizes_availability() {
    let file = write_temp(
        r#"[{"id": "u1", "name": "Ada", "intervals": [[600, 700], [540, 620]],
             "if_needed_intervals": [[540, 760]]}]"#,
    );
    let people = load_people_from_json(file.path()).unwrap();
    assert_eq!(people[0].intervals, vec![Interval::new(540, 700)]);
    assert_eq!(people[0].if_needed_intervals, vec![Interval::new(700, 760)]);
}

#[test]
fn json_import_rejects_out_of_week_ranges() {
    let file = write_temp(r#"[{"id": "u1", "name": "Ada", "intervals": [[10000, 10200]]}]"#);
    assert!(load_people_from_json(file.path()).is_err());
}

#[test]
fn csv_and_json_exports_reload_identically() {
    let people = vec![
        Person::new("u1", "Ada")
            .with_intervals(vec![Interval::new(540, 600)])
            .with_courses(["rust"]),
        Person::new("u2", "Grace")
            .with_if_needed(vec![Interval::new(1440, 1500)])
            .with_timezone("America/New_York"),
    ];

    let csv_file = NamedTempFile::new().unwrap();
    save_people_to_csv(&people, csv_file.path()).unwrap();
    assert_eq!(load_people_from_csv(csv_file.path()).unwrap(), people);

    let json_file = NamedTempFile::new().unwrap();
    save_people_to_json(&people, json_file.path()).unwrap();
    assert_eq!(load_people_from_json(json_file.path()).unwrap(), people);
}

#[test]
fn scheduling_result_exports_as_json() {
    let people: Vec<Person> = ["a", "b"]
        .into_iter()
        .map(|id| Person::new(id, id).with_intervals(vec![Interval::new(540, 600)]))
        .collect();
    let options = SchedulingOptions {
        min_size: 2,
        iterations: 3,
        ..SchedulingOptions::default()
    };
    let result = Scheduler::new()
        .schedule_people(&people, &options, None, &NoProgress)
        .unwrap();

    let file = NamedTempFile::new().unwrap();
    save_result_to_json(&result, file.path()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    assert_eq!(json["total_scheduled"], 2);
    assert_eq!(json["course_results"][0]["course"], "Uncategorized");
    assert_eq!(
        json["course_results"][0]["groups"][0]["selected_time"],
        serde_json::json!([540, 600])
    );
}
