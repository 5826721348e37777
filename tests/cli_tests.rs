#![cfg(feature = "cli")]

use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::NamedTempFile;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.write_stdin(script.to_string()).assert()
}

fn people_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    write!(
        file,
        r#"[
            {{"id": "ada", "name": "Ada", "intervals": [[540, 720]], "courses": ["rust"]}},
            {{"id": "bob", "name": "Bob", "intervals": [[540, 720]], "courses": ["rust"]}},
            {{"id": "cy", "name": "Cy", "intervals": [[3000, 3060]], "courses": ["rust"]}}
        ]"#
    )
    .expect("write people");
    file
}

fn escaped(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().replace('\\', "\\\\")
}

#[test]
fn cli_prints_help() {
    run_cli("help\nquit\n")
        .success()
        .stdout(str_contains("Commands:"))
        .stdout(str_contains("cohort <id>"));
}

#[test]
fn cli_loads_and_schedules_people() {
    let people = people_file();
    let script = format!(
        "load json {}\noptions set min_size 2\nschedule\nquit\n",
        escaped(&people)
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Loaded 3 people"))
        .stdout(str_contains("Course rust: 1 group(s), 1 unassigned"))
        .stdout(str_contains("Group 1 @ M09:00 M10:00: ada, bob"));
}

fn four_people_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    write!(
        file,
        r#"[
            {{"id": "a", "name": "A", "intervals": [[540, 600]]}},
            {{"id": "b", "name": "B", "intervals": [[540, 600]]}},
            {{"id": "c", "name": "C", "intervals": [[540, 600]]}},
            {{"id": "d", "name": "D", "intervals": [[540, 600]]}}
        ]"#
    )
    .expect("write people");
    file
}

#[test]
fn cli_requires_facilitators_in_facilitator_mode() {
    let people = four_people_file();
    let script = format!(
        "load json {}
options set facilitator_mode true
schedule
quit
",
        escaped(&people)
    );
    run_cli(&script).success().stdout(str_contains(
        "Scheduling error: facilitator mode is enabled but no facilitators are marked",
    ));
}

#[test]
fn cli_ignores_marked_facilitators_when_mode_is_off() {
    let people = four_people_file();
    let setup = format!(
        "load json {}
options set min_size 2
options set max_size 2
facilitators a
",
        escaped(&people)
    );
    run_cli(&format!("{setup}schedule
quit
"))
        .success()
        .stdout(str_contains("Course Uncategorized: 2 group(s), 0 unassigned"));
    run_cli(&format!("{setup}options set facilitator_mode true
schedule
quit
"))
        .success()
        .stdout(str_contains("Course Uncategorized: 1 group(s), 2 unassigned"))
        .stdout(str_contains("Group 1 @ M09:00 M10:00: a, "));
}

#[test]
fn cli_reports_scheduling_errors() {
    run_cli("schedule\nquit\n")
        .success()
        .stdout(str_contains("Scheduling error: no users have set their availability yet"));
}

#[test]
fn cli_rejects_invalid_options() {
    run_cli("options set min_size 0\noptions set shoe_size 9\nquit\n")
        .success()
        .stdout(str_contains("Error: invalid scheduling options: min_size must be at least 1"))
        .stdout(str_contains("unknown option 'shoe_size'"));
}

#[test]
fn cli_finds_overlap_between_loaded_people() {
    let people = people_file();
    let script = format!("load json {}\noverlap ada bob\noverlap ada cy\nquit\n", escaped(&people));
    run_cli(&script)
        .success()
        .stdout(str_contains("Common time: Monday"))
        .stdout(str_contains("  ada: Mondays "))
        .stdout(str_contains("No common hour found."));
}

#[test]
fn cli_saves_last_result() {
    let people = people_file();
    let out = NamedTempFile::new().expect("create temp file");
    let script = format!(
        "save {out}\nload json {people}\noptions set min_size 2\nschedule\nsave {out}\nquit\n",
        out = escaped(&out),
        people = escaped(&people)
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Nothing to save."))
        .stdout(str_contains("Result saved to"));

    let saved = std::fs::read_to_string(out.path()).expect("read result");
    let json: serde_json::Value = serde_json::from_str(&saved).expect("valid json");
    assert_eq!(json["total_scheduled"], 2);
}

#[test]
fn cli_cohort_needs_database() {
    let db = NamedTempFile::new().expect("create temp file");
    let script = format!("cohort 1\ndb {}\ncohort 5\nquit\n", escaped(&db));
    run_cli(&script)
        .success()
        .stdout(str_contains("No database open."))
        .stdout(str_contains("Database opened at"))
        .stdout(str_contains("Scheduling error: cohort 5 not found"));
}
