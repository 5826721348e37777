use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use cohort_scheduling::cohort::UNSCHEDULED_MEETING_TIME;
use cohort_scheduling::optimizer::NoProgress;
use cohort_scheduling::persistence::{load_people_from_csv, load_people_from_json, save_result_to_json};
use cohort_scheduling::{
    MultiCourseSchedulingResult, Person, Scheduler, SchedulingOptions, SqliteCohortStore,
    WeeklySlots, facilitators_for_run, find_availability_overlap, format_time_range,
};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  load json|csv <path>               Load people from a file\n  people                             List loaded people\n  options show                       Show scheduling options\n  options set <key> <value>          Change one option\n  options load <path>                Load options from JSON\n  options save <path>                Save options to JSON\n  facilitators <id,...>|none         Mark facilitators among loaded people\n  schedule                           Schedule loaded people\n  schedule db                        Schedule everyone in the open database\n  overlap <id> <id>...               Find a common UTC hour for the given people\n  db <path>                          Open (or create) a SQLite cohort database\n  cohort <id>                        Schedule a cohort in the open database\n  save <path>                        Save the last scheduling result as JSON\n  quit|exit                          Exit"
    );
}

fn render_people(people: &[Person], facilitators: &HashSet<String>) -> String {
    let mut out = String::new();
    for person in people {
        let role = if facilitators.contains(&person.id) {
            " [facilitator]"
        } else {
            ""
        };
        out.push_str(&format!(
            "{} {}{}: courses={} available={}min if_needed={}\n",
            person.id,
            person.name,
            role,
            if person.courses.is_empty() {
                "-".to_string()
            } else {
                person.courses.join(";")
            },
            person.total_available_minutes(),
            person.if_needed_intervals.len()
        ));
    }
    out
}

fn render_result(result: &MultiCourseSchedulingResult) -> String {
    let mut out = format!("Scheduled ({})\n", result.summary());
    for course in &result.course_results {
        out.push_str(&format!(
            "Course {}: {} group(s), {} unassigned",
            course.course,
            course.groups.len(),
            course.unassigned.len()
        ));
        if let Some(reason) = course.skipped {
            out.push_str(&format!(" (skipped: {reason:?})"));
        }
        out.push('\n');
        for (index, group) in course.groups.iter().enumerate() {
            let time = group
                .selected_time
                .as_ref()
                .map(format_time_range)
                .unwrap_or_else(|| UNSCHEDULED_MEETING_TIME.to_string());
            let members: Vec<&str> = group.member_ids().collect();
            out.push_str(&format!(
                "  Group {} @ {}: {}\n",
                index + 1,
                time,
                members.join(", ")
            ));
        }
    }
    out
}

fn main() {
    // Logs go to stderr so command output stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let scheduler = Scheduler::new();
    let mut options = SchedulingOptions::default();
    let mut people: Vec<Person> = Vec::new();
    let mut facilitators: HashSet<String> = HashSet::new();
    let mut store: Option<SqliteCohortStore> = None;
    let mut last_result: Option<MultiCourseSchedulingResult> = None;

    println!("Cohort Scheduling (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "load" => match (parts.next(), parts.next()) {
                (Some(format), Some(path)) => {
                    let loaded = match format {
                        "json" => load_people_from_json(path),
                        "csv" => load_people_from_csv(path),
                        _ => {
                            println!("Usage: load json|csv <path>");
                            continue;
                        }
                    };
                    match loaded {
                        Ok(loaded) => {
                            people = loaded;
                            facilitators.clear();
                            last_result = None;
                            println!("Loaded {} people from {}", people.len(), path);
                        }
                        Err(e) => println!("Load error: {}", e),
                    }
                }
                _ => println!("Usage: load json|csv <path>"),
            },
            "people" => {
                if people.is_empty() {
                    println!("No people loaded.");
                } else {
                    print!("{}", render_people(&people, &facilitators));
                }
            }
            "options" => match parts.next() {
                Some("show") | None => match serde_json::to_string_pretty(&options) {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("Error: {}", e),
                },
                Some("set") => match (parts.next(), parts.next()) {
                    (Some(key), Some(value)) => {
                        let mut updated = options.clone();
                        match updated.set(key, value).and_then(|_| updated.validate()) {
                            Ok(()) => {
                                options = updated;
                                println!("{} set.", key);
                            }
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: options set <key> <value>"),
                },
                Some("load") => match parts.next() {
                    Some(path) => match SchedulingOptions::from_json_file(path) {
                        Ok(loaded) => match loaded.validate() {
                            Ok(()) => {
                                options = loaded;
                                println!("Options loaded from {}", path);
                            }
                            Err(e) => println!("Error: {}", e),
                        },
                        Err(e) => println!("Load error: {}", e),
                    },
                    None => println!("Usage: options load <path>"),
                },
                Some("save") => match parts.next() {
                    Some(path) => match options.save_to_json_file(path) {
                        Ok(()) => println!("Options saved to {}", path),
                        Err(e) => println!("Save error: {}", e),
                    },
                    None => println!("Usage: options save <path>"),
                },
                Some(_) => println!("Usage: options show|set|load|save"),
            },
            "facilitators" => match parts.next() {
                Some("none") => {
                    facilitators.clear();
                    println!("Facilitators cleared.");
                }
                Some(csv) => {
                    let requested: Vec<&str> =
                        csv.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
                    let unknown: Vec<&str> = requested
                        .iter()
                        .copied()
                        .filter(|id| !people.iter().any(|p| p.id == *id))
                        .collect();
                    if !unknown.is_empty() {
                        println!("Unknown people: {}", unknown.join(", "));
                        continue;
                    }
                    facilitators = requested.into_iter().map(str::to_string).collect();
                    println!("{} facilitator(s) marked.", facilitators.len());
                }
                None => println!("Usage: facilitators <id,...>|none"),
            },
            "schedule" => {
                let outcome = match parts.next() {
                    Some("db") => match store.as_ref() {
                        Some(db) => scheduler.schedule(db, &options, &NoProgress),
                        None => {
                            println!("No database open. Use 'db <path>'.");
                            continue;
                        }
                    },
                    Some(_) => {
                        println!("Usage: schedule [db]");
                        continue;
                    }
                    None => facilitators_for_run(&options, &facilitators).and_then(|marked| {
                        scheduler.schedule_people(&people, &options, marked, &NoProgress)
                    }),
                };
                match outcome {
                    Ok(result) => {
                        print!("{}", render_result(&result));
                        last_result = Some(result);
                    }
                    Err(e) => println!("Scheduling error: {}", e),
                }
            }
            "overlap" => {
                let ids: Vec<&str> = parts.collect();
                if ids.is_empty() {
                    println!("Usage: overlap <id> <id>...");
                    continue;
                }
                let slots: HashMap<String, WeeklySlots> = people
                    .iter()
                    .map(|p| (p.id.clone(), WeeklySlots::from_person(p)))
                    .collect();
                match find_availability_overlap(&ids, &slots) {
                    Some(slot) => {
                        println!("Common time: {}", slot);
                        for person in people.iter().filter(|p| ids.contains(&p.id.as_str())) {
                            println!("  {}: {}", person.id, slot.to_local(&person.timezone));
                        }
                    }
                    None => println!("No common hour found."),
                }
            }
            "db" => match parts.next() {
                Some(path) => match SqliteCohortStore::new(path) {
                    Ok(opened) => {
                        store = Some(opened);
                        println!("Database opened at {}", path);
                    }
                    Err(e) => println!("Database error: {}", e),
                },
                None => println!("Usage: db <path>"),
            },
            "cohort" => {
                let Some(db) = store.as_ref() else {
                    println!("No database open. Use 'db <path>'.");
                    continue;
                };
                let cohort_id: i64 = match parts.next().map(str::parse) {
                    Some(Ok(id)) => id,
                    _ => {
                        println!("Usage: cohort <id>");
                        continue;
                    }
                };
                match scheduler.schedule_cohort(db, cohort_id, &options, &NoProgress) {
                    Ok(result) => {
                        println!(
                            "Cohort {} ({}): {} group(s), {} grouped, {} ungroupable",
                            result.cohort_id,
                            result.cohort_name,
                            result.groups_created,
                            result.users_grouped,
                            result.users_ungroupable
                        );
                        for group in &result.groups {
                            println!(
                                "  {} @ {}: {} member(s)",
                                group.group_name, group.meeting_time, group.member_count
                            );
                        }
                    }
                    Err(e) => println!("Scheduling error: {}", e),
                }
            }
            "save" => match (parts.next(), last_result.as_ref()) {
                (Some(path), Some(result)) => match save_result_to_json(result, path) {
                    Ok(()) => println!("Result saved to {}", path),
                    Err(e) => println!("Save error: {}", e),
                },
                (Some(_), None) => println!("Nothing to save. Run 'schedule' first."),
                (None, _) => println!("Usage: save <path>"),
            },
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
