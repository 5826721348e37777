use super::{PersistenceError, PersistenceResult};
use crate::availability::{Person, format_interval_string, parse_interval_string};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Loads people from a JSON array of [`Person`] values and normalizes their availability.
pub fn load_people_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Person>> {
    let file = File::open(path)?;
    let people: Vec<Person> = serde_json::from_reader(file)?;
    prepare_people(people)
}

pub fn save_people_to_json<P: AsRef<Path>>(people: &[Person], path: P) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, people)?;
    Ok(())
}

/// Writes any scheduling result (or other serializable value) as pretty JSON.
pub fn save_result_to_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

#[derive(Default, Serialize, Deserialize)]
struct PersonCsvRecord {
    id: String,
    name: String,
    #[serde(default)]
    availability: String,
    #[serde(default)]
    if_needed: String,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    courses: String,
    #[serde(default)]
    experience: String,
}

impl From<&Person> for PersonCsvRecord {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.name.clone(),
            availability: format_interval_string(&person.intervals),
            if_needed: format_interval_string(&person.if_needed_intervals),
            timezone: person.timezone.clone(),
            courses: person.courses.join(";"),
            experience: person.experience.clone(),
        }
    }
}

impl PersonCsvRecord {
    fn into_person(self) -> PersistenceResult<Person> {
        if self.id.trim().is_empty() {
            return Err(PersistenceError::InvalidData(
                "person row is missing an id".into(),
            ));
        }
        let timezone = if self.timezone.trim().is_empty() {
            "UTC".to_string()
        } else {
            self.timezone
        };
        Ok(Person::new(self.id.trim(), self.name)
            .with_intervals(parse_interval_string(&self.availability)?)
            .with_if_needed(parse_interval_string(&self.if_needed)?)
            .with_timezone(timezone)
            .with_courses(split_strings(&self.courses))
            .with_experience(self.experience))
    }
}

/// Loads people from CSV with columns `id,name,availability,if_needed,timezone,courses,
/// experience`. Availability columns use the interval-string format; courses are `;`-separated.
pub fn load_people_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Person>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut people = Vec::new();
    for record in reader.deserialize::<PersonCsvRecord>() {
        people.push(record?.into_person()?);
    }
    prepare_people(people)
}

pub fn save_people_to_csv<P: AsRef<Path>>(people: &[Person], path: P) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for person in people {
        writer.serialize(PersonCsvRecord::from(person))?;
    }
    writer.flush()?;
    Ok(())
}

fn prepare_people(mut people: Vec<Person>) -> PersistenceResult<Vec<Person>> {
    let mut seen = HashSet::with_capacity(people.len());
    for person in &mut people {
        if !seen.insert(person.id.clone()) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate person id {}",
                person.id
            )));
        }
        person
            .normalize()
            .map_err(|err| PersistenceError::InvalidData(format!("person {}: {err}", person.id)))?;
    }
    Ok(people)
}

fn split_strings(input: &str) -> Vec<String> {
    input
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
