use crate::availability::Person;
use std::collections::HashMap;

/// Bucket for people not enrolled in any course.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// People partitioned by course, in first-seen course order.
///
/// The order matters: the orchestrator walks buckets front to back and earlier courses get
/// first claim on the time of people enrolled in several courses.
#[derive(Debug, Default)]
pub struct CourseBuckets<'a> {
    buckets: Vec<(String, Vec<&'a Person>)>,
    index: HashMap<String, usize>,
}

impl<'a> CourseBuckets<'a> {
    fn push(&mut self, course: &str, person: &'a Person) {
        let slot = match self.index.get(course) {
            Some(&slot) => slot,
            None => {
                self.buckets.push((course.to_string(), Vec::new()));
                self.index.insert(course.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        self.buckets[slot].1.push(person);
    }

    pub fn get(&self, course: &str) -> Option<&[&'a Person]> {
        self.index
            .get(course)
            .map(|&slot| self.buckets[slot].1.as_slice())
    }

    pub fn courses(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(course, _)| course.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a Person])> {
        self.buckets
            .iter()
            .map(|(course, people)| (course.as_str(), people.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Partitions people by course. Someone in several courses lands in each of them; someone in
/// none lands in [`UNCATEGORIZED`]. Bucket contents keep input order.
pub fn group_people_by_course(people: &[Person]) -> CourseBuckets<'_> {
    let mut buckets = CourseBuckets::default();
    for person in people {
        if person.courses.is_empty() {
            buckets.push(UNCATEGORIZED, person);
            continue;
        }
        for (position, course) in person.courses.iter().enumerate() {
            if person.courses[..position].contains(course) {
                continue;
            }
            buckets.push(course, person);
        }
    }
    buckets
}
