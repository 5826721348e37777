use crate::availability::{Interval, Person};
use std::borrow::Cow;

/// Drops every availability range that conflicts with an already committed meeting.
///
/// Ranges are removed whole, never trimmed, so a person's availability can only shrink. With
/// nothing blocked the original person is handed back untouched.
pub fn remove_blocked_intervals<'a>(person: &'a Person, blocked: &[Interval]) -> Cow<'a, Person> {
    if blocked.is_empty() {
        return Cow::Borrowed(person);
    }

    let keep = |range: &&Interval| !blocked.iter().any(|b| range.conflicts_with(b));

    Cow::Owned(Person {
        intervals: person.intervals.iter().filter(keep).copied().collect(),
        if_needed_intervals: person.if_needed_intervals.iter().filter(keep).copied().collect(),
        ..person.clone()
    })
}
