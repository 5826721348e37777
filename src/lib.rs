pub mod availability;
pub mod blocking;
pub mod cohort;
pub mod config;
pub mod course;
pub mod error;
pub mod optimizer;
pub mod orchestrator;
pub mod overlap;
pub mod persistence;
#[cfg(feature = "http_api")]
pub mod http_api;

pub use availability::{Interval, Person, format_time_range, parse_interval_string};
pub use blocking::remove_blocked_intervals;
pub use cohort::{CohortScheduler, CohortSchedulingResult, SchedulingInvoker};
pub use config::SchedulingOptions;
pub use course::group_people_by_course;
pub use error::{SchedulingError, SchedulingResult};
pub use optimizer::{CancellationFlag, Group, NoProgress};
pub use orchestrator::{
    CourseSchedulingResult, MultiCourseSchedulingResult, PeopleSnapshot, PeopleSource, Scheduler,
    facilitators_for_run,
};
pub use overlap::{HourSlot, LocalMeetingTime, WeeklySlots, find_availability_overlap};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteCohortStore;
