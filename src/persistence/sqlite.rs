use super::{
    CohortMemberRow, CohortRecord, CohortRole, CohortStore, CohortTransaction, GroupMemberRecord,
    GroupRecord, GroupRole, GroupingStatus, PersistenceError, PersistenceResult,
    person_from_stored,
};
use crate::orchestrator::{PeopleSnapshot, PeopleSource};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Profile fields the enrollment flow writes for a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub discord_id: String,
    pub nickname: Option<String>,
    pub discord_username: Option<String>,
    pub timezone: Option<String>,
    pub availability_utc: Option<String>,
    pub if_needed_availability_utc: Option<String>,
    pub is_facilitator: bool,
}

impl UserProfile {
    pub fn new(discord_id: impl Into<String>) -> Self {
        Self {
            discord_id: discord_id.into(),
            ..Self::default()
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_availability(mut self, availability: impl Into<String>) -> Self {
        self.availability_utc = Some(availability.into());
        self
    }

    pub fn with_if_needed(mut self, if_needed: impl Into<String>) -> Self {
        self.if_needed_availability_utc = Some(if_needed.into());
        self
    }

    pub fn facilitator(mut self) -> Self {
        self.is_facilitator = true;
        self
    }
}

pub struct SqliteCohortStore {
    connection: Mutex<Connection>,
}

impl SqliteCohortStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS courses (
                course_id INTEGER PRIMARY KEY,
                course_name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS cohorts (
                cohort_id INTEGER PRIMARY KEY,
                cohort_name TEXT NOT NULL,
                course_id INTEGER NOT NULL REFERENCES courses(course_id),
                cohort_start_date TEXT,
                number_of_group_meetings INTEGER
            );
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                discord_id TEXT NOT NULL UNIQUE,
                nickname TEXT,
                discord_username TEXT,
                timezone TEXT,
                availability_utc TEXT,
                if_needed_availability_utc TEXT,
                is_facilitator INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS courses_users (
                user_id INTEGER NOT NULL REFERENCES users(user_id),
                course_id INTEGER NOT NULL REFERENCES courses(course_id),
                cohort_id INTEGER NOT NULL REFERENCES cohorts(cohort_id),
                cohort_role TEXT NOT NULL DEFAULT 'participant',
                grouping_status TEXT NOT NULL DEFAULT 'awaiting_grouping',
                PRIMARY KEY (user_id, cohort_id)
            );
            CREATE TABLE IF NOT EXISTS cohort_groups (
                group_id INTEGER PRIMARY KEY,
                cohort_id INTEGER NOT NULL REFERENCES cohorts(cohort_id),
                group_name TEXT NOT NULL,
                recurring_meeting_time_utc TEXT,
                status TEXT NOT NULL DEFAULT 'forming'
            );
            CREATE TABLE IF NOT EXISTS group_memberships (
                group_id INTEGER NOT NULL REFERENCES cohort_groups(group_id),
                user_id INTEGER NOT NULL REFERENCES users(user_id),
                role TEXT NOT NULL DEFAULT 'participant',
                status TEXT NOT NULL DEFAULT 'active',
                PRIMARY KEY (group_id, user_id)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    pub fn create_course(&self, course_name: &str) -> PersistenceResult<i64> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO courses (course_name) VALUES (?1)",
            params![course_name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_cohort(
        &self,
        cohort_name: &str,
        course_id: i64,
        start_date: Option<NaiveDate>,
        number_of_group_meetings: Option<u32>,
    ) -> PersistenceResult<i64> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO cohorts (cohort_name, course_id, cohort_start_date, number_of_group_meetings)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                cohort_name,
                course_id,
                start_date.map(|d| d.format("%Y-%m-%d").to_string()),
                number_of_group_meetings
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Inserts or updates a user keyed by `discord_id`; returns the internal `user_id`.
    pub fn upsert_user(&self, profile: &UserProfile) -> PersistenceResult<i64> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO users (discord_id, nickname, discord_username, timezone,
                                availability_utc, if_needed_availability_utc, is_facilitator)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(discord_id) DO UPDATE SET
                nickname = excluded.nickname,
                discord_username = excluded.discord_username,
                timezone = excluded.timezone,
                availability_utc = excluded.availability_utc,
                if_needed_availability_utc = excluded.if_needed_availability_utc,
                is_facilitator = excluded.is_facilitator",
            params![
                profile.discord_id,
                profile.nickname,
                profile.discord_username,
                profile.timezone,
                profile.availability_utc,
                profile.if_needed_availability_utc,
                profile.is_facilitator
            ],
        )?;
        let user_id = conn.query_row(
            "SELECT user_id FROM users WHERE discord_id = ?1",
            params![profile.discord_id],
            |row| row.get(0),
        )?;
        Ok(user_id)
    }

    /// Enrolls a user in a cohort (and therefore its course) awaiting grouping.
    pub fn enroll(&self, user_id: i64, cohort_id: i64, role: CohortRole) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        let inserted = conn.execute(
            "INSERT INTO courses_users (user_id, course_id, cohort_id, cohort_role)
             SELECT ?1, course_id, cohort_id, ?3 FROM cohorts WHERE cohort_id = ?2",
            params![user_id, cohort_id, role],
        )?;
        if inserted == 0 {
            return Err(PersistenceError::NotFound(format!("cohort {cohort_id}")));
        }
        Ok(())
    }

    pub fn cohort(&self, cohort_id: i64) -> PersistenceResult<Option<CohortRecord>> {
        let conn = self.connection.lock();
        select_cohort(&conn, cohort_id)
    }

    pub fn grouping_status(
        &self,
        cohort_id: i64,
        user_id: i64,
    ) -> PersistenceResult<Option<GroupingStatus>> {
        let conn = self.connection.lock();
        let status = conn
            .query_row(
                "SELECT grouping_status FROM courses_users WHERE cohort_id = ?1 AND user_id = ?2",
                params![cohort_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    pub fn groups_for_cohort(&self, cohort_id: i64) -> PersistenceResult<Vec<GroupRecord>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT group_id, cohort_id, group_name, recurring_meeting_time_utc
             FROM cohort_groups WHERE cohort_id = ?1 ORDER BY group_id ASC",
        )?;
        let rows = stmt.query_map(params![cohort_id], group_from_row)?;
        let mut groups = Vec::new();
        for group in rows {
            groups.push(group?);
        }
        Ok(groups)
    }

    pub fn group_members(&self, group_id: i64) -> PersistenceResult<Vec<GroupMemberRecord>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, role FROM group_memberships WHERE group_id = ?1 ORDER BY user_id ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok(GroupMemberRecord {
                user_id: row.get(0)?,
                role: row.get(1)?,
            })
        })?;
        let mut members = Vec::new();
        for member in rows {
            members.push(member?);
        }
        Ok(members)
    }
}

fn select_cohort(conn: &Connection, cohort_id: i64) -> PersistenceResult<Option<CohortRecord>> {
    let row = conn
        .query_row(
            "SELECT cohort_id, cohort_name, course_id, cohort_start_date, number_of_group_meetings
             FROM cohorts WHERE cohort_id = ?1",
            params![cohort_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<u32>>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((cohort_id, cohort_name, course_id, start, meetings)) = row else {
        return Ok(None);
    };
    let cohort_start_date = start
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                PersistenceError::InvalidData(format!("invalid cohort_start_date '{s}': {e}"))
            })
        })
        .transpose()?;
    Ok(Some(CohortRecord {
        cohort_id,
        cohort_name,
        course_id,
        cohort_start_date,
        number_of_group_meetings: meetings,
    }))
}

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        group_id: row.get(0)?,
        cohort_id: row.get(1)?,
        group_name: row.get(2)?,
        recurring_meeting_time_utc: row.get(3)?,
    })
}

struct SqliteCohortTransaction<'a> {
    conn: &'a Connection,
}

impl CohortTransaction for SqliteCohortTransaction<'_> {
    fn cohort_by_id(&mut self, cohort_id: i64) -> PersistenceResult<Option<CohortRecord>> {
        select_cohort(self.conn, cohort_id)
    }

    fn awaiting_members(&mut self, cohort_id: i64) -> PersistenceResult<Vec<CohortMemberRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.user_id, u.discord_id, u.nickname, u.discord_username, u.timezone,
                    u.availability_utc, u.if_needed_availability_utc, cu.cohort_role
             FROM users u
             JOIN courses_users cu ON cu.user_id = u.user_id
             WHERE cu.cohort_id = ?1 AND cu.grouping_status = ?2
             ORDER BY u.user_id ASC",
        )?;
        let rows = stmt.query_map(params![cohort_id, GroupingStatus::AwaitingGrouping], |row| {
            Ok(CohortMemberRow {
                user_id: row.get(0)?,
                discord_id: row.get(1)?,
                nickname: row.get(2)?,
                discord_username: row.get(3)?,
                timezone: row.get(4)?,
                availability_utc: row.get(5)?,
                if_needed_availability_utc: row.get(6)?,
                cohort_role: row.get(7)?,
            })
        })?;
        let mut members = Vec::new();
        for member in rows {
            members.push(member?);
        }
        Ok(members)
    }

    fn create_group(
        &mut self,
        cohort_id: i64,
        group_name: &str,
        meeting_time: &str,
    ) -> PersistenceResult<GroupRecord> {
        self.conn.execute(
            "INSERT INTO cohort_groups (cohort_id, group_name, recurring_meeting_time_utc)
             VALUES (?1, ?2, ?3)",
            params![cohort_id, group_name, meeting_time],
        )?;
        Ok(GroupRecord {
            group_id: self.conn.last_insert_rowid(),
            cohort_id,
            group_name: group_name.to_string(),
            recurring_meeting_time_utc: Some(meeting_time.to_string()),
        })
    }

    fn add_user_to_group(
        &mut self,
        group_id: i64,
        user_id: i64,
        role: GroupRole,
    ) -> PersistenceResult<()> {
        self.conn.execute(
            "INSERT INTO group_memberships (group_id, user_id, role) VALUES (?1, ?2, ?3)",
            params![group_id, user_id, role],
        )?;
        Ok(())
    }

    fn set_grouping_status(
        &mut self,
        cohort_id: i64,
        user_ids: &[i64],
        status: GroupingStatus,
    ) -> PersistenceResult<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            "UPDATE courses_users SET grouping_status = ? WHERE cohort_id = ? AND user_id IN ({placeholders})"
        );
        let values = [
            Value::Text(status.as_str().to_string()),
            Value::Integer(cohort_id),
        ]
        .into_iter()
        .chain(user_ids.iter().map(|id| Value::Integer(*id)));
        let updated = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(updated)
    }
}

impl CohortStore for SqliteCohortStore {
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CohortTransaction) -> Result<T, E>,
        E: From<PersistenceError>,
    {
        let mut conn = self.connection.lock();
        let tx = conn.transaction().map_err(PersistenceError::from)?;
        let value = work(&mut SqliteCohortTransaction { conn: &tx })?;
        tx.commit().map_err(PersistenceError::from)?;
        debug!("cohort transaction committed");
        Ok(value)
    }
}

impl PeopleSource for SqliteCohortStore {
    fn load_people(&self) -> PersistenceResult<PeopleSnapshot> {
        let conn = self.connection.lock();

        let mut courses: HashMap<i64, Vec<String>> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT cu.user_id, c.course_name
             FROM courses_users cu JOIN courses c ON c.course_id = cu.course_id
             ORDER BY cu.user_id ASC, c.course_name ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (user_id, course_name) = row?;
            courses.entry(user_id).or_default().push(course_name);
        }

        let mut stmt = conn.prepare(
            "SELECT user_id, discord_id, nickname, discord_username, timezone,
                    availability_utc, if_needed_availability_utc, is_facilitator
             FROM users ORDER BY user_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let member = CohortMemberRow {
                user_id: row.get(0)?,
                discord_id: row.get(1)?,
                nickname: row.get(2)?,
                discord_username: row.get(3)?,
                timezone: row.get(4)?,
                availability_utc: row.get(5)?,
                if_needed_availability_utc: row.get(6)?,
                cohort_role: CohortRole::Participant,
            };
            Ok((member, row.get::<_, bool>(7)?))
        })?;

        let mut snapshot = PeopleSnapshot::default();
        for row in rows {
            let (member, is_facilitator) = row?;
            let Some(person) = person_from_stored(
                &member.discord_id,
                member.display_name(),
                member.timezone.as_deref(),
                member.availability_utc.as_deref(),
                member.if_needed_availability_utc.as_deref(),
            ) else {
                continue;
            };
            let person = person.with_courses(courses.remove(&member.user_id).unwrap_or_default());
            if is_facilitator {
                snapshot.facilitator_ids.insert(person.id.clone());
            }
            snapshot.people.push(person);
        }
        Ok(snapshot)
    }
}

macro_rules! sql_text_enum {
    ($($ty:ty),+) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|err: PersistenceError| FromSqlError::Other(Box::new(err)))
                }
            }
        )+
    };
}

sql_text_enum!(GroupingStatus, CohortRole, GroupRole);
