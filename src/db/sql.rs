//! Relational store over SQLite or PostgreSQL through sqlx's `Any` driver.
//!
//! Ids and timestamps are TEXT (RFC 3339, millisecond precision) so the
//! same schema and queries run on both engines; list fields are JSON TEXT.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    any::{install_default_drivers, AnyPoolOptions},
    AnyConnection, AnyPool, FromRow,
};

use super::models::*;
use super::{new_id, DbConfig, Store, StoreError, StoreResult};
use crate::dates;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT,
        role TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        skills TEXT NOT NULL DEFAULT '[]',
        certifications TEXT NOT NULL DEFAULT '[]',
        hourly_rate DOUBLE PRECISION,
        availability TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        date TEXT NOT NULL,
        start_time TEXT,
        end_time TEXT,
        location TEXT,
        client_name TEXT,
        client_phone TEXT,
        notes TEXT,
        status TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assignments (
        id TEXT PRIMARY KEY,
        event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        employee_id TEXT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        role TEXT,
        assigned_at TEXT NOT NULL,
        UNIQUE (event_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS saved_items (
        id TEXT PRIMARY KEY,
        form_key TEXT NOT NULL,
        kind TEXT NOT NULL,
        form_version TEXT,
        payload TEXT NOT NULL,
        event_id TEXT,
        created_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (form_key, kind)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_date ON events(date)",
    "CREATE INDEX IF NOT EXISTS idx_events_status ON events(status)",
    "CREATE INDEX IF NOT EXISTS idx_assignments_employee_id ON assignments(employee_id)",
];

const EMPLOYEE_COLUMNS: &str = "id, first_name, last_name, email, phone, role, status, skills, \
     certifications, hourly_rate, availability, notes, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, title, date, start_time, end_time, location, client_name, \
     client_phone, notes, status, created_at, updated_at";

const SAVED_ITEM_COLUMNS: &str = "id, form_key, kind, form_version, payload, event_id, \
     created_by, created_at, updated_at";

// ============================================================================
// Rows and decoding
// ============================================================================

fn corrupt(column: &'static str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        column,
        reason: reason.to_string(),
    }
}

fn decode_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> StoreResult<T> {
    serde_json::from_str(raw).map_err(|e| corrupt(column, e))
}

fn encode_json<T: Serialize>(column: &'static str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| corrupt(column, e))
}

fn decode_ts(column: &'static str, raw: &str) -> StoreResult<DateTime<Utc>> {
    dates::from_storage(raw).map_err(|e| corrupt(column, e))
}

fn decode_opt_ts(column: &'static str, raw: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    raw.map(|r| decode_ts(column, &r)).transpose()
}

/// `$start, $start+1, ...` for `n` parameters.
fn placeholders(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Unique-key violations become `Conflict` so both stores report the same.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    role: Option<String>,
    status: String,
    skills: String,
    certifications: String,
    hourly_rate: Option<f64>,
    availability: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = StoreError;

    fn try_from(row: EmployeeRow) -> StoreResult<Self> {
        Ok(Employee {
            status: EmployeeStatus::parse(&row.status)
                .ok_or_else(|| corrupt("employees.status", &row.status))?,
            skills: decode_json("employees.skills", &row.skills)?,
            certifications: decode_json("employees.certifications", &row.certifications)?,
            availability: row
                .availability
                .as_deref()
                .map(|raw| decode_json("employees.availability", raw))
                .transpose()?,
            created_at: decode_ts("employees.created_at", &row.created_at)?,
            updated_at: decode_ts("employees.updated_at", &row.updated_at)?,
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            role: row.role,
            hourly_rate: row.hourly_rate,
            notes: row.notes,
        })
    }
}

#[derive(Debug, FromRow)]
struct EmployeeCountRow {
    #[sqlx(flatten)]
    employee: EmployeeRow,
    assignment_count: i64,
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    title: String,
    date: String,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    client_name: Option<String>,
    client_phone: Option<String>,
    notes: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> StoreResult<Self> {
        Ok(Event {
            date: dates::parse_date_only(&row.date).map_err(|e| corrupt("events.date", e))?,
            start_time: decode_opt_ts("events.start_time", row.start_time)?,
            end_time: decode_opt_ts("events.end_time", row.end_time)?,
            status: EventStatus::parse(&row.status)
                .ok_or_else(|| corrupt("events.status", &row.status))?,
            created_at: decode_ts("events.created_at", &row.created_at)?,
            updated_at: decode_ts("events.updated_at", &row.updated_at)?,
            id: row.id,
            title: row.title,
            location: row.location,
            client_name: row.client_name,
            client_phone: row.client_phone,
            notes: row.notes,
        })
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: String,
    event_id: String,
    employee_id: String,
    role: Option<String>,
    assigned_at: String,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = StoreError;

    fn try_from(row: AssignmentRow) -> StoreResult<Self> {
        Ok(Assignment {
            assigned_at: decode_ts("assignments.assigned_at", &row.assigned_at)?,
            id: row.id,
            event_id: row.event_id,
            employee_id: row.employee_id,
            role: row.role,
        })
    }
}

/// Assignment joined with the employee summary columns.
#[derive(Debug, FromRow)]
struct AssignmentEmployeeRow {
    #[sqlx(flatten)]
    assignment: AssignmentRow,
    emp_id: Option<String>,
    emp_first_name: Option<String>,
    emp_last_name: Option<String>,
    emp_email: Option<String>,
    emp_phone: Option<String>,
    emp_role: Option<String>,
    emp_status: Option<String>,
}

impl TryFrom<AssignmentEmployeeRow> for AssignmentWithEmployee {
    type Error = StoreError;

    fn try_from(row: AssignmentEmployeeRow) -> StoreResult<Self> {
        let employee = match (row.emp_id, row.emp_status) {
            (Some(id), Some(status)) => Some(EmployeeSummary {
                id,
                status: EmployeeStatus::parse(&status)
                    .ok_or_else(|| corrupt("employees.status", &status))?,
                first_name: row.emp_first_name.unwrap_or_default(),
                last_name: row.emp_last_name.unwrap_or_default(),
                email: row.emp_email.unwrap_or_default(),
                phone: row.emp_phone,
                role: row.emp_role,
            }),
            _ => None,
        };
        Ok(AssignmentWithEmployee {
            assignment: row.assignment.try_into()?,
            employee,
        })
    }
}

#[derive(Debug, FromRow)]
struct SavedItemRow {
    id: String,
    form_key: String,
    kind: String,
    form_version: Option<String>,
    payload: String,
    event_id: Option<String>,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SavedItemRow> for SavedItem {
    type Error = StoreError;

    fn try_from(row: SavedItemRow) -> StoreResult<Self> {
        Ok(SavedItem {
            kind: SavedItemKind::parse(&row.kind)
                .ok_or_else(|| corrupt("saved_items.kind", &row.kind))?,
            payload: decode_json("saved_items.payload", &row.payload)?,
            created_at: decode_ts("saved_items.created_at", &row.created_at)?,
            updated_at: decode_ts("saved_items.updated_at", &row.updated_at)?,
            id: row.id,
            form_key: row.form_key,
            form_version: row.form_version,
            event_id: row.event_id,
            created_by: row.created_by,
        })
    }
}

// ============================================================================
// Query helpers (shared by pooled reads and transactions)
// ============================================================================

async fn fetch_employee(conn: &mut AnyConnection, id: &str) -> StoreResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1");
    sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(Employee::try_from)
        .transpose()
}

async fn write_employee(conn: &mut AnyConnection, e: &Employee, insert: bool) -> StoreResult<()> {
    let sql = if insert {
        format!(
            "INSERT INTO employees ({EMPLOYEE_COLUMNS}) VALUES ({})",
            placeholders(1, 14)
        )
    } else {
        "UPDATE employees SET first_name = $2, last_name = $3, email = $4, phone = $5, \
         role = $6, status = $7, skills = $8, certifications = $9, hourly_rate = $10, \
         availability = $11, notes = $12, created_at = $13, updated_at = $14 WHERE id = $1"
            .to_string()
    };
    let availability = e
        .availability
        .as_ref()
        .map(|a| encode_json("employees.availability", a))
        .transpose()?;

    sqlx::query(&sql)
        .bind(&e.id)
        .bind(&e.first_name)
        .bind(&e.last_name)
        .bind(&e.email)
        .bind(&e.phone)
        .bind(&e.role)
        .bind(e.status.as_str())
        .bind(encode_json("employees.skills", &e.skills)?)
        .bind(encode_json("employees.certifications", &e.certifications)?)
        .bind(e.hourly_rate)
        .bind(availability)
        .bind(&e.notes)
        .bind(dates::to_storage(&e.created_at))
        .bind(dates::to_storage(&e.updated_at))
        .execute(conn)
        .await
        .map_err(|err| conflict_on_unique(err, "Employee email already exists"))?;
    Ok(())
}

async fn check_employees(conn: &mut AnyConnection, items: &[NewAssignment]) -> StoreResult<()> {
    if items.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "SELECT id FROM employees WHERE id IN ({})",
        placeholders(1, items.len())
    );
    let mut query = sqlx::query_scalar::<_, String>(&sql);
    for item in items {
        query = query.bind(&item.employee_id);
    }
    let found = query.fetch_all(conn).await?;
    if items.iter().all(|i| found.contains(&i.employee_id)) {
        Ok(())
    } else {
        Err(StoreError::InvalidEmployee)
    }
}

async fn fetch_event(conn: &mut AnyConnection, id: &str) -> StoreResult<Option<Event>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
    sqlx::query_as::<_, EventRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(Event::try_from)
        .transpose()
}

async fn fetch_events_by_ids(
    conn: &mut AnyConnection,
    ids: &[String],
) -> StoreResult<HashMap<String, Event>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id IN ({})",
        placeholders(1, ids.len())
    );
    let mut query = sqlx::query_as::<_, EventRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    query
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|row| Event::try_from(row).map(|e| (e.id.clone(), e)))
        .collect()
}

async fn write_event(conn: &mut AnyConnection, e: &Event, insert: bool) -> StoreResult<()> {
    let sql = if insert {
        format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ({})",
            placeholders(1, 12)
        )
    } else {
        "UPDATE events SET title = $2, date = $3, start_time = $4, end_time = $5, \
         location = $6, client_name = $7, client_phone = $8, notes = $9, status = $10, \
         created_at = $11, updated_at = $12 WHERE id = $1"
            .to_string()
    };
    sqlx::query(&sql)
        .bind(&e.id)
        .bind(&e.title)
        .bind(dates::day_to_storage(&e.date))
        .bind(e.start_time.as_ref().map(dates::to_storage))
        .bind(e.end_time.as_ref().map(dates::to_storage))
        .bind(&e.location)
        .bind(&e.client_name)
        .bind(&e.client_phone)
        .bind(&e.notes)
        .bind(e.status.as_str())
        .bind(dates::to_storage(&e.created_at))
        .bind(dates::to_storage(&e.updated_at))
        .execute(conn)
        .await?;
    Ok(())
}

const ASSIGNMENT_JOIN: &str = "SELECT a.id, a.event_id, a.employee_id, a.role, a.assigned_at, \
     e.id AS emp_id, e.first_name AS emp_first_name, e.last_name AS emp_last_name, \
     e.email AS emp_email, e.phone AS emp_phone, e.role AS emp_role, e.status AS emp_status \
     FROM assignments a LEFT JOIN employees e ON e.id = a.employee_id";

/// Assignments (with employees) for the given events, keyed by event id.
async fn fetch_assignments(
    conn: &mut AnyConnection,
    event_ids: &[String],
) -> StoreResult<HashMap<String, Vec<AssignmentWithEmployee>>> {
    let mut grouped: HashMap<String, Vec<AssignmentWithEmployee>> = HashMap::new();
    if event_ids.is_empty() {
        return Ok(grouped);
    }
    let sql = format!(
        "{ASSIGNMENT_JOIN} WHERE a.event_id IN ({}) ORDER BY a.assigned_at, a.id",
        placeholders(1, event_ids.len())
    );
    let mut query = sqlx::query_as::<_, AssignmentEmployeeRow>(&sql);
    for id in event_ids {
        query = query.bind(id);
    }
    for row in query.fetch_all(conn).await? {
        let item = AssignmentWithEmployee::try_from(row)?;
        grouped
            .entry(item.assignment.event_id.clone())
            .or_default()
            .push(item);
    }
    Ok(grouped)
}

async fn fetch_assignment(
    conn: &mut AnyConnection,
    id: &str,
) -> StoreResult<AssignmentWithEmployee> {
    let sql = format!("{ASSIGNMENT_JOIN} WHERE a.id = $1");
    let row = sqlx::query_as::<_, AssignmentEmployeeRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound("Assignment"))?;
    row.try_into()
}

async fn load_event(conn: &mut AnyConnection, id: &str) -> StoreResult<EventWithAssignments> {
    let event = fetch_event(&mut *conn, id)
        .await?
        .ok_or(StoreError::NotFound("Event"))?;
    let mut grouped = fetch_assignments(conn, std::slice::from_ref(&event.id)).await?;
    Ok(EventWithAssignments {
        assignments: grouped.remove(&event.id).unwrap_or_default(),
        event,
    })
}

async fn insert_assignment(conn: &mut AnyConnection, a: &Assignment) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO assignments (id, event_id, employee_id, role, assigned_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&a.id)
    .bind(&a.event_id)
    .bind(&a.employee_id)
    .bind(&a.role)
    .bind(dates::to_storage(&a.assigned_at))
    .execute(conn)
    .await
    .map_err(|err| conflict_on_unique(err, "Employee already assigned to this event"))?;
    Ok(())
}

/// Delete every assignment of the event, then create `items`.
async fn replace_assignments(
    conn: &mut AnyConnection,
    event_id: &str,
    items: Vec<NewAssignment>,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    let items = dedupe_assignments(items);
    check_employees(&mut *conn, &items).await?;
    sqlx::query("DELETE FROM assignments WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    for (position, item) in items.into_iter().enumerate() {
        let assignment = Assignment {
            id: new_id(),
            event_id: event_id.to_string(),
            employee_id: item.employee_id,
            role: item.role,
            assigned_at: batch_timestamp(now, position),
        };
        insert_assignment(&mut *conn, &assignment).await?;
    }
    Ok(())
}

async fn fetch_saved_item(
    conn: &mut AnyConnection,
    form_key: &str,
    kind: SavedItemKind,
) -> StoreResult<Option<SavedItem>> {
    let sql = format!("SELECT {SAVED_ITEM_COLUMNS} FROM saved_items WHERE form_key = $1 AND kind = $2");
    sqlx::query_as::<_, SavedItemRow>(&sql)
        .bind(form_key)
        .bind(kind.as_str())
        .fetch_optional(conn)
        .await?
        .map(SavedItem::try_from)
        .transpose()
}

// ============================================================================
// Store
// ============================================================================

pub struct SqlStore {
    pool: AnyPool,
    /// Appended to text ORDER BY keys so both engines sort by bytes.
    collate: &'static str,
}

/// SQLite's default BINARY collation already compares bytes; PostgreSQL
/// follows the database locale unless told otherwise.
fn byte_order_collation(url: &str) -> &'static str {
    if url.starts_with("postgres") {
        r#" COLLATE "C""#
    } else {
        ""
    }
}

impl SqlStore {
    pub async fn connect(config: DbConfig) -> StoreResult<Self> {
        install_default_drivers();

        tracing::info!("Initializing database connection pool...");
        tracing::debug!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database pool settings"
        );

        // Every connection to `sqlite::memory:` is its own database.
        let in_memory = config.url.contains(":memory:");
        let mut options = AnyPoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .test_before_acquire(true);
        options = if in_memory {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = options.connect(&config.url).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;

        tracing::info!("Database connection pool initialized successfully");
        Ok(Self {
            pool,
            collate: byte_order_collation(&config.url),
        })
    }

    /// Idempotent schema setup.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        tracing::info!("Running database migrations...");
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database migrations completed successfully");
        Ok(())
    }

    /// Migrated store on a private in-memory SQLite database.
    #[cfg(test)]
    pub(crate) async fn in_memory() -> StoreResult<Self> {
        let store = Self::connect(DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 60,
        })
        .await?;
        store.run_migrations().await?;
        Ok(store)
    }
}

#[async_trait]
impl Store for SqlStore {
    fn backend(&self) -> &'static str {
        "sql"
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed())
    }

    async fn list_employees(&self) -> StoreResult<Vec<EmployeeWithCount>> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS}, \
             (SELECT COUNT(*) FROM assignments a WHERE a.employee_id = employees.id) AS assignment_count \
             FROM employees ORDER BY last_name{c}, first_name{c}, id{c}",
            c = self.collate
        );
        sqlx::query_as::<_, EmployeeCountRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| {
                Ok(EmployeeWithCount {
                    employee: row.employee.try_into()?,
                    assignment_count: row.assignment_count,
                })
            })
            .collect()
    }

    async fn find_employee(&self, id: &str) -> StoreResult<Option<EmployeeDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(employee) = fetch_employee(&mut conn, id).await? else {
            return Ok(None);
        };

        let assignments: Vec<Assignment> = sqlx::query_as::<_, AssignmentRow>(
            "SELECT id, event_id, employee_id, role, assigned_at FROM assignments WHERE employee_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Assignment::try_from)
        .collect::<StoreResult<_>>()?;

        let event_ids: Vec<String> = assignments.iter().map(|a| a.event_id.clone()).collect();
        let events = fetch_events_by_ids(&mut conn, &event_ids).await?;

        let mut assignments: Vec<EmployeeAssignment> = assignments
            .into_iter()
            .map(|a| EmployeeAssignment {
                event: events.get(&a.event_id).cloned(),
                assignment: a,
            })
            .collect();
        assignments.sort_by(|a, b| {
            let day = |x: &EmployeeAssignment| x.event.as_ref().map(|e| e.date);
            day(a)
                .cmp(&day(b))
                .then_with(|| a.assignment.assigned_at.cmp(&b.assignment.assigned_at))
                .then_with(|| a.assignment.id.cmp(&b.assignment.id))
        });

        Ok(Some(EmployeeDetail {
            employee,
            assignments,
        }))
    }

    async fn create_employee(&self, new: NewEmployee) -> StoreResult<Employee> {
        let employee = new.into_employee(new_id(), dates::now());
        let mut conn = self.pool.acquire().await?;
        write_employee(&mut conn, &employee, true).await?;
        Ok(employee)
    }

    async fn update_employee(&self, id: &str, patch: EmployeePatch) -> StoreResult<Employee> {
        let mut tx = self.pool.begin().await?;
        let mut employee = fetch_employee(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("Employee"))?;
        patch.apply(&mut employee, dates::now());
        write_employee(&mut tx, &employee, false).await?;
        tx.commit().await?;
        Ok(employee)
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<EventWithAssignments>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1 = 1");
        let mut binds: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            binds.push(status.as_str().to_string());
            sql.push_str(&format!(" AND status = ${}", binds.len()));
        }
        if let Some(from) = filter.date_from {
            binds.push(dates::day_to_storage(&from));
            sql.push_str(&format!(" AND date >= ${}", binds.len()));
        }
        if let Some(to) = filter.date_to {
            binds.push(dates::day_to_storage(&to));
            sql.push_str(&format!(" AND date <= ${}", binds.len()));
        }
        sql.push_str(&format!(" ORDER BY date, title{c}, id{c}", c = self.collate));

        let mut conn = self.pool.acquire().await?;
        let mut query = sqlx::query_as::<_, EventRow>(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let events: Vec<Event> = query
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Event::try_from)
            .collect::<StoreResult<_>>()?;

        let ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
        let mut grouped = fetch_assignments(&mut conn, &ids).await?;
        Ok(events
            .into_iter()
            .map(|event| EventWithAssignments {
                assignments: grouped.remove(&event.id).unwrap_or_default(),
                event,
            })
            .collect())
    }

    async fn find_event(&self, id: &str) -> StoreResult<Option<EventWithAssignments>> {
        let mut conn = self.pool.acquire().await?;
        match load_event(&mut conn, id).await {
            Ok(event) => Ok(Some(event)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_event(
        &self,
        new: NewEvent,
        assignments: Vec<NewAssignment>,
    ) -> StoreResult<EventWithAssignments> {
        let now = dates::now();
        let event = new.into_event(new_id(), now);

        let mut tx = self.pool.begin().await?;
        write_event(&mut tx, &event, true).await?;
        replace_assignments(&mut tx, &event.id, assignments, now).await?;
        let created = load_event(&mut tx, &event.id).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_event(
        &self,
        id: &str,
        patch: EventPatch,
        assignments: Option<Vec<NewAssignment>>,
    ) -> StoreResult<EventWithAssignments> {
        let now = dates::now();
        let mut tx = self.pool.begin().await?;
        let mut event = fetch_event(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("Event"))?;
        patch.apply(&mut event, now);
        write_event(&mut tx, &event, false).await?;
        if let Some(items) = assignments {
            replace_assignments(&mut tx, id, items, now).await?;
        }
        let updated = load_event(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn assign_employee(
        &self,
        event_id: &str,
        assignment: NewAssignment,
    ) -> StoreResult<AssignOutcome> {
        let mut tx = self.pool.begin().await?;
        if fetch_event(&mut tx, event_id).await?.is_none() {
            return Err(StoreError::NotFound("Event"));
        }
        check_employees(&mut tx, std::slice::from_ref(&assignment)).await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM assignments WHERE event_id = $1 AND employee_id = $2",
        )
        .bind(event_id)
        .bind(&assignment.employee_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (id, created) = match existing {
            Some(id) => {
                if let Some(role) = &assignment.role {
                    sqlx::query("UPDATE assignments SET role = $1 WHERE id = $2")
                        .bind(role)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await?;
                }
                (id, false)
            }
            None => {
                let row = Assignment {
                    id: new_id(),
                    event_id: event_id.to_string(),
                    employee_id: assignment.employee_id,
                    role: assignment.role,
                    assigned_at: dates::now(),
                };
                insert_assignment(&mut tx, &row).await?;
                (row.id, true)
            }
        };

        let assignment = fetch_assignment(&mut tx, &id).await?;
        tx.commit().await?;
        Ok(AssignOutcome {
            assignment,
            created,
        })
    }

    async fn unassign_employee(&self, event_id: &str, assignment_id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1 AND event_id = $2")
            .bind(assignment_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Assignment"));
        }
        Ok(())
    }

    async fn upsert_draft(&self, draft: DraftUpsert) -> StoreResult<SavedItem> {
        let now = dates::to_storage(&dates::now());
        let payload = encode_json("saved_items.payload", &draft.payload)?;
        let sql = format!(
            "INSERT INTO saved_items ({SAVED_ITEM_COLUMNS}) VALUES ({}) \
             ON CONFLICT (form_key, kind) DO UPDATE SET \
                 payload = excluded.payload, \
                 form_version = COALESCE(excluded.form_version, saved_items.form_version), \
                 event_id = COALESCE(excluded.event_id, saved_items.event_id), \
                 created_by = COALESCE(excluded.created_by, saved_items.created_by), \
                 updated_at = excluded.updated_at",
            placeholders(1, 9)
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&sql)
            .bind(new_id())
            .bind(&draft.form_key)
            .bind(draft.kind.as_str())
            .bind(&draft.form_version)
            .bind(payload)
            .bind(&draft.event_id)
            .bind(&draft.created_by)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        let item = fetch_saved_item(&mut tx, &draft.form_key, draft.kind)
            .await?
            .ok_or(StoreError::NotFound("Saved draft"))?;
        tx.commit().await?;
        Ok(item)
    }

    async fn find_draft(
        &self,
        form_key: &str,
        kind: SavedItemKind,
    ) -> StoreResult<Option<SavedItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_saved_item(&mut conn, form_key, kind).await
    }

    async fn delete_draft(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM saved_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Saved draft"));
        }
        Ok(())
    }

    async fn submit_draft(
        &self,
        submission: SchedulerSubmission,
    ) -> StoreResult<EventWithAssignments> {
        let now = dates::now();
        let finalized = encode_json("saved_items.payload", &submission.finalized_payload())?;
        let SchedulerSubmission {
            form_key,
            target_event_id,
            event: new_event,
            assignments,
            ..
        } = submission;

        let mut tx = self.pool.begin().await?;
        let event_id = match target_event_id {
            Some(id) => {
                let mut event = fetch_event(&mut tx, &id)
                    .await?
                    .ok_or(StoreError::NotFound("Event"))?;
                new_event.overwrite(&mut event, now);
                write_event(&mut tx, &event, false).await?;
                id
            }
            None => {
                let event = new_event.into_event(new_id(), now);
                write_event(&mut tx, &event, true).await?;
                event.id
            }
        };

        if let Some(items) = assignments {
            replace_assignments(&mut tx, &event_id, items, now).await?;
        }

        sqlx::query(
            "UPDATE saved_items SET event_id = $1, payload = $2, updated_at = $3 \
             WHERE form_key = $4 AND kind = $5",
        )
        .bind(&event_id)
        .bind(finalized)
        .bind(dates::to_storage(&now))
        .bind(&form_key)
        .bind(SavedItemKind::SchedulerDraft.as_str())
        .execute(&mut *tx)
        .await?;

        let event = load_event(&mut tx, &event_id).await?;
        tx.commit().await?;
        Ok(event)
    }
}
