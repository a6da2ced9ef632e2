//! Domain Models - records held by the stores, plus the validated inputs
//! that create or change them.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dates;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub const ALL: [EmployeeStatus; 2] = [EmployeeStatus::Active, EmployeeStatus::Inactive];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "active",
            EmployeeStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Scheduled,
    Completed,
    Canceled,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::Draft,
        EventStatus::Scheduled,
        EventStatus::Completed,
        EventStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Scheduled => "scheduled",
            EventStatus::Completed => "completed",
            EventStatus::Canceled => "canceled",
        }
    }

    /// Case-sensitive match against the wire names.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedItemKind {
    SchedulerDraft,
}

impl SavedItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavedItemKind::SchedulerDraft => "scheduler_draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduler_draft" => Some(SavedItemKind::SchedulerDraft),
            _ => None,
        }
    }
}

// ============================================================================
// Employees
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    #[serde(alias = "open")]
    Available,
    #[serde(alias = "unavailable")]
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Day-by-day open/blocked windows for an employee.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Availability {
    pub notes: Option<String>,
    #[serde(default)]
    pub days: Vec<AvailabilityDay>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: EmployeeStatus,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub availability: Option<Availability>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: EmployeeStatus,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub availability: Option<Availability>,
    pub notes: Option<String>,
}

impl NewEmployee {
    pub fn into_employee(self, id: String, now: DateTime<Utc>) -> Employee {
        Employee {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            role: self.role,
            status: self.status,
            skills: self.skills,
            certifications: self.certifications,
            hourly_rate: self.hourly_rate,
            availability: self.availability,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial employee update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub skills: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
    pub availability: Option<Availability>,
    pub notes: Option<String>,
}

impl EmployeePatch {
    pub fn apply(self, employee: &mut Employee, now: DateTime<Utc>) {
        if let Some(v) = self.first_name {
            employee.first_name = v;
        }
        if let Some(v) = self.last_name {
            employee.last_name = v;
        }
        if let Some(v) = self.email {
            employee.email = v;
        }
        if let Some(v) = self.phone {
            employee.phone = Some(v);
        }
        if let Some(v) = self.role {
            employee.role = Some(v);
        }
        if let Some(v) = self.status {
            employee.status = v;
        }
        if let Some(v) = self.skills {
            employee.skills = v;
        }
        if let Some(v) = self.certifications {
            employee.certifications = v;
        }
        if let Some(v) = self.hourly_rate {
            employee.hourly_rate = Some(v);
        }
        if let Some(v) = self.availability {
            employee.availability = Some(v);
        }
        if let Some(v) = self.notes {
            employee.notes = Some(v);
        }
        employee.updated_at = now;
    }
}

/// The employee fields embedded in an event's assignment list.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: EmployeeStatus,
}

impl From<&Employee> for EmployeeSummary {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id.clone(),
            first_name: e.first_name.clone(),
            last_name: e.last_name.clone(),
            email: e.email.clone(),
            phone: e.phone.clone(),
            role: e.role.clone(),
            status: e.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeWithCount {
    pub employee: Employee,
    pub assignment_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeAssignment {
    pub assignment: Assignment,
    pub event: Option<Event>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeDetail {
    pub employee: Employee,
    pub assignments: Vec<EmployeeAssignment>,
}

// ============================================================================
// Events & assignments
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full set of event fields, used on create and on scheduler overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: EventStatus,
}

impl NewEvent {
    pub fn into_event(self, id: String, now: DateTime<Utc>) -> Event {
        let mut event = Event {
            id,
            title: String::new(),
            date: self.date,
            start_time: None,
            end_time: None,
            location: None,
            client_name: None,
            client_phone: None,
            notes: None,
            status: self.status,
            created_at: now,
            updated_at: now,
        };
        self.overwrite(&mut event, now);
        event
    }

    /// Replace every editable field of `event`.
    pub fn overwrite(self, event: &mut Event, now: DateTime<Utc>) {
        event.title = self.title;
        event.date = self.date;
        event.start_time = self.start_time.map(|t| dates::at_time(self.date, t));
        event.end_time = self.end_time.map(|t| dates::at_time(self.date, t));
        event.location = self.location;
        event.client_name = self.client_name;
        event.client_phone = self.client_phone;
        event.notes = self.notes;
        event.status = self.status;
        event.updated_at = now;
    }
}

/// Partial event update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<EventStatus>,
}

impl EventPatch {
    /// A new date without new times re-anchors the stored times of day on
    /// the new day; a new time without a date lands on the current day.
    pub fn apply(self, event: &mut Event, now: DateTime<Utc>) {
        let day = self.date.unwrap_or(event.date);

        event.start_time = match self.start_time {
            Some(t) => Some(dates::at_time(day, t)),
            None => dates::reanchor(day, event.start_time),
        };
        event.end_time = match self.end_time {
            Some(t) => Some(dates::at_time(day, t)),
            None => dates::reanchor(day, event.end_time),
        };
        event.date = day;

        if let Some(v) = self.title {
            event.title = v;
        }
        if let Some(v) = self.location {
            event.location = Some(v);
        }
        if let Some(v) = self.client_name {
            event.client_name = Some(v);
        }
        if let Some(v) = self.client_phone {
            event.client_phone = Some(v);
        }
        if let Some(v) = self.notes {
            event.notes = Some(v);
        }
        if let Some(v) = self.status {
            event.status = v;
        }
        event.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.status.is_none_or(|s| event.status == s)
            && self.date_from.is_none_or(|from| event.date >= from)
            && self.date_to.is_none_or(|to| event.date <= to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub event_id: String,
    pub employee_id: String,
    pub role: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub employee_id: String,
    pub role: Option<String>,
}

/// `assigned_at` for the entry at `position` of a replacement batch. One
/// millisecond apart so list order follows request order at storage precision.
pub fn batch_timestamp(now: DateTime<Utc>, position: usize) -> DateTime<Utc> {
    now + TimeDelta::milliseconds(position as i64)
}

/// Collapse repeated employee ids: the last entry wins, at the position of
/// the first.
pub fn dedupe_assignments(items: Vec<NewAssignment>) -> Vec<NewAssignment> {
    let mut out: Vec<NewAssignment> = Vec::with_capacity(items.len());
    for item in items {
        match out.iter_mut().find(|a| a.employee_id == item.employee_id) {
            Some(existing) => *existing = item,
            None => out.push(item),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentWithEmployee {
    pub assignment: Assignment,
    pub employee: Option<EmployeeSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventWithAssignments {
    pub event: Event,
    pub assignments: Vec<AssignmentWithEmployee>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignOutcome {
    pub assignment: AssignmentWithEmployee,
    pub created: bool,
}

// ============================================================================
// Scheduler drafts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEvent {
    pub id: Option<String>,
    pub title: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAssignment {
    pub employee_id: String,
    pub role: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// What the scheduler form keeps between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerPayload {
    pub event: DraftEvent,
    pub assignments: Option<Vec<DraftAssignment>>,
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub finalized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedItem {
    pub id: String,
    pub form_key: String,
    pub kind: SavedItemKind,
    pub form_version: Option<String>,
    pub payload: SchedulerPayload,
    pub event_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedItem {
    pub fn is_finalized(&self) -> bool {
        self.payload.finalized
    }
}

/// Upsert keyed by `(form_key, kind)`. On update, `None` optionals keep the
/// stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftUpsert {
    pub form_key: String,
    pub kind: SavedItemKind,
    pub payload: SchedulerPayload,
    pub form_version: Option<String>,
    pub event_id: Option<String>,
    pub created_by: Option<String>,
}

impl DraftUpsert {
    pub fn into_saved_item(self, id: String, now: DateTime<Utc>) -> SavedItem {
        SavedItem {
            id,
            form_key: self.form_key,
            kind: self.kind,
            form_version: self.form_version,
            payload: self.payload,
            event_id: self.event_id,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(self, item: &mut SavedItem, now: DateTime<Utc>) {
        item.payload = self.payload;
        if self.form_version.is_some() {
            item.form_version = self.form_version;
        }
        if self.event_id.is_some() {
            item.event_id = self.event_id;
        }
        if self.created_by.is_some() {
            item.created_by = self.created_by;
        }
        item.updated_at = now;
    }
}

/// A validated scheduler submit: the parsed event plus the raw payload that
/// gets stored on the finalized draft.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSubmission {
    pub form_key: String,
    pub target_event_id: Option<String>,
    pub event: NewEvent,
    pub assignments: Option<Vec<NewAssignment>>,
    pub payload: SchedulerPayload,
}

impl SchedulerSubmission {
    pub fn finalized_payload(&self) -> SchedulerPayload {
        SchedulerPayload {
            finalized: true,
            ..self.payload.clone()
        }
    }
}
