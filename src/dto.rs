//! Response shapes. Optional fields serialize as `null`, never omitted.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::dates;
use crate::db::models::{
    AssignmentWithEmployee, Availability, DayStatus, Employee, EmployeeDetail, EmployeeStatus,
    EmployeeSummary, EmployeeWithCount, Event, EventStatus, EventWithAssignments, SavedItem,
    SavedItemKind, SchedulerPayload,
};

const AVAILABILITY_WINDOW_DAYS: i64 = 30;

// ============================================================================
// Employees
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Success,
    Danger,
}

fn status_display(status: EmployeeStatus) -> (&'static str, StatusLevel) {
    match status {
        EmployeeStatus::Active => ("Active", StatusLevel::Success),
        EmployeeStatus::Inactive => ("Unavailable", StatusLevel::Danger),
    }
}

/// "N open day(s) · M blocked" over `[today, today + 30 days]`.
pub fn summarize_availability(availability: Option<&Availability>, today: NaiveDate) -> Option<String> {
    let days = &availability?.days;
    let cutoff = today + Duration::days(AVAILABILITY_WINDOW_DAYS);

    let (mut open, mut blocked) = (0usize, 0usize);
    for day in days.iter().filter(|d| d.date >= today && d.date <= cutoff) {
        match day.status {
            DayStatus::Available => open += 1,
            DayStatus::Blocked => blocked += 1,
        }
    }

    let mut parts = Vec::new();
    if open > 0 {
        parts.push(format!("{} open day{}", open, if open == 1 { "" } else { "s" }));
    }
    if blocked > 0 {
        parts.push(format!("{} blocked", blocked));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" · "))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: EmployeeStatus,
    pub status_label: &'static str,
    pub status_level: StatusLevel,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub availability: Option<Availability>,
    pub availability_summary: Option<String>,
    pub notes: Option<String>,
    pub assignments_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl EmployeeDto {
    pub fn new(employee: &Employee, assignments_count: i64, today: NaiveDate) -> Self {
        let (status_label, status_level) = status_display(employee.status);
        Self {
            id: employee.id.clone(),
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            full_name: format!("{} {}", employee.first_name, employee.last_name)
                .trim()
                .to_string(),
            email: employee.email.clone(),
            phone: employee.phone.clone(),
            role: employee.role.clone(),
            status: employee.status,
            status_label,
            status_level,
            skills: employee.skills.clone(),
            certifications: employee.certifications.clone(),
            hourly_rate: employee.hourly_rate,
            availability: employee.availability.clone(),
            availability_summary: summarize_availability(employee.availability.as_ref(), today),
            notes: employee.notes.clone(),
            assignments_count,
            created_at: dates::to_storage(&employee.created_at),
            updated_at: dates::to_storage(&employee.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListItemDto {
    #[serde(flatten)]
    pub employee: EmployeeDto,
    /// First line of the notes.
    pub teaser: Option<String>,
}

impl EmployeeListItemDto {
    pub fn new(item: &EmployeeWithCount, today: NaiveDate) -> Self {
        Self {
            employee: EmployeeDto::new(&item.employee, item.assignment_count, today),
            teaser: item
                .employee
                .notes
                .as_deref()
                .and_then(|n| n.lines().next())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAssignmentDto {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDetailDto {
    #[serde(flatten)]
    pub employee: EmployeeDto,
    pub upcoming_assignments: Vec<UpcomingAssignmentDto>,
}

impl EmployeeDetailDto {
    /// Assignments arrive sorted by event date from the store.
    pub fn new(detail: &EmployeeDetail, today: NaiveDate) -> Self {
        let upcoming_assignments = detail
            .assignments
            .iter()
            .map(|item| {
                let a = &item.assignment;
                match &item.event {
                    Some(event) => UpcomingAssignmentDto {
                        id: a.id.clone(),
                        event_id: a.event_id.clone(),
                        title: event.title.clone(),
                        date: event_date(event.date),
                        start_time: event.start_time.as_ref().map(dates::to_storage),
                        end_time: event.end_time.as_ref().map(dates::to_storage),
                        location: event.location.clone(),
                        role: a.role.clone(),
                    },
                    None => UpcomingAssignmentDto {
                        id: a.id.clone(),
                        event_id: a.event_id.clone(),
                        title: "Scheduled event".to_string(),
                        date: dates::to_storage(&a.assigned_at),
                        start_time: None,
                        end_time: None,
                        location: None,
                        role: a.role.clone(),
                    },
                }
            })
            .collect();

        Self {
            employee: EmployeeDto::new(
                &detail.employee,
                detail.assignments.len() as i64,
                today,
            ),
            upcoming_assignments,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Calendar days go out as midnight UTC timestamps.
fn event_date(date: NaiveDate) -> String {
    dates::to_storage(&dates::start_of_day(date))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEmployeeDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: EmployeeStatus,
}

impl From<&EmployeeSummary> for AssignmentEmployeeDto {
    fn from(e: &EmployeeSummary) -> Self {
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

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub id: String,
    pub event_id: String,
    pub employee_id: String,
    pub role: Option<String>,
    pub assigned_at: String,
    pub employee: Option<AssignmentEmployeeDto>,
}

impl From<&AssignmentWithEmployee> for AssignmentDto {
    fn from(item: &AssignmentWithEmployee) -> Self {
        let a = &item.assignment;
        Self {
            id: a.id.clone(),
            event_id: a.event_id.clone(),
            employee_id: a.employee_id.clone(),
            role: a.role.clone(),
            assigned_at: dates::to_storage(&a.assigned_at),
            employee: item.employee.as_ref().map(AssignmentEmployeeDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub id: String,
    pub title: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: EventStatus,
    pub created_at: String,
    pub updated_at: String,
    pub assignments: Vec<AssignmentDto>,
}

impl EventDto {
    fn from_parts(event: &Event, assignments: &[AssignmentWithEmployee]) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            date: event_date(event.date),
            start_time: event.start_time.as_ref().map(dates::to_storage),
            end_time: event.end_time.as_ref().map(dates::to_storage),
            location: event.location.clone(),
            client_name: event.client_name.clone(),
            client_phone: event.client_phone.clone(),
            notes: event.notes.clone(),
            status: event.status,
            created_at: dates::to_storage(&event.created_at),
            updated_at: dates::to_storage(&event.updated_at),
            assignments: assignments.iter().map(AssignmentDto::from).collect(),
        }
    }
}

impl From<&EventWithAssignments> for EventDto {
    fn from(item: &EventWithAssignments) -> Self {
        Self::from_parts(&item.event, &item.assignments)
    }
}

// ============================================================================
// Scheduler drafts
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItemDto {
    pub id: String,
    pub form_key: String,
    pub kind: SavedItemKind,
    pub form_version: Option<String>,
    pub payload: SchedulerPayload,
    pub event_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&SavedItem> for SavedItemDto {
    fn from(item: &SavedItem) -> Self {
        Self {
            id: item.id.clone(),
            form_key: item.form_key.clone(),
            kind: item.kind,
            form_version: item.form_version.clone(),
            payload: item.payload.clone(),
            event_id: item.event_id.clone(),
            created_by: item.created_by.clone(),
            created_at: dates::to_storage(&item.created_at),
            updated_at: dates::to_storage(&item.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AvailabilityDay;
    use crate::db::MemoryStore;
    use crate::db::Store;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn availability(days: &[(NaiveDate, DayStatus)]) -> Availability {
        Availability {
            notes: None,
            days: days
                .iter()
                .map(|(date, status)| AvailabilityDay {
                    date: *date,
                    status: *status,
                    start: None,
                    end: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_availability_summary_counts_window_only() {
        let today = day(2025, 10, 1);
        let a = availability(&[
            (day(2025, 9, 30), DayStatus::Available),
            (day(2025, 10, 1), DayStatus::Available),
            (day(2025, 10, 2), DayStatus::Available),
            (day(2025, 10, 20), DayStatus::Blocked),
            (day(2025, 10, 31), DayStatus::Blocked),
            (day(2025, 11, 1), DayStatus::Available),
        ]);
        assert_eq!(
            summarize_availability(Some(&a), today).as_deref(),
            Some("2 open days · 2 blocked")
        );

        let single = availability(&[(day(2025, 10, 3), DayStatus::Available)]);
        assert_eq!(
            summarize_availability(Some(&single), today).as_deref(),
            Some("1 open day")
        );

        let blocked = availability(&[(day(2025, 10, 3), DayStatus::Blocked)]);
        assert_eq!(
            summarize_availability(Some(&blocked), today).as_deref(),
            Some("1 blocked")
        );

        assert_eq!(summarize_availability(Some(&availability(&[])), today), None);
        assert_eq!(summarize_availability(None, today), None);
    }

    #[tokio::test]
    async fn test_employee_list_item_shape() {
        let store = MemoryStore::with_demo_data();
        let employees = store.list_employees().await.unwrap();
        let john = employees
            .iter()
            .find(|e| e.employee.first_name == "John")
            .unwrap();

        let dto = EmployeeListItemDto::new(john, day(2025, 10, 1));
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["fullName"], "John Doe");
        assert_eq!(json["statusLabel"], "Active");
        assert_eq!(json["statusLevel"], "success");
        assert_eq!(json["assignmentsCount"], john.assignment_count);
        assert!(json["teaser"].as_str().is_some_and(|t| !t.contains('\n')));
        assert!(json.get("phone").is_some());
        assert!(json.get("availabilitySummary").is_some());
    }

    #[test]
    fn test_inactive_employee_is_unavailable_and_nulls_are_kept() {
        let now = dates::now();
        let employee = Employee {
            id: "e1".into(),
            first_name: "Solo".into(),
            last_name: "".into(),
            email: "solo@example.com".into(),
            phone: None,
            role: None,
            status: EmployeeStatus::Inactive,
            skills: vec![],
            certifications: vec![],
            hourly_rate: None,
            availability: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(EmployeeDto::new(&employee, 0, day(2025, 10, 1))).unwrap();
        assert_eq!(json["fullName"], "Solo");
        assert_eq!(json["statusLabel"], "Unavailable");
        assert_eq!(json["statusLevel"], "danger");
        for key in ["phone", "role", "hourlyRate", "availability", "availabilitySummary", "notes"] {
            assert!(json[key].is_null(), "{key} should be null");
            assert!(json.get(key).is_some(), "{key} should be present");
        }
    }

    #[tokio::test]
    async fn test_event_dto_nests_employee() {
        let store = MemoryStore::with_demo_data();
        let events = store.list_events(&Default::default()).await.unwrap();
        let dto = EventDto::from(&events[0]);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["date"], "2025-10-05T00:00:00.000Z");
        assert!(json["clientPhone"].is_string() || json["clientPhone"].is_null());
        let first = &json["assignments"][0];
        assert_eq!(first["eventId"], json["id"]);
        assert!(first["employee"]["email"].is_string());
    }
}
