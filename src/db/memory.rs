//! In-memory store for development and tests.
//!
//! Composite writes run against a staged copy of the tables that replaces
//! the live copy only when every step succeeded.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::models::*;
use super::{new_id, Store, StoreError, StoreResult};
use crate::dates;

#[derive(Debug, Clone, Default)]
struct Tables {
    employees: Vec<Employee>,
    events: Vec<Event>,
    assignments: Vec<Assignment>,
    saved_items: Vec<SavedItem>,
}

impl Tables {
    fn employee(&self, id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    fn event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    fn email_taken(&self, email: &str, except_id: Option<&str>) -> bool {
        self.employees
            .iter()
            .any(|e| e.email == email && Some(e.id.as_str()) != except_id)
    }

    fn check_employees(&self, items: &[NewAssignment]) -> StoreResult<()> {
        if items.iter().all(|a| self.employee(&a.employee_id).is_some()) {
            Ok(())
        } else {
            Err(StoreError::InvalidEmployee)
        }
    }

    fn with_employee(&self, assignment: &Assignment) -> AssignmentWithEmployee {
        AssignmentWithEmployee {
            assignment: assignment.clone(),
            employee: self.employee(&assignment.employee_id).map(EmployeeSummary::from),
        }
    }

    fn event_with_assignments(&self, event: &Event) -> EventWithAssignments {
        let mut assignments: Vec<&Assignment> = self
            .assignments
            .iter()
            .filter(|a| a.event_id == event.id)
            .collect();
        assignments.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then_with(|| a.id.cmp(&b.id)));
        EventWithAssignments {
            event: event.clone(),
            assignments: assignments.into_iter().map(|a| self.with_employee(a)).collect(),
        }
    }

    fn load_event(&self, id: &str) -> StoreResult<EventWithAssignments> {
        self.event(id)
            .map(|e| self.event_with_assignments(e))
            .ok_or(StoreError::NotFound("Event"))
    }

    /// Delete every assignment of the event, then create `items`.
    fn replace_assignments(
        &mut self,
        event_id: &str,
        items: Vec<NewAssignment>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let items = dedupe_assignments(items);
        self.check_employees(&items)?;
        self.assignments.retain(|a| a.event_id != event_id);
        for (position, item) in items.into_iter().enumerate() {
            self.assignments.push(Assignment {
                id: new_id(),
                event_id: event_id.to_string(),
                employee_id: item.employee_id,
                role: item.role,
                assigned_at: batch_timestamp(now, position),
            });
        }
        Ok(())
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// A store preloaded with a small roster and two events.
    pub fn with_demo_data() -> Self {
        Self {
            tables: RwLock::new(demo_tables()),
        }
    }

    /// Drop all records.
    pub async fn reset(&self) {
        *self.tables.write().await = Tables::default();
    }

    /// Run `f` against a staged copy; commit only on `Ok`.
    async fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Tables) -> StoreResult<T>,
    {
        let mut guard = self.tables.write().await;
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        let _ = self.tables.read().await.employees.len();
        Ok(start.elapsed())
    }

    async fn list_employees(&self) -> StoreResult<Vec<EmployeeWithCount>> {
        let tables = self.tables.read().await;
        let mut employees: Vec<&Employee> = tables.employees.iter().collect();
        employees.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(employees
            .into_iter()
            .map(|e| EmployeeWithCount {
                employee: e.clone(),
                assignment_count: tables
                    .assignments
                    .iter()
                    .filter(|a| a.employee_id == e.id)
                    .count() as i64,
            })
            .collect())
    }

    async fn find_employee(&self, id: &str) -> StoreResult<Option<EmployeeDetail>> {
        let tables = self.tables.read().await;
        let Some(employee) = tables.employee(id) else {
            return Ok(None);
        };
        let mut assignments: Vec<EmployeeAssignment> = tables
            .assignments
            .iter()
            .filter(|a| a.employee_id == id)
            .map(|a| EmployeeAssignment {
                assignment: a.clone(),
                event: tables.event(&a.event_id).cloned(),
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
            employee: employee.clone(),
            assignments,
        }))
    }

    async fn create_employee(&self, new: NewEmployee) -> StoreResult<Employee> {
        self.transaction(|tables| {
            if tables.email_taken(&new.email, None) {
                return Err(StoreError::Conflict("Employee email already exists".into()));
            }
            let employee = new.into_employee(new_id(), dates::now());
            tables.employees.push(employee.clone());
            Ok(employee)
        })
        .await
    }

    async fn update_employee(&self, id: &str, patch: EmployeePatch) -> StoreResult<Employee> {
        self.transaction(|tables| {
            if let Some(email) = &patch.email {
                if tables.email_taken(email, Some(id)) {
                    return Err(StoreError::Conflict("Employee email already exists".into()));
                }
            }
            let employee = tables
                .employees
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(StoreError::NotFound("Employee"))?;
            patch.apply(employee, dates::now());
            Ok(employee.clone())
        })
        .await
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<EventWithAssignments>> {
        let tables = self.tables.read().await;
        let mut events: Vec<&Event> = tables.events.iter().filter(|e| filter.matches(e)).collect();
        events.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events
            .into_iter()
            .map(|e| tables.event_with_assignments(e))
            .collect())
    }

    async fn find_event(&self, id: &str) -> StoreResult<Option<EventWithAssignments>> {
        let tables = self.tables.read().await;
        Ok(tables.event(id).map(|e| tables.event_with_assignments(e)))
    }

    async fn create_event(
        &self,
        new: NewEvent,
        assignments: Vec<NewAssignment>,
    ) -> StoreResult<EventWithAssignments> {
        self.transaction(|tables| {
            let now = dates::now();
            let event = new.into_event(new_id(), now);
            let id = event.id.clone();
            tables.events.push(event);
            tables.replace_assignments(&id, assignments, now)?;
            tables.load_event(&id)
        })
        .await
    }

    async fn update_event(
        &self,
        id: &str,
        patch: EventPatch,
        assignments: Option<Vec<NewAssignment>>,
    ) -> StoreResult<EventWithAssignments> {
        self.transaction(|tables| {
            let now = dates::now();
            let event = tables
                .events
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(StoreError::NotFound("Event"))?;
            patch.apply(event, now);
            if let Some(items) = assignments {
                tables.replace_assignments(id, items, now)?;
            }
            tables.load_event(id)
        })
        .await
    }

    async fn assign_employee(
        &self,
        event_id: &str,
        assignment: NewAssignment,
    ) -> StoreResult<AssignOutcome> {
        self.transaction(|tables| {
            if tables.event(event_id).is_none() {
                return Err(StoreError::NotFound("Event"));
            }
            tables.check_employees(std::slice::from_ref(&assignment))?;

            if let Some(existing) = tables
                .assignments
                .iter_mut()
                .find(|a| a.event_id == event_id && a.employee_id == assignment.employee_id)
            {
                if assignment.role.is_some() {
                    existing.role = assignment.role;
                }
                let existing = existing.clone();
                return Ok(AssignOutcome {
                    assignment: tables.with_employee(&existing),
                    created: false,
                });
            }

            let created = Assignment {
                id: new_id(),
                event_id: event_id.to_string(),
                employee_id: assignment.employee_id,
                role: assignment.role,
                assigned_at: dates::now(),
            };
            tables.assignments.push(created.clone());
            Ok(AssignOutcome {
                assignment: tables.with_employee(&created),
                created: true,
            })
        })
        .await
    }

    async fn unassign_employee(&self, event_id: &str, assignment_id: &str) -> StoreResult<()> {
        self.transaction(|tables| {
            let before = tables.assignments.len();
            tables
                .assignments
                .retain(|a| !(a.id == assignment_id && a.event_id == event_id));
            if tables.assignments.len() == before {
                return Err(StoreError::NotFound("Assignment"));
            }
            Ok(())
        })
        .await
    }

    async fn upsert_draft(&self, draft: DraftUpsert) -> StoreResult<SavedItem> {
        self.transaction(|tables| {
            let now = dates::now();
            if let Some(item) = tables
                .saved_items
                .iter_mut()
                .find(|i| i.form_key == draft.form_key && i.kind == draft.kind)
            {
                draft.apply(item, now);
                return Ok(item.clone());
            }
            let item = draft.into_saved_item(new_id(), now);
            tables.saved_items.push(item.clone());
            Ok(item)
        })
        .await
    }

    async fn find_draft(
        &self,
        form_key: &str,
        kind: SavedItemKind,
    ) -> StoreResult<Option<SavedItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .saved_items
            .iter()
            .find(|i| i.form_key == form_key && i.kind == kind)
            .cloned())
    }

    async fn delete_draft(&self, id: &str) -> StoreResult<()> {
        self.transaction(|tables| {
            let before = tables.saved_items.len();
            tables.saved_items.retain(|i| i.id != id);
            if tables.saved_items.len() == before {
                return Err(StoreError::NotFound("Saved draft"));
            }
            Ok(())
        })
        .await
    }

    async fn submit_draft(
        &self,
        submission: SchedulerSubmission,
    ) -> StoreResult<EventWithAssignments> {
        self.transaction(|tables| {
            let now = dates::now();
            let finalized = submission.finalized_payload();

            let event_id = match &submission.target_event_id {
                Some(id) => {
                    let event = tables
                        .events
                        .iter_mut()
                        .find(|e| &e.id == id)
                        .ok_or(StoreError::NotFound("Event"))?;
                    submission.event.overwrite(event, now);
                    id.clone()
                }
                None => {
                    let event = submission.event.into_event(new_id(), now);
                    let id = event.id.clone();
                    tables.events.push(event);
                    id
                }
            };

            if let Some(items) = submission.assignments {
                tables.replace_assignments(&event_id, items, now)?;
            }

            if let Some(item) = tables.saved_items.iter_mut().find(|i| {
                i.form_key == submission.form_key && i.kind == SavedItemKind::SchedulerDraft
            }) {
                item.event_id = Some(event_id.clone());
                item.payload = finalized;
                item.updated_at = now;
            }

            tables.load_event(&event_id)
        })
        .await
    }
}

// ============================================================================
// Demo data
// ============================================================================

const JOHN_ID: &str = "6f1c2b0e-4a51-4c1e-9a7d-2d0f4b1e8a01";
const JANE_ID: &str = "0b7e9d4c-8f3a-4d62-b1c5-7e2a9f6d3c02";
const MARCUS_ID: &str = "c3a8f1e2-5b7d-4e90-a2c4-9d1b6e8f4a03";
const CORPORATE_ID: &str = "9e2d4f6a-1c3b-4a5d-8e7f-0a1b2c3d4e01";
const WEDDING_ID: &str = "4b6d8f0a-2c4e-4f1a-9b3d-5e7f9a1b3c02";

fn demo_ts(value: &str) -> DateTime<Utc> {
    dates::from_storage(value).unwrap_or_else(|_| dates::now())
}

fn demo_day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn demo_availability(notes: &str, days: &[(NaiveDate, DayStatus, Option<&str>, Option<&str>)]) -> Availability {
    Availability {
        notes: Some(notes.to_string()),
        days: days
            .iter()
            .map(|(date, status, start, end)| AvailabilityDay {
                date: *date,
                status: *status,
                start: start.map(str::to_string),
                end: end.map(str::to_string),
            })
            .collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn demo_employee(
    id: &str,
    first: &str,
    last: &str,
    phone: &str,
    role: &str,
    skills: &[&str],
    certifications: &[&str],
    rate: f64,
    availability: Availability,
    notes: &str,
    created: &str,
) -> Employee {
    Employee {
        id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}.{}@bartending2u.com", first.to_lowercase(), last.to_lowercase()),
        phone: Some(phone.to_string()),
        role: Some(role.to_string()),
        status: EmployeeStatus::Active,
        skills: skills.iter().map(|s| s.to_string()).collect(),
        certifications: certifications.iter().map(|s| s.to_string()).collect(),
        hourly_rate: Some(rate),
        availability: Some(availability),
        notes: Some(notes.to_string()),
        created_at: demo_ts(created),
        updated_at: demo_ts("2025-09-20T12:00:00.000Z"),
    }
}

fn demo_tables() -> Tables {
    use DayStatus::{Available, Blocked};

    let employees = vec![
        demo_employee(
            JOHN_ID,
            "John",
            "Doe",
            "+17135550114",
            "Bar Lead",
            &["Flair certified", "High-volume service"],
            &["TABC Certificate", "Liability Waiver"],
            32.5,
            demo_availability(
                "Prefers evening activations. Trainer for new hires.",
                &[
                    (demo_day(2025, 10, 5), Available, Some("17:00"), Some("23:00")),
                    (demo_day(2025, 10, 12), Available, Some("16:00"), Some("22:00")),
                    (demo_day(2025, 10, 18), Blocked, None, None),
                ],
            ),
            "Lead trainer for new hires.\nLoves crafting signature welcome cocktails.",
            "2025-08-01T09:00:00.000Z",
        ),
        demo_employee(
            JANE_ID,
            "Jane",
            "Smith",
            "+15125550199",
            "Mixologist",
            &["Mocktail specialist", "Low ABV menus"],
            &["TABC Certificate", "Food Handler"],
            29.0,
            demo_availability(
                "On PTO until Oct 14. Available for design consultations.",
                &[
                    (demo_day(2025, 10, 10), Blocked, None, None),
                    (demo_day(2025, 10, 16), Available, Some("15:00"), Some("21:00")),
                    (demo_day(2025, 10, 22), Available, Some("18:00"), Some("22:00")),
                ],
            ),
            "Certified sommelier. Currently on PTO returning Oct 14.",
            "2025-07-14T11:30:00.000Z",
        ),
        demo_employee(
            MARCUS_ID,
            "Marcus",
            "Allen",
            "+17135550160",
            "Barback",
            &["Inventory", "Breakdown"],
            &["Food Handler"],
            24.5,
            demo_availability(
                "Prefers closing shifts. CDL certified for logistics support.",
                &[
                    (demo_day(2025, 10, 5), Available, Some("17:00"), Some("23:30")),
                    (demo_day(2025, 10, 15), Available, Some("17:00"), Some("23:00")),
                    (demo_day(2025, 10, 28), Available, Some("18:00"), Some("23:30")),
                ],
            ),
            "Great with tight timelines and closing shifts. CDL certified.",
            "2025-06-01T15:45:00.000Z",
        ),
    ];

    let events = vec![
        Event {
            id: CORPORATE_ID.to_string(),
            title: "Corporate Party".to_string(),
            date: demo_day(2025, 10, 5),
            start_time: Some(demo_ts("2025-10-05T17:00:00.000Z")),
            end_time: Some(demo_ts("2025-10-05T23:00:00.000Z")),
            location: Some("Downtown Houston".to_string()),
            client_name: Some("Acme Corp".to_string()),
            client_phone: Some("+17135550000".to_string()),
            notes: Some("Celebrating quarterly milestone.".to_string()),
            status: EventStatus::Scheduled,
            created_at: demo_ts("2025-08-10T10:00:00.000Z"),
            updated_at: demo_ts("2025-09-20T12:00:00.000Z"),
        },
        Event {
            id: WEDDING_ID.to_string(),
            title: "Wedding Reception".to_string(),
            date: demo_day(2025, 10, 15),
            start_time: Some(demo_ts("2025-10-15T17:30:00.000Z")),
            end_time: Some(demo_ts("2025-10-15T23:30:00.000Z")),
            location: Some("The Grand Hall".to_string()),
            client_name: Some("Hannah & Luis".to_string()),
            client_phone: Some("+17135550012".to_string()),
            notes: Some("Signature his & hers cocktails requested.".to_string()),
            status: EventStatus::Scheduled,
            created_at: demo_ts("2025-08-18T12:45:00.000Z"),
            updated_at: demo_ts("2025-09-20T12:00:00.000Z"),
        },
    ];

    let assignments = vec![
        Assignment {
            id: "d1e2f3a4-b5c6-4d7e-8f90-a1b2c3d4e5f1".to_string(),
            event_id: CORPORATE_ID.to_string(),
            employee_id: JOHN_ID.to_string(),
            role: Some("Lead bartender".to_string()),
            assigned_at: demo_ts("2025-09-20T12:00:00.000Z"),
        },
        Assignment {
            id: "e2f3a4b5-c6d7-4e8f-90a1-b2c3d4e5f6a2".to_string(),
            event_id: WEDDING_ID.to_string(),
            employee_id: MARCUS_ID.to_string(),
            role: Some("Barback".to_string()),
            assigned_at: demo_ts("2025-09-22T14:15:00.000Z"),
        },
    ];

    Tables {
        employees,
        events,
        assignments,
        saved_items: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_data_is_consistent() {
        let store = MemoryStore::with_demo_data();
        let employees = store.list_employees().await.unwrap();
        let names: Vec<&str> = employees.iter().map(|e| e.employee.last_name.as_str()).collect();
        assert_eq!(names, vec!["Allen", "Doe", "Smith"]);

        let events = store.list_events(&EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .flat_map(|e| e.assignments.iter())
            .all(|a| a.employee.is_some()));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = MemoryStore::with_demo_data();
        store.reset().await;
        assert!(store.list_employees().await.unwrap().is_empty());
        assert!(store.list_events(&EventFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_tables_untouched() {
        let store = MemoryStore::with_demo_data();
        let before = store.find_event(CORPORATE_ID).await.unwrap().unwrap();

        let err = store
            .update_event(
                CORPORATE_ID,
                EventPatch {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
                Some(vec![NewAssignment {
                    employee_id: "00000000-0000-4000-8000-000000000000".into(),
                    role: None,
                }]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidEmployee));

        let after = store.find_event(CORPORATE_ID).await.unwrap().unwrap();
        assert_eq!(before, after);
    }
}
