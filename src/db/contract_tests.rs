//! Behaviour every `Store` must share. Each case runs against both the
//! in-memory store and the SQL store on an in-memory SQLite database.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Map;

use super::models::*;
use super::{MemoryStore, SqlStore, Store, StoreError};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn new_employee(first: &str, last: &str) -> NewEmployee {
    NewEmployee {
        first_name: first.into(),
        last_name: last.into(),
        email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        phone: None,
        role: Some("Bartender".into()),
        status: EmployeeStatus::Active,
        skills: vec!["Mixology".into()],
        certifications: vec![],
        hourly_rate: Some(32.5),
        availability: None,
        notes: None,
    }
}

fn new_event(title: &str, date: NaiveDate, status: EventStatus) -> NewEvent {
    NewEvent {
        title: title.into(),
        date,
        start_time: Some(hm(17, 0)),
        end_time: Some(hm(23, 0)),
        location: Some("Downtown".into()),
        client_name: None,
        client_phone: None,
        notes: None,
        status,
    }
}

fn staff(id: &str, role: Option<&str>) -> NewAssignment {
    NewAssignment {
        employee_id: id.into(),
        role: role.map(Into::into),
    }
}

fn payload(title: &str) -> SchedulerPayload {
    SchedulerPayload {
        event: DraftEvent {
            id: None,
            title: title.into(),
            date: "2025-11-01".into(),
            start_time: Some("18:00".into()),
            end_time: None,
            location: None,
            client_name: None,
            client_phone: None,
            notes: None,
            status: None,
        },
        assignments: None,
        metadata: Some(Map::new()),
        finalized: false,
    }
}

fn draft(form_key: &str, title: &str) -> DraftUpsert {
    DraftUpsert {
        form_key: form_key.into(),
        kind: SavedItemKind::SchedulerDraft,
        payload: payload(title),
        form_version: None,
        event_id: None,
        created_by: None,
    }
}

// ============================================================================
// Cases
// ============================================================================

async fn employees_sorted_by_last_then_first_name(store: &dyn Store) {
    for (first, last) in [("Zoe", "Baker"), ("Adam", "Baker"), ("Mia", "Avery")] {
        store.create_employee(new_employee(first, last)).await.unwrap();
    }
    let names: Vec<String> = store
        .list_employees()
        .await
        .unwrap()
        .into_iter()
        .map(|e| format!("{} {}", e.employee.first_name, e.employee.last_name))
        .collect();
    assert_eq!(names, vec!["Mia Avery", "Adam Baker", "Zoe Baker"]);
}

async fn duplicate_email_is_a_conflict(store: &dyn Store) {
    let first = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    let err = store
        .create_employee(new_employee("Ana", "Lee"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");

    let other = store.create_employee(new_employee("Ben", "Ode")).await.unwrap();
    let err = store
        .update_employee(
            &other.id,
            EmployeePatch {
                email: Some(first.email.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
}

async fn employee_round_trips_lists_and_rates(store: &dyn Store) {
    let mut new = new_employee("Ana", "Lee");
    new.availability = Some(Availability {
        notes: Some("Weekends".into()),
        days: vec![AvailabilityDay {
            date: day(2025, 10, 4),
            status: DayStatus::Available,
            start: Some("16:00".into()),
            end: None,
        }],
    });
    let created = store.create_employee(new).await.unwrap();

    let detail = store.find_employee(&created.id).await.unwrap().unwrap();
    assert_eq!(detail.employee, created);
    assert_eq!(detail.employee.hourly_rate, Some(32.5));
    assert!(detail.assignments.is_empty());

    let updated = store
        .update_employee(
            &created.id,
            EmployeePatch {
                status: Some(EmployeeStatus::Inactive),
                skills: Some(vec!["Flair".into(), "Wine".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, EmployeeStatus::Inactive);
    assert_eq!(updated.skills, vec!["Flair", "Wine"]);
    assert_eq!(updated.first_name, "Ana");
    assert!(updated.updated_at >= created.updated_at);
}

async fn missing_records_are_not_found(store: &dyn Store) {
    let ghost = "00000000-0000-4000-8000-000000000000";
    assert!(store.find_employee(ghost).await.unwrap().is_none());
    assert!(store.find_event(ghost).await.unwrap().is_none());
    assert!(matches!(
        store.update_employee(ghost, EmployeePatch::default()).await,
        Err(StoreError::NotFound("Employee"))
    ));
    assert!(matches!(
        store.update_event(ghost, EventPatch::default(), None).await,
        Err(StoreError::NotFound("Event"))
    ));
    assert!(matches!(
        store.assign_employee(ghost, staff(ghost, None)).await,
        Err(StoreError::NotFound("Event"))
    ));
    assert!(matches!(
        store.delete_draft(ghost).await,
        Err(StoreError::NotFound(_))
    ));
}

async fn unknown_employee_rolls_back_event_creation(store: &dyn Store) {
    let known = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    let err = store
        .create_event(
            new_event("Gala", day(2025, 10, 5), EventStatus::Draft),
            vec![
                staff(&known.id, None),
                staff("00000000-0000-4000-8000-000000000000", None),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidEmployee));
    assert!(store
        .list_events(&EventFilter::default())
        .await
        .unwrap()
        .is_empty());
}

async fn events_sorted_and_filtered(store: &dyn Store) {
    store
        .create_event(new_event("Wedding", day(2025, 10, 15), EventStatus::Scheduled), vec![])
        .await
        .unwrap();
    store
        .create_event(new_event("Brunch", day(2025, 10, 5), EventStatus::Draft), vec![])
        .await
        .unwrap();
    store
        .create_event(new_event("Auction", day(2025, 10, 5), EventStatus::Scheduled), vec![])
        .await
        .unwrap();

    let all = store.list_events(&EventFilter::default()).await.unwrap();
    let titles: Vec<&str> = all.iter().map(|e| e.event.title.as_str()).collect();
    assert_eq!(titles, vec!["Auction", "Brunch", "Wedding"]);

    let scheduled = store
        .list_events(&EventFilter {
            status: Some(EventStatus::Scheduled),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scheduled.len(), 2);
    assert!(scheduled.iter().all(|e| e.event.status == EventStatus::Scheduled));

    let window = store
        .list_events(&EventFilter {
            date_from: Some(day(2025, 10, 6)),
            date_to: Some(day(2025, 10, 31)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].event.title, "Wedding");
}

async fn replacing_assignments_yields_exact_set(store: &dyn Store) {
    let a = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    let b = store.create_employee(new_employee("Ben", "Ode")).await.unwrap();
    let c = store.create_employee(new_employee("Cal", "Poe")).await.unwrap();

    let created = store
        .create_event(
            new_event("Gala", day(2025, 10, 5), EventStatus::Draft),
            vec![staff(&a.id, Some("Lead")), staff(&b.id, None)],
        )
        .await
        .unwrap();
    assert_eq!(created.assignments.len(), 2);
    assert_eq!(
        created.assignments[0].employee.as_ref().map(|e| e.last_name.as_str()),
        Some("Lee")
    );

    let updated = store
        .update_event(
            &created.event.id,
            EventPatch::default(),
            Some(vec![staff(&c.id, Some("Barback")), staff(&b.id, None)]),
        )
        .await
        .unwrap();
    let mut ids: Vec<&str> = updated
        .assignments
        .iter()
        .map(|x| x.assignment.employee_id.as_str())
        .collect();
    ids.sort();
    let mut expected = vec![b.id.as_str(), c.id.as_str()];
    expected.sort();
    assert_eq!(ids, expected);

    let cleared = store
        .update_event(&created.event.id, EventPatch::default(), Some(vec![]))
        .await
        .unwrap();
    assert!(cleared.assignments.is_empty());

    let counts = store.list_employees().await.unwrap();
    assert!(counts.iter().all(|e| e.assignment_count == 0));
}

async fn replaced_assignments_keep_request_order(store: &dyn Store) {
    let a = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    let b = store.create_employee(new_employee("Ben", "Ode")).await.unwrap();
    let c = store.create_employee(new_employee("Cal", "Poe")).await.unwrap();
    let event = store
        .create_event(new_event("Gala", day(2025, 10, 5), EventStatus::Draft), vec![])
        .await
        .unwrap();

    let requested = [c.id.as_str(), a.id.as_str(), b.id.as_str()];
    for _ in 0..10 {
        let updated = store
            .update_event(
                &event.event.id,
                EventPatch::default(),
                Some(requested.iter().map(|id| staff(id, None)).collect()),
            )
            .await
            .unwrap();
        let order: Vec<&str> = updated
            .assignments
            .iter()
            .map(|x| x.assignment.employee_id.as_str())
            .collect();
        assert_eq!(order, requested);

        let listed = store.find_event(&event.event.id).await.unwrap().unwrap();
        let order: Vec<&str> = listed
            .assignments
            .iter()
            .map(|x| x.assignment.employee_id.as_str())
            .collect();
        assert_eq!(order, requested);
    }
}

async fn date_change_keeps_time_of_day(store: &dyn Store) {
    let created = store
        .create_event(new_event("Gala", day(2025, 10, 5), EventStatus::Draft), vec![])
        .await
        .unwrap();
    let moved = store
        .update_event(
            &created.event.id,
            EventPatch {
                date: Some(day(2025, 12, 31)),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(moved.event.date, day(2025, 12, 31));
    let start = moved.event.start_time.unwrap();
    assert_eq!(start.date_naive(), day(2025, 12, 31));
    assert_eq!(start.time(), hm(17, 0));
    assert_eq!(moved.event.end_time.unwrap().time(), hm(23, 0));
    assert_eq!(moved.event.location.as_deref(), Some("Downtown"));
}

async fn assign_is_idempotent_and_unassign_is_scoped(store: &dyn Store) {
    let a = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    let gala = store
        .create_event(new_event("Gala", day(2025, 10, 5), EventStatus::Draft), vec![])
        .await
        .unwrap();
    let other = store
        .create_event(new_event("Other", day(2025, 10, 6), EventStatus::Draft), vec![])
        .await
        .unwrap();

    let first = store
        .assign_employee(&gala.event.id, staff(&a.id, Some("Bartender")))
        .await
        .unwrap();
    assert!(first.created);
    assert_eq!(
        first.assignment.employee.as_ref().map(|e| e.email.as_str()),
        Some(a.email.as_str())
    );

    let again = store
        .assign_employee(&gala.event.id, staff(&a.id, Some("Lead")))
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.assignment.assignment.id, first.assignment.assignment.id);
    assert_eq!(again.assignment.assignment.role.as_deref(), Some("Lead"));

    let err = store
        .assign_employee(&gala.event.id, staff("00000000-0000-4000-8000-000000000000", None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidEmployee));

    let assignment_id = first.assignment.assignment.id;
    assert!(matches!(
        store.unassign_employee(&other.event.id, &assignment_id).await,
        Err(StoreError::NotFound("Assignment"))
    ));
    store
        .unassign_employee(&gala.event.id, &assignment_id)
        .await
        .unwrap();
    assert!(matches!(
        store.unassign_employee(&gala.event.id, &assignment_id).await,
        Err(StoreError::NotFound("Assignment"))
    ));

    let detail = store.find_event(&gala.event.id).await.unwrap().unwrap();
    assert!(detail.assignments.is_empty());
}

async fn employee_detail_lists_assignments_by_event_date(store: &dyn Store) {
    let a = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    let late = store
        .create_event(
            new_event("Late", day(2025, 12, 1), EventStatus::Scheduled),
            vec![staff(&a.id, None)],
        )
        .await
        .unwrap();
    let early = store
        .create_event(
            new_event("Early", day(2025, 10, 1), EventStatus::Scheduled),
            vec![staff(&a.id, None)],
        )
        .await
        .unwrap();

    let detail = store.find_employee(&a.id).await.unwrap().unwrap();
    let order: Vec<&str> = detail
        .assignments
        .iter()
        .map(|x| x.event.as_ref().unwrap().id.as_str())
        .collect();
    assert_eq!(order, vec![early.event.id.as_str(), late.event.id.as_str()]);

    let listed = store.list_employees().await.unwrap();
    assert_eq!(listed[0].assignment_count, 2);
}

async fn draft_upsert_keeps_one_row_per_form_key(store: &dyn Store) {
    let mut first = draft("form-1", "Gala");
    first.created_by = Some("manager".into());
    let saved = store.upsert_draft(first).await.unwrap();
    assert!(!saved.is_finalized());

    let resaved = store.upsert_draft(draft("form-1", "Gala v2")).await.unwrap();
    assert_eq!(resaved.id, saved.id);
    assert_eq!(resaved.payload.event.title, "Gala v2");
    assert_eq!(resaved.created_by.as_deref(), Some("manager"));
    assert!(resaved.updated_at >= saved.updated_at);

    let found = store
        .find_draft("form-1", SavedItemKind::SchedulerDraft)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, saved.id);
    assert!(store
        .find_draft("form-2", SavedItemKind::SchedulerDraft)
        .await
        .unwrap()
        .is_none());

    store.delete_draft(&saved.id).await.unwrap();
    assert!(store
        .find_draft("form-1", SavedItemKind::SchedulerDraft)
        .await
        .unwrap()
        .is_none());
}

async fn submit_finalizes_draft_and_schedules_event(store: &dyn Store) {
    let a = store.create_employee(new_employee("Ana", "Lee")).await.unwrap();
    store.upsert_draft(draft("form-1", "Gala")).await.unwrap();

    let submission = SchedulerSubmission {
        form_key: "form-1".into(),
        target_event_id: None,
        event: new_event("Gala", day(2025, 11, 1), EventStatus::Scheduled),
        assignments: Some(vec![staff(&a.id, Some("Lead"))]),
        payload: payload("Gala"),
    };
    let event = store.submit_draft(submission.clone()).await.unwrap();
    assert_eq!(event.event.status, EventStatus::Scheduled);
    assert_eq!(event.assignments.len(), 1);

    let saved = store
        .find_draft("form-1", SavedItemKind::SchedulerDraft)
        .await
        .unwrap()
        .unwrap();
    assert!(saved.is_finalized());
    assert_eq!(saved.event_id.as_deref(), Some(event.event.id.as_str()));

    // Overwrite the same event, keeping assignments untouched.
    let resubmitted = store
        .submit_draft(SchedulerSubmission {
            target_event_id: Some(event.event.id.clone()),
            event: NewEvent {
                location: None,
                ..new_event("Gala Night", day(2025, 11, 2), EventStatus::Scheduled)
            },
            assignments: None,
            ..submission
        })
        .await
        .unwrap();
    assert_eq!(resubmitted.event.id, event.event.id);
    assert_eq!(resubmitted.event.title, "Gala Night");
    assert_eq!(resubmitted.event.location, None);
    assert_eq!(resubmitted.assignments.len(), 1);
    assert_eq!(store.list_events(&EventFilter::default()).await.unwrap().len(), 1);
}

async fn submit_without_draft_still_creates_event(store: &dyn Store) {
    let event = store
        .submit_draft(SchedulerSubmission {
            form_key: "never-saved".into(),
            target_event_id: None,
            event: new_event("Pop-up", day(2025, 11, 3), EventStatus::Scheduled),
            assignments: None,
            payload: payload("Pop-up"),
        })
        .await
        .unwrap();
    assert!(event.assignments.is_empty());
    assert!(store
        .find_draft("never-saved", SavedItemKind::SchedulerDraft)
        .await
        .unwrap()
        .is_none());
}

async fn submit_with_unknown_target_changes_nothing(store: &dyn Store) {
    store.upsert_draft(draft("form-1", "Gala")).await.unwrap();
    let err = store
        .submit_draft(SchedulerSubmission {
            form_key: "form-1".into(),
            target_event_id: Some("00000000-0000-4000-8000-000000000000".into()),
            event: new_event("Gala", day(2025, 11, 1), EventStatus::Scheduled),
            assignments: None,
            payload: payload("Gala"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound("Event")));

    let saved = store
        .find_draft("form-1", SavedItemKind::SchedulerDraft)
        .await
        .unwrap()
        .unwrap();
    assert!(!saved.is_finalized());
}

async fn ping_reports_latency(store: &dyn Store) {
    store.ping().await.unwrap();
}

// ============================================================================
// Runners
// ============================================================================

macro_rules! contract {
    ($($case:ident),* $(,)?) => {
        mod memory_store {
            use super::*;
            $(
                #[tokio::test]
                async fn $case() {
                    super::$case(&MemoryStore::new()).await;
                }
            )*
        }

        mod sql_store {
            use super::*;
            $(
                #[tokio::test]
                async fn $case() {
                    let store = SqlStore::in_memory().await.unwrap();
                    super::$case(&store).await;
                }
            )*
        }
    };
}

contract!(
    employees_sorted_by_last_then_first_name,
    duplicate_email_is_a_conflict,
    employee_round_trips_lists_and_rates,
    missing_records_are_not_found,
    unknown_employee_rolls_back_event_creation,
    events_sorted_and_filtered,
    replacing_assignments_yields_exact_set,
    replaced_assignments_keep_request_order,
    date_change_keeps_time_of_day,
    assign_is_idempotent_and_unassign_is_scoped,
    employee_detail_lists_assignments_by_event_date,
    draft_upsert_keeps_one_row_per_form_key,
    submit_finalizes_draft_and_schedules_event,
    submit_without_draft_still_creates_event,
    submit_with_unknown_target_changes_nothing,
    ping_reports_latency,
);
