/**
 * Event Routes
 * Event listing, create/update and single-employee assignment endpoints
 */
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::db::models::{EventFilter, EventPatch, EventStatus, NewAssignment, NewEvent};
use crate::dto::{AssignmentDto, EventDto};
use crate::error::AppResult;
use crate::response::{created, ok, DeletedId};
use crate::validation::{self as rules, ApiJson, ApiQuery, AssignmentInput, FieldErrors};
use crate::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for GET /api/events
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// Body for POST /api/events and PUT /api/events/:id
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub title: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub assignments: Option<Vec<AssignmentInput>>,
}

/// Body for POST /api/events/:id/assign
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    pub employee_id: Option<String>,
    pub role: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

impl EventListQuery {
    fn into_filter(self) -> AppResult<EventFilter> {
        let mut errors = FieldErrors::new();
        let filter = EventFilter {
            status: rules::optional_event_status(&mut errors, "status", rules::trimmed(self.status)),
            date_from: rules::optional_date(&mut errors, "dateFrom", self.date_from),
            date_to: rules::optional_date(&mut errors, "dateTo", self.date_to),
        };
        errors.finish(filter)
    }
}

impl EventBody {
    fn into_new(self) -> AppResult<(NewEvent, Vec<NewAssignment>)> {
        let mut errors = FieldErrors::new();
        let title = rules::required_string(&mut errors, "title", self.title);
        let date = rules::date(&mut errors, "date", self.date);
        let start_time = rules::optional_time(&mut errors, "startTime", self.start_time);
        let end_time = rules::optional_time(&mut errors, "endTime", self.end_time);
        let status = rules::optional_event_status(&mut errors, "status", self.status);
        let assignments = rules::assignments(&mut errors, "assignments", self.assignments);

        let Some(date) = date else {
            return Err(errors.into_error());
        };
        let new = NewEvent {
            title,
            date,
            start_time,
            end_time,
            location: rules::trimmed(self.location),
            client_name: rules::trimmed(self.client_name),
            client_phone: rules::trimmed(self.client_phone),
            notes: rules::trimmed(self.notes),
            status: status.unwrap_or(EventStatus::Draft),
        };
        errors.finish((new, assignments.unwrap_or_default()))
    }

    fn into_patch(self) -> AppResult<(EventPatch, Option<Vec<NewAssignment>>)> {
        let mut errors = FieldErrors::new();
        rules::require_any(
            &mut errors,
            &[
                self.title.is_some(),
                self.date.is_some(),
                self.start_time.is_some(),
                self.end_time.is_some(),
                self.location.is_some(),
                self.client_name.is_some(),
                self.client_phone.is_some(),
                self.notes.is_some(),
                self.status.is_some(),
                self.assignments.is_some(),
            ],
        );

        let patch = EventPatch {
            title: self
                .title
                .map(|v| rules::required_string(&mut errors, "title", Some(v))),
            date: self
                .date
                .and_then(|v| rules::date(&mut errors, "date", Some(v))),
            start_time: rules::optional_time(&mut errors, "startTime", self.start_time),
            end_time: rules::optional_time(&mut errors, "endTime", self.end_time),
            location: rules::trimmed(self.location),
            client_name: rules::trimmed(self.client_name),
            client_phone: rules::trimmed(self.client_phone),
            notes: rules::trimmed(self.notes),
            status: rules::optional_event_status(&mut errors, "status", self.status),
        };
        let assignments = rules::assignments(&mut errors, "assignments", self.assignments);
        errors.finish((patch, assignments))
    }
}

impl AssignBody {
    fn into_assignment(self) -> AppResult<NewAssignment> {
        let mut errors = FieldErrors::new();
        let employee_id = rules::uuid(&mut errors, "employeeId", self.employee_id);
        let role = rules::trimmed(self.role);
        match employee_id {
            Some(employee_id) => errors.finish(NewAssignment { employee_id, role }),
            None => Err(errors.into_error()),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/events?status=&dateFrom=&dateTo= - by date, then title
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventListQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = query.into_filter()?;
    let events = state.store.list_events(&filter).await?;
    let items: Vec<EventDto> = events.iter().map(EventDto::from).collect();
    Ok(ok(items))
}

/// POST /api/events - event plus initial assignments, atomically
pub async fn create_event(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EventBody>,
) -> AppResult<impl IntoResponse> {
    let (new, assignments) = body.into_new()?;
    let event = state.store.create_event(new, assignments).await?;
    tracing::info!(
        event_id = %event.event.id,
        assignments = event.assignments.len(),
        "Event created"
    );
    Ok(created(EventDto::from(&event)))
}

/// PUT /api/events/:id - partial update; `assignments` replaces the set
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<EventBody>,
) -> AppResult<impl IntoResponse> {
    let (patch, assignments) = body.into_patch()?;
    let replaced = assignments.is_some();
    let event = state.store.update_event(&id, patch, assignments).await?;
    tracing::info!(event_id = %id, replaced_assignments = replaced, "Event updated");
    Ok(ok(EventDto::from(&event)))
}

/// POST /api/events/:id/assign - 201 when created, 200 when it already existed
pub async fn assign_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignBody>,
) -> AppResult<Response> {
    let assignment = body.into_assignment()?;
    let outcome = state.store.assign_employee(&id, assignment).await?;
    let dto = AssignmentDto::from(&outcome.assignment);
    if outcome.created {
        tracing::info!(event_id = %id, assignment_id = %dto.id, "Employee assigned");
        Ok(created(dto).into_response())
    } else {
        Ok(ok(dto).into_response())
    }
}

/// DELETE /api/events/:eventId/assign/:assignmentId
pub async fn unassign_employee(
    State(state): State<AppState>,
    Path((event_id, assignment_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    state
        .store
        .unassign_employee(&event_id, &assignment_id)
        .await?;
    tracing::info!(event_id = %event_id, assignment_id = %assignment_id, "Employee unassigned");
    Ok(ok(DeletedId { id: assignment_id }))
}
