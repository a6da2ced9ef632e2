/**
 * Scheduler Routes
 * Draft save/fetch/delete and submit-into-event endpoints
 */
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::db::models::{
    DraftAssignment, DraftEvent, DraftUpsert, EventStatus, NewAssignment, NewEvent, SavedItemKind,
    SchedulerPayload, SchedulerSubmission,
};
use crate::dto::{EventDto, SavedItemDto};
use crate::error::AppResult;
use crate::response::{created, ok, DeletedId};
use crate::validation::{self as rules, ApiJson, ApiQuery, AssignmentInput, FieldErrors};
use crate::AppState;

const FORM_KEY_MIN: usize = 3;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEventInput {
    pub id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayloadInput {
    pub event: Option<DraftEventInput>,
    pub assignments: Option<Vec<AssignmentInput>>,
    pub metadata: Option<Map<String, Value>>,
}

/// Body for POST /api/scheduler/save
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraftBody {
    pub form_key: Option<String>,
    pub payload: Option<PayloadInput>,
    pub form_version: Option<String>,
    pub event_id: Option<String>,
    pub created_by: Option<String>,
}

/// Body for POST /api/scheduler/submit
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub form_key: Option<String>,
    pub payload: Option<PayloadInput>,
}

/// Query for GET /api/scheduler/saved
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub form_key: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

/// A checked payload: the normalized form to store plus the parsed event.
struct CheckedPayload {
    payload: SchedulerPayload,
    event: Option<NewEvent>,
    target_event_id: Option<String>,
    assignments: Option<Vec<NewAssignment>>,
}

fn check_payload(errors: &mut FieldErrors, input: Option<PayloadInput>) -> Option<CheckedPayload> {
    let Some(input) = input else {
        errors.add("payload", rules::REQUIRED);
        return None;
    };
    let Some(event) = input.event else {
        errors.add("payload.event", rules::REQUIRED);
        return None;
    };

    let target_event_id = rules::optional_uuid(errors, "payload.event.id", event.id);
    let title = rules::required_string(errors, "payload.event.title", event.title);
    let raw_date = rules::trimmed(event.date.clone());
    let date = rules::date(errors, "payload.event.date", event.date);
    let raw_start = rules::trimmed(event.start_time.clone());
    let raw_end = rules::trimmed(event.end_time.clone());
    let start_time = rules::optional_time(errors, "payload.event.startTime", event.start_time);
    let end_time = rules::optional_time(errors, "payload.event.endTime", event.end_time);
    let status = rules::optional_event_status(errors, "payload.event.status", event.status);
    let location = rules::trimmed(event.location);
    let client_name = rules::trimmed(event.client_name);
    let client_phone = rules::trimmed(event.client_phone);
    let notes = rules::trimmed(event.notes);
    let assignments = rules::assignments(errors, "payload.assignments", input.assignments);

    let payload = SchedulerPayload {
        event: DraftEvent {
            id: target_event_id.clone(),
            title: title.clone(),
            date: raw_date.unwrap_or_default(),
            start_time: raw_start,
            end_time: raw_end,
            location: location.clone(),
            client_name: client_name.clone(),
            client_phone: client_phone.clone(),
            notes: notes.clone(),
            status,
        },
        assignments: assignments.as_ref().map(|items| {
            items
                .iter()
                .map(|a| DraftAssignment {
                    employee_id: a.employee_id.clone(),
                    role: a.role.clone(),
                })
                .collect()
        }),
        metadata: input.metadata,
        finalized: false,
    };

    let event = date.map(|date| NewEvent {
        title,
        date,
        start_time,
        end_time,
        location,
        client_name,
        client_phone,
        notes,
        status: status.unwrap_or(EventStatus::Draft),
    });

    Some(CheckedPayload {
        payload,
        event,
        target_event_id,
        assignments,
    })
}

impl SaveDraftBody {
    fn into_upsert(self) -> AppResult<DraftUpsert> {
        let mut errors = FieldErrors::new();
        let form_key = rules::min_len(&mut errors, "formKey", self.form_key, FORM_KEY_MIN);
        let checked = check_payload(&mut errors, self.payload);
        let event_id = rules::optional_uuid(&mut errors, "eventId", self.event_id);
        let (Some(checked), true) = (checked, errors.is_empty()) else {
            return Err(errors.into_error());
        };
        Ok(DraftUpsert {
            form_key,
            kind: SavedItemKind::SchedulerDraft,
            payload: checked.payload,
            form_version: rules::trimmed(self.form_version),
            event_id,
            created_by: rules::trimmed(self.created_by),
        })
    }
}

impl SubmitBody {
    fn into_submission(self) -> AppResult<SchedulerSubmission> {
        let mut errors = FieldErrors::new();
        let form_key = rules::min_len(&mut errors, "formKey", self.form_key, FORM_KEY_MIN);
        let checked = check_payload(&mut errors, self.payload);
        let Some(CheckedPayload {
            payload,
            event: Some(event),
            target_event_id,
            assignments,
        }) = checked
        else {
            return Err(errors.into_error());
        };
        errors.finish(SchedulerSubmission {
            form_key,
            target_event_id,
            event: NewEvent {
                status: EventStatus::Scheduled,
                ..event
            },
            assignments,
            payload,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/scheduler/save - upsert by (formKey, scheduler_draft)
pub async fn save_draft(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SaveDraftBody>,
) -> AppResult<impl IntoResponse> {
    let upsert = body.into_upsert()?;
    let item = state.store.upsert_draft(upsert).await?;
    tracing::info!(form_key = %item.form_key, draft_id = %item.id, "Scheduler draft saved");
    Ok(created(SavedItemDto::from(&item)))
}

/// GET /api/scheduler/saved?formKey= - null when absent or finalized
pub async fn get_saved_draft(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SavedQuery>,
) -> AppResult<impl IntoResponse> {
    let mut errors = FieldErrors::new();
    let form_key = rules::min_len(&mut errors, "formKey", query.form_key, FORM_KEY_MIN);
    errors.finish(())?;

    let draft = state
        .store
        .find_draft(&form_key, SavedItemKind::SchedulerDraft)
        .await?
        .filter(|item| !item.is_finalized());
    Ok(ok(draft.as_ref().map(SavedItemDto::from)))
}

/// DELETE /api/scheduler/saved/:id
pub async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.store.delete_draft(&id).await?;
    tracing::info!(draft_id = %id, "Scheduler draft deleted");
    Ok(ok(DeletedId { id }))
}

/// POST /api/scheduler/submit - draft becomes a scheduled event
pub async fn submit_draft(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitBody>,
) -> AppResult<impl IntoResponse> {
    let submission = body.into_submission()?;
    let form_key = submission.form_key.clone();
    let event = state.store.submit_draft(submission).await?;
    tracing::info!(form_key = %form_key, event_id = %event.event.id, "Scheduler draft submitted");
    Ok(ok(EventDto::from(&event)))
}
