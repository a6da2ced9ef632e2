/**
 * Request Validation
 * Field rules, error collection and extractors that turn framework
 * rejections into VALIDATION_ERROR responses.
 */
use std::collections::BTreeMap;

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    FromRequest, FromRequestParts, Query, Request,
};
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};

use crate::dates;
use crate::db::models::{EventStatus, NewAssignment};
use crate::error::{AppError, AppResult};

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub const REQUIRED: &str = "Required";
pub const INVALID_UUID: &str = "Invalid uuid";
pub const INVALID_EMAIL: &str = "Invalid email";
pub const NO_FIELDS: &str = "At least one field must be provided";

// ============================================================================
// Error collection
// ============================================================================

/// Collects every violation in a payload before anything is applied.
#[derive(Debug, Default)]
pub struct FieldErrors {
    form: Vec<String>,
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(path.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.form.is_empty() && self.fields.is_empty()
    }

    pub fn into_error(self) -> AppError {
        AppError::validation(
            "Invalid request",
            Some(json!({
                "formErrors": self.form,
                "fieldErrors": self.fields,
            })),
        )
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> AppResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self.into_error())
        }
    }
}

fn rejection(message: String) -> AppError {
    let mut errors = FieldErrors::new();
    errors.form(message);
    errors.into_error()
}

// ============================================================================
// Extractors
// ============================================================================

/// `Json<T>` whose rejections use the API error envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(err) => Err(json_rejection(err)),
        }
    }
}

fn json_rejection(err: JsonRejection) -> AppError {
    tracing::debug!(error = %err, "Rejected JSON body");
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge;
    }
    rejection(err.body_text())
}

/// `Query<T>` whose rejections use the API error envelope. A repeated key
/// keeps its first value, and every value reaches `T` as a string.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(query_rejection)?;

        let mut first = Map::new();
        for (key, value) in pairs {
            first.entry(key).or_insert(Value::String(value));
        }

        serde_json::from_value(Value::Object(first))
            .map(ApiQuery)
            .map_err(|e| rejection(format!("Failed to deserialize query string: {}", e)))
    }
}

fn query_rejection(err: QueryRejection) -> AppError {
    rejection(err.body_text())
}

// ============================================================================
// Field rules
// ============================================================================

/// Trim; an empty string counts as absent.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required_string(errors: &mut FieldErrors, path: &str, value: Option<String>) -> String {
    match trimmed(value) {
        Some(v) => v,
        None => {
            errors.add(path, REQUIRED);
            String::new()
        }
    }
}

pub fn uuid(errors: &mut FieldErrors, path: &str, value: Option<String>) -> Option<String> {
    let value = value.map(|v| v.trim().to_string());
    match value {
        None => {
            errors.add(path, REQUIRED);
            None
        }
        Some(v) => match uuid::Uuid::parse_str(&v) {
            Ok(_) => Some(v),
            Err(_) => {
                errors.add(path, INVALID_UUID);
                None
            }
        },
    }
}

pub fn optional_uuid(errors: &mut FieldErrors, path: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(v) => uuid(errors, path, Some(v)),
        None => None,
    }
}

pub fn email(errors: &mut FieldErrors, path: &str, value: Option<String>) -> String {
    let value = required_string(errors, path, value);
    if !value.is_empty() && !EMAIL_REGEX.is_match(&value) {
        errors.add(path, INVALID_EMAIL);
    }
    value
}

pub fn date(errors: &mut FieldErrors, path: &str, value: Option<String>) -> Option<NaiveDate> {
    let value = trimmed(value);
    let Some(value) = value else {
        errors.add(path, REQUIRED);
        return None;
    };
    match dates::parse_date_only(&value) {
        Ok(d) => Some(d),
        Err(e) => {
            errors.add(path, e.to_string());
            None
        }
    }
}

pub fn optional_date(errors: &mut FieldErrors, path: &str, value: Option<String>) -> Option<NaiveDate> {
    match trimmed(value) {
        Some(v) => date(errors, path, Some(v)),
        None => None,
    }
}

/// `HH:MM`, empty meaning absent.
pub fn optional_time(errors: &mut FieldErrors, path: &str, value: Option<String>) -> Option<NaiveTime> {
    let value = trimmed(value)?;
    match dates::parse_time(&value) {
        Ok(t) => Some(t),
        Err(e) => {
            errors.add(path, e.to_string());
            None
        }
    }
}

pub fn optional_event_status(
    errors: &mut FieldErrors,
    path: &str,
    value: Option<String>,
) -> Option<EventStatus> {
    let value = value?;
    match EventStatus::parse(value.trim()) {
        Some(status) => Some(status),
        None => {
            let expected = EventStatus::ALL
                .iter()
                .map(|s| format!("'{}'", s.as_str()))
                .collect::<Vec<_>>()
                .join(" | ");
            errors.add(
                path,
                format!("Invalid enum value. Expected {}, received '{}'", expected, value),
            );
            None
        }
    }
}

pub fn min_len(errors: &mut FieldErrors, path: &str, value: Option<String>, min: usize) -> String {
    let value = value.unwrap_or_default();
    if value.chars().count() < min {
        errors.add(
            path,
            format!("String must contain at least {} character(s)", min),
        );
    }
    value
}

/// Update bodies must carry at least one recognised field.
pub fn require_any(errors: &mut FieldErrors, present: &[bool]) {
    if !present.iter().any(|p| *p) {
        errors.form(NO_FIELDS);
    }
}

// ============================================================================
// Shared inputs
// ============================================================================

/// One `{employeeId, role?}` entry of an assignment list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    pub employee_id: Option<String>,
    pub role: Option<String>,
}

pub fn assignments(
    errors: &mut FieldErrors,
    path: &str,
    items: Option<Vec<AssignmentInput>>,
) -> Option<Vec<NewAssignment>> {
    let items = items?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if let Some(employee_id) = uuid(
            errors,
            &format!("{}.{}.employeeId", path, i),
            item.employee_id,
        ) {
            out.push(NewAssignment {
                employee_id,
                role: trimmed(item.role),
            });
        }
    }
    Some(out)
}
