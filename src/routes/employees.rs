/**
 * Employee Routes
 * Roster listing, detail and create/update endpoints
 */
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::dates;
use crate::db::models::{Availability, EmployeePatch, EmployeeStatus, NewEmployee};
use crate::dto::{EmployeeDetailDto, EmployeeDto, EmployeeListItemDto};
use crate::error::{AppError, AppResult};
use crate::response::{created, ok};
use crate::validation::{self as rules, ApiJson, FieldErrors};
use crate::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Body for POST /api/employees and PUT /api/employees/:id
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeBody {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub skills: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
    pub availability: Option<Availability>,
    pub notes: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

fn status(errors: &mut FieldErrors, value: Option<String>) -> Option<EmployeeStatus> {
    let value = value?;
    let parsed = EmployeeStatus::parse(value.trim());
    if parsed.is_none() {
        errors.add(
            "status",
            format!("Invalid enum value. Expected 'active' | 'inactive', received '{}'", value),
        );
    }
    parsed
}

fn string_list(values: Option<Vec<String>>) -> Option<Vec<String>> {
    values.map(|list| {
        list.into_iter()
            .filter_map(|v| rules::trimmed(Some(v)))
            .collect()
    })
}

fn hourly_rate(errors: &mut FieldErrors, value: Option<f64>) -> Option<f64> {
    let rate = value?;
    if !rate.is_finite() || rate < 0.0 {
        errors.add("hourlyRate", "Number must be greater than or equal to 0");
        return None;
    }
    Some(rate)
}

fn availability(errors: &mut FieldErrors, value: Option<Availability>) -> Option<Availability> {
    let mut availability = value?;
    availability.notes = rules::trimmed(availability.notes);
    for (i, day) in availability.days.iter_mut().enumerate() {
        day.start = rules::trimmed(day.start.take());
        day.end = rules::trimmed(day.end.take());
        for (field, value) in [("start", &day.start), ("end", &day.end)] {
            if value.as_deref().is_some_and(|t| !dates::is_valid_time(t)) {
                errors.add(
                    format!("availability.days.{}.{}", i, field),
                    dates::DateError::InvalidTime.to_string(),
                );
            }
        }
    }
    Some(availability)
}

impl EmployeeBody {
    fn into_new(self) -> AppResult<NewEmployee> {
        let mut errors = FieldErrors::new();
        let new = NewEmployee {
            first_name: rules::required_string(&mut errors, "firstName", self.first_name),
            last_name: rules::required_string(&mut errors, "lastName", self.last_name),
            email: rules::email(&mut errors, "email", self.email),
            phone: rules::trimmed(self.phone),
            role: rules::trimmed(self.role),
            status: status(&mut errors, self.status).unwrap_or(EmployeeStatus::Active),
            skills: string_list(self.skills).unwrap_or_default(),
            certifications: string_list(self.certifications).unwrap_or_default(),
            hourly_rate: hourly_rate(&mut errors, self.hourly_rate),
            availability: availability(&mut errors, self.availability),
            notes: rules::trimmed(self.notes),
        };
        errors.finish(new)
    }

    fn into_patch(self) -> AppResult<EmployeePatch> {
        let mut errors = FieldErrors::new();
        rules::require_any(
            &mut errors,
            &[
                self.first_name.is_some(),
                self.last_name.is_some(),
                self.email.is_some(),
                self.phone.is_some(),
                self.role.is_some(),
                self.status.is_some(),
                self.skills.is_some(),
                self.certifications.is_some(),
                self.hourly_rate.is_some(),
                self.availability.is_some(),
                self.notes.is_some(),
            ],
        );

        let patch = EmployeePatch {
            first_name: self
                .first_name
                .map(|v| rules::required_string(&mut errors, "firstName", Some(v))),
            last_name: self
                .last_name
                .map(|v| rules::required_string(&mut errors, "lastName", Some(v))),
            email: self.email.map(|v| rules::email(&mut errors, "email", Some(v))),
            phone: rules::trimmed(self.phone),
            role: rules::trimmed(self.role),
            status: status(&mut errors, self.status),
            skills: string_list(self.skills),
            certifications: string_list(self.certifications),
            hourly_rate: hourly_rate(&mut errors, self.hourly_rate),
            availability: availability(&mut errors, self.availability),
            notes: rules::trimmed(self.notes),
        };
        errors.finish(patch)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/employees - all employees, by last then first name
pub async fn list_employees(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let today = dates::now().date_naive();
    let employees = state.store.list_employees().await?;
    let items: Vec<EmployeeListItemDto> = employees
        .iter()
        .map(|e| EmployeeListItemDto::new(e, today))
        .collect();
    Ok(ok(items))
}

/// GET /api/employees/:id - one employee with their assignments
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let detail = state
        .store
        .find_employee(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;
    Ok(ok(EmployeeDetailDto::new(&detail, dates::now().date_naive())))
}

/// POST /api/employees
pub async fn create_employee(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmployeeBody>,
) -> AppResult<impl IntoResponse> {
    let new = body.into_new()?;
    let employee = state.store.create_employee(new).await?;
    tracing::info!(employee_id = %employee.id, "Employee created");
    Ok(created(EmployeeDto::new(&employee, 0, dates::now().date_naive())))
}

/// PUT /api/employees/:id - partial update
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<EmployeeBody>,
) -> AppResult<impl IntoResponse> {
    let patch = body.into_patch()?;
    let employee = state.store.update_employee(&id, patch).await?;
    let detail = state
        .store
        .find_employee(&employee.id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;
    tracing::info!(employee_id = %employee.id, "Employee updated");
    Ok(ok(EmployeeDto::new(
        &detail.employee,
        detail.assignments.len() as i64,
        dates::now().date_naive(),
    )))
}
