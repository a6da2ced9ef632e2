/**
 * Routes Module
 * API route handlers
 */

pub mod employees;
pub mod events;
pub mod health;
pub mod scheduler;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::error::AppError;
use crate::AppState;

/// Everything mounted under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route(
            "/employees/{id}",
            get(employees::get_employee).put(employees::update_employee),
        )
        .route(
            "/events",
            get(events::list_events).post(events::create_event),
        )
        .route("/events/{id}", put(events::update_event))
        .route("/events/{id}/assign", post(events::assign_employee))
        .route(
            "/events/{event_id}/assign/{assignment_id}",
            delete(events::unassign_employee),
        )
        .route("/scheduler/save", post(scheduler::save_draft))
        .route("/scheduler/saved", get(scheduler::get_saved_draft))
        .route("/scheduler/saved/{id}", delete(scheduler::delete_draft))
        .route("/scheduler/submit", post(scheduler::submit_draft))
        .method_not_allowed_fallback(method_not_allowed)
}

/// Fallback for unmatched paths.
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Known path, unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::db::{MemoryStore, Store};
    use crate::{create_app, AppState};

    pub const JOHN_ID: &str = "6f1c2b0e-4a51-4c1e-9a7d-2d0f4b1e8a01";
    pub const JANE_ID: &str = "0b7e9d4c-8f3a-4d62-b1c5-7e2a9f6d3c02";
    pub const MARCUS_ID: &str = "c3a8f1e2-5b7d-4e90-a2c4-9d1b6e8f4a03";

    /// Full application over a fresh demo store.
    pub fn app() -> Router {
        app_with(Arc::new(MemoryStore::with_demo_data()))
    }

    pub fn app_with(store: Arc<dyn Store>) -> Router {
        let config = AppConfig::from_lookup(|_| None).expect("default config");
        create_app(AppState { store }, &config)
    }

    async fn read(res: axum::response::Response) -> (StatusCode, Value) {
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        read(app.oneshot(req).await.unwrap()).await
    }

    /// `Value::Null` sends no body.
    pub async fn send_json(app: Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = if body.is_null() {
            Request::builder().method(method).uri(uri).body(Body::empty())
        } else {
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
        }
        .unwrap();
        read(app.oneshot(req).await.unwrap()).await
    }
}
