//! Persistence adapter. One `Store` interface, two implementations: the
//! relational `SqlStore` and the in-memory `MemoryStore`.

pub mod memory;
pub mod models;
pub mod sql;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::config::StoreSelection;
use models::{
    AssignOutcome, DraftUpsert, Employee, EmployeeDetail, EmployeePatch, EmployeeWithCount,
    EventFilter, EventPatch, EventWithAssignments, NewAssignment, NewEmployee, NewEvent,
    SavedItem, SavedItemKind, SchedulerSubmission,
};

pub use memory::MemoryStore;
pub use sql::SqlStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("One or more employees were not found")]
    InvalidEmployee,

    #[error("{0}")]
    Conflict(String),

    #[error("stored {column} could not be decoded: {reason}")]
    Corrupt { column: &'static str, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Everything the route handlers need from persistence. Includes are
/// resolved here; composite writes are atomic.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short name for health output.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<Duration>;

    /// Ordered by last name, then first name.
    async fn list_employees(&self) -> StoreResult<Vec<EmployeeWithCount>>;

    async fn find_employee(&self, id: &str) -> StoreResult<Option<EmployeeDetail>>;

    async fn create_employee(&self, new: NewEmployee) -> StoreResult<Employee>;

    async fn update_employee(&self, id: &str, patch: EmployeePatch) -> StoreResult<Employee>;

    /// Ordered by date, then title.
    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<EventWithAssignments>>;

    async fn find_event(&self, id: &str) -> StoreResult<Option<EventWithAssignments>>;

    /// Creates the event and its assignments in one transaction. Every
    /// employee id must exist.
    async fn create_event(
        &self,
        new: NewEvent,
        assignments: Vec<NewAssignment>,
    ) -> StoreResult<EventWithAssignments>;

    /// Applies `patch` and, when `assignments` is given, replaces the whole
    /// assignment set (delete then recreate), all in one transaction.
    async fn update_event(
        &self,
        id: &str,
        patch: EventPatch,
        assignments: Option<Vec<NewAssignment>>,
    ) -> StoreResult<EventWithAssignments>;

    /// Idempotent: an existing (event, employee) pair is returned as is,
    /// with its role updated when one is given.
    async fn assign_employee(
        &self,
        event_id: &str,
        assignment: NewAssignment,
    ) -> StoreResult<AssignOutcome>;

    async fn unassign_employee(&self, event_id: &str, assignment_id: &str) -> StoreResult<()>;

    async fn upsert_draft(&self, draft: DraftUpsert) -> StoreResult<SavedItem>;

    async fn find_draft(&self, form_key: &str, kind: SavedItemKind)
        -> StoreResult<Option<SavedItem>>;

    async fn delete_draft(&self, id: &str) -> StoreResult<()>;

    /// Creates or overwrites the target event, replaces its assignments
    /// when given, and marks the draft finalized, in one transaction.
    async fn submit_draft(&self, submission: SchedulerSubmission)
        -> StoreResult<EventWithAssignments>;
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl DbConfig {
    pub fn from_env(url: String) -> Self {
        fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        Self {
            url,
            max_connections: env_or("DB_POOL_MAX", 10),
            min_connections: env_or("DB_POOL_MIN", 1),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", 300),
        }
    }
}

/// Build the store the configuration asks for.
pub async fn open_store(selection: &StoreSelection) -> StoreResult<Arc<dyn Store>> {
    match selection {
        StoreSelection::Memory => {
            tracing::info!("Using in-memory store with demo data");
            Ok(Arc::new(MemoryStore::with_demo_data()))
        }
        StoreSelection::Sql { url, provider } => {
            tracing::info!(provider = ?provider, "Using relational store");
            let store = SqlStore::connect(DbConfig::from_env(url.clone())).await?;
            store.run_migrations().await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
pub(crate) mod contract_tests;
