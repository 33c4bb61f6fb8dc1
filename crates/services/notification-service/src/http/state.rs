//! Application state for dependency injection.

use std::sync::Arc;

use crate::infra::Database;
use crate::jobs::NotificationJob;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub job: Arc<NotificationJob>,
    /// Checked by the health endpoint when present
    pub database: Option<Database>,
}

impl AppState {
    /// Create new app state.
    pub fn new(job: Arc<NotificationJob>, database: Option<Database>) -> Self {
        Self { job, database }
    }
}
