use std::sync::Arc;
use std::time::{Instant, SystemTime};

use sqlx::SqlitePool;

use crate::response::AppError;
use crate::services::feedback::TextOracle;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db: Option<SqlitePool>,
    oracle: Arc<dyn TextOracle>,
}

impl AppState {
    pub fn new(db: Option<SqlitePool>, oracle: Arc<dyn TextOracle>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db,
            oracle,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db(&self) -> Option<SqlitePool> {
        self.db.clone()
    }

    /// Pool for data routes; 503 when the service runs without storage.
    pub fn require_db(&self) -> Result<SqlitePool, AppError> {
        self.db
            .clone()
            .ok_or_else(|| AppError::service_unavailable("Database is not available"))
    }

    pub fn oracle(&self) -> Arc<dyn TextOracle> {
        Arc::clone(&self.oracle)
    }
}
