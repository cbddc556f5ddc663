//! Metrics for reconciliation passes

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome counters for one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassMetrics {
    /// Unique pass identifier, stamped on every log line of the pass.
    pub pass_id: Uuid,
    /// Start time of the pass
    pub start_time: SystemTime,
    /// Total duration once [`PassMetrics::complete`] has run
    pub duration: Duration,
    /// Clients created
    pub created: usize,
    /// Clients rewritten from their directory record
    pub updated: usize,
    /// Clients disabled
    pub disabled: usize,
    /// Clients deleted
    pub deleted: usize,
    /// Mutations the admin API rejected or that failed in transit
    pub failed: usize,
    /// Fail-safe follow-ups applied after failed updates
    pub compensated: usize,
}

impl PassMetrics {
    pub fn new() -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            start_time: SystemTime::now(),
            duration: Duration::default(),
            created: 0,
            updated: 0,
            disabled: 0,
            deleted: 0,
            failed: 0,
            compensated: 0,
        }
    }

    /// Stamp the duration at the end of the pass.
    pub fn complete(&mut self) {
        self.duration = SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default();
    }

    /// True when every attempted mutation was confirmed by the server.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "pass {}: {} created, {} updated, {} disabled, {} deleted, {} failed, {} compensated in {:.2?}",
            self.pass_id,
            self.created,
            self.updated,
            self.disabled,
            self.deleted,
            self.failed,
            self.compensated,
            self.duration
        )
    }
}

impl Default for PassMetrics {
    fn default() -> Self {
        Self::new()
    }
}
