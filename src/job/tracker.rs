//! Job tracker collaborator: receives forward-only status updates.

use std::sync::Mutex;

use tracing::{info, warn};

use super::JobSnapshot;

/// Persists job status/progress updates. The core only writes forward; it
/// never reads tracker state back mid-run.
pub trait JobTracker: Send + Sync {
    fn update(&self, snapshot: &JobSnapshot);
}

/// Tracker that ignores all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTracker;

impl JobTracker for NoOpTracker {
    fn update(&self, _snapshot: &JobSnapshot) {}
}

/// Tracker that logs updates through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTracker;

impl JobTracker for LoggingTracker {
    fn update(&self, snapshot: &JobSnapshot) {
        if let Some(error) = &snapshot.error {
            warn!(
                job = %snapshot.id,
                status = ?snapshot.status,
                error = %error,
                "job failed"
            );
        } else {
            info!(
                job = %snapshot.id,
                status = ?snapshot.status,
                progress = snapshot.progress,
                warnings = snapshot.warnings.len(),
                "job update"
            );
        }
    }
}

/// Tracker that records every update. Test observer.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    updates: Mutex<Vec<JobSnapshot>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<JobSnapshot> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl JobTracker for RecordingTracker {
    fn update(&self, snapshot: &JobSnapshot) {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot.clone());
    }
}
