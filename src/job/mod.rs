//! Job state machine and ownership handle.
//!
//! A job moves QUEUED → RUNNING → {COMPLETED, FAILED, CANCELLED}. The three
//! right-hand states are terminal: no transition leaves them and no field
//! mutates once one is reached. Progress is a weighted sum over the fixed
//! stage order and never decreases.

mod tracker;

pub use tracker::{JobTracker, LoggingTracker, NoOpTracker, RecordingTracker};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Pipeline stages in execution order. Weights are fixed and sum to 100, so
/// overall progress stays monotonic as stages hand over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingestion,
    Extraction,
    Resolution,
    Projection,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Ingestion,
        Stage::Extraction,
        Stage::Resolution,
        Stage::Projection,
    ];

    pub fn weight(&self) -> f32 {
        match self {
            Self::Ingestion => 10.0,
            Self::Extraction => 30.0,
            Self::Resolution => 40.0,
            Self::Projection => 20.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Extraction => "extraction",
            Self::Resolution => "resolution",
            Self::Projection => "projection",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Ingestion => 0,
            Self::Extraction => 1,
            Self::Resolution => 2,
            Self::Projection => 3,
        }
    }
}

/// Per-stage counters reported in the result summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub calls_found: usize,
    pub calls_unattributed: usize,
    pub resolved_deterministic: usize,
    pub resolved_inferred: usize,
    pub unresolved: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
}

/// Attempted transition out of a terminal state (or a claim of a job that
/// is not queued).
#[derive(Debug, Clone, Error)]
#[error("invalid job transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Read-only view of a job, safe to hand to observers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: f32,
    pub counts: StageCounts,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct JobState {
    id: Uuid,
    status: JobStatus,
    progress: f32,
    fractions: [f32; 4],
    counts: StageCounts,
    warnings: Vec<String>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            progress: 0.0,
            fractions: [0.0; 4],
            counts: StageCounts::default(),
            warnings: Vec::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn recompute_progress(&mut self) {
        let weighted: f32 = Stage::ALL
            .iter()
            .map(|s| s.weight() * self.fractions[s.index()])
            .sum();
        // Monotonic guard: progress never decreases.
        self.progress = self.progress.max(weighted.clamp(0.0, 100.0));
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status,
            progress: self.progress,
            counts: self.counts,
            warnings: self.warnings.clone(),
            error: self.error.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Exclusive ownership handle for one job.
///
/// All mutation goes through this handle; each mutation pushes a fresh
/// snapshot to the tracker (forward-only, never read back). Cloning shares
/// the same underlying job.
#[derive(Clone)]
pub struct JobHandle {
    state: Arc<Mutex<JobState>>,
    tracker: Arc<dyn JobTracker>,
}

impl JobHandle {
    pub fn new(tracker: Arc<dyn JobTracker>) -> Self {
        Self {
            state: Arc::new(Mutex::new(JobState::new())),
            tracker: tracker.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.lock().id
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot()
    }

    /// QUEUED → RUNNING. A worker claims the job exclusively.
    pub fn claim(&self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running)
    }

    /// RUNNING → COMPLETED; pins progress to exactly 100.
    pub fn complete(&self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Completed)
    }

    /// RUNNING → FAILED; sets the terminal error, exactly once.
    pub fn fail(&self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        let error = error.into();
        let mut state = self.lock();
        Self::check_transition(&state, JobStatus::Failed)?;
        state.status = JobStatus::Failed;
        state.error = Some(error);
        state.finished_at = Some(Utc::now());
        let snapshot = state.snapshot();
        drop(state);
        self.tracker.update(&snapshot);
        Ok(())
    }

    /// RUNNING → CANCELLED.
    pub fn cancel(&self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Cancelled)
    }

    /// Reports completion of a fraction of `stage`, in [0,1]. Ignored once
    /// the job is terminal; per-stage fractions only move forward.
    pub fn stage_fraction(&self, stage: Stage, fraction: f32) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        let slot = &mut state.fractions[stage.index()];
        *slot = slot.max(fraction.clamp(0.0, 1.0));
        state.recompute_progress();
        let snapshot = state.snapshot();
        drop(state);
        self.tracker.update(&snapshot);
    }

    pub fn stage_complete(&self, stage: Stage) {
        self.stage_fraction(stage, 1.0);
    }

    /// Appends a recoverable warning. Ignored once terminal.
    pub fn warn(&self, warning: impl Into<String>) {
        let warning = warning.into();
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        state.warnings.push(warning);
        let snapshot = state.snapshot();
        drop(state);
        self.tracker.update(&snapshot);
    }

    pub fn warn_all<I, S>(&self, warnings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collected: Vec<String> = warnings.into_iter().map(Into::into).collect();
        if collected.is_empty() {
            return;
        }
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        state.warnings.extend(collected);
        let snapshot = state.snapshot();
        drop(state);
        self.tracker.update(&snapshot);
    }

    /// Updates the per-stage counters. Ignored once terminal.
    pub fn update_counts(&self, apply: impl FnOnce(&mut StageCounts)) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        apply(&mut state.counts);
        let snapshot = state.snapshot();
        drop(state);
        self.tracker.update(&snapshot);
    }

    fn transition(&self, to: JobStatus) -> Result<(), InvalidTransition> {
        let mut state = self.lock();
        Self::check_transition(&state, to)?;
        state.status = to;
        match to {
            JobStatus::Running => state.started_at = Some(Utc::now()),
            JobStatus::Completed => {
                state.progress = 100.0;
                state.finished_at = Some(Utc::now());
            }
            JobStatus::Cancelled => state.finished_at = Some(Utc::now()),
            _ => {}
        }
        let snapshot = state.snapshot();
        drop(state);
        self.tracker.update(&snapshot);
        Ok(())
    }

    fn check_transition(state: &JobState, to: JobStatus) -> Result<(), InvalidTransition> {
        let valid = match (state.status, to) {
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Completed)
            | (JobStatus::Running, JobStatus::Failed)
            | (JobStatus::Running, JobStatus::Cancelled) => true,
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: state.status,
                to,
            })
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cooperative cancellation signal, checked at stage boundaries only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> JobHandle {
        JobHandle::new(Arc::new(NoOpTracker))
    }

    #[test]
    fn test_initial_state_is_queued() {
        let job = handle();
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0.0);
        assert!(snapshot.started_at.is_none());
    }

    #[test]
    fn test_claim_then_complete() {
        let job = handle();
        job.claim().unwrap();
        assert_eq!(job.snapshot().status, JobStatus::Running);
        job.complete().unwrap();

        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100.0);
        assert!(snapshot.finished_at.is_some());
    }

    #[test]
    fn test_cannot_complete_queued_job() {
        let job = handle();
        assert!(job.complete().is_err());
    }

    #[test]
    fn test_terminal_state_is_frozen() {
        let job = handle();
        job.claim().unwrap();
        job.fail("boom").unwrap();

        assert!(job.claim().is_err());
        assert!(job.complete().is_err());
        assert!(job.cancel().is_err());

        job.stage_fraction(Stage::Extraction, 0.5);
        job.warn("late warning");
        job.update_counts(|c| c.calls_found = 99);

        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
        assert!(snapshot.warnings.is_empty());
        assert_eq!(snapshot.counts.calls_found, 0);
    }

    #[test]
    fn test_progress_is_weighted_and_monotonic() {
        let job = handle();
        job.claim().unwrap();

        job.stage_complete(Stage::Ingestion);
        assert_eq!(job.snapshot().progress, 10.0);

        job.stage_fraction(Stage::Extraction, 0.5);
        assert_eq!(job.snapshot().progress, 25.0);

        // Regressing a fraction never lowers progress.
        job.stage_fraction(Stage::Extraction, 0.1);
        assert_eq!(job.snapshot().progress, 25.0);

        job.stage_complete(Stage::Extraction);
        job.stage_complete(Stage::Resolution);
        job.stage_complete(Stage::Projection);
        assert_eq!(job.snapshot().progress, 100.0);
    }

    #[test]
    fn test_stage_weights_sum_to_hundred() {
        let total: f32 = Stage::ALL.iter().map(Stage::weight).sum();
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let job = handle();
        job.claim().unwrap();
        job.complete().unwrap();

        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["progress"], 100.0);
        // The job id round-trips as a plain UUID string.
        assert_eq!(
            json["id"].as_str().map(str::len),
            Some(uuid::Uuid::nil().to_string().len())
        );
    }

    #[test]
    fn test_tracker_receives_updates() {
        let tracker = Arc::new(RecordingTracker::new());
        let job = JobHandle::new(tracker.clone());
        job.claim().unwrap();
        job.warn("a warning");
        job.complete().unwrap();

        let updates = tracker.updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].status, JobStatus::Running);
        assert_eq!(updates[2].status, JobStatus::Completed);
        assert_eq!(updates[2].progress, 100.0);
    }
}
