//! Bulk job orchestration: persisted job records plus the batch runner.

pub mod runner;

use crate::error::{ReconError, Result};
use crate::models::job::{BulkJob, JobStatus, UnitResult};
use crate::models::rule::ModuleKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub use runner::{BulkJobRunner, JobConfig, MAX_CONCURRENCY};

/// Progress event emitted after every unit. The service republishes these
/// for polling clients.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub team_id: String,
    pub module: ModuleKind,
    pub ok: bool,
    pub completed: u32,
    pub failed: u32,
    pub total: u32,
}

/// Persisted job records. The job record is the only resource requiring
/// serialized writes; every method applies its mutation atomically.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &BulkJob) -> Result<()>;

    async fn get(&self, job_id: Uuid) -> Result<BulkJob>;

    /// Forward-only status transition. Returns false when the current
    /// status does not allow it (e.g. the job is already terminal).
    async fn transition(&self, job_id: Uuid, to: JobStatus) -> Result<bool>;

    /// Record one finished unit: append the result and bump the progress
    /// counters in a single update.
    async fn record_unit(&self, job_id: Uuid, unit: &UnitResult) -> Result<()>;

    async fn set_current(
        &self,
        job_id: Uuid,
        current: Option<(&str, ModuleKind)>,
    ) -> Result<()>;

    /// Idempotent cancellation request; a no-op on terminal jobs.
    async fn request_cancel(&self, job_id: Uuid) -> Result<()>;

    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool>;
}

/// Map-backed job store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, BulkJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &BulkJob) -> Result<()> {
        self.jobs.lock().insert(job.job_id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<BulkJob> {
        self.jobs
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))
    }

    async fn transition(&self, job_id: Uuid, to: JobStatus) -> Result<bool> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))?;
        if !job.status.can_transition_to(to) {
            return Ok(false);
        }
        job.status = to;
        let now = chrono::Utc::now();
        if to == JobStatus::Running {
            job.started_at = Some(now);
        }
        if to.is_terminal() {
            job.completed_at = Some(now);
            job.progress.current_team = None;
            job.progress.current_module = None;
        }
        Ok(true)
    }

    async fn record_unit(&self, job_id: Uuid, unit: &UnitResult) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))?;
        job.progress.completed += 1;
        if !unit.is_ok() {
            job.progress.failed += 1;
        }
        job.results.push(unit.clone());
        Ok(())
    }

    async fn set_current(
        &self,
        job_id: Uuid,
        current: Option<(&str, ModuleKind)>,
    ) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))?;
        match current {
            Some((team, module)) => {
                job.progress.current_team = Some(team.to_string());
                job.progress.current_module = Some(module);
            }
            None => {
                job.progress.current_team = None;
                job.progress.current_module = None;
            }
        }
        Ok(())
    }

    async fn request_cancel(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))?;
        if !job.status.is_terminal() {
            job.cancel_requested = true;
        }
        Ok(())
    }

    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool> {
        Ok(self
            .jobs
            .lock()
            .get(&job_id)
            .map_or(false, |job| job.cancel_requested))
    }
}
