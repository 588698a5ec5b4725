//! Bulk job state: filters, progress, per-unit results and the status
//! state machine.

use super::comparison::ComparisonResult;
use super::rule::{ComparisonSource, ModuleKind};
use crate::error::{ReconError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strict forward state machine:
/// pending -> running -> {completed | failed | cancelled}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Statuses a transition to `self` is allowed from.
    pub fn allowed_from(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Running => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Running],
            JobStatus::Cancelled => &[JobStatus::Pending, JobStatus::Running],
        }
    }

    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        to.allowed_from().contains(self)
    }
}

/// Bulk request filters. A request must name a league or explicit teams,
/// and at least one module.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilters {
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub conference: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    pub modules: Vec<ModuleKind>,
    pub source: ComparisonSource,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Requested batch size; clamped to the engine ceiling.
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl JobFilters {
    pub fn validate(&self) -> Result<()> {
        if self.league.as_deref().map_or(true, str::is_empty) && self.teams.is_empty() {
            return Err(ReconError::validation(
                "bulk request must specify a league or explicit teams",
            ));
        }
        if self.modules.is_empty() {
            return Err(ReconError::validation(
                "bulk request must specify at least one module",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub total: u32,
    /// Units processed so far, successful or not. Monotonic.
    pub completed: u32,
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_module: Option<ModuleKind>,
}

/// Outcome of one reconciliation unit inside a bulk job. A failing unit
/// carries its error message; the job itself proceeds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitResult {
    pub team_id: String,
    pub module: ModuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ComparisonResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl UnitResult {
    pub fn ok(team_id: impl Into<String>, module: ModuleKind, result: ComparisonResult) -> Self {
        Self {
            team_id: team_id.into(),
            module,
            result: Some(result),
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(team_id: impl Into<String>, module: ModuleKind, error: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            module,
            result: None,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub filters: JobFilters,
    pub progress: JobProgress,
    pub results: Vec<UnitResult>,
    pub estimated_seconds: u64,
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    pub fn new(filters: JobFilters, total_units: u32, estimated_seconds: u64) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Pending,
            filters,
            progress: JobProgress {
                total: total_units,
                ..Default::default()
            },
            results: Vec::new(),
            estimated_seconds,
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Acceptance reply for a bulk request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJobAccepted {
    pub job_id: Uuid,
    pub total_operations: u32,
    pub teams: Vec<String>,
    pub estimated_seconds: u64,
}
