//! The bulk job runner: partitions (team, module) units into batches,
//! runs each batch concurrently, sleeps between batches to respect the
//! authoritative source's rate limits, and checks the cancel flag before
//! every batch. One failing unit never aborts the job.

use super::{JobStore, ProgressEvent};
use crate::compare::ComparisonEngine;
use crate::error::Result;
use crate::models::comparison::{ComparisonResult, UnitContext};
use crate::models::job::{BulkJob, BulkJobAccepted, JobFilters, JobStatus, UnitResult};
use crate::models::rule::ModuleKind;
use crate::sources::{SourceRegistry, TeamDirectory, TeamRef};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Batch-size ceiling enforced regardless of what a caller asks for.
pub const MAX_CONCURRENCY: usize = 5;

#[derive(Clone, Debug)]
pub struct JobConfig {
    /// Default batch size when a request does not ask for one.
    pub concurrency: usize,
    /// Pause between batches. Operator input is floored at 1s where it
    /// enters (service config parsing).
    pub batch_delay: Duration,
    /// Estimated wall time of one unit, used for acceptance estimates.
    pub unit_estimate: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            batch_delay: Duration::from_secs(1),
            unit_estimate: Duration::from_secs(4),
        }
    }
}

#[derive(Clone)]
struct UnitSpec {
    team: TeamRef,
    ctx: UnitContext,
}

#[derive(Clone)]
pub struct BulkJobRunner {
    engine: ComparisonEngine,
    sources: Arc<SourceRegistry>,
    teams: Arc<dyn TeamDirectory>,
    store: Arc<dyn JobStore>,
    config: JobConfig,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl BulkJobRunner {
    pub fn new(
        engine: ComparisonEngine,
        sources: Arc<SourceRegistry>,
        teams: Arc<dyn TeamDirectory>,
        store: Arc<dyn JobStore>,
        config: JobConfig,
    ) -> Self {
        Self {
            engine,
            sources,
            teams,
            store,
            config,
            progress: None,
        }
    }

    /// Attach a progress-event sender; events are emitted after each unit.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    /// Run one comparison outside any bulk job. The team must exist.
    pub async fn compare_unit(&self, ctx: &UnitContext) -> Result<ComparisonResult> {
        self.teams.get(&ctx.team_id).await?;
        self.execute(ctx).await
    }

    /// Validate a bulk request, persist a pending job and spawn its run.
    pub async fn submit(&self, filters: JobFilters) -> Result<BulkJobAccepted> {
        filters.validate()?;
        let teams = self.teams.select(&filters).await?;
        if teams.is_empty() {
            return Err(crate::error::ReconError::validation(
                "no teams matched the bulk filters",
            ));
        }

        let concurrency = filters
            .concurrency
            .unwrap_or(self.config.concurrency)
            .clamp(1, MAX_CONCURRENCY);

        let mut units: Vec<UnitSpec> = Vec::with_capacity(teams.len() * filters.modules.len());
        for team in &teams {
            for &module in &filters.modules {
                units.push(UnitSpec {
                    team: team.clone(),
                    ctx: unit_context(team, module, &filters),
                });
            }
        }

        let total = units.len() as u32;
        let estimated_seconds = estimate_seconds(
            units.len(),
            concurrency,
            self.config.unit_estimate,
            self.config.batch_delay,
        );

        let job = BulkJob::new(filters, total, estimated_seconds);
        let job_id = job.job_id;
        self.store.insert(&job).await?;

        info!(
            %job_id,
            teams = teams.len(),
            units = total,
            concurrency,
            "bulk job accepted"
        );

        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(job_id, units, concurrency).await {
                error!(%job_id, "bulk job failed: {}", e);
                let _ = runner.store.transition(job_id, JobStatus::Failed).await;
            }
        });

        Ok(BulkJobAccepted {
            job_id,
            total_operations: total,
            teams: teams.into_iter().map(|t| t.team_id).collect(),
            estimated_seconds,
        })
    }

    /// Idempotent cancellation: terminal jobs are untouched, pending jobs
    /// flip straight to cancelled, running jobs stop at the next batch
    /// boundary.
    pub async fn cancel(&self, job_id: Uuid) -> Result<BulkJob> {
        self.store.request_cancel(job_id).await?;
        let job = self.store.get(job_id).await?;
        if job.status == JobStatus::Pending {
            self.store.transition(job_id, JobStatus::Cancelled).await?;
            return self.store.get(job_id).await;
        }
        Ok(job)
    }

    async fn run(&self, job_id: Uuid, units: Vec<UnitSpec>, concurrency: usize) -> Result<()> {
        if !self.store.transition(job_id, JobStatus::Running).await? {
            // Cancelled before it ever started.
            return Ok(());
        }

        let batches: Vec<&[UnitSpec]> = units.chunks(concurrency).collect();
        let batch_count = batches.len();
        for (index, batch) in batches.into_iter().enumerate() {
            if self.store.cancel_requested(job_id).await? {
                info!(%job_id, "cancel requested, stopping before batch {}", index + 1);
                self.store.transition(job_id, JobStatus::Cancelled).await?;
                return Ok(());
            }

            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|unit| self.run_unit(job_id, unit))
                .collect();
            while let Some(unit_result) = in_flight.next().await {
                self.store.record_unit(job_id, &unit_result).await?;
                self.emit_progress(job_id, &unit_result).await;
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        self.store.transition(job_id, JobStatus::Completed).await?;
        info!(%job_id, "bulk job completed");
        Ok(())
    }

    /// One unit, with its own error capture. Never fails the job.
    async fn run_unit(&self, job_id: Uuid, unit: &UnitSpec) -> UnitResult {
        if let Err(e) = self
            .store
            .set_current(job_id, Some((&unit.team.team_id, unit.ctx.module)))
            .await
        {
            warn!(%job_id, "progress update failed: {}", e);
        }

        match self.teams.get(&unit.team.team_id).await {
            Ok(_) => match self.execute(&unit.ctx).await {
                Ok(result) => UnitResult::ok(&unit.team.team_id, unit.ctx.module, result),
                Err(e) => {
                    warn!(
                        %job_id,
                        team = %unit.team.team_id,
                        module = unit.ctx.module.as_str(),
                        "unit failed: {}",
                        e
                    );
                    UnitResult::failed(&unit.team.team_id, unit.ctx.module, e.to_string())
                }
            },
            Err(e) => UnitResult::failed(&unit.team.team_id, unit.ctx.module, e.to_string()),
        }
    }

    async fn execute(&self, ctx: &UnitContext) -> Result<ComparisonResult> {
        let scraped_source = self.sources.scraped();
        let authoritative = self.sources.select(ctx.source)?;
        match ctx.module {
            ModuleKind::Roster => {
                let scraped = scraped_source.players(ctx).await?;
                let source = authoritative.players(ctx).await?;
                self.engine.compare_players(scraped, source, ctx).await
            }
            ModuleKind::Schedule => {
                let scraped = scraped_source.games(ctx).await?;
                let source = authoritative.games(ctx).await?;
                self.engine.compare_games(scraped, source, ctx).await
            }
        }
    }

    async fn emit_progress(&self, job_id: Uuid, unit: &UnitResult) {
        let Some(sender) = &self.progress else {
            return;
        };
        let progress = match self.store.get(job_id).await {
            Ok(job) => job.progress,
            Err(_) => return,
        };
        let _ = sender.send(ProgressEvent {
            job_id,
            team_id: unit.team_id.clone(),
            module: unit.module,
            ok: unit.is_ok(),
            completed: progress.completed,
            failed: progress.failed,
            total: progress.total,
        });
    }
}

fn unit_context(team: &TeamRef, module: ModuleKind, filters: &JobFilters) -> UnitContext {
    let mut ctx = UnitContext::new(team.team_id.clone(), module, filters.source);
    ctx.league = filters
        .league
        .clone()
        .or_else(|| (!team.league.is_empty()).then(|| team.league.clone()));
    ctx.sport = team.sport.clone();
    ctx.season = filters.season.clone();
    ctx.start_date = filters.start_date;
    ctx.end_date = filters.end_date;
    ctx
}

/// Wall-clock estimate: batches run units concurrently, so the unit cost
/// counts once per batch, plus the delay between batches.
pub fn estimate_seconds(
    units: usize,
    concurrency: usize,
    unit_estimate: Duration,
    batch_delay: Duration,
) -> u64 {
    if units == 0 {
        return 0;
    }
    let batches = units.div_ceil(concurrency.max(1)) as u64;
    batches * unit_estimate.as_secs().max(1) + (batches - 1) * batch_delay.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counts_batches() {
        let unit = Duration::from_secs(4);
        let delay = Duration::from_secs(1);
        assert_eq!(estimate_seconds(0, 3, unit, delay), 0);
        assert_eq!(estimate_seconds(3, 3, unit, delay), 4);
        assert_eq!(estimate_seconds(12, 3, unit, delay), 19);
    }

    #[test]
    fn test_default_config_within_bounds() {
        let config = JobConfig::default();
        assert!(config.concurrency <= MAX_CONCURRENCY);
        assert!(config.batch_delay >= Duration::from_secs(1));
    }
}
