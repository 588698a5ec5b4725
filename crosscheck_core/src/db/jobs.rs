//! Postgres-backed job store. Progress counters are bumped with atomic
//! SQL increments so concurrent batch completions never lose updates;
//! status transitions are guarded in the WHERE clause to keep the state
//! machine forward-only.

use crate::error::{ReconError, Result};
use crate::jobs::JobStore;
use crate::models::job::{BulkJob, JobFilters, JobProgress, JobStatus, UnitResult};
use crate::models::rule::ModuleKind;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &BulkJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recon_jobs (
                job_id, status, filters, total, completed, failed,
                estimated_seconds, cancel_requested, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.job_id)
        .bind(job.status.as_str())
        .bind(serde_json::to_string(&job.filters)?)
        .bind(job.progress.total as i32)
        .bind(job.progress.completed as i32)
        .bind(job.progress.failed as i32)
        .bind(job.estimated_seconds as i64)
        .bind(job.cancel_requested)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<BulkJob> {
        let row = sqlx::query("SELECT * FROM recon_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))?;

        let status_raw: String = row.try_get("status")?;
        let status = JobStatus::parse(&status_raw).ok_or_else(|| {
            ReconError::validation(format!("unknown job status in store: {}", status_raw))
        })?;
        let filters: JobFilters = serde_json::from_str(&row.try_get::<String, _>("filters")?)?;
        let current_module = row
            .try_get::<Option<String>, _>("current_module")?
            .as_deref()
            .and_then(ModuleKind::parse);

        let result_rows = sqlx::query(
            "SELECT team_id, module, ok, error, result, finished_at \
             FROM recon_job_results WHERE job_id = $1 ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(result_rows.len());
        for row in &result_rows {
            let module_raw: String = row.try_get("module")?;
            let module = ModuleKind::parse(&module_raw).ok_or_else(|| {
                ReconError::validation(format!("unknown module in store: {}", module_raw))
            })?;
            results.push(UnitResult {
                team_id: row.try_get("team_id")?,
                module,
                result: row
                    .try_get::<Option<String>, _>("result")?
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()?,
                error: row.try_get("error")?,
                finished_at: row.try_get("finished_at")?,
            });
        }

        Ok(BulkJob {
            job_id,
            status,
            filters,
            progress: JobProgress {
                total: row.try_get::<i32, _>("total")? as u32,
                completed: row.try_get::<i32, _>("completed")? as u32,
                failed: row.try_get::<i32, _>("failed")? as u32,
                current_team: row.try_get("current_team")?,
                current_module,
            },
            results,
            estimated_seconds: row.try_get::<i64, _>("estimated_seconds")? as u64,
            cancel_requested: row.try_get("cancel_requested")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    async fn transition(&self, job_id: Uuid, to: JobStatus) -> Result<bool> {
        let allowed: Vec<String> = to
            .allowed_from()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let outcome = sqlx::query(
            r#"
            UPDATE recon_jobs SET
                status = $2,
                started_at = CASE WHEN $2 = 'running' THEN now() ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed', 'cancelled')
                    THEN now() ELSE completed_at END,
                current_team = CASE WHEN $2 IN ('completed', 'failed', 'cancelled')
                    THEN NULL ELSE current_team END,
                current_module = CASE WHEN $2 IN ('completed', 'failed', 'cancelled')
                    THEN NULL ELSE current_module END
            WHERE job_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(job_id)
        .bind(to.as_str())
        .bind(&allowed)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    async fn record_unit(&self, job_id: Uuid, unit: &UnitResult) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE recon_jobs SET completed = completed + 1, failed = failed + $2 \
             WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(if unit.is_ok() { 0_i32 } else { 1 })
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO recon_job_results (job_id, team_id, module, ok, error, result, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job_id)
        .bind(&unit.team_id)
        .bind(unit.module.as_str())
        .bind(unit.is_ok())
        .bind(&unit.error)
        .bind(
            unit.result
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(unit.finished_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_current(
        &self,
        job_id: Uuid,
        current: Option<(&str, ModuleKind)>,
    ) -> Result<()> {
        sqlx::query("UPDATE recon_jobs SET current_team = $2, current_module = $3 WHERE job_id = $1")
            .bind(job_id)
            .bind(current.map(|(team, _)| team.to_string()))
            .bind(current.map(|(_, module)| module.as_str()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn request_cancel(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE recon_jobs SET cancel_requested = TRUE \
             WHERE job_id = $1 AND status IN ('pending', 'running')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT cancel_requested FROM recon_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ReconError::not_found("job", job_id.to_string()))?;
        Ok(row.try_get("cancel_requested")?)
    }
}
