//! Postgres persistence: connection pooling, retry policy, schema, and
//! the database-backed stores for rules, jobs, ignored games and team
//! metadata.

pub mod ignored;
pub mod jobs;
pub mod pool;
pub mod retry;
pub mod rules;
pub mod teams;

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Create the engine's tables when they do not exist yet. Run once at
/// service startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mapping_rules (
            id UUID PRIMARY KEY,
            field_type TEXT NOT NULL,
            custom_field TEXT,
            scope TEXT NOT NULL,
            priority INT NOT NULL DEFAULT 0,
            mapping_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            applies_scraped BOOLEAN NOT NULL DEFAULT TRUE,
            applies_api BOOLEAN NOT NULL DEFAULT TRUE,
            applies_oracle BOOLEAN NOT NULL DEFAULT TRUE,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            discovery TEXT,
            times_used BIGINT NOT NULL DEFAULT 0,
            last_used TIMESTAMPTZ,
            successful_matches BIGINT NOT NULL DEFAULT 0,
            history TEXT NOT NULL DEFAULT '[]',
            expires_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create mapping_rules table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mapping_rules_field ON mapping_rules (field_type, active)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recon_jobs (
            job_id UUID PRIMARY KEY,
            status TEXT NOT NULL,
            filters TEXT NOT NULL,
            total INT NOT NULL,
            completed INT NOT NULL DEFAULT 0,
            failed INT NOT NULL DEFAULT 0,
            current_team TEXT,
            current_module TEXT,
            estimated_seconds BIGINT NOT NULL DEFAULT 0,
            cancel_requested BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create recon_jobs table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recon_job_results (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL,
            team_id TEXT NOT NULL,
            module TEXT NOT NULL,
            ok BOOLEAN NOT NULL,
            error TEXT,
            result TEXT,
            finished_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create recon_job_results table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recon_job_results_job ON recon_job_results (job_id, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ignored_games (
            team_id TEXT NOT NULL,
            module TEXT NOT NULL,
            date_key TEXT NOT NULL,
            note TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (team_id, module, date_key)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create ignored_games table")?;

    Ok(())
}
