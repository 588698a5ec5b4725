//! Postgres-backed ignored-games list.

use crate::error::Result;
use crate::ignored::IgnoredGameStore;
use crate::models::rule::ModuleKind;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PgIgnoredGames {
    pool: PgPool,
}

impl PgIgnoredGames {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IgnoredGameStore for PgIgnoredGames {
    async fn is_ignored(&self, team_id: &str, module: ModuleKind, date_key: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 AS hit FROM ignored_games \
             WHERE team_id = $1 AND module = $2 AND date_key = $3",
        )
        .bind(team_id)
        .bind(module.as_str())
        .bind(date_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn add(
        &self,
        team_id: &str,
        module: ModuleKind,
        date_key: &str,
        note: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ignored_games (team_id, module, date_key, note)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (team_id, module, date_key) DO UPDATE SET note = EXCLUDED.note
            "#,
        )
        .bind(team_id)
        .bind(module.as_str())
        .bind(date_key)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, team_id: &str, module: ModuleKind, date_key: &str) -> Result<bool> {
        let outcome = sqlx::query(
            "DELETE FROM ignored_games WHERE team_id = $1 AND module = $2 AND date_key = $3",
        )
        .bind(team_id)
        .bind(module.as_str())
        .bind(date_key)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    async fn list(&self, team_id: &str, module: ModuleKind) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT date_key FROM ignored_games \
             WHERE team_id = $1 AND module = $2 ORDER BY date_key",
        )
        .bind(team_id)
        .bind(module.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(row.try_get("date_key")?))
            .collect()
    }
}
