//! Read-only adapter over the team metadata table owned by the admin
//! surface. The engine never writes here.

use crate::error::{ReconError, Result};
use crate::models::job::JobFilters;
use crate::sources::{TeamDirectory, TeamRef};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgTeamDirectory {
    pool: PgPool,
}

impl PgTeamDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_team(row: &PgRow) -> Result<TeamRef> {
    Ok(TeamRef {
        team_id: row.try_get("team_id")?,
        name: row.try_get("name")?,
        league: row.try_get("league")?,
        sport: row.try_get("sport")?,
        conference: row.try_get("conference")?,
        division: row.try_get("division")?,
    })
}

#[async_trait]
impl TeamDirectory for PgTeamDirectory {
    async fn get(&self, team_id: &str) -> Result<TeamRef> {
        let row = sqlx::query(
            "SELECT team_id, name, league, sport, conference, division \
             FROM teams WHERE team_id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ReconError::not_found("team", team_id))?;
        decode_team(&row)
    }

    async fn select(&self, filters: &JobFilters) -> Result<Vec<TeamRef>> {
        if !filters.teams.is_empty() {
            // Explicit ids pass through; unknown ones fail per unit.
            let mut selected = Vec::with_capacity(filters.teams.len());
            for id in &filters.teams {
                selected.push(match self.get(id).await {
                    Ok(team) => team,
                    Err(ReconError::NotFound { .. }) => TeamRef {
                        team_id: id.clone(),
                        name: id.clone(),
                        league: filters.league.clone().unwrap_or_default(),
                        sport: None,
                        conference: None,
                        division: None,
                    },
                    Err(e) => return Err(e),
                });
            }
            return Ok(selected);
        }

        let rows = sqlx::query(
            "SELECT team_id, name, league, sport, conference, division \
             FROM teams WHERE league = $1 ORDER BY team_id",
        )
        .bind(filters.league.as_deref().unwrap_or_default())
        .fetch_all(&self.pool)
        .await?;

        // Conference/division narrowing stays in code, matching the
        // explicit-predicate style of the rule resolver.
        rows.iter()
            .map(decode_team)
            .filter(|team| match team {
                Ok(team) => {
                    filters
                        .conference
                        .as_deref()
                        .map_or(true, |c| team.conference.as_deref() == Some(c))
                        && filters
                            .division
                            .as_deref()
                            .map_or(true, |d| team.division.as_deref() == Some(d))
                }
                Err(_) => true,
            })
            .collect()
    }
}
