//! Record sources: where the two sides of a comparison come from. The
//! scrapers, the paid stats API and the oracle database all sit behind the
//! same trait; a baseline is a previously captured snapshot served the
//! same way.

pub mod http;

use crate::error::{ReconError, Result};
use crate::models::comparison::UnitContext;
use crate::models::job::JobFilters;
use crate::models::record::{GameRecord, PlayerRecord};
use crate::models::rule::ComparisonSource;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn players(&self, ctx: &UnitContext) -> Result<Vec<PlayerRecord>>;

    async fn games(&self, ctx: &UnitContext) -> Result<Vec<GameRecord>>;
}

/// The scraped store plus whichever authoritative sources are configured.
pub struct SourceRegistry {
    scraped: Arc<dyn RecordSource>,
    authoritative: FxHashMap<ComparisonSource, Arc<dyn RecordSource>>,
}

impl SourceRegistry {
    pub fn new(scraped: Arc<dyn RecordSource>) -> Self {
        Self {
            scraped,
            authoritative: FxHashMap::default(),
        }
    }

    pub fn register(mut self, kind: ComparisonSource, source: Arc<dyn RecordSource>) -> Self {
        self.authoritative.insert(kind, source);
        self
    }

    pub fn scraped(&self) -> Arc<dyn RecordSource> {
        self.scraped.clone()
    }

    pub fn select(&self, kind: ComparisonSource) -> Result<Arc<dyn RecordSource>> {
        self.authoritative.get(&kind).cloned().ok_or_else(|| {
            ReconError::validation(format!("source '{}' is not configured", kind.as_str()))
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    pub team_id: String,
    pub name: String,
    pub league: String,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub conference: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
}

/// Team metadata lookup. The CRUD surface behind it is external; the
/// engine only reads.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Fails with NotFound for an unknown id.
    async fn get(&self, team_id: &str) -> Result<TeamRef>;

    /// Expand bulk filters into concrete teams. Explicit team ids pass
    /// through unchecked; existence is verified per unit at fetch time.
    async fn select(&self, filters: &JobFilters) -> Result<Vec<TeamRef>>;
}

/// Map-backed directory for tests and embedded use.
#[derive(Default)]
pub struct InMemoryTeamDirectory {
    teams: parking_lot::RwLock<Vec<TeamRef>>,
}

impl InMemoryTeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_teams(teams: Vec<TeamRef>) -> Self {
        Self {
            teams: parking_lot::RwLock::new(teams),
        }
    }

    pub fn push(&self, team: TeamRef) {
        self.teams.write().push(team);
    }
}

#[async_trait]
impl TeamDirectory for InMemoryTeamDirectory {
    async fn get(&self, team_id: &str) -> Result<TeamRef> {
        self.teams
            .read()
            .iter()
            .find(|t| t.team_id == team_id)
            .cloned()
            .ok_or_else(|| ReconError::not_found("team", team_id))
    }

    async fn select(&self, filters: &JobFilters) -> Result<Vec<TeamRef>> {
        if !filters.teams.is_empty() {
            let known = self.teams.read();
            return Ok(filters
                .teams
                .iter()
                .map(|id| {
                    known
                        .iter()
                        .find(|t| &t.team_id == id)
                        .cloned()
                        .unwrap_or_else(|| TeamRef {
                            team_id: id.clone(),
                            name: id.clone(),
                            league: filters.league.clone().unwrap_or_default(),
                            sport: None,
                            conference: None,
                            division: None,
                        })
                })
                .collect());
        }
        Ok(self
            .teams
            .read()
            .iter()
            .filter(|t| filters.league.as_deref().map_or(true, |l| t.league == l))
            .filter(|t| {
                filters
                    .conference
                    .as_deref()
                    .map_or(true, |c| t.conference.as_deref() == Some(c))
            })
            .filter(|t| {
                filters
                    .division
                    .as_deref()
                    .map_or(true, |d| t.division.as_deref() == Some(d))
            })
            .cloned()
            .collect())
    }
}
