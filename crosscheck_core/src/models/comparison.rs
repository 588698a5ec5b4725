//! Comparison context and results for a single reconciliation unit.

use super::rule::{ComparisonSource, FieldType, ModuleKind};
use crate::rules::resolver::ScopeContext;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Context for one (team, module) comparison.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitContext {
    pub team_id: String,
    pub module: ModuleKind,
    pub source: ComparisonSource,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl UnitContext {
    pub fn new(team_id: impl Into<String>, module: ModuleKind, source: ComparisonSource) -> Self {
        Self {
            team_id: team_id.into(),
            module,
            source,
            league: None,
            sport: None,
            season: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = Some(league.into());
        self
    }

    pub fn with_sport(mut self, sport: impl Into<String>) -> Self {
        self.sport = Some(sport.into());
        self
    }

    pub fn with_season(mut self, season: impl Into<String>) -> Self {
        self.season = Some(season.into());
        self
    }

    /// Scope context for rule resolution within this unit.
    pub fn scope(&self) -> ScopeContext {
        let mut ctx = ScopeContext::new()
            .with_team(self.team_id.clone())
            .with_source(self.source);
        if let Some(league) = &self.league {
            ctx = ctx.with_league(league.clone());
        }
        if let Some(sport) = &self.sport {
            ctx = ctx.with_sport(sport.clone());
        }
        ctx
    }
}

/// One differing field on an aligned pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiscrepancy {
    pub field: FieldType,
    pub scraped: String,
    pub source: String,
}

/// An aligned pair of entities. `mapped_fields` records which fields were
/// resolved via a mapping rule so consumers can distinguish mapped-equal
/// from identical.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMatch {
    pub scraped: String,
    pub source: String,
    #[serde(default)]
    pub mapped_fields: Vec<FieldType>,
    #[serde(default)]
    pub discrepancies: Vec<FieldDiscrepancy>,
}

impl EntityMatch {
    pub fn is_perfect(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// An entity present on only one side. Ignore-rule hits stay in the list
/// flagged rather than being dropped, so consumers can count either way.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingEntity {
    pub identity: String,
    #[serde(default)]
    pub is_ignored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_reason: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub perfect_matches: usize,
    pub with_discrepancies: usize,
    pub unique_to_scraped: usize,
    pub unique_to_source: usize,
    /// Missing entries not covered by an ignore rule or ignored-games list.
    pub actionable_missing: usize,
}

/// Result of one reconciliation unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub team_id: String,
    pub module: ModuleKind,
    pub source: ComparisonSource,
    /// Pairs with zero discrepancies.
    pub matches: Vec<EntityMatch>,
    /// Pairs with at least one differing field.
    pub discrepancies: Vec<EntityMatch>,
    /// Entities only the source side has.
    pub missing_in_scraped: Vec<MissingEntity>,
    /// Entities only the scraped side has.
    pub missing_in_source: Vec<MissingEntity>,
    pub total_scraped: usize,
    pub total_source: usize,
    /// round(100 * perfect / total_source), 0 when the source is empty.
    pub match_percentage: u32,
    pub summary: ComparisonSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_carries_unit_identity() {
        let ctx = UnitContext::new("team-9", ModuleKind::Roster, ComparisonSource::Oracle)
            .with_league("big-ten")
            .with_sport("wbb");
        let scope = ctx.scope();
        assert_eq!(scope.team_id.as_deref(), Some("team-9"));
        assert_eq!(scope.league.as_deref(), Some("big-ten"));
        assert_eq!(scope.sport.as_deref(), Some("wbb"));
        assert_eq!(scope.source, Some(ComparisonSource::Oracle));
    }

    #[test]
    fn test_perfect_match() {
        let m = EntityMatch {
            scraped: "a".into(),
            source: "a".into(),
            mapped_fields: vec![],
            discrepancies: vec![],
        };
        assert!(m.is_perfect());
    }
}
