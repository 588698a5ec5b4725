//! Scope resolution: which rules apply to a concrete comparison context,
//! and in what order.
//!
//! Global rules always apply; narrower scopes apply only when the context
//! provides the matching value. Each level has its own explicit predicate
//! rather than an assembled query fragment, so the logic is testable in
//! isolation.

use crate::models::rule::{ComparisonSource, MappingRule, RuleScope};
use chrono::{DateTime, Utc};

/// Concrete comparison context a rule scope is matched against.
#[derive(Clone, Debug, Default)]
pub struct ScopeContext {
    pub league: Option<String>,
    pub sport: Option<String>,
    pub team_id: Option<String>,
    pub player_id: Option<String>,
    /// Source-side identity of the entity currently being compared; lets
    /// player-scope rules match by name when no shared id exists.
    pub player_name: Option<String>,
    pub source: Option<ComparisonSource>,
}

impl ScopeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = Some(league.into());
        self
    }

    pub fn with_sport(mut self, sport: impl Into<String>) -> Self {
        self.sport = Some(sport.into());
        self
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_player(mut self, player_id: impl Into<String>) -> Self {
        self.player_id = Some(player_id.into());
        self
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    pub fn with_source(mut self, source: ComparisonSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// Per-level scope predicate. An empty context matches global rules only.
pub fn scope_applies(scope: &RuleScope, ctx: &ScopeContext) -> bool {
    match scope {
        RuleScope::Global => true,
        RuleScope::League { league } => ctx.league.as_deref() == Some(league.as_str()),
        RuleScope::Sport { sport } => ctx.sport.as_deref() == Some(sport.as_str()),
        RuleScope::Team { team_id } => ctx.team_id.as_deref() == Some(team_id.as_str()),
        RuleScope::Player {
            player_id,
            player_name,
        } => {
            if ctx.player_id.as_deref() == Some(player_id.as_str()) {
                return true;
            }
            match (player_name, &ctx.player_name) {
                (Some(scoped), Some(current)) => scoped.eq_ignore_ascii_case(current),
                _ => false,
            }
        }
    }
}

/// Filter and order candidate rules for one comparison. Candidates are
/// assumed to already match the field type. Ordering: priority descending,
/// then specificity descending, then most-recently-created.
pub fn resolve(
    candidates: Vec<MappingRule>,
    ctx: &ScopeContext,
    include_inactive: bool,
    now: DateTime<Utc>,
) -> Vec<MappingRule> {
    let mut applicable: Vec<MappingRule> = candidates
        .into_iter()
        .filter(|rule| include_inactive || rule.is_live(now))
        .filter(|rule| scope_applies(&rule.scope, ctx))
        .filter(|rule| ctx.source.map_or(true, |s| rule.applies_to.allows(s)))
        .collect();

    applicable.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.scope.specificity().cmp(&a.scope.specificity()))
            .then(b.created_at.cmp(&a.created_at))
    });
    applicable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::{EquivalenceRule, FieldType, RulePayload};

    fn rule(scope: RuleScope, priority: i32) -> MappingRule {
        MappingRule::new(
            FieldType::Name,
            scope,
            RulePayload::Equivalence(EquivalenceRule {
                primary_value: "x".to_string(),
                equivalents: vec!["y".to_string()],
                case_sensitive: false,
            }),
        )
        .with_priority(priority)
    }

    #[test]
    fn test_empty_context_yields_global_only() {
        let rules = vec![
            rule(RuleScope::Global, 0),
            rule(
                RuleScope::Team {
                    team_id: "t1".to_string(),
                },
                10,
            ),
        ];
        let resolved = resolve(rules, &ScopeContext::new(), false, Utc::now());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].scope, RuleScope::Global);
    }

    #[test]
    fn test_priority_beats_specificity() {
        let ctx = ScopeContext::new().with_team("t1");
        let rules = vec![
            rule(
                RuleScope::Team {
                    team_id: "t1".to_string(),
                },
                1,
            ),
            rule(RuleScope::Global, 5),
        ];
        let resolved = resolve(rules, &ctx, false, Utc::now());
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].scope, RuleScope::Global);
    }

    #[test]
    fn test_specificity_breaks_priority_ties() {
        let ctx = ScopeContext::new().with_team("t1").with_league("acc");
        let rules = vec![
            rule(
                RuleScope::League {
                    league: "acc".to_string(),
                },
                3,
            ),
            rule(
                RuleScope::Team {
                    team_id: "t1".to_string(),
                },
                3,
            ),
        ];
        let resolved = resolve(rules, &ctx, false, Utc::now());
        assert!(matches!(resolved[0].scope, RuleScope::Team { .. }));
    }

    #[test]
    fn test_wrong_team_excluded() {
        let ctx = ScopeContext::new().with_team("t2");
        let rules = vec![rule(
            RuleScope::Team {
                team_id: "t1".to_string(),
            },
            0,
        )];
        assert!(resolve(rules, &ctx, false, Utc::now()).is_empty());
    }

    #[test]
    fn test_inactive_excluded_unless_requested() {
        let mut inactive = rule(RuleScope::Global, 0);
        inactive.active = false;
        let resolved = resolve(vec![inactive.clone()], &ScopeContext::new(), false, Utc::now());
        assert!(resolved.is_empty());

        let resolved = resolve(vec![inactive], &ScopeContext::new(), true, Utc::now());
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_player_scope_matches_by_name() {
        let scope = RuleScope::Player {
            player_id: "p1".to_string(),
            player_name: Some("Bob Smith".to_string()),
        };
        let by_id = ScopeContext::new().with_player("p1");
        let by_name = ScopeContext::new().with_player_name("bob smith");
        let neither = ScopeContext::new().with_player_name("al jones");
        assert!(scope_applies(&scope, &by_id));
        assert!(scope_applies(&scope, &by_name));
        assert!(!scope_applies(&scope, &neither));
    }

    #[test]
    fn test_source_filter() {
        use crate::models::rule::AppliesTo;
        let mut r = rule(RuleScope::Global, 0);
        r.applies_to = AppliesTo {
            scraped: true,
            api: false,
            oracle: true,
        };
        let api_ctx = ScopeContext::new().with_source(ComparisonSource::Api);
        assert!(resolve(vec![r.clone()], &api_ctx, false, Utc::now()).is_empty());

        let oracle_ctx = ScopeContext::new().with_source(ComparisonSource::Oracle);
        assert_eq!(resolve(vec![r], &oracle_ctx, false, Utc::now()).len(), 1);
    }
}
