//! The comparison engine for one reconciliation unit: align two record
//! sets, build per-field discrepancies and aggregate the result.

pub mod aggregate;

use crate::error::Result;
use crate::ignored::IgnoredGameStore;
use crate::matching::EntityMatcher;
use crate::models::comparison::{
    ComparisonResult, EntityMatch, FieldDiscrepancy, MissingEntity, UnitContext,
};
use crate::models::record::{GameRecord, PlayerRecord, Reconcilable};
use crate::models::rule::FieldType;
use crate::rules::evaluate::{FieldEvaluator, FieldOutcome};
use crate::rules::resolver::ScopeContext;
use crate::rules::store::RuleStore;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ComparisonEngine {
    evaluator: FieldEvaluator,
    matcher: EntityMatcher,
    ignored_games: Arc<dyn IgnoredGameStore>,
}

impl ComparisonEngine {
    pub fn new(rules: Arc<dyn RuleStore>, ignored_games: Arc<dyn IgnoredGameStore>) -> Self {
        let evaluator = FieldEvaluator::new(rules);
        Self {
            matcher: EntityMatcher::new(evaluator.clone()),
            evaluator,
            ignored_games,
        }
    }

    pub async fn compare_players(
        &self,
        scraped: Vec<PlayerRecord>,
        source: Vec<PlayerRecord>,
        ctx: &UnitContext,
    ) -> Result<ComparisonResult> {
        self.compare_entities(scraped, source, ctx).await
    }

    pub async fn compare_games(
        &self,
        scraped: Vec<GameRecord>,
        source: Vec<GameRecord>,
        ctx: &UnitContext,
    ) -> Result<ComparisonResult> {
        self.compare_entities(scraped, source, ctx).await
    }

    async fn compare_entities<T: Reconcilable>(
        &self,
        scraped: Vec<T>,
        source: Vec<T>,
        ctx: &UnitContext,
    ) -> Result<ComparisonResult> {
        let total_scraped = scraped.len();
        let total_source = source.len();
        let scope = ctx.scope();

        let alignment = self.matcher.align(scraped, source, &scope).await?;

        let mut matches: Vec<EntityMatch> = Vec::new();
        let mut discrepancies: Vec<EntityMatch> = Vec::new();
        for pair in alignment.pairs {
            let entry = self.compare_pair(&pair.scraped, &pair.source, pair.key_mapped, &scope)
                .await?;
            if entry.is_perfect() {
                matches.push(entry);
            } else {
                discrepancies.push(entry);
            }
        }

        let missing_in_source = self
            .missing_entries(alignment.only_scraped, ctx, &scope)
            .await?;
        let missing_in_scraped = self
            .missing_entries(alignment.only_source, ctx, &scope)
            .await?;

        let summary = aggregate::summarize(
            &matches,
            &discrepancies,
            &missing_in_scraped,
            &missing_in_source,
        );
        let match_percentage = aggregate::match_percentage(summary.perfect_matches, total_source);

        debug!(
            team = %ctx.team_id,
            module = ctx.module.as_str(),
            perfect = summary.perfect_matches,
            with_discrepancies = summary.with_discrepancies,
            missing = summary.unique_to_scraped + summary.unique_to_source,
            "comparison finished"
        );

        Ok(ComparisonResult {
            team_id: ctx.team_id.clone(),
            module: ctx.module,
            source: ctx.source,
            matches,
            discrepancies,
            missing_in_scraped,
            missing_in_source,
            total_scraped,
            total_source,
            match_percentage,
            summary,
        })
    }

    /// Compare every declared field of an aligned pair.
    async fn compare_pair<T: Reconcilable>(
        &self,
        scraped: &T,
        source: &T,
        key_mapped: bool,
        scope: &ScopeContext,
    ) -> Result<EntityMatch> {
        // Player-scope rules can match on the source-side identity.
        let scope = scope.clone().with_player_name(source.identity());

        let mut mapped_fields: Vec<FieldType> = Vec::new();
        if key_mapped {
            if let Some(key_field) = T::key_field() {
                mapped_fields.push(key_field);
            }
        }

        let mut field_discrepancies: Vec<FieldDiscrepancy> = Vec::new();
        for &field in T::comparable_fields() {
            let a = scraped.field(field);
            let b = source.field(field);
            if a.is_none() && b.is_none() {
                continue;
            }
            let a = a.unwrap_or("");
            let b = b.unwrap_or("");
            let eval = self.evaluator.evaluate(a, b, field, None, &scope).await?;
            match eval.outcome {
                FieldOutcome::Exact | FieldOutcome::Ignored => {}
                FieldOutcome::ByRule => mapped_fields.push(field),
                FieldOutcome::Unequal => field_discrepancies.push(FieldDiscrepancy {
                    field,
                    scraped: a.to_string(),
                    source: b.to_string(),
                }),
            }
        }

        Ok(EntityMatch {
            scraped: scraped.identity().to_string(),
            source: source.identity().to_string(),
            mapped_fields,
            discrepancies: field_discrepancies,
        })
    }

    /// Build the missing list for one side, flagging entries covered by an
    /// ignore rule (players) or the ignored-games list (games).
    async fn missing_entries<T: Reconcilable>(
        &self,
        leftovers: Vec<T>,
        ctx: &UnitContext,
        scope: &ScopeContext,
    ) -> Result<Vec<MissingEntity>> {
        let mut entries = Vec::with_capacity(leftovers.len());
        for item in leftovers {
            let (is_ignored, reason) = match T::key_field() {
                Some(field) => match self.evaluator.ignored_value(item.identity(), field, scope).await? {
                    Some(reason) => (true, Some(reason)),
                    None => (false, None),
                },
                None => {
                    let hit = self
                        .ignored_games
                        .is_ignored(&ctx.team_id, ctx.module, &item.match_key())
                        .await?;
                    (hit, hit.then(|| "on ignored-games list".to_string()))
                }
            };
            entries.push(MissingEntity {
                identity: item.identity().to_string(),
                is_ignored,
                ignore_reason: reason,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignored::InMemoryIgnoredGames;
    use crate::models::rule::{
        ComparisonSource, EquivalenceRule, MappingRule, ModuleKind, RulePayload, RuleScope,
        ToleranceRule, ToleranceType,
    };
    use crate::rules::store::InMemoryRuleStore;

    fn engine_with(rules: Vec<MappingRule>) -> ComparisonEngine {
        ComparisonEngine::new(
            Arc::new(InMemoryRuleStore::with_rules(rules)),
            Arc::new(InMemoryIgnoredGames::new()),
        )
    }

    fn roster_ctx() -> UnitContext {
        UnitContext::new("t1", ModuleKind::Roster, ComparisonSource::Oracle)
    }

    fn player(name: &str, weight: &str) -> PlayerRecord {
        let mut p = PlayerRecord::named(name);
        p.weight = Some(weight.to_string());
        p
    }

    #[tokio::test]
    async fn test_perfect_match_has_no_discrepancies() {
        let engine = engine_with(vec![]);
        let result = engine
            .compare_players(
                vec![player("Al Jones", "200")],
                vec![player("Al Jones", "200")],
                &roster_ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result.matches.len(), 1);
        assert!(result.discrepancies.is_empty());
        assert_eq!(result.match_percentage, 100);
        assert_eq!(result.summary.perfect_matches, 1);
    }

    #[tokio::test]
    async fn test_weight_tolerance_scenario() {
        let tolerant = MappingRule::new(
            FieldType::Weight,
            RuleScope::Global,
            RulePayload::Tolerance(ToleranceRule {
                tolerance: 5.0,
                tolerance_type: ToleranceType::Absolute,
            }),
        );
        let engine = engine_with(vec![tolerant]);
        let result = engine
            .compare_players(
                vec![player("Al Jones", "205")],
                vec![player("Al Jones", "208")],
                &roster_ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].mapped_fields, vec![FieldType::Weight]);

        // Tighter tolerance turns the same pair into a discrepancy.
        let strict = MappingRule::new(
            FieldType::Weight,
            RuleScope::Global,
            RulePayload::Tolerance(ToleranceRule {
                tolerance: 2.0,
                tolerance_type: ToleranceType::Absolute,
            }),
        );
        let engine = engine_with(vec![strict]);
        let result = engine
            .compare_players(
                vec![player("Al Jones", "205")],
                vec![player("Al Jones", "208")],
                &roster_ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result.discrepancies.len(), 1);
        let disc = &result.discrepancies[0].discrepancies[0];
        assert_eq!(disc.field, FieldType::Weight);
        assert_eq!(disc.scraped, "205");
        assert_eq!(disc.source, "208");
    }

    #[tokio::test]
    async fn test_mapped_name_produces_single_match() {
        let mapping = MappingRule::new(
            FieldType::Name,
            RuleScope::Team {
                team_id: "t1".to_string(),
            },
            RulePayload::Equivalence(EquivalenceRule {
                primary_value: "Bob Smith Jr.".to_string(),
                equivalents: vec!["Smith, Bob".to_string()],
                case_sensitive: false,
            }),
        );
        let engine = engine_with(vec![mapping]);
        let result = engine
            .compare_players(
                vec![PlayerRecord::named("Bob Smith Jr.")],
                vec![PlayerRecord::named("Smith, Bob")],
                &roster_ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result.matches.len(), 1);
        assert!(result.matches[0].mapped_fields.contains(&FieldType::Name));
        assert!(result.missing_in_scraped.is_empty());
        assert!(result.missing_in_source.is_empty());
    }

    #[tokio::test]
    async fn test_one_sided_field_is_discrepancy() {
        let engine = engine_with(vec![]);
        let mut a = PlayerRecord::named("Al Jones");
        a.position = Some("G".to_string());
        let b = PlayerRecord::named("Al Jones");
        let result = engine
            .compare_players(vec![a], vec![b], &roster_ctx())
            .await
            .unwrap();
        assert_eq!(result.discrepancies.len(), 1);
        let disc = &result.discrepancies[0].discrepancies[0];
        assert_eq!(disc.field, FieldType::Position);
        assert_eq!(disc.source, "");
    }

    #[tokio::test]
    async fn test_ignored_game_flagged_not_removed() {
        let rules = Arc::new(InMemoryRuleStore::new());
        let ignored = Arc::new(InMemoryIgnoredGames::new());
        ignored
            .add("t1", ModuleKind::Schedule, "2026-03-15", None)
            .await
            .unwrap();
        let engine = ComparisonEngine::new(rules, ignored);

        let ctx = UnitContext::new("t1", ModuleKind::Schedule, ComparisonSource::Oracle);
        let result = engine
            .compare_games(
                vec![GameRecord::on("2026-03-15")],
                vec![],
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result.missing_in_source.len(), 1);
        assert!(result.missing_in_source[0].is_ignored);
        assert_eq!(result.summary.actionable_missing, 0);
        assert_eq!(result.summary.unique_to_scraped, 1);
    }

    #[tokio::test]
    async fn test_empty_source_zero_percentage() {
        let engine = engine_with(vec![]);
        let result = engine
            .compare_players(vec![player("Al Jones", "200")], vec![], &roster_ctx())
            .await
            .unwrap();
        assert_eq!(result.match_percentage, 0);
        assert_eq!(result.total_source, 0);
    }
}
