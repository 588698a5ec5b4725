//! Entity alignment across two independently sourced collections.
//!
//! Pass 1 pairs on normalized-key equality, the cheap common case. Pass 2
//! consults the evaluator for the still-unmatched remainder so an active
//! name mapping resolves an otherwise-orphaned entity without a re-scrape.
//! Ambiguous keys resolve first-found-in-iteration-order.

use crate::error::Result;
use crate::models::record::Reconcilable;
use crate::rules::evaluate::{FieldEvaluator, FieldOutcome};
use crate::rules::resolver::ScopeContext;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct AlignedPair<T> {
    pub scraped: T,
    pub source: T,
    /// True when pass 2 paired them via a mapping rule.
    pub key_mapped: bool,
}

#[derive(Clone, Debug)]
pub struct Alignment<T> {
    pub pairs: Vec<AlignedPair<T>>,
    pub only_scraped: Vec<T>,
    pub only_source: Vec<T>,
}

#[derive(Clone)]
pub struct EntityMatcher {
    evaluator: FieldEvaluator,
}

impl EntityMatcher {
    pub fn new(evaluator: FieldEvaluator) -> Self {
        Self { evaluator }
    }

    pub async fn align<T: Reconcilable>(
        &self,
        scraped: Vec<T>,
        source: Vec<T>,
        ctx: &ScopeContext,
    ) -> Result<Alignment<T>> {
        // Index source items by key; duplicate keys queue up and are
        // consumed in order.
        let mut by_key: FxHashMap<String, VecDeque<usize>> = FxHashMap::default();
        for (idx, item) in source.iter().enumerate() {
            by_key.entry(item.match_key()).or_default().push_back(idx);
        }

        let mut source_taken = vec![false; source.len()];
        let mut pairs: Vec<AlignedPair<T>> = Vec::new();
        let mut leftover_scraped: Vec<T> = Vec::new();

        for item in scraped {
            match by_key.get_mut(&item.match_key()).and_then(VecDeque::pop_front) {
                Some(idx) => {
                    source_taken[idx] = true;
                    pairs.push(AlignedPair {
                        scraped: item,
                        source: source[idx].clone(),
                        key_mapped: false,
                    });
                }
                None => leftover_scraped.push(item),
            }
        }

        // Pass 2: rule-assisted pairing for name-keyed entities. Small
        // leftover sets, so the pairwise walk is fine.
        let mut only_scraped: Vec<T> = Vec::new();
        if let Some(key_field) = T::key_field() {
            for item in leftover_scraped {
                let mut matched_idx = None;
                for (idx, candidate) in source.iter().enumerate() {
                    if source_taken[idx] {
                        continue;
                    }
                    let eval = self
                        .evaluator
                        .evaluate(item.identity(), candidate.identity(), key_field, None, ctx)
                        .await?;
                    if eval.outcome == FieldOutcome::ByRule {
                        matched_idx = Some(idx);
                        break;
                    }
                }
                match matched_idx {
                    Some(idx) => {
                        source_taken[idx] = true;
                        pairs.push(AlignedPair {
                            scraped: item,
                            source: source[idx].clone(),
                            key_mapped: true,
                        });
                    }
                    None => only_scraped.push(item),
                }
            }
        } else {
            only_scraped = leftover_scraped;
        }

        let only_source = source
            .into_iter()
            .zip(source_taken)
            .filter_map(|(item, taken)| (!taken).then_some(item))
            .collect();

        Ok(Alignment {
            pairs,
            only_scraped,
            only_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{GameRecord, PlayerRecord};
    use crate::models::rule::{
        EquivalenceRule, FieldType, MappingRule, RulePayload, RuleScope,
    };
    use crate::rules::store::InMemoryRuleStore;
    use std::sync::Arc;

    fn matcher_with(rules: Vec<MappingRule>) -> EntityMatcher {
        EntityMatcher::new(FieldEvaluator::new(Arc::new(InMemoryRuleStore::with_rules(
            rules,
        ))))
    }

    fn name_mapping(primary: &str, equivalent: &str) -> MappingRule {
        MappingRule::new(
            FieldType::Name,
            RuleScope::Global,
            RulePayload::Equivalence(EquivalenceRule {
                primary_value: primary.to_string(),
                equivalents: vec![equivalent.to_string()],
                case_sensitive: false,
            }),
        )
    }

    #[tokio::test]
    async fn test_direct_key_alignment() {
        let matcher = matcher_with(vec![]);
        let scraped = vec![PlayerRecord::named("Bob Smith Jr."), PlayerRecord::named("Al Jones")];
        let source = vec![PlayerRecord::named("Al  Jones"), PlayerRecord::named("bob smith")];

        let alignment = matcher
            .align(scraped, source, &ScopeContext::new())
            .await
            .unwrap();
        assert_eq!(alignment.pairs.len(), 2);
        assert!(alignment.pairs.iter().all(|p| !p.key_mapped));
        assert!(alignment.only_scraped.is_empty());
        assert!(alignment.only_source.is_empty());
    }

    #[tokio::test]
    async fn test_rule_assisted_alignment() {
        let matcher = matcher_with(vec![name_mapping("Bob Smith Jr.", "Smith, Bob")]);
        let scraped = vec![PlayerRecord::named("Bob Smith Jr.")];
        let source = vec![PlayerRecord::named("Smith, Bob")];

        let alignment = matcher
            .align(scraped, source, &ScopeContext::new())
            .await
            .unwrap();
        assert_eq!(alignment.pairs.len(), 1);
        assert!(alignment.pairs[0].key_mapped);
        assert!(alignment.only_scraped.is_empty());
        assert!(alignment.only_source.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_become_orphans() {
        let matcher = matcher_with(vec![]);
        let scraped = vec![PlayerRecord::named("Only Scraped")];
        let source = vec![PlayerRecord::named("Only Source")];

        let alignment = matcher
            .align(scraped, source, &ScopeContext::new())
            .await
            .unwrap();
        assert!(alignment.pairs.is_empty());
        assert_eq!(alignment.only_scraped[0].name, "Only Scraped");
        assert_eq!(alignment.only_source[0].name, "Only Source");
    }

    #[tokio::test]
    async fn test_games_align_on_date_only() {
        let matcher = matcher_with(vec![]);
        let scraped = vec![GameRecord::on("2026-01-10"), GameRecord::on("2026-01-17")];
        let source = vec![GameRecord::on("2026-01-10")];

        let alignment = matcher
            .align(scraped, source, &ScopeContext::new())
            .await
            .unwrap();
        assert_eq!(alignment.pairs.len(), 1);
        assert_eq!(alignment.only_scraped.len(), 1);
        assert_eq!(alignment.only_scraped[0].date, "2026-01-17");
    }

    #[tokio::test]
    async fn test_ambiguous_key_first_found_wins() {
        let matcher = matcher_with(vec![]);
        let mut first = PlayerRecord::named("Bob Smith");
        first.jersey = Some("4".to_string());
        let mut second = PlayerRecord::named("Bob Smith");
        second.jersey = Some("12".to_string());

        let alignment = matcher
            .align(
                vec![PlayerRecord::named("Bob Smith")],
                vec![first, second],
                &ScopeContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(alignment.pairs.len(), 1);
        assert_eq!(alignment.pairs[0].source.jersey.as_deref(), Some("4"));
        assert_eq!(alignment.only_source.len(), 1);
    }
}
