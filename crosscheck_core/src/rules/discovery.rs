//! Rule auto-discovery: propose equivalence rules from near-miss name
//! pairs left unmatched by a comparison.
//!
//! Suggested rules are created inactive with discovery provenance and only
//! start firing once an operator confirms them.

use super::store::RuleStore;
use crate::error::{ReconError, Result};
use crate::matching::normalize_name;
use crate::models::comparison::ComparisonResult;
use crate::models::rule::{
    DiscoveryMetadata, EquivalenceRule, FieldType, HistoryEntry, MappingRule, RuleAction,
    RulePayload, RuleScope, SuggestionStatus,
};
use chrono::Utc;
use strsim::jaro_winkler;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub struct SuggestionConfig {
    /// Jaro-Winkler floor below which a pair is not worth suggesting.
    pub min_confidence: f64,
    /// Cap per comparison so one noisy roster can't flood the queue.
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.88,
            max_suggestions: 10,
        }
    }
}

/// Scan the missing lists of a roster comparison for likely same-player
/// pairs and store them as pending suggestions. Returns the new rule ids.
pub async fn suggest_name_rules(
    store: &dyn RuleStore,
    result: &ComparisonResult,
    config: &SuggestionConfig,
) -> Result<Vec<Uuid>> {
    let mut scored: Vec<(f64, String, String)> = Vec::new();
    for scraped in &result.missing_in_source {
        if scraped.is_ignored {
            continue;
        }
        for source in &result.missing_in_scraped {
            if source.is_ignored {
                continue;
            }
            let score = jaro_winkler(
                &normalize_name(&scraped.identity),
                &normalize_name(&source.identity),
            );
            if score >= config.min_confidence {
                scored.push((score, scraped.identity.clone(), source.identity.clone()));
            }
        }
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(config.max_suggestions);

    let existing = store.rules_for_field(FieldType::Name, None).await?;
    let mut created = Vec::new();
    for (score, scraped, source) in scored {
        // Same pair already known: bump its occurrence count instead.
        if let Some(prior) = existing.iter().find(|r| covers_pair(r, &scraped, &source)) {
            let mut rule = store.get(prior.id).await?;
            if let Some(meta) = rule.discovery.as_mut() {
                meta.occurrences += 1;
                if !meta.examples.iter().any(|(a, b)| a == &scraped && b == &source) {
                    meta.examples.push((scraped.clone(), source.clone()));
                }
                rule.updated_at = Utc::now();
                store.update(rule).await?;
            }
            continue;
        }

        let mut rule = MappingRule::new(
            FieldType::Name,
            RuleScope::Team {
                team_id: result.team_id.clone(),
            },
            RulePayload::Equivalence(EquivalenceRule {
                primary_value: scraped.clone(),
                equivalents: vec![source.clone()],
                case_sensitive: false,
            }),
        );
        rule.active = false;
        rule.discovery = Some(DiscoveryMetadata {
            confidence: score,
            occurrences: 1,
            examples: vec![(scraped.clone(), source.clone())],
            status: SuggestionStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
        });
        rule.history = vec![HistoryEntry::new(RuleAction::Suggested)
            .with_note(format!("similarity {:.3}", score))];
        info!(
            team = %result.team_id,
            scraped = %scraped,
            source = %source,
            confidence = score,
            "suggesting name mapping"
        );
        created.push(store.insert(rule).await?);
    }
    Ok(created)
}

fn covers_pair(rule: &MappingRule, scraped: &str, source: &str) -> bool {
    if let RulePayload::Equivalence(eq) = &rule.payload {
        let mut values = vec![eq.primary_value.as_str()];
        values.extend(eq.equivalents.iter().map(String::as_str));
        values.iter().any(|v| v.eq_ignore_ascii_case(scraped))
            && values.iter().any(|v| v.eq_ignore_ascii_case(source))
    } else {
        false
    }
}

/// Activate a pending suggestion.
pub async fn confirm_suggestion(
    store: &dyn RuleStore,
    id: Uuid,
    reviewer: Option<&str>,
) -> Result<MappingRule> {
    review(store, id, reviewer, true).await
}

/// Reject a pending suggestion; the rule stays stored for audit but will
/// never resolve.
pub async fn reject_suggestion(
    store: &dyn RuleStore,
    id: Uuid,
    reviewer: Option<&str>,
) -> Result<MappingRule> {
    review(store, id, reviewer, false).await
}

async fn review(
    store: &dyn RuleStore,
    id: Uuid,
    reviewer: Option<&str>,
    accept: bool,
) -> Result<MappingRule> {
    let mut rule = store.get(id).await?;
    let meta = rule
        .discovery
        .as_mut()
        .ok_or_else(|| ReconError::validation("rule was not auto-suggested"))?;
    if meta.status != SuggestionStatus::Pending {
        return Err(ReconError::validation("suggestion already reviewed"));
    }
    meta.status = if accept {
        SuggestionStatus::Confirmed
    } else {
        SuggestionStatus::Rejected
    };
    meta.reviewed_by = reviewer.map(str::to_string);
    meta.reviewed_at = Some(Utc::now());
    rule.active = accept;
    rule.updated_at = Utc::now();
    let mut entry = HistoryEntry::new(if accept {
        RuleAction::Confirmed
    } else {
        RuleAction::Rejected
    });
    if let Some(reviewer) = reviewer {
        entry = entry.with_actor(reviewer);
    }
    rule.history.push(entry);
    store.update(rule.clone()).await?;
    Ok(rule)
}
