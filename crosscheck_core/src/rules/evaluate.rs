//! Field equivalence evaluation.
//!
//! An exact match (after whitespace normalization) short-circuits without
//! consulting any rules. Otherwise resolved rules are walked in order and
//! the first decisive rule wins; its usage counters are bumped as a
//! side effect. No firing rule means unequal.

use super::convert;
use super::resolver::ScopeContext;
use super::store::RuleStore;
use crate::error::Result;
use crate::matching::fold_case;
use crate::models::rule::{FieldType, MappingRule, RulePayload, ToleranceType};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Identical after whitespace normalization.
    Exact,
    /// Equated by a mapping rule.
    ByRule,
    Unequal,
    /// Covered by an ignore rule; not a discrepancy, not a match.
    Ignored,
}

#[derive(Clone, Copy, Debug)]
pub struct Evaluation {
    pub outcome: FieldOutcome,
    pub fired_rule: Option<Uuid>,
}

impl Evaluation {
    fn exact() -> Self {
        Self {
            outcome: FieldOutcome::Exact,
            fired_rule: None,
        }
    }

    fn unequal() -> Self {
        Self {
            outcome: FieldOutcome::Unequal,
            fired_rule: None,
        }
    }

    fn fired(outcome: FieldOutcome, rule: Uuid) -> Self {
        Self {
            outcome,
            fired_rule: Some(rule),
        }
    }

    /// True for outcomes that count toward equality (exact or mapped).
    pub fn counts_equal(&self) -> bool {
        matches!(self.outcome, FieldOutcome::Exact | FieldOutcome::ByRule)
    }
}

#[derive(Clone)]
pub struct FieldEvaluator {
    store: Arc<dyn RuleStore>,
}

impl FieldEvaluator {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    /// Compare two raw values for one field under the given scope context.
    pub async fn evaluate(
        &self,
        scraped: &str,
        source: &str,
        field: FieldType,
        custom_field: Option<&str>,
        ctx: &ScopeContext,
    ) -> Result<Evaluation> {
        if normalize_ws(scraped) == normalize_ws(source) {
            return Ok(Evaluation::exact());
        }

        let rules = self.store.resolve(field, custom_field, ctx, false).await?;
        for rule in &rules {
            if let Some(outcome) = apply_rule(rule, scraped, source) {
                debug!(
                    rule = %rule.id,
                    field = field.as_str(),
                    ?outcome,
                    "mapping rule fired"
                );
                let matched = outcome == FieldOutcome::ByRule;
                if let Err(e) = self.store.record_usage(rule.id, matched).await {
                    debug!("usage counter update failed: {}", e);
                }
                return Ok(Evaluation::fired(outcome, rule.id));
            }
        }
        Ok(Evaluation::unequal())
    }

    /// Check whether a lone value is covered by an ignore rule for the
    /// given field. Used for entities left unmatched after alignment.
    pub async fn ignored_value(
        &self,
        value: &str,
        field: FieldType,
        ctx: &ScopeContext,
    ) -> Result<Option<String>> {
        let rules = self.store.resolve(field, None, ctx, false).await?;
        for rule in &rules {
            if let RulePayload::Ignore(ig) = &rule.payload {
                let folded = fold_case(value, ig.case_sensitive);
                if folded == fold_case(&ig.primary_value, ig.case_sensitive) {
                    if let Err(e) = self.store.record_usage(rule.id, false).await {
                        debug!("usage counter update failed: {}", e);
                    }
                    return Ok(Some(
                        ig.ignore_reason
                            .clone()
                            .unwrap_or_else(|| "covered by ignore rule".to_string()),
                    ));
                }
            }
        }
        Ok(None)
    }
}

/// Apply one rule to a value pair. None means the rule does not fire,
/// including any parse failure inside tolerance or transformation rules.
pub fn apply_rule(rule: &MappingRule, scraped: &str, source: &str) -> Option<FieldOutcome> {
    match &rule.payload {
        RulePayload::Ignore(ig) => {
            let primary = fold_case(&ig.primary_value, ig.case_sensitive);
            let a = fold_case(scraped, ig.case_sensitive);
            let b = fold_case(source, ig.case_sensitive);
            (a == primary || b == primary).then_some(FieldOutcome::Ignored)
        }
        RulePayload::Equivalence(eq) => {
            let mut set: Vec<String> = Vec::with_capacity(eq.equivalents.len() + 1);
            set.push(fold_case(&eq.primary_value, eq.case_sensitive));
            for v in &eq.equivalents {
                set.push(fold_case(v, eq.case_sensitive));
            }
            let a = fold_case(scraped, eq.case_sensitive);
            let b = fold_case(source, eq.case_sensitive);
            (set.contains(&a) && set.contains(&b)).then_some(FieldOutcome::ByRule)
        }
        RulePayload::Tolerance(tol) => {
            let a = parse_number(scraped)?;
            let b = parse_number(source)?;
            let diff = (a - b).abs();
            let within = match tol.tolerance_type {
                ToleranceType::Absolute => diff <= tol.tolerance,
                ToleranceType::Percentage => {
                    // Denominator is the larger magnitude so neither side
                    // is favored and zero pairs stay well-defined.
                    let denom = a.abs().max(b.abs());
                    if denom == 0.0 {
                        diff == 0.0
                    } else {
                        (diff / denom) * 100.0 <= tol.tolerance
                    }
                }
            };
            within.then_some(FieldOutcome::ByRule)
        }
        RulePayload::Transformation(tr) => {
            let a = normalize_ws(scraped);
            let b = normalize_ws(source);
            let forward = convert::apply(tr.transform_function, &tr.transform_params, scraped)
                .map(|v| normalize_ws(&v) == b);
            if forward == Some(true) {
                return Some(FieldOutcome::ByRule);
            }
            let backward = convert::apply(tr.transform_function, &tr.transform_params, source)
                .map(|v| normalize_ws(&v) == a);
            (backward == Some(true)).then_some(FieldOutcome::ByRule)
        }
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lenient numeric parse: trims, drops thousands separators and a unit
/// suffix ("205 lbs" -> 205.0).
fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().replace(',', "");
    let numeric: String = cleaned
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();
    if numeric.is_empty() {
        return None;
    }
    numeric.parse().ok()
}
