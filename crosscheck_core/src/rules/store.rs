//! Rule storage. The trait is the seam between the engine and persistence;
//! the in-memory implementation backs tests and embedded use, the Postgres
//! implementation lives in `db::rules`.

use super::resolver::{self, ScopeContext};
use crate::error::{ReconError, Result};
use crate::models::rule::{FieldType, HistoryEntry, MappingRule, RuleAction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn insert(&self, rule: MappingRule) -> Result<Uuid>;

    /// Whole-row update. Callers append the relevant history entry before
    /// calling.
    async fn update(&self, rule: MappingRule) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<MappingRule>;

    async fn all(&self) -> Result<Vec<MappingRule>>;

    /// Candidates for one field, unsorted and unscoped. `custom_field` is
    /// matched only when `field` is `Custom`.
    async fn rules_for_field(
        &self,
        field: FieldType,
        custom_field: Option<&str>,
    ) -> Result<Vec<MappingRule>>;

    /// Best-effort usage counter bump when a rule fires. Lost updates
    /// under races are acceptable.
    async fn record_usage(&self, id: Uuid, matched: bool) -> Result<()>;

    /// Deactivate or reactivate, appending an audit entry. Rules are never
    /// hard-deleted mid-job.
    async fn set_active(&self, id: Uuid, active: bool, note: Option<&str>) -> Result<()>;

    /// Deactivate every rule whose expiry instant has passed. Returns the
    /// number of rules swept.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Resolve the ordered applicable rules for one comparison.
    async fn resolve(
        &self,
        field: FieldType,
        custom_field: Option<&str>,
        ctx: &ScopeContext,
        include_inactive: bool,
    ) -> Result<Vec<MappingRule>> {
        let candidates = self.rules_for_field(field, custom_field).await?;
        Ok(resolver::resolve(candidates, ctx, include_inactive, Utc::now()))
    }
}

/// Map-backed store. Read-mostly; a single RwLock is plenty for the
/// concurrent read load of a bulk job.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<HashMap<Uuid, MappingRule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<MappingRule>) -> Self {
        let store = Self::new();
        {
            let mut map = store.rules.write();
            for rule in rules {
                map.insert(rule.id, rule);
            }
        }
        store
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn insert(&self, rule: MappingRule) -> Result<Uuid> {
        rule.validate()?;
        let id = rule.id;
        self.rules.write().insert(id, rule);
        Ok(id)
    }

    async fn update(&self, rule: MappingRule) -> Result<()> {
        rule.validate()?;
        let mut map = self.rules.write();
        if !map.contains_key(&rule.id) {
            return Err(ReconError::not_found("rule", rule.id.to_string()));
        }
        map.insert(rule.id, rule);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<MappingRule> {
        self.rules
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ReconError::not_found("rule", id.to_string()))
    }

    async fn all(&self) -> Result<Vec<MappingRule>> {
        Ok(self.rules.read().values().cloned().collect())
    }

    async fn rules_for_field(
        &self,
        field: FieldType,
        custom_field: Option<&str>,
    ) -> Result<Vec<MappingRule>> {
        Ok(self
            .rules
            .read()
            .values()
            .filter(|r| r.field_type == field)
            .filter(|r| {
                field != FieldType::Custom || r.custom_field.as_deref() == custom_field
            })
            .cloned()
            .collect())
    }

    async fn record_usage(&self, id: Uuid, matched: bool) -> Result<()> {
        if let Some(rule) = self.rules.write().get_mut(&id) {
            rule.usage.times_used += 1;
            rule.usage.last_used = Some(Utc::now());
            if matched {
                rule.usage.successful_matches += 1;
            }
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool, note: Option<&str>) -> Result<()> {
        let mut map = self.rules.write();
        let rule = map
            .get_mut(&id)
            .ok_or_else(|| ReconError::not_found("rule", id.to_string()))?;
        rule.active = active;
        rule.updated_at = Utc::now();
        let mut entry = HistoryEntry::new(if active {
            RuleAction::Updated
        } else {
            RuleAction::Deactivated
        });
        if let Some(note) = note {
            entry = entry.with_note(note);
        }
        rule.history.push(entry);
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut swept = 0;
        let mut map = self.rules.write();
        for rule in map.values_mut() {
            if rule.active && rule.expires_at.map_or(false, |at| at <= now) {
                rule.active = false;
                rule.updated_at = now;
                rule.history.push(HistoryEntry::new(RuleAction::Expired));
                swept += 1;
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::{EquivalenceRule, RulePayload, RuleScope};

    fn name_rule() -> MappingRule {
        MappingRule::new(
            FieldType::Name,
            RuleScope::Global,
            RulePayload::Equivalence(EquivalenceRule {
                primary_value: "a".to_string(),
                equivalents: vec!["b".to_string()],
                case_sensitive: false,
            }),
        )
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let store = InMemoryRuleStore::new();
        let rule = name_rule();
        let id = store.insert(rule).await.unwrap();
        let loaded = store.get(id).await.unwrap();
        assert_eq!(loaded.field_type, FieldType::Name);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = InMemoryRuleStore::new();
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_usage_recording() {
        let store = InMemoryRuleStore::new();
        let id = store.insert(name_rule()).await.unwrap();
        store.record_usage(id, true).await.unwrap();
        store.record_usage(id, false).await.unwrap();
        let rule = store.get(id).await.unwrap();
        assert_eq!(rule.usage.times_used, 2);
        assert_eq!(rule.usage.successful_matches, 1);
        assert!(rule.usage.last_used.is_some());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = InMemoryRuleStore::new();
        let now = Utc::now();
        let live = name_rule();
        let expired = name_rule().with_expiry(now - chrono::Duration::minutes(5));
        store.insert(live).await.unwrap();
        let expired_id = store.insert(expired).await.unwrap();

        let swept = store.sweep_expired(now).await.unwrap();
        assert_eq!(swept, 1);
        let rule = store.get(expired_id).await.unwrap();
        assert!(!rule.active);
        assert!(matches!(
            rule.history.last().unwrap().action,
            RuleAction::Expired
        ));

        // Sweeping again finds nothing new.
        assert_eq!(store.sweep_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_field_filtering() {
        let store = InMemoryRuleStore::new();
        let mut rule = name_rule();
        rule.field_type = FieldType::Custom;
        rule.custom_field = Some("gpa".to_string());
        store.insert(rule).await.unwrap();

        let hits = store
            .rules_for_field(FieldType::Custom, Some("gpa"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let misses = store
            .rules_for_field(FieldType::Custom, Some("era"))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }
}
