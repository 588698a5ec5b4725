//! Postgres-backed rule store. Structured columns carry what queries
//! filter on; scope, payload, discovery and history ride as JSON text.

use crate::error::{ReconError, Result};
use crate::models::rule::{
    AppliesTo, DiscoveryMetadata, FieldType, HistoryEntry, MappingRule, RuleAction, RulePayload,
    RuleScope, UsageStats,
};
use crate::rules::store::RuleStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_rule(row: &PgRow) -> Result<MappingRule> {
    let field_type_raw: String = row.try_get("field_type")?;
    let field_type = FieldType::parse(&field_type_raw).ok_or_else(|| {
        ReconError::validation(format!("unknown field type in store: {}", field_type_raw))
    })?;
    let scope: RuleScope = serde_json::from_str(&row.try_get::<String, _>("scope")?)?;
    let payload: RulePayload = serde_json::from_str(&row.try_get::<String, _>("payload")?)?;
    let history: Vec<HistoryEntry> = serde_json::from_str(&row.try_get::<String, _>("history")?)?;
    let discovery: Option<DiscoveryMetadata> = row
        .try_get::<Option<String>, _>("discovery")?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;

    Ok(MappingRule {
        id: row.try_get("id")?,
        field_type,
        custom_field: row.try_get("custom_field")?,
        scope,
        priority: row.try_get("priority")?,
        payload,
        applies_to: AppliesTo {
            scraped: row.try_get("applies_scraped")?,
            api: row.try_get("applies_api")?,
            oracle: row.try_get("applies_oracle")?,
        },
        active: row.try_get("active")?,
        discovery,
        usage: UsageStats {
            times_used: row.try_get::<i64, _>("times_used")? as u64,
            last_used: row.try_get("last_used")?,
            successful_matches: row.try_get::<i64, _>("successful_matches")? as u64,
        },
        history,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        notes: row.try_get("notes")?,
    })
}

const UPSERT_SQL: &str = r#"
    INSERT INTO mapping_rules (
        id, field_type, custom_field, scope, priority, mapping_type, payload,
        applies_scraped, applies_api, applies_oracle, active, discovery,
        times_used, last_used, successful_matches, history, expires_at,
        created_at, updated_at, notes
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
            $13, $14, $15, $16, $17, $18, $19, $20)
    ON CONFLICT (id) DO UPDATE SET
        field_type = EXCLUDED.field_type,
        custom_field = EXCLUDED.custom_field,
        scope = EXCLUDED.scope,
        priority = EXCLUDED.priority,
        mapping_type = EXCLUDED.mapping_type,
        payload = EXCLUDED.payload,
        applies_scraped = EXCLUDED.applies_scraped,
        applies_api = EXCLUDED.applies_api,
        applies_oracle = EXCLUDED.applies_oracle,
        active = EXCLUDED.active,
        discovery = EXCLUDED.discovery,
        history = EXCLUDED.history,
        expires_at = EXCLUDED.expires_at,
        updated_at = EXCLUDED.updated_at,
        notes = EXCLUDED.notes
"#;

async fn upsert(pool: &PgPool, rule: &MappingRule) -> Result<()> {
    sqlx::query(UPSERT_SQL)
        .bind(rule.id)
        .bind(rule.field_type.as_str())
        .bind(&rule.custom_field)
        .bind(serde_json::to_string(&rule.scope)?)
        .bind(rule.priority)
        .bind(rule.mapping_type().as_str())
        .bind(serde_json::to_string(&rule.payload)?)
        .bind(rule.applies_to.scraped)
        .bind(rule.applies_to.api)
        .bind(rule.applies_to.oracle)
        .bind(rule.active)
        .bind(
            rule.discovery
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(rule.usage.times_used as i64)
        .bind(rule.usage.last_used)
        .bind(rule.usage.successful_matches as i64)
        .bind(serde_json::to_string(&rule.history)?)
        .bind(rule.expires_at)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .bind(&rule.notes)
        .execute(pool)
        .await?;
    Ok(())
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn insert(&self, rule: MappingRule) -> Result<Uuid> {
        rule.validate()?;
        upsert(&self.pool, &rule).await?;
        Ok(rule.id)
    }

    async fn update(&self, rule: MappingRule) -> Result<()> {
        rule.validate()?;
        // Existence check keeps update semantics distinct from insert.
        self.get(rule.id).await?;
        upsert(&self.pool, &rule).await
    }

    async fn get(&self, id: Uuid) -> Result<MappingRule> {
        let row = sqlx::query("SELECT * FROM mapping_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ReconError::not_found("rule", id.to_string()))?;
        decode_rule(&row)
    }

    async fn all(&self) -> Result<Vec<MappingRule>> {
        let rows = sqlx::query("SELECT * FROM mapping_rules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_rule).collect()
    }

    async fn rules_for_field(
        &self,
        field: FieldType,
        custom_field: Option<&str>,
    ) -> Result<Vec<MappingRule>> {
        let rows = sqlx::query(
            "SELECT * FROM mapping_rules WHERE field_type = $1 \
             AND ($2::text IS NULL OR custom_field = $2)",
        )
        .bind(field.as_str())
        .bind(if field == FieldType::Custom {
            custom_field
        } else {
            None
        })
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_rule).collect()
    }

    async fn record_usage(&self, id: Uuid, matched: bool) -> Result<()> {
        sqlx::query(
            "UPDATE mapping_rules SET times_used = times_used + 1, \
             last_used = now(), \
             successful_matches = successful_matches + $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(if matched { 1_i64 } else { 0 })
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool, note: Option<&str>) -> Result<()> {
        let mut rule = self.get(id).await?;
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
        upsert(&self.pool, &rule).await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let rows = sqlx::query(
            "SELECT * FROM mapping_rules WHERE active AND expires_at IS NOT NULL \
             AND expires_at <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut swept = 0;
        for row in &rows {
            let mut rule = decode_rule(row)?;
            rule.active = false;
            rule.updated_at = now;
            rule.history.push(HistoryEntry::new(RuleAction::Expired));
            upsert(&self.pool, &rule).await?;
            swept += 1;
        }
        Ok(swept)
    }
}
