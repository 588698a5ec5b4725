//! Mapping rules: the stored instructions telling the evaluator that two
//! differing raw values should (or should not) be treated as equal.

use crate::error::{ReconError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which authoritative source a comparison runs against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonSource {
    #[default]
    Oracle,
    Api,
    Baseline,
}

impl ComparisonSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonSource::Oracle => "oracle",
            ComparisonSource::Api => "api",
            ComparisonSource::Baseline => "baseline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oracle" => Some(ComparisonSource::Oracle),
            "api" => Some(ComparisonSource::Api),
            "baseline" => Some(ComparisonSource::Baseline),
            _ => None,
        }
    }
}

/// Comparison module: which dataset of a team is being reconciled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Roster,
    Schedule,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Roster => "roster",
            ModuleKind::Schedule => "schedule",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "roster" => Some(ModuleKind::Roster),
            "schedule" => Some(ModuleKind::Schedule),
            _ => None,
        }
    }
}

/// Rule kind. Kept alongside the payload for listings and storage; the
/// payload enum is the source of truth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    Equivalence,
    Tolerance,
    Transformation,
    Ignore,
}

impl MappingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingType::Equivalence => "equivalence",
            MappingType::Tolerance => "tolerance",
            MappingType::Transformation => "transformation",
            MappingType::Ignore => "ignore",
        }
    }
}

/// Fields a rule can govern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Name,
    Position,
    Weight,
    Height,
    Year,
    Eligibility,
    Hometown,
    Jersey,
    Opponent,
    Venue,
    Tv,
    LocationIndicator,
    IsConferenceGame,
    Time,
    Location,
    Custom,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Name => "name",
            FieldType::Position => "position",
            FieldType::Weight => "weight",
            FieldType::Height => "height",
            FieldType::Year => "year",
            FieldType::Eligibility => "eligibility",
            FieldType::Hometown => "hometown",
            FieldType::Jersey => "jersey",
            FieldType::Opponent => "opponent",
            FieldType::Venue => "venue",
            FieldType::Tv => "tv",
            FieldType::LocationIndicator => "locationIndicator",
            FieldType::IsConferenceGame => "isConferenceGame",
            FieldType::Time => "time",
            FieldType::Location => "location",
            FieldType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(FieldType::Name),
            "position" => Some(FieldType::Position),
            "weight" => Some(FieldType::Weight),
            "height" => Some(FieldType::Height),
            "year" => Some(FieldType::Year),
            "eligibility" => Some(FieldType::Eligibility),
            "hometown" => Some(FieldType::Hometown),
            "jersey" => Some(FieldType::Jersey),
            "opponent" => Some(FieldType::Opponent),
            "venue" => Some(FieldType::Venue),
            "tv" => Some(FieldType::Tv),
            "locationIndicator" => Some(FieldType::LocationIndicator),
            "isConferenceGame" => Some(FieldType::IsConferenceGame),
            "time" => Some(FieldType::Time),
            "location" => Some(FieldType::Location),
            "custom" => Some(FieldType::Custom),
            _ => None,
        }
    }
}

/// Rule scope as a tagged variant: each level carries only its legal
/// fields, so an inconsistent scope is unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum RuleScope {
    Global,
    League {
        league: String,
    },
    Sport {
        sport: String,
    },
    Team {
        #[serde(rename = "teamId")]
        team_id: String,
    },
    Player {
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "playerName", default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
    },
}

impl RuleScope {
    /// Narrower scopes win ties: player > team > sport > league > global.
    pub fn specificity(&self) -> u8 {
        match self {
            RuleScope::Global => 0,
            RuleScope::League { .. } => 1,
            RuleScope::Sport { .. } => 2,
            RuleScope::Team { .. } => 3,
            RuleScope::Player { .. } => 4,
        }
    }

    pub fn level_str(&self) -> &'static str {
        match self {
            RuleScope::Global => "global",
            RuleScope::League { .. } => "league",
            RuleScope::Sport { .. } => "sport",
            RuleScope::Team { .. } => "team",
            RuleScope::Player { .. } => "player",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceType {
    #[default]
    Absolute,
    Percentage,
}

/// Enumerated value converters for transformation rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFn {
    FeetInchesToInches,
    InchesToFeetInches,
    PoundsToKilograms,
    KilogramsToPounds,
    DateFormat,
    ClockFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquivalenceRule {
    pub primary_value: String,
    #[serde(default)]
    pub equivalents: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceRule {
    /// 0 means exact numeric equality after parsing.
    #[serde(default)]
    pub tolerance: f64,
    #[serde(default)]
    pub tolerance_type: ToleranceType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationRule {
    pub transform_function: TransformFn,
    /// Opaque converter parameters, e.g. date format strings.
    #[serde(default)]
    pub transform_params: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreRule {
    pub primary_value: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_reason: Option<String>,
}

/// Type-specific rule payload. Serializes as `mappingType` + `rules`,
/// matching the wire contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mappingType", content = "rules", rename_all = "lowercase")]
pub enum RulePayload {
    Equivalence(EquivalenceRule),
    Tolerance(ToleranceRule),
    Transformation(TransformationRule),
    Ignore(IgnoreRule),
}

impl RulePayload {
    pub fn mapping_type(&self) -> MappingType {
        match self {
            RulePayload::Equivalence(_) => MappingType::Equivalence,
            RulePayload::Tolerance(_) => MappingType::Tolerance,
            RulePayload::Transformation(_) => MappingType::Transformation,
            RulePayload::Ignore(_) => MappingType::Ignore,
        }
    }
}

/// Which source pairing a rule is valid for. A baseline is a captured
/// oracle snapshot and consults the oracle flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliesTo {
    pub scraped: bool,
    pub api: bool,
    pub oracle: bool,
}

impl Default for AppliesTo {
    fn default() -> Self {
        Self {
            scraped: true,
            api: true,
            oracle: true,
        }
    }
}

impl AppliesTo {
    pub fn allows(&self, source: ComparisonSource) -> bool {
        if !self.scraped {
            return false;
        }
        match source {
            ComparisonSource::Api => self.api,
            ComparisonSource::Oracle | ComparisonSource::Baseline => self.oracle,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

/// Provenance for auto-suggested rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryMetadata {
    /// Similarity score of the pair that produced the suggestion, 0.0-1.0.
    pub confidence: f64,
    /// How many comparisons surfaced the same pair.
    pub occurrences: u32,
    /// (scraped, source) value pairs observed.
    #[serde(default)]
    pub examples: Vec<(String, String)>,
    #[serde(default)]
    pub status: SuggestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Usage counters mutated every time a rule fires. Best-effort metrics,
/// at-least-once under races.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub times_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    pub successful_matches: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Created,
    Imported,
    Suggested,
    Updated,
    Confirmed,
    Rejected,
    Deactivated,
    Expired,
}

/// Append-only audit trail entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: RuleAction,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HistoryEntry {
    pub fn new(action: RuleAction) -> Self {
        Self {
            action,
            at: Utc::now(),
            actor: None,
            note: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// A stored mapping rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub id: Uuid,
    pub field_type: FieldType,
    /// Required when `field_type` is `Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field: Option<String>,
    pub scope: RuleScope,
    /// Higher wins among equally-scoped candidates.
    #[serde(default)]
    pub priority: i32,
    #[serde(flatten)]
    pub payload: RulePayload,
    #[serde(default)]
    pub applies_to: AppliesTo,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryMetadata>,
    #[serde(default)]
    pub usage: UsageStats,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MappingRule {
    pub fn new(field_type: FieldType, scope: RuleScope, payload: RulePayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            field_type,
            custom_field: None,
            scope,
            priority: 0,
            payload,
            applies_to: AppliesTo::default(),
            active: true,
            discovery: None,
            usage: UsageStats::default(),
            history: vec![HistoryEntry::new(RuleAction::Created)],
            expires_at: None,
            created_at: now,
            updated_at: now,
            notes: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_custom_field(mut self, field: impl Into<String>) -> Self {
        self.custom_field = Some(field.into());
        self
    }

    pub fn with_applies_to(mut self, applies_to: AppliesTo) -> Self {
        self.applies_to = applies_to;
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn mapping_type(&self) -> MappingType {
        self.payload.mapping_type()
    }

    /// Active and not past its expiry instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |at| at > now)
    }

    /// Contract validation, applied before any rule is stored.
    pub fn validate(&self) -> Result<()> {
        if self.field_type == FieldType::Custom
            && self.custom_field.as_deref().map_or(true, str::is_empty)
        {
            return Err(ReconError::validation(
                "fieldType=custom requires a customField",
            ));
        }
        if self.field_type != FieldType::Custom && self.custom_field.is_some() {
            return Err(ReconError::validation(
                "customField is only valid with fieldType=custom",
            ));
        }
        match &self.payload {
            RulePayload::Equivalence(eq) => {
                if eq.primary_value.trim().is_empty() {
                    return Err(ReconError::validation(
                        "equivalence rule requires a primaryValue",
                    ));
                }
            }
            RulePayload::Tolerance(tol) => {
                if !tol.tolerance.is_finite() || tol.tolerance < 0.0 {
                    return Err(ReconError::validation(
                        "tolerance must be a non-negative number",
                    ));
                }
            }
            RulePayload::Transformation(_) => {}
            RulePayload::Ignore(ig) => {
                if ig.primary_value.trim().is_empty() {
                    return Err(ReconError::validation(
                        "ignore rule requires a primaryValue",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Incoming create/update payload for a rule, the contract consumed by the
/// admin surface. Lifecycle metadata is owned by the engine, not the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub field_type: FieldType,
    #[serde(default)]
    pub custom_field: Option<String>,
    pub scope: RuleScope,
    #[serde(default)]
    pub priority: i32,
    #[serde(flatten)]
    pub payload: RulePayload,
    #[serde(default)]
    pub applies_to: AppliesTo,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RuleDraft {
    /// Build and validate a fresh rule from this draft.
    pub fn into_rule(self, action: RuleAction) -> Result<MappingRule> {
        let mut rule = MappingRule::new(self.field_type, self.scope, self.payload);
        rule.custom_field = self.custom_field;
        rule.priority = self.priority;
        rule.applies_to = self.applies_to;
        rule.expires_at = self.expires_at;
        rule.notes = self.notes;
        rule.history = vec![HistoryEntry::new(action)];
        rule.validate()?;
        Ok(rule)
    }

    /// Apply this draft on top of an existing rule, appending an Updated
    /// history entry. Usage stats and discovery provenance are preserved.
    pub fn apply_to(self, mut rule: MappingRule) -> Result<MappingRule> {
        rule.field_type = self.field_type;
        rule.custom_field = self.custom_field;
        rule.scope = self.scope;
        rule.priority = self.priority;
        rule.payload = self.payload;
        rule.applies_to = self.applies_to;
        rule.expires_at = self.expires_at;
        rule.notes = self.notes;
        rule.updated_at = Utc::now();
        rule.history.push(HistoryEntry::new(RuleAction::Updated));
        rule.validate()?;
        Ok(rule)
    }
}
