//! Shared data model: mapping rules, entity records, comparison results,
//! bulk jobs.

pub mod comparison;
pub mod job;
pub mod record;
pub mod rule;

pub use comparison::{
    ComparisonResult, ComparisonSummary, EntityMatch, FieldDiscrepancy, MissingEntity,
    UnitContext,
};
pub use job::{BulkJob, BulkJobAccepted, JobFilters, JobProgress, JobStatus, UnitResult};
pub use record::{EntityKind, GameRecord, PlayerRecord, Reconcilable};
pub use rule::{
    AppliesTo, ComparisonSource, DiscoveryMetadata, EquivalenceRule, FieldType, HistoryEntry,
    IgnoreRule, MappingRule, MappingType, ModuleKind, RuleAction, RuleDraft, RulePayload,
    RuleScope, SuggestionStatus, ToleranceRule, ToleranceType, TransformFn, TransformationRule,
    UsageStats,
};
