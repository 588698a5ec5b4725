//! Crosscheck Core - reconciliation of scraped sports data against an
//! authoritative source.
//!
//! This crate provides:
//! - Scoped mapping rules (equivalence, tolerance, transformation, ignore)
//!   with global/league/sport/team/player override resolution
//! - Field equivalence evaluation with first-decisive-rule semantics
//! - Entity alignment for rosters and schedules across two record sets
//! - Discrepancy building and comparison aggregation
//! - A bulk job orchestrator with bounded batch concurrency, inter-batch
//!   delay, progress events and cooperative cancellation
//! - Postgres-backed stores for rules, jobs and ignored games, plus
//!   in-memory implementations for embedding and tests
//! - Rule auto-discovery from near-miss name pairs

pub mod compare;
pub mod db;
pub mod error;
pub mod ignored;
pub mod jobs;
pub mod matching;
pub mod models;
pub mod redis;
pub mod rules;
pub mod sources;

pub use error::{ReconError, Result};
