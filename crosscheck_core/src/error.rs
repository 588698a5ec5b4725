//! Error taxonomy for the reconciliation engine.
//!
//! Validation and not-found errors abort the request or unit that raised
//! them. Upstream errors during a bulk unit are captured into that unit's
//! result entry and never abort the whole job. Value-parse failures inside
//! the evaluator are not errors at all; the rule simply does not fire.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// Malformed rule or comparison request, rejected before any work.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown team, module, rule or job id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Authoritative source or scraped-data store unreachable or returned
    /// a malformed response.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ReconError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ReconError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ReconError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        ReconError::Upstream(msg.into())
    }

    /// Short machine-readable tag used in wire replies.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconError::Validation(_) => "validation",
            ReconError::NotFound { .. } => "not_found",
            ReconError::Upstream(_) => "upstream",
            ReconError::Database(_) => "database",
            ReconError::Encoding(_) => "encoding",
        }
    }
}

impl From<reqwest::Error> for ReconError {
    fn from(e: reqwest::Error) -> Self {
        ReconError::Upstream(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
