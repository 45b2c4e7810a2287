//! Bypass rule table: schema, loading, and domain resolution
//!
//! A rule table is a JSON mapping of entry titles to declarative rule
//! entries. An entry applies to a single `domain` or to a `group` of
//! domains, optionally with per-domain `exception` overrides. Resolution
//! produces at most one effective rule per domain; `nofix` entries
//! resolve to nothing (plain pass-through crawl).

mod engine;
mod loader;
mod types;

pub use engine::{normalize_domain, RuleEngine};
pub use loader::{compute_table_hash, load_rules, load_rules_from_str};
pub use types::{CsAction, CsEdit, EffectiveRule, RuleEntry};

use thiserror::Error;

/// Errors raised while loading or validating the rule table
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to read rule table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rule table JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for rule operations
pub type RuleResult<T> = std::result::Result<T, RuleError>;
