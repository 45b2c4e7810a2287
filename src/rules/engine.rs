use crate::rules::types::EffectiveRule;
use std::collections::HashMap;
use std::sync::Arc;

/// What a domain key maps to in the compiled table
#[derive(Debug)]
pub(crate) enum Resolution {
    /// `nofix` was set: the domain is known but crawls pass through
    Nofix,

    /// A compiled directive set
    Rule(Arc<EffectiveRule>),
}

/// Domain to effective-rule resolution over a loaded table.
///
/// The table is built once at load time and is read-only afterwards, so
/// it is safe to share between tasks without synchronization.
#[derive(Debug)]
pub struct RuleEngine {
    table: HashMap<String, Resolution>,
    table_hash: String,
}

impl RuleEngine {
    pub(crate) fn new(table: HashMap<String, Resolution>, table_hash: String) -> Self {
        Self { table, table_hash }
    }

    /// An engine with no rules; every domain resolves to pass-through
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
            table_hash: String::new(),
        }
    }

    /// Resolves the effective rule for a domain.
    ///
    /// Returns `None` when the domain has no entry or its entry sets
    /// `nofix`; both mean: crawl with no special handling.
    pub fn resolve(&self, domain: &str) -> Option<Arc<EffectiveRule>> {
        match self.table.get(&normalize_domain(domain))? {
            Resolution::Nofix => None,
            Resolution::Rule(rule) => Some(Arc::clone(rule)),
        }
    }

    /// Number of domains with an entry (including `nofix` ones)
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the table has no entries
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// SHA-256 hash of the loaded table content
    pub fn table_hash(&self) -> &str {
        &self.table_hash
    }
}

/// Normalizes a domain for table lookup: lowercase, one leading `www.`
/// label stripped.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_ascii_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => lower,
    }
}
