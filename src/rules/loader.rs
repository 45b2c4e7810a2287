use crate::rules::engine::{normalize_domain, Resolution, RuleEngine};
use crate::rules::types::{CsEdit, EffectiveRule, RuleEntry};
use crate::rules::{RuleError, RuleResult};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Default selector for a page's AMP variant link
const AMP_LINK_SELECTOR: &str = "link[rel=\"amphtml\"]";

/// Loads, validates, and compiles a rule table from a JSON file.
///
/// Load is all-or-nothing: any malformed entry rejects the whole table
/// and the engine never starts with a partially-valid one.
pub fn load_rules(path: &Path) -> RuleResult<RuleEngine> {
    let content = std::fs::read_to_string(path)?;
    load_rules_from_str(&content)
}

/// Loads a rule table from JSON text (see [`load_rules`])
pub fn load_rules_from_str(content: &str) -> RuleResult<RuleEngine> {
    // BTreeMap keeps entry iteration deterministic across loads
    let raw: BTreeMap<String, RuleEntry> = serde_json::from_str(content)?;

    let mut table: HashMap<String, Resolution> = HashMap::new();
    // Which top-level entry claimed each domain, for conflict reporting
    let mut claimed: HashMap<String, String> = HashMap::new();

    for (title, entry) in &raw {
        validate_entry(title, entry)?;

        let mut claim = |domain: String,
                         resolution: Resolution,
                         table: &mut HashMap<String, Resolution>|
         -> RuleResult<()> {
            if let Some(other) = claimed.get(&domain) {
                if other != title {
                    return Err(RuleError::Validation(format!(
                        "domain '{}' is claimed by both '{}' and '{}'",
                        domain, other, title
                    )));
                }
            }
            claimed.insert(domain.clone(), title.clone());
            table.insert(domain, resolution);
            Ok(())
        };

        if let Some(domain) = &entry.domain {
            let key = normalize_domain(domain);
            claim(key.clone(), compile_entry(title, entry, &key)?, &mut table)?;
        }

        if let Some(group) = &entry.group {
            for member in group {
                let key = normalize_domain(member);
                claim(key.clone(), compile_entry(title, entry, &key)?, &mut table)?;
            }

            // Exceptions overwrite the group insert for their domain
            if let Some(exceptions) = &entry.exception {
                for exc in exceptions {
                    let domain = exc.domain.as_ref().ok_or_else(|| {
                        RuleError::Validation(format!(
                            "entry '{}': exception without a domain",
                            title
                        ))
                    })?;
                    let key = normalize_domain(domain);
                    claim(key.clone(), compile_entry(title, exc, &key)?, &mut table)?;
                }
            }
        }
    }

    Ok(RuleEngine::new(table, compute_table_hash(content)))
}

/// SHA-256 content hash of the rule table, for logging and versioning
pub fn compute_table_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Structural validation of one entry (and its exceptions)
fn validate_entry(title: &str, entry: &RuleEntry) -> RuleResult<()> {
    if entry.domain.is_none() && entry.group.as_ref().map_or(true, |g| g.is_empty()) {
        return Err(RuleError::Validation(format!(
            "entry '{}' has neither a domain nor a non-empty group",
            title
        )));
    }

    if let Some(domain) = &entry.domain {
        validate_domain_string(title, domain)?;
    }

    if let Some(group) = &entry.group {
        for member in group {
            validate_domain_string(title, member)?;
        }
    }

    if let Some(exceptions) = &entry.exception {
        let members: Vec<String> = entry
            .group
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|m| normalize_domain(m))
            .collect();

        for exc in exceptions {
            let domain = exc.domain.as_ref().ok_or_else(|| {
                RuleError::Validation(format!("entry '{}': exception without a domain", title))
            })?;
            validate_domain_string(title, domain)?;

            if !members.contains(&normalize_domain(domain)) {
                return Err(RuleError::Validation(format!(
                    "entry '{}': exception domain '{}' is not a member of the group",
                    title, domain
                )));
            }

            if exc.group.is_some() || exc.exception.is_some() {
                return Err(RuleError::Validation(format!(
                    "entry '{}': exception '{}' cannot nest a group or further exceptions",
                    title, domain
                )));
            }
        }
    }

    Ok(())
}

/// Validates a bare domain string
fn validate_domain_string(title: &str, domain: &str) -> RuleResult<()> {
    if domain.is_empty() {
        return Err(RuleError::Validation(format!(
            "entry '{}': empty domain",
            title
        )));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(RuleError::Validation(format!(
            "entry '{}': domain '{}' contains invalid characters",
            title, domain
        )));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(RuleError::Validation(format!(
            "entry '{}': malformed domain '{}'",
            title, domain
        )));
    }

    if !domain.contains('.') {
        return Err(RuleError::Validation(format!(
            "entry '{}': domain '{}' must contain at least one dot",
            title, domain
        )));
    }

    Ok(())
}

/// Compiles one entry into its resolution for `domain`
fn compile_entry(title: &str, entry: &RuleEntry, domain: &str) -> RuleResult<Resolution> {
    if entry.nofix {
        return Ok(Resolution::Nofix);
    }

    let block_regex = compile_pattern(title, "block_regex", entry.block_regex.as_deref())?;
    let block_js_inline =
        compile_pattern(title, "block_js_inline", entry.block_js_inline.as_deref())?;
    let cs_code = parse_cs_code(title, entry.cs_code.as_ref())?;
    let amp_redirect = parse_amp_redirect(title, entry.amp_redirect.as_ref())?;

    Ok(Resolution::Rule(Arc::new(EffectiveRule {
        domain: domain.to_string(),
        allow_cookies: entry.allow_cookies,
        block_regex,
        block_js_inline,
        useragent: entry.useragent.clone(),
        cs_block: entry.cs_block,
        cs_code,
        cs_dompurify: entry.cs_dompurify,
        add_style: entry.add_style.clone(),
        add_ext_link: entry.add_ext_link.clone(),
        add_ext_link_type: entry.add_ext_link_type.clone(),
        ld_json: entry.ld_json,
        ld_archive_is: entry.ld_archive_is.clone(),
        amp_redirect,
        amp_unhide: entry.amp_unhide,
    })))
}

fn compile_pattern(title: &str, field: &str, pattern: Option<&str>) -> RuleResult<Option<Regex>> {
    match pattern {
        None => Ok(None),
        Some(p) => Regex::new(p).map(Some).map_err(|e| {
            RuleError::Validation(format!("entry '{}': invalid {}: {}", title, field, e))
        }),
    }
}

/// `cs_code` is a list of edits, inline or embedded as a JSON string
fn parse_cs_code(title: &str, value: Option<&serde_json::Value>) -> RuleResult<Vec<CsEdit>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let parsed: Result<Vec<CsEdit>, serde_json::Error> = match value {
        serde_json::Value::String(embedded) => serde_json::from_str(embedded),
        other => serde_json::from_value(other.clone()),
    };

    parsed.map_err(|e| RuleError::Validation(format!("entry '{}': malformed cs_code: {}", title, e)))
}

/// `amp_redirect` is a selector string, or a truthy numeral meaning the
/// standard AMP link selector
fn parse_amp_redirect(
    title: &str,
    value: Option<&serde_json::Value>,
) -> RuleResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(serde_json::Value::String(sel)) if !sel.is_empty() => Ok(Some(sel.clone())),
        Some(serde_json::Value::Number(n)) => {
            if n.as_i64() == Some(0) {
                Ok(None)
            } else {
                Ok(Some(AMP_LINK_SELECTOR.to_string()))
            }
        }
        Some(serde_json::Value::Bool(b)) => Ok(b.then(|| AMP_LINK_SELECTOR.to_string())),
        Some(other) => Err(RuleError::Validation(format!(
            "entry '{}': amp_redirect must be a selector or flag, got {}",
            title, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::CsAction;

    #[test]
    fn test_entry_without_domain_or_group_rejected() {
        let result = load_rules_from_str(r#"{"Broken": {"useragent": "X"}}"#);
        assert!(matches!(result, Err(RuleError::Validation(_))));
    }

    #[test]
    fn test_exception_outside_group_rejected() {
        let result = load_rules_from_str(
            r#"{"Publisher": {
                "group": ["a.test"],
                "exception": [{"domain": "outsider.test"}]
            }}"#,
        );
        assert!(matches!(result, Err(RuleError::Validation(_))));
    }

    #[test]
    fn test_invalid_block_regex_rejected() {
        let result =
            load_rules_from_str(r#"{"Bad": {"domain": "a.test", "block_regex": "(unclosed"}}"#);
        assert!(matches!(result, Err(RuleError::Validation(_))));
    }

    #[test]
    fn test_malformed_cs_code_rejected() {
        let result = load_rules_from_str(
            r#"{"Bad": {"domain": "a.test", "cs_code": [{"sel": ".x", "act": "explode"}]}}"#,
        );
        assert!(matches!(result, Err(RuleError::Validation(_))));
    }

    #[test]
    fn test_load_is_all_or_nothing() {
        // One good entry, one bad: nothing loads
        let result = load_rules_from_str(
            r#"{
                "Good": {"domain": "good.test"},
                "Bad": {"useragent": "no domain or group"}
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_domain_claim_rejected() {
        let result = load_rules_from_str(
            r#"{
                "One": {"domain": "dup.test"},
                "Two": {"group": ["dup.test", "other.test"]}
            }"#,
        );
        assert!(matches!(result, Err(RuleError::Validation(_))));
    }

    #[test]
    fn test_cs_code_embedded_as_string() {
        let engine = load_rules_from_str(
            r#"{"Site": {"domain": "a.test", "cs_code": "[{\"sel\": \".gate\", \"act\": \"rm\"}]"}}"#,
        )
        .unwrap();

        let rule = engine.resolve("a.test").unwrap();
        assert_eq!(rule.cs_code.len(), 1);
        assert_eq!(rule.cs_code[0].sel, ".gate");
        assert_eq!(rule.cs_code[0].act, CsAction::Remove);
    }

    #[test]
    fn test_amp_redirect_forms() {
        let engine = load_rules_from_str(
            r#"{
                "Flag": {"domain": "flag.test", "amp_redirect": 1},
                "Sel": {"domain": "sel.test", "amp_redirect": "link.amp-variant"},
                "Off": {"domain": "off.test", "amp_redirect": 0}
            }"#,
        )
        .unwrap();

        assert_eq!(
            engine.resolve("flag.test").unwrap().amp_redirect.as_deref(),
            Some(AMP_LINK_SELECTOR)
        );
        assert_eq!(
            engine.resolve("sel.test").unwrap().amp_redirect.as_deref(),
            Some("link.amp-variant")
        );
        assert!(engine.resolve("off.test").unwrap().amp_redirect.is_none());
    }

    #[test]
    fn test_table_hash_stability() {
        let content = r#"{"Site": {"domain": "a.test"}}"#;
        assert_eq!(compute_table_hash(content), compute_table_hash(content));
        assert_eq!(compute_table_hash(content).len(), 64);

        let engine = load_rules_from_str(content).unwrap();
        assert_eq!(engine.table_hash(), compute_table_hash(content));
    }

    #[test]
    fn test_version_metadata_accepted() {
        let engine = load_rules_from_str(
            r#"{"Site": {"domain": "a.test", "upd_version": "4.1.2", "upd_version_min": "3.0"}}"#,
        )
        .unwrap();
        assert_eq!(engine.len(), 1);
    }
}
