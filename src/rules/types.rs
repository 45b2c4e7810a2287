use regex::Regex;
use serde::{Deserialize, Deserializer};

/// One entry of the rule table, bit-exact with the curated JSON format.
///
/// Boolean-ish fields in the curated table are written as `0`/`1`; the
/// deserializer accepts numerals and proper booleans interchangeably.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Domain this entry applies to (entries may instead name a group)
    pub domain: Option<String>,

    /// Domains sharing this entry's defaults
    pub group: Option<Vec<String>>,

    /// Keep existing cookies instead of clearing them before navigation
    #[serde(default, deserialize_with = "flag")]
    pub allow_cookies: bool,

    /// Outgoing requests matching this pattern are denied
    pub block_regex: Option<String>,

    /// Additional request-deny pattern (script resources)
    pub block_js_inline: Option<String>,

    /// User agent override for this domain
    pub useragent: Option<String>,

    /// Remove the built-in overlay/scroll-lock selector set after load
    #[serde(default, deserialize_with = "flag")]
    pub cs_block: bool,

    /// DOM edits: a JSON list of `{"sel": <css>, "act": "rm"|"show"}`,
    /// either inline or embedded as a JSON string
    pub cs_code: Option<serde_json::Value>,

    #[serde(default, deserialize_with = "flag")]
    pub cs_dompurify: bool,

    /// CSS text injected into the page after load
    pub add_style: Option<String>,

    pub add_ext_link: Option<String>,

    pub add_ext_link_type: Option<String>,

    /// Prefer the JSON-LD articleBody as the fit-content source
    #[serde(default, deserialize_with = "flag")]
    pub ld_json: bool,

    /// CSS selector for the article body container
    pub ld_archive_is: Option<String>,

    /// Follow the page's AMP variant before capture; a selector for the
    /// AMP link, or `1` for the standard `link[rel=amphtml]`
    pub amp_redirect: Option<serde_json::Value>,

    /// Strip `amp-access-hide` hiding attributes after load
    #[serde(default, deserialize_with = "flag")]
    pub amp_unhide: bool,

    /// Disable all directives for this domain (resolves to pass-through)
    #[serde(default, deserialize_with = "flag")]
    pub nofix: bool,

    pub upd_version: Option<String>,

    pub upd_version_min: Option<String>,

    /// Per-domain overrides within this entry's group; each exception is
    /// a full entry scoped to one domain and fully replaces the group
    /// defaults for it
    pub exception: Option<Vec<RuleEntry>>,
}

/// Accepts `true`/`false`, `0`, and `1` for boolean-ish table fields
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Num(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Num(n) => Ok(n != 0),
    }
}

/// A single DOM edit from a `cs_code` list
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CsEdit {
    /// CSS selector the edit applies to
    pub sel: String,

    /// What to do with matched elements
    pub act: CsAction,
}

/// Action of a [`CsEdit`]
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum CsAction {
    /// Remove matched elements from the document
    #[serde(rename = "rm")]
    Remove,

    /// Clear `display:none`/`visibility:hidden` on matched elements
    #[serde(rename = "show")]
    Show,
}

/// The resolved, compiled directive set for one domain.
///
/// Produced once at table load; shared read-only between concurrent
/// crawl and setup operations.
#[derive(Debug)]
pub struct EffectiveRule {
    /// Domain the rule was compiled for (normalized)
    pub domain: String,

    pub allow_cookies: bool,
    pub block_regex: Option<Regex>,
    pub block_js_inline: Option<Regex>,
    pub useragent: Option<String>,
    pub cs_block: bool,
    pub cs_code: Vec<CsEdit>,
    pub cs_dompurify: bool,
    pub add_style: Option<String>,
    pub add_ext_link: Option<String>,
    pub add_ext_link_type: Option<String>,
    pub ld_json: bool,
    pub ld_archive_is: Option<String>,
    /// Selector for the AMP variant link, when AMP redirection is on
    pub amp_redirect: Option<String>,
    pub amp_unhide: bool,
}

impl EffectiveRule {
    /// True when the rule denies the given outgoing request URL
    pub fn blocks_request(&self, url: &str) -> bool {
        self.block_regex.as_ref().is_some_and(|re| re.is_match(url))
            || self
                .block_js_inline
                .as_ref()
                .is_some_and(|re| re.is_match(url))
    }

    /// True when the rule carries any post-load DOM work
    pub fn has_dom_directives(&self) -> bool {
        self.cs_block || !self.cs_code.is_empty() || self.add_style.is_some() || self.amp_unhide
    }
}
