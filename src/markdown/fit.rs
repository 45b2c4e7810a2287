//! Content-saliency filtering for fit Markdown
//!
//! The fit variant converts a pruned copy of the document: structural
//! boilerplate regions, class/id-flagged noise, and link-dense
//! containers are dropped before conversion. Pruning only ever removes
//! nodes, so fit output never contains text absent from the page.

use crate::markdown::{convert, ContentHints, MarkdownOptions};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Tags whose whole region is boilerplate
const PRUNE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "noscript", "script", "style", "iframe", "svg",
    "button",
];

/// Elements with no closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Containers eligible for the link-density test
const DENSITY_TAGS: &[&str] = &["div", "section", "ul", "ol", "table", "span"];

/// Class/id fragments that mark a region as noise
fn boilerplate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(navigation|navbar|menu|sidebar|footer|comment|promo|related|share|social|cookie|banner|advert|\bads?\b|ad-|subscribe|newsletter|popup|modal|breadcrumb|masthead)",
        )
        .expect("static boilerplate pattern")
    })
}

/// Produces the fit Markdown variant for a parsed document
pub(crate) fn fit_markdown(
    document: &Html,
    options: &MarkdownOptions,
    hints: &ContentHints,
) -> String {
    if hints.prefer_ld_json {
        if let Some(body) = extract_ld_json_article(document) {
            let wrapped = match options.body_width {
                Some(width) if width > 0 => convert::wrap_markdown(&body, width),
                _ => body,
            };
            return wrapped.trim().to_string();
        }
    }

    let pruned = match hints
        .article_selector
        .as_deref()
        .and_then(|s| Selector::parse(s).ok())
    {
        Some(selector) => {
            let parts: Vec<String> = document.select(&selector).map(render_pruned).collect();
            if parts.is_empty() {
                render_body_pruned(document)
            } else {
                parts.join("\n")
            }
        }
        None => render_body_pruned(document),
    };

    convert::to_markdown(&pruned, options)
}

/// The `articleBody` of the page's JSON-LD metadata, when present
pub fn extract_ld_json_article(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for script in document.select(&selector) {
        let text: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(body) = find_article_body(&value) {
                return Some(body);
            }
        }
    }

    None
}

fn find_article_body(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(body)) = map.get("articleBody") {
                if !body.trim().is_empty() {
                    return Some(body.clone());
                }
            }
            if let Some(graph) = map.get("@graph") {
                return find_article_body(graph);
            }
            None
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_article_body),
        _ => None,
    }
}

fn render_body_pruned(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());

    match body {
        Some(body) => render_pruned(body),
        None => render_pruned(document.root_element()),
    }
}

/// Serializes an element subtree, skipping pruned regions
fn render_pruned(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    emit_element(element, &mut out);
    out
}

fn emit_element(element: ElementRef<'_>, out: &mut String) {
    if should_prune(element) {
        return;
    }

    let value = element.value();
    let tag = value.name();

    out.push('<');
    out.push_str(tag);
    for (name, attr_value) in value.attrs() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(attr_value));
        out.push('"');
    }
    out.push('>');

    if VOID_TAGS.contains(&tag) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    emit_element(child_el, out);
                }
            }
            _ => {}
        }
    }

    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn should_prune(element: ElementRef<'_>) -> bool {
    let value = element.value();
    let tag = value.name();

    if PRUNE_TAGS.contains(&tag) {
        return true;
    }

    let mut markers = String::new();
    if let Some(class) = value.attr("class") {
        markers.push_str(class);
    }
    if let Some(id) = value.attr("id") {
        markers.push(' ');
        markers.push_str(id);
    }
    if !markers.is_empty() && boilerplate_pattern().is_match(&markers) {
        return true;
    }

    if DENSITY_TAGS.contains(&tag) {
        let text_len = text_length(element);
        if text_len > 0 && text_len < 400 {
            let link_len = link_text_length(element);
            if link_len * 10 > text_len * 6 {
                return true;
            }
        }
    }

    false
}

fn text_length(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().len()).sum()
}

fn link_text_length(element: ElementRef<'_>) -> usize {
    let Ok(anchors) = Selector::parse("a") else {
        return 0;
    };
    element
        .select(&anchors)
        .map(|a| a.text().map(|t| t.trim().len()).sum::<usize>())
        .sum()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
