//! Structural HTML to Markdown conversion

use crate::markdown::MarkdownOptions;
use htmd::{Element, HtmlToMarkdown};
use scraper::{Html, Selector};

/// Tags that never contribute to Markdown output
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "head"];

/// Extracts the document's primary title: `<title>`, else the first
/// `<h1>`, else empty
pub(crate) fn extract_title(document: &Html) -> String {
    for selector in ["title", "h1"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&sel).next() {
            let text: String = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Serialized HTML of the nodes matching `selector`, or `None` when the
/// selector is invalid or matches nothing
pub(crate) fn select_subtree(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let matches: Vec<String> = document.select(&sel).map(|el| el.html()).collect();
    if matches.is_empty() {
        None
    } else {
        Some(matches.join("\n"))
    }
}

/// Converts an HTML fragment to Markdown honoring the request options
pub(crate) fn to_markdown(html: &str, options: &MarkdownOptions) -> String {
    let mut builder = HtmlToMarkdown::builder().skip_tags(SKIP_TAGS.to_vec());

    if options.ignore_links {
        // Keep the anchor text, drop the target
        builder = builder.add_handler(vec!["a"], |el: Element| Some(el.content.to_string()));
    }

    let converter = builder.build();

    let mut markdown = converter.convert(html).unwrap_or_else(|_| {
        // Conversion failure degrades to the fragment's plain text
        Html::parse_fragment(html)
            .root_element()
            .text()
            .collect::<String>()
    });

    if !options.escape_html {
        markdown = unescape_markdown(&markdown);
    }

    if let Some(width) = options.body_width {
        if width > 0 {
            markdown = wrap_markdown(&markdown, width);
        }
    }

    markdown.trim().to_string()
}

/// Strips the backslash escapes the converter adds in front of Markdown
/// punctuation (`escape_html: false`)
fn unescape_markdown(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut chars = markdown.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(next) if next.is_ascii_punctuation() => continue,
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }

    out
}

/// Wraps prose lines at `width` columns without splitting words.
///
/// Fenced code, headings, quotes, tables, and list items keep their
/// original line breaks; only plain paragraph lines re-wrap.
pub fn wrap_markdown(markdown: &str, width: usize) -> String {
    if width == 0 {
        return markdown.to_string();
    }

    let mut out = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }

        if in_fence || line.len() <= width || is_structural_line(trimmed) {
            out.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.len() + 1 + word.len() <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                out.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    out.join("\n")
}

/// Lines whose leading marker carries Markdown structure
fn is_structural_line(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || trimmed.starts_with('>')
        || trimmed.starts_with('|')
        || trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("+ ")
        || trimmed
            .split_once(". ")
            .is_some_and(|(n, _)| n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty())
}
