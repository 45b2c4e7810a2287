//! HTML to Markdown pipeline
//!
//! Produces two variants from one captured page: `raw_markdown`, a
//! structural conversion of the (optionally selector-restricted)
//! document, and `fit_markdown`, the same conversion after boilerplate
//! pruning: navigation, ads, and link farms stripped so downstream
//! consumers see article content only. The fit variant never contains
//! text absent from the page.

mod convert;
mod fit;

pub use convert::wrap_markdown;
pub use fit::extract_ld_json_article;

use scraper::Html;

/// Options controlling the raw conversion
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Replace links with their text
    pub ignore_links: bool,

    /// Keep Markdown punctuation escapes in converted text
    pub escape_html: bool,

    /// Wrap column for prose lines; `None`/0 disables wrapping
    pub body_width: Option<usize>,

    /// Restrict conversion to this subtree; a selector matching nothing
    /// degrades to the full document (noted, not failed)
    pub css_selector: Option<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            ignore_links: false,
            escape_html: true,
            body_width: None,
            css_selector: None,
        }
    }
}

/// Extraction hints resolved from the domain's bypass rule
#[derive(Debug, Clone, Default)]
pub struct ContentHints {
    /// Prefer the page's JSON-LD `articleBody` as the fit source
    pub prefer_ld_json: bool,

    /// CSS selector of the article body container
    pub article_selector: Option<String>,
}

/// What the pipeline produced for one page
#[derive(Debug, Clone)]
pub struct MarkdownOutput {
    pub raw_markdown: String,
    pub fit_markdown: String,
    pub title: String,
    /// Whitespace-separated tokens of `raw_markdown`
    pub word_count: usize,
    /// Degradation context (e.g. a css_selector that matched nothing)
    pub note: Option<String>,
}

/// Converts captured HTML into both Markdown variants
pub fn convert(html: &str, options: &MarkdownOptions) -> MarkdownOutput {
    convert_with_hints(html, options, &ContentHints::default())
}

/// Converts captured HTML, applying rule-resolved extraction hints
pub fn convert_with_hints(
    html: &str,
    options: &MarkdownOptions,
    hints: &ContentHints,
) -> MarkdownOutput {
    let document = Html::parse_document(html);

    let title = convert::extract_title(&document);

    let (source_html, note) = match options.css_selector.as_deref() {
        None => (html.to_string(), None),
        Some(selector) => match convert::select_subtree(&document, selector) {
            Some(subtree) => (subtree, None),
            None => (
                html.to_string(),
                Some(format!(
                    "css_selector '{}' matched nothing; converted full document",
                    selector
                )),
            ),
        },
    };

    let raw_markdown = convert::to_markdown(&source_html, options);
    let word_count = raw_markdown.split_whitespace().count();

    let fit_markdown = fit::fit_markdown(&document, options, hints);

    MarkdownOutput {
        raw_markdown,
        fit_markdown,
        title,
        word_count,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Sample Article</title></head><body>
        <nav><a href="/a">Home</a> <a href="/b">World</a> <a href="/c">Sports</a></nav>
        <article>
          <h1>Sample Article</h1>
          <p>First paragraph of real content with enough text to keep.</p>
          <p>Second paragraph, also <a href="/ref">worth</a> keeping.</p>
        </article>
        <footer>Copyright notice</footer>
        </body></html>
    "#;

    #[test]
    fn test_convert_produces_both_variants() {
        let output = convert(PAGE, &MarkdownOptions::default());

        assert_eq!(output.title, "Sample Article");
        assert!(output.raw_markdown.contains("First paragraph"));
        assert!(output.fit_markdown.contains("First paragraph"));
        assert!(output.word_count > 0);
        assert!(output.note.is_none());
    }

    #[test]
    fn test_fit_strips_navigation_raw_keeps_it() {
        let output = convert(PAGE, &MarkdownOptions::default());

        assert!(output.raw_markdown.contains("Home"));
        assert!(!output.fit_markdown.contains("Home"));
        assert!(!output.fit_markdown.contains("Copyright"));
    }

    #[test]
    fn test_fit_is_contained_in_page_content() {
        let output = convert(PAGE, &MarkdownOptions::default());

        // Every plain fit word already occurs in the page source
        // (link syntax like `[text](/target)` is skipped as non-plain)
        for word in output.fit_markdown.split_whitespace() {
            let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
            if !bare.is_empty() && bare.chars().all(char::is_alphanumeric) {
                assert!(PAGE.contains(bare), "fit introduced '{}'", bare);
            }
        }
    }

    #[test]
    fn test_css_selector_restricts_conversion() {
        let options = MarkdownOptions {
            css_selector: Some("article".to_string()),
            ..Default::default()
        };
        let output = convert(PAGE, &options);

        assert!(output.raw_markdown.contains("First paragraph"));
        assert!(!output.raw_markdown.contains("Home"));
        assert!(output.note.is_none());
    }

    #[test]
    fn test_missing_selector_degrades_with_note() {
        let options = MarkdownOptions {
            css_selector: Some("#does-not-exist".to_string()),
            ..Default::default()
        };
        let output = convert(PAGE, &options);

        assert!(output.raw_markdown.contains("First paragraph"));
        assert!(output.note.as_deref().unwrap_or("").contains("matched nothing"));
    }

    #[test]
    fn test_ignore_links_drops_targets_keeps_text() {
        let options = MarkdownOptions {
            ignore_links: true,
            ..Default::default()
        };
        let output = convert(PAGE, &options);

        assert!(output.raw_markdown.contains("worth"));
        assert!(!output.raw_markdown.contains("(/ref)"));
    }

    #[test]
    fn test_word_count_matches_raw() {
        let output = convert(PAGE, &MarkdownOptions::default());
        assert_eq!(
            output.word_count,
            output.raw_markdown.split_whitespace().count()
        );
    }

    #[test]
    fn test_empty_document() {
        let output = convert("", &MarkdownOptions::default());
        assert_eq!(output.title, "");
        assert_eq!(output.word_count, 0);
    }
}
