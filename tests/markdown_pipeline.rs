//! Integration tests for the Markdown pipeline
//!
//! Exercises the conversion contract over realistic page fixtures: both
//! variants, containment of fit in the page content, selector
//! degradation, and the interaction with rule-driven blocking.

use gatecrawl::markdown::{convert, convert_with_hints, ContentHints, MarkdownOptions};
use gatecrawl::rules::load_rules_from_str;

const ARTICLE_PAGE: &str = r#"
<html>
<head>
  <title>Quarterly Water Report</title>
  <script src="https://ads.example.com/loader.js"></script>
  <script>document.write('INJECTED PROMO TEXT');</script>
</head>
<body>
  <nav class="top-navigation">
    <a href="/">Front</a> <a href="/local">Local</a> <a href="/world">World</a>
  </nav>
  <article>
    <h1>Quarterly Water Report</h1>
    <p>Reservoir levels rose for the third consecutive quarter, the
       utility said on Monday, citing heavier than expected rainfall.</p>
    <p>Officials cautioned that <a href="/conservation">conservation
       rules</a> remain in effect through the summer.</p>
    <pre><code>usage --by-quarter --format=csv</code></pre>
  </article>
  <div class="related-stories">
    <a href="/a">More</a> <a href="/b">Stories</a> <a href="/c">Here</a>
  </div>
  <footer class="site-footer">All rights reserved.</footer>
</body>
</html>
"#;

#[test]
fn test_both_variants_and_title() {
    let output = convert(ARTICLE_PAGE, &MarkdownOptions::default());

    assert_eq!(output.title, "Quarterly Water Report");
    assert!(output.raw_markdown.contains("Reservoir levels rose"));
    assert!(output.fit_markdown.contains("Reservoir levels rose"));
    assert_eq!(
        output.word_count,
        output.raw_markdown.split_whitespace().count()
    );
}

#[test]
fn test_script_text_never_reaches_markdown() {
    // Scripts are not executed and not converted, so neither variant
    // carries text a blocked ad script would have injected
    let output = convert(ARTICLE_PAGE, &MarkdownOptions::default());

    assert!(!output.raw_markdown.contains("INJECTED PROMO TEXT"));
    assert!(!output.fit_markdown.contains("INJECTED PROMO TEXT"));
}

#[test]
fn test_rule_blocks_the_ad_request_itself() {
    let engine = load_rules_from_str(
        r#"{"Example": {"domain": "example.com", "block_regex": "ads\\.example\\.com"}}"#,
    )
    .unwrap();

    let rule = engine.resolve("example.com").unwrap();
    assert!(rule.blocks_request("https://ads.example.com/loader.js"));
    assert!(!rule.blocks_request("https://cdn.example.com/styles.css"));
}

#[test]
fn test_fit_strips_boilerplate_regions() {
    let output = convert(ARTICLE_PAGE, &MarkdownOptions::default());

    // Raw keeps everything the page shows
    assert!(output.raw_markdown.contains("Front"));
    assert!(output.raw_markdown.contains("All rights reserved."));

    // Fit drops navigation, link farms, and the footer
    assert!(!output.fit_markdown.contains("Front"));
    assert!(!output.fit_markdown.contains("More"));
    assert!(!output.fit_markdown.contains("All rights reserved."));
}

#[test]
fn test_fit_words_are_contained_in_the_page() {
    let output = convert(ARTICLE_PAGE, &MarkdownOptions::default());

    for word in output.fit_markdown.split_whitespace() {
        let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
        if !bare.is_empty() && bare.chars().all(char::is_alphanumeric) {
            assert!(
                ARTICLE_PAGE.contains(bare),
                "fit introduced text absent from the page: '{}'",
                bare
            );
        }
    }
}

#[test]
fn test_css_selector_restriction_and_fallback() {
    let restricted = convert(
        ARTICLE_PAGE,
        &MarkdownOptions {
            css_selector: Some("article".to_string()),
            ..Default::default()
        },
    );
    assert!(restricted.raw_markdown.contains("Reservoir levels"));
    assert!(!restricted.raw_markdown.contains("Front"));
    assert!(restricted.note.is_none());

    let fallback = convert(
        ARTICLE_PAGE,
        &MarkdownOptions {
            css_selector: Some("#missing-container".to_string()),
            ..Default::default()
        },
    );
    // Degrades to the full document with a note, not a failure
    assert!(fallback.raw_markdown.contains("Reservoir levels"));
    assert!(fallback
        .note
        .as_deref()
        .unwrap_or("")
        .contains("matched nothing"));
}

#[test]
fn test_body_width_wraps_prose_only() {
    let output = convert(
        ARTICLE_PAGE,
        &MarkdownOptions {
            body_width: Some(40),
            ..Default::default()
        },
    );

    for line in output.raw_markdown.lines() {
        let trimmed = line.trim_start();
        let structural = trimmed.starts_with('#')
            || trimmed.starts_with('|')
            || trimmed.starts_with('>')
            || trimmed.starts_with("```")
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ");
        if !structural && line.contains(' ') {
            assert!(line.len() <= 40, "unwrapped prose line: '{}'", line);
        }
    }
}

#[test]
fn test_ld_json_hint_prefers_metadata_body() {
    let gated_page = r#"
    <html><head>
      <title>Gated Story</title>
      <script type="application/ld+json">
        {"@type": "NewsArticle",
         "articleBody": "The complete story text lives in the metadata."}
      </script>
    </head>
    <body><p>Subscribe to keep reading.</p></body></html>
    "#;

    let hints = ContentHints {
        prefer_ld_json: true,
        article_selector: None,
    };
    let output = convert_with_hints(gated_page, &MarkdownOptions::default(), &hints);

    assert!(output
        .fit_markdown
        .contains("The complete story text lives in the metadata."));
    // The raw variant still reflects the DOM as served
    assert!(output.raw_markdown.contains("Subscribe to keep reading."));
}
