//! Login/paywall gate detection
//!
//! Two questions, both answered from a page's final URL and HTML: "is
//! this a login form?" (used to poll for login completion during setup)
//! and "does this page indicate we are logged out?" (used to validate a
//! captured session and to detect staleness at crawl time).

use scraper::{Html, Selector};
use url::Url;

/// Keywords that mark a page as a login gate
const LOGIN_KEYWORDS: &[&str] = &["login", "sign in", "signin"];

/// Markers only present for signed-in users
const SIGNED_IN_MARKERS: &[&str] = &["logout", "sign out", "account", "profile"];

/// True when the document contains a password form
pub fn login_form_present(html: &str) -> bool {
    let document = Html::parse_document(html);

    let Ok(password_input) = Selector::parse(r#"input[type="password"]"#) else {
        return false;
    };

    document.select(&password_input).next().is_some()
}

/// True when a loaded page exhibits the site's login indicator: the
/// browser was redirected onto the login URL, or the page carries a
/// password form plus login keywords without any signed-in marker.
pub fn page_indicates_login(html: &str, final_url: &str, login_url: &str) -> bool {
    if redirected_to_login(final_url, login_url) {
        return true;
    }

    if !login_form_present(html) {
        return false;
    }

    let lower = html.to_lowercase();
    let has_login_keyword = LOGIN_KEYWORDS.iter().any(|k| lower.contains(k));
    let has_signed_in_marker = SIGNED_IN_MARKERS.iter().any(|m| lower.contains(m));

    has_login_keyword && !has_signed_in_marker
}

/// True when `final_url` landed on the login page (same host, path at
/// or under the login path)
fn redirected_to_login(final_url: &str, login_url: &str) -> bool {
    match (Url::parse(final_url), Url::parse(login_url)) {
        (Ok(actual), Ok(login)) => {
            actual.host_str() == login.host_str()
                && actual.path().trim_end_matches('/') == login.path().trim_end_matches('/')
        }
        // Unparseable URLs fall back to a textual comparison
        _ => !final_url.is_empty() && final_url == login_url,
    }
}
