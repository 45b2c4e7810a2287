//! The crawl executor

use crate::auth::page_indicates_login;
use crate::browser::{
    BrowserError, BrowserLease, BrowserPool, NavigationOutcome, PageSession, StorageState,
};
use crate::config;
use crate::crawl::{CrawlError, CrawlRequest, CrawlResult, MarkdownFormat};
use crate::markdown::{self, ContentHints};
use crate::rules::{EffectiveRule, RuleEngine};
use crate::session::{SessionStore, SiteProfile, StoreError};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Loads pages under resolved rules and site sessions and converts the
/// captured HTML to Markdown.
///
/// Profiles are read once per request and treated as immutable
/// snapshots, so any number of crawls for the same site may run
/// concurrently; only the rule-driven staleness path writes back
/// (`mark_expired`).
pub struct CrawlExecutor {
    rules: Arc<RuleEngine>,
    store: Arc<dyn SessionStore>,
    pool: Arc<BrowserPool>,
    browser_config: config::BrowserConfig,
    crawl_config: config::CrawlConfig,
    acquire_timeout: Duration,
}

impl CrawlExecutor {
    pub fn new(
        rules: Arc<RuleEngine>,
        store: Arc<dyn SessionStore>,
        pool: Arc<BrowserPool>,
        browser_config: config::BrowserConfig,
        crawl_config: config::CrawlConfig,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            rules,
            store,
            pool,
            browser_config,
            crawl_config,
            acquire_timeout,
        }
    }

    /// Runs a crawl, mapping every failure into a `success: false`
    /// result with a human-readable message
    pub async fn crawl(&self, request: CrawlRequest) -> CrawlResult {
        let url = request.url.clone();
        match self.try_crawl(request).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(url = %url, error = %error, "crawl failed");
                CrawlResult::failure(url, error.status_code(), error.to_string())
            }
        }
    }

    /// Runs a crawl, surfacing the typed failure kind to callers that
    /// branch on it
    pub async fn try_crawl(&self, request: CrawlRequest) -> Result<CrawlResult, CrawlError> {
        let domain = host_of(&request.url)?;
        let rule = self.rules.resolve(&domain);

        // An authenticated crawl needs an Active profile before any
        // navigation is attempted
        let profile = match &request.site_name {
            None => None,
            Some(site_name) => Some(self.usable_profile(site_name)?),
        };

        let storage_state = profile
            .as_ref()
            .and_then(|p| p.storage_state.as_deref())
            .map(StorageState::from_json)
            .transpose()?;

        let lease = self
            .pool
            .acquire(self.acquire_timeout, self.browser_config.headless)
            .await
            .map_err(|e| match e {
                BrowserError::PoolExhausted { capacity, waited } => {
                    CrawlError::PoolExhausted { capacity, waited }
                }
                other => CrawlError::Browser(other),
            })?;

        let result = self
            .run_crawl(
                &request,
                rule.as_ref(),
                profile.as_ref(),
                storage_state.as_ref(),
                &lease,
            )
            .await;

        lease.close().await;
        result
    }

    fn usable_profile(&self, site_name: &str) -> Result<SiteProfile, CrawlError> {
        let profile = match self.store.get(site_name) {
            Ok(profile) => profile,
            Err(StoreError::NotFound(_)) => {
                return Err(CrawlError::SessionNotReady {
                    site_name: site_name.to_string(),
                    status: None,
                })
            }
            Err(other) => return Err(other.into()),
        };

        if !profile.is_crawlable() {
            return Err(CrawlError::SessionNotReady {
                site_name: site_name.to_string(),
                status: Some(profile.status),
            });
        }

        Ok(profile)
    }

    async fn run_crawl(
        &self,
        request: &CrawlRequest,
        rule: Option<&Arc<EffectiveRule>>,
        profile: Option<&SiteProfile>,
        storage_state: Option<&StorageState>,
        lease: &BrowserLease,
    ) -> Result<CrawlResult, CrawlError> {
        let mut page = PageSession::open(lease.session()).await?;

        if !request.js_enabled {
            page.disable_javascript().await?;
        }
        if request.bypass_cache {
            page.disable_cache().await?;
        }

        let user_agent = rule
            .and_then(|r| r.useragent.clone())
            .or_else(|| self.browser_config.user_agent.clone());
        if let Some(user_agent) = user_agent {
            page.set_user_agent(&user_agent).await?;
        }

        if let Some(state) = storage_state {
            page.apply_storage_state(state).await?;
        } else if rule.is_some_and(|r| !r.allow_cookies) {
            page.clear_cookies().await?;
        }

        if let Some(rule) = rule {
            page.apply_request_blocking(Arc::clone(rule)).await?;
        }

        let page_timeout = Duration::from_millis(self.crawl_config.page_timeout);
        let settle = Duration::from_millis(self.crawl_config.settle_delay);

        self.navigate(&page, &request.url, page_timeout, settle)
            .await?;

        // Captured localStorage only takes effect for page scripts after
        // a reload on the owning origin
        if let Some(items) = storage_state.and_then(|s| origin_items(s, &request.url)) {
            page.seed_local_storage(items).await?;
            self.navigate(&page, &request.url, page_timeout, settle)
                .await?;
        }

        // Rules may route the crawl through the page's AMP variant
        if let Some(selector) = rule.and_then(|r| r.amp_redirect.as_deref()) {
            if let Some(amp_url) = page.find_amp_url(selector).await {
                tracing::debug!(url = %amp_url, "following AMP variant");
                self.navigate(&page, &amp_url, page_timeout, settle).await?;
            }
        }

        if let Some(rule) = rule {
            page.apply_dom_directives(rule).await;
        }

        let outcome = page.outcome().await?;
        page.close().await;

        self.check_response(&outcome)?;

        // A page that bounced an Active session back to login must not
        // be returned as content
        if let Some(profile) = profile {
            if page_indicates_login(&outcome.html, &outcome.final_url, &profile.login_url) {
                self.store.mark_expired(&profile.site_name)?;
                return Err(CrawlError::SessionExpired {
                    site_name: profile.site_name.clone(),
                });
            }
        }

        Ok(self.to_result(request, rule, outcome))
    }

    async fn navigate(
        &self,
        page: &PageSession,
        url: &str,
        timeout: Duration,
        settle: Duration,
    ) -> Result<(), CrawlError> {
        page.navigate(url, timeout, settle)
            .await
            .map_err(|e| match e {
                BrowserError::NavigationTimeout(waited) => CrawlError::Navigation {
                    status_code: page.last_status(),
                    message: format!("navigation timed out after {:?}", waited),
                },
                other => CrawlError::Navigation {
                    status_code: page.last_status(),
                    message: other.to_string(),
                },
            })
    }

    /// Non-2xx responses that carried no usable content fail the crawl
    fn check_response(&self, outcome: &NavigationOutcome) -> Result<(), CrawlError> {
        if let Some(status) = outcome.status_code {
            if !(200..300).contains(&status) && !has_visible_text(&outcome.html) {
                return Err(CrawlError::Navigation {
                    status_code: Some(status),
                    message: format!("HTTP {} with no content", status),
                });
            }
        }
        Ok(())
    }

    fn to_result(
        &self,
        request: &CrawlRequest,
        rule: Option<&Arc<EffectiveRule>>,
        outcome: NavigationOutcome,
    ) -> CrawlResult {
        let hints = ContentHints {
            prefer_ld_json: rule.is_some_and(|r| r.ld_json),
            article_selector: rule.and_then(|r| r.ld_archive_is.clone()),
        };

        let output = markdown::convert_with_hints(&outcome.html, &request.markdown, &hints);

        let (raw_markdown, fit_markdown) = match request.format {
            MarkdownFormat::Raw => (output.raw_markdown, String::new()),
            MarkdownFormat::Fit => (String::new(), output.fit_markdown),
            MarkdownFormat::Both => (output.raw_markdown, output.fit_markdown),
        };

        CrawlResult {
            url: request.url.clone(),
            success: true,
            status_code: outcome.status_code,
            raw_markdown,
            fit_markdown,
            title: output.title,
            word_count: output.word_count,
            error_message: output.note,
        }
    }
}

fn host_of(url: &str) -> Result<String, CrawlError> {
    let parsed = Url::parse(url).map_err(|e| CrawlError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| CrawlError::InvalidUrl {
            url: url.to_string(),
            message: "URL has no host".to_string(),
        })
}

fn origin_items<'a>(
    state: &'a StorageState,
    url: &str,
) -> Option<&'a [crate::browser::StorageItem]> {
    let origin = Url::parse(url).ok()?.origin().ascii_serialization();
    state.origin_items(&origin).filter(|items| !items.is_empty())
}

fn has_visible_text(html: &str) -> bool {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .any(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ProfileStatus, SqliteSessionStore};
    use chrono::Utc;

    fn executor_with_store(store: Arc<dyn SessionStore>) -> CrawlExecutor {
        let browser = config::BrowserConfig {
            executable_path: None,
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            user_agent: None,
        };
        CrawlExecutor::new(
            Arc::new(RuleEngine::empty()),
            store,
            Arc::new(BrowserPool::new(browser.clone(), 2)),
            browser,
            config::CrawlConfig {
                page_timeout: 60_000,
                settle_delay: 0,
            },
            Duration::from_secs(5),
        )
    }

    fn profile_with_status(site_name: &str, status: ProfileStatus) -> SiteProfile {
        let mut profile = SiteProfile::pending(
            site_name,
            "https://x.test/login",
            "https://x.test/me",
            Duration::from_secs(300),
        );
        profile.status = status;
        if matches!(status, ProfileStatus::Active | ProfileStatus::Expired) {
            profile.storage_state = Some(r#"{"cookies":[],"origins":[]}"#.to_string());
            profile.last_validated_at = Some(Utc::now());
        }
        profile
    }

    #[tokio::test]
    async fn test_expired_profile_fails_before_navigation() {
        let store = Arc::new(SqliteSessionStore::new_in_memory().unwrap());
        store
            .put(&profile_with_status("site_a", ProfileStatus::Expired))
            .unwrap();

        let executor = executor_with_store(store);
        let mut request = CrawlRequest::new("https://x.test/page");
        request.site_name = Some("site_a".to_string());

        let result = executor.try_crawl(request).await;
        assert!(matches!(
            result,
            Err(CrawlError::SessionNotReady {
                status: Some(ProfileStatus::Expired),
                ..
            })
        ));

        // No navigation happened: the pool never handed out a context
        assert_eq!(executor.pool.available(), 2);
    }

    #[tokio::test]
    async fn test_missing_profile_fails_before_navigation() {
        let store = Arc::new(SqliteSessionStore::new_in_memory().unwrap());
        let executor = executor_with_store(store);

        let mut request = CrawlRequest::new("https://x.test/page");
        request.site_name = Some("never_setup".to_string());

        let result = executor.try_crawl(request).await;
        assert!(matches!(
            result,
            Err(CrawlError::SessionNotReady { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let store = Arc::new(SqliteSessionStore::new_in_memory().unwrap());
        let executor = executor_with_store(store);

        let result = executor.try_crawl(CrawlRequest::new("not a url")).await;
        assert!(matches!(result, Err(CrawlError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_crawl_maps_errors_to_failure_results() {
        let store = Arc::new(SqliteSessionStore::new_in_memory().unwrap());
        let executor = executor_with_store(store);

        let mut request = CrawlRequest::new("https://x.test/page");
        request.site_name = Some("never_setup".to_string());

        let result = executor.crawl(request).await;
        assert!(!result.success);
        assert!(result.raw_markdown.is_empty());
        assert!(result.fit_markdown.is_empty());
        assert!(result
            .error_message
            .as_deref()
            .unwrap_or("")
            .contains("not ready"));
    }

    #[test]
    fn test_has_visible_text() {
        assert!(has_visible_text("<body><p>something</p></body>"));
        assert!(!has_visible_text("<body>   </body>"));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://www.x.test/p").unwrap(), "www.x.test");
        assert!(host_of("nonsense").is_err());
    }
}
