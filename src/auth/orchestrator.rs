//! Setup orchestration: login flow, validation, persistence

use crate::auth::login::page_indicates_login;
use crate::auth::{login, SetupError, SetupResult};
use crate::browser::{BrowserPool, PageSession, StorageState};
use crate::config;
use crate::rules::RuleEngine;
use crate::session::{ProfileStatus, SessionStore, SiteProfile};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One setup attempt's parameters
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub site_name: String,
    pub login_url: String,
    pub test_url: String,

    /// Hard upper bound for the whole attempt
    pub setup_timeout: Duration,

    pub policy: SetupPolicy,
}

/// How the orchestrator decides the login has completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPolicy {
    /// Poll until the password form is gone and the browser has
    /// navigated off the login page
    WaitForLogin,

    /// Wait a fixed duration, then capture whatever state exists
    SimpleWait { wait_time: Duration },
}

/// An attempt failure plus any state captured before it failed
struct AttemptFailure {
    error: SetupError,
    diagnostic_state: Option<String>,
}

impl From<crate::browser::BrowserError> for AttemptFailure {
    fn from(error: crate::browser::BrowserError) -> Self {
        Self {
            error: SetupError::Browser(error),
            diagnostic_state: None,
        }
    }
}

/// Drives login flows and owns the per-site setup locks.
///
/// Operations on different sites run independently; a second `setup`
/// for a site whose attempt is still running is rejected with
/// [`SetupError::SetupInProgress`].
pub struct AuthSetupOrchestrator {
    store: Arc<dyn SessionStore>,
    rules: Arc<RuleEngine>,
    pool: Arc<BrowserPool>,
    setup_config: config::SetupConfig,
    crawl_config: config::CrawlConfig,
    acquire_timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AuthSetupOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        rules: Arc<RuleEngine>,
        pool: Arc<BrowserPool>,
        setup_config: config::SetupConfig,
        crawl_config: config::CrawlConfig,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            store,
            rules,
            pool,
            setup_config,
            crawl_config,
            acquire_timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Establishes (or refreshes) the session for a site.
    ///
    /// Protocol: lock the site, mark the profile Pending, drive the
    /// login flow under `setup_timeout`, validate against `test_url`,
    /// and persist the outcome (Active or Failed). The lock is released
    /// on every path, including timeout.
    pub async fn setup(&self, request: SetupRequest) -> SetupResult<SiteProfile> {
        let lock = self.lock_for(&request.site_name);
        let _guard = lock
            .try_lock_owned()
            .map_err(|_| SetupError::SetupInProgress(request.site_name.clone()))?;

        tracing::info!(site = %request.site_name, policy = ?request.policy, "starting setup");

        // Re-setup overwrites, but the profile's creation time survives
        let created_at = self
            .store
            .get(&request.site_name)
            .ok()
            .map(|existing| existing.created_at);

        let mut profile = SiteProfile::pending(
            &request.site_name,
            &request.login_url,
            &request.test_url,
            request.setup_timeout,
        );
        if let Some(created_at) = created_at {
            profile.created_at = created_at;
        }
        self.store.put(&profile)?;

        let attempt = tokio::time::timeout(request.setup_timeout, self.run_attempt(&request)).await;

        match attempt {
            Err(_elapsed) => {
                profile.status = ProfileStatus::Failed;
                self.store.put(&profile)?;
                tracing::warn!(site = %request.site_name, "setup timed out");
                Err(SetupError::SetupTimeout(request.setup_timeout))
            }
            Ok(Err(failure)) => {
                profile.status = ProfileStatus::Failed;
                profile.storage_state = failure.diagnostic_state;
                self.store.put(&profile)?;
                tracing::warn!(site = %request.site_name, error = %failure.error, "setup failed");
                Err(failure.error)
            }
            Ok(Ok(storage_state)) => {
                profile.status = ProfileStatus::Active;
                profile.storage_state = Some(storage_state);
                profile.last_validated_at = Some(Utc::now());
                self.store.put(&profile)?;
                tracing::info!(site = %request.site_name, "setup succeeded, session active");
                Ok(profile)
            }
        }
    }

    /// The fixed-duration setup variant
    pub async fn setup_simple_wait(
        &self,
        site_name: &str,
        login_url: &str,
        test_url: &str,
        wait_time: Duration,
    ) -> SetupResult<SiteProfile> {
        // The fixed wait still respects a hard upper bound
        let setup_timeout =
            wait_time + Duration::from_secs(self.setup_config.default_timeout.max(1));

        self.setup(SetupRequest {
            site_name: site_name.to_string(),
            login_url: login_url.to_string(),
            test_url: test_url.to_string(),
            setup_timeout,
            policy: SetupPolicy::SimpleWait { wait_time },
        })
        .await
    }

    /// The browser phase: login, capture, validate. Bounded by the
    /// caller's timeout wrapper; cancellation drops the lease, which
    /// tears down the context.
    async fn run_attempt(&self, request: &SetupRequest) -> Result<String, AttemptFailure> {
        let lease = self
            .pool
            .acquire(self.acquire_timeout, self.setup_config.headless)
            .await?;

        let result = self.drive_login(request, &lease).await;

        lease.close().await;
        result
    }

    async fn drive_login(
        &self,
        request: &SetupRequest,
        lease: &crate::browser::BrowserLease,
    ) -> Result<String, AttemptFailure> {
        let page = PageSession::open(lease.session()).await?;

        let page_timeout = Duration::from_millis(self.crawl_config.page_timeout);
        let settle = Duration::from_millis(self.crawl_config.settle_delay);

        page.navigate(&request.login_url, page_timeout, settle)
            .await
            .map_err(|e| AttemptFailure {
                error: SetupError::LoginUnreachable(e.to_string()),
                diagnostic_state: None,
            })?;

        match request.policy {
            SetupPolicy::SimpleWait { wait_time } => {
                tracing::info!(wait = ?wait_time, "waiting for manual login (simple wait)");
                tokio::time::sleep(wait_time).await;
            }
            SetupPolicy::WaitForLogin => {
                tracing::info!("waiting for manual login (completion detection)");
                self.wait_for_login_completion(&page, &request.login_url)
                    .await?;
            }
        }

        let state = page.capture_storage_state().await?;
        let state_json = state.to_json()?;
        page.close().await;

        self.validate_session(request, lease, &state, state_json)
            .await
    }

    /// Polls until the login completion signal: password form gone and
    /// the browser navigated off the login page
    async fn wait_for_login_completion(
        &self,
        page: &PageSession,
        login_url: &str,
    ) -> Result<(), AttemptFailure> {
        let interval = Duration::from_millis(self.setup_config.poll_interval);

        loop {
            tokio::time::sleep(interval).await;

            let html = page.content().await?;
            let current = page.current_url().await?;

            let still_gated =
                login::login_form_present(&html) || page_indicates_login(&html, &current, login_url);
            if !still_gated {
                return Ok(());
            }
        }
    }

    /// Loads `test_url` in a fresh page under the captured state and the
    /// domain's rule; the captured session is valid iff the page does
    /// not exhibit the login indicator
    async fn validate_session(
        &self,
        request: &SetupRequest,
        lease: &crate::browser::BrowserLease,
        state: &StorageState,
        state_json: String,
    ) -> Result<String, AttemptFailure> {
        let mut page = PageSession::open(lease.session()).await.map_err(|e| {
            AttemptFailure {
                error: e.into(),
                diagnostic_state: Some(state_json.clone()),
            }
        })?;

        let rule = url::Url::parse(&request.test_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .and_then(|host| self.rules.resolve(&host));

        let validation = async {
            page.apply_storage_state(state).await?;

            if let Some(rule) = &rule {
                if let Some(user_agent) = &rule.useragent {
                    page.set_user_agent(user_agent).await?;
                }
                page.apply_request_blocking(Arc::clone(rule)).await?;
            }

            let page_timeout = Duration::from_millis(self.crawl_config.page_timeout);
            let settle = Duration::from_millis(self.crawl_config.settle_delay);
            page.navigate(&request.test_url, page_timeout, settle)
                .await?;

            if let Some(rule) = &rule {
                page.apply_dom_directives(rule).await;
            }

            let html = page.content().await?;
            let final_url = page.current_url().await?;
            Ok::<(String, String), crate::browser::BrowserError>((html, final_url))
        }
        .await;

        let outcome = match validation {
            Err(e) => Err(AttemptFailure {
                error: SetupError::ValidationFailed(format!(
                    "could not load test page: {}",
                    e
                )),
                diagnostic_state: Some(state_json.clone()),
            }),
            Ok((html, final_url)) => {
                if page_indicates_login(&html, &final_url, &request.login_url) {
                    Err(AttemptFailure {
                        error: SetupError::ValidationFailed(
                            "test page still shows the login indicator".to_string(),
                        ),
                        diagnostic_state: Some(state_json.clone()),
                    })
                } else {
                    Ok(state_json)
                }
            }
        };

        page.close().await;
        outcome
    }

    /// The lazily created per-site lock; handles are shared, never
    /// removed, so a site's lock identity is stable for the process
    /// lifetime
    fn lock_for(&self, site_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(site_name.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}
