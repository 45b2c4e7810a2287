//! Page-level setup and capture
//!
//! A [`PageSession`] wraps one browser page with the machinery a crawl
//! or setup operation needs: session storage restore, rule directives
//! (request blocking, user-agent override, DOM edits), navigation with a
//! hard timeout, and final HTML/status/storage capture.

use crate::browser::session::BrowserSession;
use crate::browser::storage_state::{OriginState, StorageItem, StorageState};
use crate::browser::{BrowserError, BrowserResult};
use crate::rules::{CsAction, EffectiveRule};
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, EnableParams as NetworkEnableParams, ErrorReason,
    EventResponseReceived, ResourceType, SetCacheDisabledParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Selectors removed by the `cs_block` directive: common paywall
/// curtains, modal backdrops, and scroll locks
const BLOCK_SELECTORS: &[&str] = &[
    "[class*=\"paywall\"]",
    "[id*=\"paywall\"]",
    "[class*=\"subscribe-wall\"]",
    "[class*=\"piano-modal\"]",
    ".tp-modal",
    ".tp-backdrop",
    ".fc-ab-root",
    "[class*=\"reg-gate\"]",
];

/// What a completed navigation produced
#[derive(Debug, Clone)]
pub struct NavigationOutcome {
    pub final_url: String,
    pub status_code: Option<u16>,
    pub html: String,
}

/// One prepared page inside a [`BrowserSession`]
pub struct PageSession {
    page: Page,
    status: Arc<Mutex<Option<u16>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl PageSession {
    /// Opens a blank page and starts observing Document responses so
    /// the navigation status code can be reported
    pub async fn open(session: &BrowserSession) -> BrowserResult<Self> {
        let page = session.new_page().await?;
        page.execute(NetworkEnableParams::default()).await?;

        let status = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&status);
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let status_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(event.response.status as u16);
                    }
                }
            }
        });

        Ok(Self {
            page,
            status,
            tasks: vec![status_task],
        })
    }

    /// Disables script execution for the page (crawls with `js_enabled:
    /// false`)
    pub async fn disable_javascript(&self) -> BrowserResult<()> {
        self.page
            .execute(SetScriptExecutionDisabledParams::new(true))
            .await?;
        Ok(())
    }

    /// Disables the browser cache (`bypass_cache` requests)
    pub async fn disable_cache(&self) -> BrowserResult<()> {
        self.page.execute(SetCacheDisabledParams::new(true)).await?;
        Ok(())
    }

    /// Applies a user-agent override
    pub async fn set_user_agent(&self, user_agent: &str) -> BrowserResult<()> {
        self.page.set_user_agent(user_agent).await?;
        Ok(())
    }

    /// Clears all cookies in the context (rules with `allow_cookies`
    /// unset and no site session)
    pub async fn clear_cookies(&self) -> BrowserResult<()> {
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await?;
        Ok(())
    }

    /// Restores a captured storage snapshot's cookies into the context
    pub async fn apply_storage_state(&self, state: &StorageState) -> BrowserResult<()> {
        let params = state.cookie_params()?;
        if !params.is_empty() {
            self.page.set_cookies(params).await?;
        }
        Ok(())
    }

    /// Starts denying requests the rule blocks, before they leave the
    /// page. Runs until the page session closes.
    pub async fn apply_request_blocking(&mut self, rule: Arc<EffectiveRule>) -> BrowserResult<()> {
        if rule.block_regex.is_none() && rule.block_js_inline.is_none() {
            return Ok(());
        }

        self.page.execute(FetchEnableParams::default()).await?;

        let mut requests = self.page.event_listener::<EventRequestPaused>().await?;
        let page = self.page.clone();
        let blocker = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let url = event.request.url.clone();
                let verdict = if rule.blocks_request(&url) {
                    tracing::debug!(url = %url, "blocked request");
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };

                // The page is gone once commands start failing
                if verdict.is_err() {
                    break;
                }
            }
        });

        self.tasks.push(blocker);
        Ok(())
    }

    /// Navigates and waits for the load to finish, bounded by `timeout`
    pub async fn navigate(
        &self,
        url: &str,
        timeout: Duration,
        settle_delay: Duration,
    ) -> BrowserResult<()> {
        if let Ok(mut guard) = self.status.lock() {
            *guard = None;
        }

        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), BrowserError>(())
        };

        tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| BrowserError::NavigationTimeout(timeout))??;

        if !settle_delay.is_zero() {
            tokio::time::sleep(settle_delay).await;
        }

        Ok(())
    }

    /// Seeds localStorage with captured items (must run on the target
    /// origin; the caller reloads afterwards so page scripts see them)
    pub async fn seed_local_storage(&self, items: &[StorageItem]) -> BrowserResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let pairs: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.name.as_str(), i.value.as_str()))
            .collect();
        let script = format!(
            "(() => {{ for (const [k, v] of {}) localStorage.setItem(k, v); }})()",
            serde_json::to_string(&pairs)?
        );
        self.page.evaluate(script).await?;
        Ok(())
    }

    /// HTTP status of the last Document response, when one was observed
    pub fn last_status(&self) -> Option<u16> {
        self.status.lock().ok().and_then(|guard| *guard)
    }

    /// The page's current URL (after redirects)
    pub async fn current_url(&self) -> BrowserResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    /// Serialized DOM of the loaded page
    pub async fn content(&self) -> BrowserResult<String> {
        Ok(self.page.content().await?)
    }

    /// Captures the final navigation outcome
    pub async fn outcome(&self) -> BrowserResult<NavigationOutcome> {
        Ok(NavigationOutcome {
            final_url: self.current_url().await?,
            status_code: self.last_status(),
            html: self.content().await?,
        })
    }

    /// Applies the rule's post-load DOM directives. Individual edit
    /// failures degrade gracefully; they never fail the operation.
    pub async fn apply_dom_directives(&self, rule: &EffectiveRule) {
        if let Some(css) = &rule.add_style {
            self.eval_logged(
                &format!(
                    "(() => {{ const s = document.createElement('style'); \
                     s.textContent = {}; document.head.appendChild(s); }})()",
                    json_str(css)
                ),
                "add_style",
            )
            .await;
        }

        if rule.amp_unhide {
            self.eval_logged(
                "document.querySelectorAll('[amp-access-hide]')\
                 .forEach(el => el.removeAttribute('amp-access-hide'))",
                "amp_unhide",
            )
            .await;
        }

        if rule.cs_block {
            for selector in BLOCK_SELECTORS {
                self.remove_matching(selector).await;
            }
            self.eval_logged(
                "document.documentElement.style.overflow = 'visible'; \
                 document.body.style.overflow = 'visible'",
                "cs_block scroll unlock",
            )
            .await;
        }

        for edit in &rule.cs_code {
            match edit.act {
                CsAction::Remove => self.remove_matching(&edit.sel).await,
                CsAction::Show => {
                    self.eval_logged(
                        &format!(
                            "document.querySelectorAll({}).forEach(el => {{ \
                             el.style.display = ''; el.style.visibility = 'visible'; \
                             el.removeAttribute('hidden'); }})",
                            json_str(&edit.sel)
                        ),
                        "cs_code show",
                    )
                    .await;
                }
            }
        }
    }

    /// Href of the page's AMP variant, when the rule asks for one and
    /// the document advertises it
    pub async fn find_amp_url(&self, selector: &str) -> Option<String> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             return el && el.href ? el.href : ''; }})()",
            json_str(selector)
        );

        let result = self.page.evaluate(script).await.ok()?;
        let href: String = result
            .value()
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())?;
        (!href.is_empty()).then_some(href)
    }

    /// Captures the context's cookies plus the current origin's
    /// localStorage as a storage snapshot
    pub async fn capture_storage_state(&self) -> BrowserResult<StorageState> {
        let cookies = self.page.get_cookies().await?;
        let mut state = StorageState::from_cookies(cookies);

        let origin_result = self
            .page
            .evaluate(
                "(() => JSON.stringify({origin: location.origin, \
                 items: Object.entries(localStorage)}))()",
            )
            .await;

        if let Ok(result) = origin_result {
            if let Some(raw) = result
                .value()
                .cloned()
                .and_then(|v| serde_json::from_value::<String>(v).ok())
            {
                #[derive(serde::Deserialize)]
                struct OriginDump {
                    origin: String,
                    items: Vec<(String, String)>,
                }

                if let Ok(dump) = serde_json::from_str::<OriginDump>(&raw) {
                    if !dump.items.is_empty() {
                        state.origins.push(OriginState {
                            origin: dump.origin,
                            local_storage: dump
                                .items
                                .into_iter()
                                .map(|(name, value)| StorageItem { name, value })
                                .collect(),
                        });
                    }
                }
            }
        }

        Ok(state)
    }

    /// Closes the page and stops its observer tasks
    pub async fn close(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("failed to close page: {}", e);
        }
    }

    async fn remove_matching(&self, selector: &str) {
        self.eval_logged(
            &format!(
                "document.querySelectorAll({}).forEach(el => el.remove())",
                json_str(selector)
            ),
            "remove selector",
        )
        .await;
    }

    async fn eval_logged(&self, script: &str, what: &str) {
        if let Err(e) = self.page.evaluate(script.to_string()).await {
            tracing::debug!("DOM directive '{}' failed: {}", what, e);
        }
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// JSON string literal for safe embedding into evaluated scripts
fn json_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_str_escapes_quotes() {
        assert_eq!(json_str("a\"b"), r#""a\"b""#);
        assert_eq!(json_str(".paywall"), "\".paywall\"");
    }
}
