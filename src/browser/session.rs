//! Browser context lifecycle
//!
//! One [`BrowserSession`] is one launched Chromium context: the process,
//! its CDP event handler task, and the pages opened in it. Sessions are
//! launched per operation and closed when the operation completes or is
//! cancelled; they are never shared between operations.

use crate::browser::{BrowserError, BrowserResult};
use crate::config;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Environment variable overriding the configured browser executable
const EXECUTABLE_ENV: &str = "CHROMIUM_EXECUTABLE_PATH";

/// A live browser context and its CDP event pump
pub struct BrowserSession {
    browser: Option<Browser>,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launches a fresh browser context.
    ///
    /// `headless` is decided per operation: crawls run headless, setup
    /// opens a visible window by default so a human can log in.
    pub async fn launch(settings: &config::BrowserConfig, headless: bool) -> BrowserResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height);

        if !headless {
            builder = builder.with_head();
        }

        if let Some(executable) = resolve_executable(settings) {
            builder = builder.chrome_executable(executable);
        }

        let browser_config = builder.build().map_err(BrowserError::Config)?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;

        // The handler stream must be pumped for the whole context
        // lifetime or every CDP call stalls
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::debug!(headless, "launched browser context");

        Ok(Self {
            browser: Some(browser),
            handler_task,
        })
    }

    /// Opens a blank page in this context
    pub async fn new_page(&self) -> BrowserResult<Page> {
        Ok(self.browser().new_page("about:blank").await?)
    }

    /// Closes the context and stops the event pump
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("failed to close browser context: {}", e);
            }
            // Drain until the process exits so no zombie is left behind
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
    }

    fn browser(&self) -> &Browser {
        // Only vacated by close()/drop, which consume the session
        self.browser.as_ref().expect("browser session already closed")
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // close() is the normal path; this covers cancellation (e.g. a
        // setup timeout dropping the in-flight future), where the
        // context must still be torn down and the event pump stopped
        if let Some(mut browser) = self.browser.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = browser.kill().await;
                });
            }
        }
        self.handler_task.abort();
    }
}

/// Executable resolution order: environment variable, then the service
/// configuration, then the browser library's own detection (None).
fn resolve_executable(settings: &config::BrowserConfig) -> Option<String> {
    if let Ok(path) = std::env::var(EXECUTABLE_ENV) {
        if !path.is_empty() {
            return Some(path);
        }
    }

    settings.executable_path.clone()
}
