//! Authenticated session establishment
//!
//! The orchestrator drives the out-of-band login flow: open a visible
//! browser on the site's login page, wait for the login to complete
//! (detected, or a fixed wait), capture the browsing state, validate it
//! against the site's test page, and persist the profile the crawl path
//! later consumes.

mod login;
mod orchestrator;

pub use login::{login_form_present, page_indicates_login};
pub use orchestrator::{AuthSetupOrchestrator, SetupPolicy, SetupRequest};

use crate::browser::BrowserError;
use crate::session::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by setup attempts
#[derive(Debug, Error)]
pub enum SetupError {
    /// Another setup for the same site holds the per-site lock; retry
    /// after it completes
    #[error("Setup already in progress for site '{0}'")]
    SetupInProgress(String),

    #[error("Login did not complete within {0:?}")]
    SetupTimeout(Duration),

    #[error("Session validation failed: {0}")]
    ValidationFailed(String),

    #[error("Could not reach login page: {0}")]
    LoginUnreachable(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// Result type for setup operations
pub type SetupResult<T> = Result<T, SetupError>;
