//! Browser automation: context pool, page sessions, storage snapshots
//!
//! Every crawl or setup operation acquires a lease from the bounded
//! [`BrowserPool`], drives a fresh browser context through it, and
//! releases the slot when the lease drops. Rule directives (request
//! blocking, user-agent overrides, DOM edits) and session storage state
//! are applied at the page level.

mod page;
mod pool;
mod session;
mod storage_state;

pub use page::{NavigationOutcome, PageSession};
pub use pool::{BrowserLease, BrowserPool};
pub use session::BrowserSession;
pub use storage_state::{OriginState, StorageItem, StorageState, StoredCookie};

use std::time::Duration;
use thiserror::Error;

/// Errors raised by browser automation
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to configure browser: {0}")]
    Config(String),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("Context pool exhausted: no slot freed within {waited:?} (capacity {capacity})")]
    PoolExhausted { capacity: u32, waited: Duration },

    #[error("Storage state error: {0}")]
    StorageState(#[from] serde_json::Error),
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;
