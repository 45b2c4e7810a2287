//! Bounded browser context pool
//!
//! A global semaphore caps how many browser contexts exist at once.
//! Callers wait for a slot up to their own deadline; expiry reports
//! [`BrowserError::PoolExhausted`] instead of spawning past the cap.

use crate::browser::session::BrowserSession;
use crate::browser::{BrowserError, BrowserResult};
use crate::config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of browser contexts
pub struct BrowserPool {
    permits: Arc<Semaphore>,
    capacity: u32,
    settings: config::BrowserConfig,
}

impl BrowserPool {
    /// Creates a pool capped at `capacity` simultaneous contexts
    pub fn new(settings: config::BrowserConfig, capacity: u32) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
            settings,
        }
    }

    /// Waits up to `deadline` for a free slot, then launches a context.
    ///
    /// The launched context is bound to the returned lease; dropping or
    /// closing the lease frees the slot.
    pub async fn acquire(&self, deadline: Duration, headless: bool) -> BrowserResult<BrowserLease> {
        let permit = tokio::time::timeout(deadline, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| BrowserError::PoolExhausted {
                capacity: self.capacity,
                waited: deadline,
            })?
            .map_err(|_| BrowserError::Config("context pool is closed".to_string()))?;

        let session = BrowserSession::launch(&self.settings, headless).await?;

        Ok(BrowserLease {
            session: Some(session),
            _permit: permit,
        })
    }

    /// Pool capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// A pool slot bound to one live browser context
pub struct BrowserLease {
    session: Option<BrowserSession>,
    _permit: OwnedSemaphorePermit,
}

impl BrowserLease {
    /// The leased browser context
    pub fn session(&self) -> &BrowserSession {
        // The option is only vacated by close(), which consumes the lease
        self.session.as_ref().expect("lease already closed")
    }

    /// Closes the context and frees the slot
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}
