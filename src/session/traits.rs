//! Session store trait and error types

use crate::session::SiteProfile;
use thiserror::Error;

/// Errors that can occur during session store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No profile for site '{0}'")]
    NotFound(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt profile row for site '{site_name}': {message}")]
    Corrupt { site_name: String, message: String },
}

/// Result type for session store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable per-site profile storage.
///
/// Implementations must make every write atomic from the caller's
/// perspective: a reader concurrent with a writer observes either the
/// old or the new profile, never a mix. `storage_state` is an opaque
/// blob; the store never inspects or mutates its contents.
pub trait SessionStore: Send + Sync {
    /// Fetches the profile for a site
    fn get(&self, site_name: &str) -> StoreResult<SiteProfile>;

    /// Inserts or fully replaces the profile for `profile.site_name`
    fn put(&self, profile: &SiteProfile) -> StoreResult<()>;

    /// Transitions an Active profile to Expired.
    ///
    /// A no-op for profiles in any other status (the session was already
    /// unusable); missing profiles are `NotFound`.
    fn mark_expired(&self, site_name: &str) -> StoreResult<()>;

    /// All stored profiles, ordered by site name
    fn list(&self) -> StoreResult<Vec<SiteProfile>>;

    /// Removes a profile. Returns true when a row was deleted.
    fn delete(&self, site_name: &str) -> StoreResult<bool>;
}
