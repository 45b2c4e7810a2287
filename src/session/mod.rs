//! Durable per-site authentication state
//!
//! This module persists one [`SiteProfile`] per site identity: the
//! serialized browser storage state captured at login time plus lifecycle
//! metadata. The store is the only mutable shared state in the service;
//! all mutation goes through its atomic `put`/`mark_expired` contract.

mod profile;
mod schema;
mod sqlite;
mod traits;

pub use profile::{ProfileStatus, SiteProfile};
pub use sqlite::SqliteSessionStore;
pub use traits::{SessionStore, StoreError, StoreResult};

use std::path::Path;

/// Opens the session store database at the given path
pub fn open_store(path: &Path) -> StoreResult<SqliteSessionStore> {
    SqliteSessionStore::new(path)
}
