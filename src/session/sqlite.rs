//! SQLite session store implementation

use crate::session::profile::{ProfileStatus, SiteProfile};
use crate::session::schema::initialize_schema;
use crate::session::traits::{SessionStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// SQLite-backed session store.
///
/// Each `put` is a single upsert statement, so SQLite's write
/// transaction makes it atomic: readers observe the old row or the new
/// one, never a mix. The connection mutex serializes writers; critical
/// sections are short and never held across await points.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Opens (or creates) the store database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (for testing)
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-statement; the store is
        // still structurally sound, so keep serving
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, site_name: &str) -> StoreResult<SiteProfile> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT site_name, login_url, test_url, status, storage_state,
                    created_at, last_validated_at, setup_timeout_ms
             FROM site_profiles WHERE site_name = ?1",
        )?;

        stmt.query_row(params![site_name], row_to_profile)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(site_name.to_string()))
    }

    fn put(&self, profile: &SiteProfile) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO site_profiles
                 (site_name, login_url, test_url, status, storage_state,
                  created_at, last_validated_at, setup_timeout_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(site_name) DO UPDATE SET
                 login_url = excluded.login_url,
                 test_url = excluded.test_url,
                 status = excluded.status,
                 storage_state = excluded.storage_state,
                 created_at = excluded.created_at,
                 last_validated_at = excluded.last_validated_at,
                 setup_timeout_ms = excluded.setup_timeout_ms",
            params![
                profile.site_name,
                profile.login_url,
                profile.test_url,
                profile.status.to_db_string(),
                profile.storage_state,
                profile.created_at.to_rfc3339(),
                profile.last_validated_at.map(|t| t.to_rfc3339()),
                profile.setup_timeout.as_millis() as i64,
            ],
        )?;
        Ok(())
    }

    fn mark_expired(&self, site_name: &str) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE site_profiles SET status = ?1
             WHERE site_name = ?2 AND status = ?3",
            params![
                ProfileStatus::Expired.to_db_string(),
                site_name,
                ProfileStatus::Active.to_db_string(),
            ],
        )?;

        if changed == 0 {
            // Distinguish a missing profile from one already non-Active
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM site_profiles WHERE site_name = ?1",
                    params![site_name],
                    |row| row.get(0),
                )
                .optional()?;

            if exists.is_none() {
                return Err(StoreError::NotFound(site_name.to_string()));
            }
        }

        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<SiteProfile>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT site_name, login_url, test_url, status, storage_state,
                    created_at, last_validated_at, setup_timeout_ms
             FROM site_profiles ORDER BY site_name",
        )?;

        let rows = stmt.query_map([], row_to_profile)?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    fn delete(&self, site_name: &str) -> StoreResult<bool> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM site_profiles WHERE site_name = ?1",
            params![site_name],
        )?;
        Ok(deleted > 0)
    }
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<SiteProfile> {
    let site_name: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let created_at_str: String = row.get(5)?;
    let last_validated_str: Option<String> = row.get(6)?;
    let timeout_ms: i64 = row.get(7)?;

    let status = ProfileStatus::from_db_string(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown profile status '{}'", status_str).into(),
        )
    })?;

    Ok(SiteProfile {
        site_name,
        login_url: row.get(1)?,
        test_url: row.get(2)?,
        status,
        storage_state: row.get(4)?,
        created_at: parse_timestamp(5, &created_at_str)?,
        last_validated_at: last_validated_str
            .map(|s| parse_timestamp(6, &s))
            .transpose()?,
        setup_timeout: Duration::from_millis(timeout_ms.max(0) as u64),
    })
}

fn parse_timestamp(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                e.to_string().into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile(site_name: &str, status: ProfileStatus) -> SiteProfile {
        let mut profile = SiteProfile::pending(
            site_name,
            "https://a.test/login",
            "https://a.test/me",
            Duration::from_secs(300),
        );
        profile.status = status;
        if matches!(status, ProfileStatus::Active | ProfileStatus::Expired) {
            profile.storage_state = Some(r#"{"cookies":[],"origins":[]}"#.to_string());
            profile.last_validated_at = Some(Utc::now());
        }
        profile
    }

    #[test]
    fn test_get_missing_profile_is_not_found() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        assert!(matches!(
            store.get("nobody"),
            Err(StoreError::NotFound(name)) if name == "nobody"
        ));
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        let profile = test_profile("site_a", ProfileStatus::Active);
        store.put(&profile).unwrap();

        let loaded = store.get("site_a").unwrap();
        assert_eq!(loaded.site_name, "site_a");
        assert_eq!(loaded.status, ProfileStatus::Active);
        assert_eq!(loaded.storage_state, profile.storage_state);
        assert_eq!(loaded.setup_timeout, Duration::from_secs(300));
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            profile.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_put_is_an_upsert() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        store
            .put(&test_profile("site_a", ProfileStatus::Pending))
            .unwrap();

        let updated = test_profile("site_a", ProfileStatus::Active);
        store.put(&updated).unwrap();

        let loaded = store.get("site_a").unwrap();
        assert_eq!(loaded.status, ProfileStatus::Active);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_mark_expired_only_downgrades_active() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        store
            .put(&test_profile("active_site", ProfileStatus::Active))
            .unwrap();
        store
            .put(&test_profile("failed_site", ProfileStatus::Failed))
            .unwrap();

        store.mark_expired("active_site").unwrap();
        assert_eq!(
            store.get("active_site").unwrap().status,
            ProfileStatus::Expired
        );

        // Failed stays Failed
        store.mark_expired("failed_site").unwrap();
        assert_eq!(
            store.get("failed_site").unwrap().status,
            ProfileStatus::Failed
        );

        assert!(matches!(
            store.mark_expired("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_expired_profile_keeps_storage_state() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        let profile = test_profile("site_a", ProfileStatus::Active);
        let state = profile.storage_state.clone();
        store.put(&profile).unwrap();

        store.mark_expired("site_a").unwrap();
        let loaded = store.get("site_a").unwrap();
        assert_eq!(loaded.storage_state, state);
        assert!(loaded.storage_state_consistent());
    }

    #[test]
    fn test_list_and_delete() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        store
            .put(&test_profile("beta", ProfileStatus::Pending))
            .unwrap();
        store
            .put(&test_profile("alpha", ProfileStatus::Active))
            .unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|p| p.site_name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        assert!(store.delete("alpha").unwrap());
        assert!(!store.delete("alpha").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_old_or_new_row() {
        use std::sync::Arc;

        let store = Arc::new(SqliteSessionStore::new_in_memory().unwrap());
        store
            .put(&test_profile("site_a", ProfileStatus::Pending))
            .unwrap();

        let writer_store = Arc::clone(&store);
        let writer = std::thread::spawn(move || {
            for _ in 0..50 {
                writer_store
                    .put(&test_profile("site_a", ProfileStatus::Active))
                    .unwrap();
                writer_store
                    .put(&test_profile("site_a", ProfileStatus::Pending))
                    .unwrap();
            }
        });

        for _ in 0..100 {
            let profile = store.get("site_a").unwrap();
            // Either full snapshot, never a mix of the two writes
            match profile.status {
                ProfileStatus::Active => {
                    assert!(profile.storage_state.is_some());
                }
                ProfileStatus::Pending => {
                    assert!(profile.storage_state.is_none());
                }
                other => panic!("unexpected status {other}"),
            }
        }

        writer.join().unwrap();
    }
}
