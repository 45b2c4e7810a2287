//! SQLite schema for the session store

use rusqlite::Connection;

/// Creates the session store tables if they do not exist
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS site_profiles (
            site_name         TEXT PRIMARY KEY,
            login_url         TEXT NOT NULL,
            test_url          TEXT NOT NULL,
            status            TEXT NOT NULL,
            storage_state     TEXT,
            created_at        TEXT NOT NULL,
            last_validated_at TEXT,
            setup_timeout_ms  INTEGER NOT NULL
        );
        ",
    )
}
