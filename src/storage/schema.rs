//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Fedi-Ripple database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Known federation servers
CREATE TABLE IF NOT EXISTS instances (
    domain TEXT PRIMARY KEY,
    client_id TEXT,
    client_secret TEXT,
    username TEXT,
    password TEXT,
    discovered_at TEXT NOT NULL
);

-- Known accounts; (username, instance) is the identity, id is instance-local
CREATE TABLE IF NOT EXISTS accounts (
    username TEXT NOT NULL,
    instance TEXT NOT NULL,
    account_id INTEGER,
    local_followers INTEGER NOT NULL DEFAULT 0,
    remote_followers INTEGER NOT NULL DEFAULT 0,
    local_followings INTEGER NOT NULL DEFAULT 0,
    remote_followings INTEGER NOT NULL DEFAULT 0,
    last_scan TEXT,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (username, instance)
);

CREATE INDEX IF NOT EXISTS idx_accounts_instance ON accounts(instance);
CREATE INDEX IF NOT EXISTS idx_accounts_last_scan ON accounts(instance, last_scan);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["instances", "accounts"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
