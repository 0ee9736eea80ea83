use rusqlite::Connection;

use crate::error::Result;

/// Initialise the delivery schema in `conn`.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
/// The `(status, updated_at)` index backs the worker's batch query
/// (pending rows, oldest-stalest first) and the stale-processing scan.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS deliveries (
            id           TEXT NOT NULL PRIMARY KEY,
            user_id      TEXT NOT NULL,
            message_id   TEXT NOT NULL,
            recipient_id TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending',
            last_error   TEXT,               -- capped at 1000 bytes
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_deliveries_status
            ON deliveries (status, updated_at);

        CREATE TABLE IF NOT EXISTS messages (
            id                TEXT NOT NULL PRIMARY KEY,
            user_id           TEXT NOT NULL,
            title             TEXT NOT NULL,
            body_text         TEXT,
            media_key         TEXT,          -- storage key of the attachment
            deliver_at        TEXT,          -- ISO-8601 or NULL
            lifecheck_enabled INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS recipients (
            id    TEXT NOT NULL PRIMARY KEY,
            email TEXT NOT NULL,
            name  TEXT
        ) STRICT;

        CREATE TABLE IF NOT EXISTS lifecheck_settings (
            user_id       TEXT NOT NULL PRIMARY KEY,
            last_ping_at  TEXT,              -- ISO-8601 or NULL
            grace_minutes INTEGER            -- NULL means default policy
        ) STRICT;
        ",
    )?;
    Ok(())
}
