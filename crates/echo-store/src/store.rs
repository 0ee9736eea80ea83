use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{instrument, warn};
use uuid::Uuid;

use echo_core::config::LAST_ERROR_MAX_BYTES;

use crate::error::{Result, StoreError};
use crate::types::{Delivery, DeliveryStatus, LifecheckSettings, Message, NewMessage, Recipient};

/// Thread-safe access to the delivery rows.
///
/// Wraps a single SQLite connection in a `Mutex`. Methods are `async`
/// so the dispatch pipeline can await independent lookups jointly, but
/// each method is lock-then-query and never holds the lock across an
/// await point.
///
/// Correctness across overlapping worker runs rests on [`claim`]:
/// an `UPDATE … WHERE status = 'pending'` whose affected-row count
/// decides the race. Everything else is a non-locking snapshot read.
///
/// [`claim`]: DeliveryStore::claim
pub struct DeliveryStore {
    db: Mutex<Connection>,
}

impl DeliveryStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    // ── Worker reads ──────────────────────────────────────────────────────

    /// Fetch up to `limit` deliveries in status `pending`, oldest
    /// `updated_at` first so long-pending items are never starved.
    #[instrument(skip(self))]
    pub async fn fetch_pending(&self, limit: u32) -> Result<Vec<Delivery>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, message_id, recipient_id, status, last_error, updated_at
             FROM deliveries
             WHERE status = 'pending'
             ORDER BY updated_at ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], row_to_delivery)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Retrieve a delivery by ID.
    pub async fn delivery(&self, id: &str) -> Result<Delivery> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, user_id, message_id, recipient_id, status, last_error, updated_at
             FROM deliveries WHERE id = ?1",
            [id],
            row_to_delivery,
        )
        .map_err(|e| not_found_or("delivery", id, e))
    }

    /// Retrieve a message by ID.
    pub async fn message(&self, id: &str) -> Result<Message> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, user_id, title, body_text, media_key, deliver_at, lifecheck_enabled
             FROM messages WHERE id = ?1",
            [id],
            row_to_message,
        )
        .map_err(|e| not_found_or("message", id, e))
    }

    /// Retrieve a recipient by ID.
    pub async fn recipient(&self, id: &str) -> Result<Recipient> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, email, name FROM recipients WHERE id = ?1",
            [id],
            |row| {
                Ok(Recipient {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .map_err(|e| not_found_or("recipient", id, e))
    }

    /// Retrieve a user's lifecheck settings, `None` when no row exists.
    pub async fn lifecheck(&self, user_id: &str) -> Result<Option<LifecheckSettings>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT user_id, last_ping_at, grace_minutes
             FROM lifecheck_settings WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(LifecheckSettings {
                    user_id: row.get(0)?,
                    last_ping_at: row.get(1)?,
                    grace_minutes: row.get(2)?,
                })
            },
        ) {
            Ok(lc) => Ok(Some(lc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// Cheap connectivity/schema probe for the diag endpoint.
    pub async fn probe(&self) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.query_row("SELECT COUNT(id) FROM messages", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(())
    }

    // ── Worker mutations ──────────────────────────────────────────────────

    /// Atomically move a delivery `pending → processing`.
    ///
    /// The status predicate in the WHERE clause is the compare-and-swap:
    /// when another run already claimed the row (or its status changed),
    /// zero rows are affected and `false` is returned — not an error.
    /// A successful claim clears `last_error` and stamps `updated_at`.
    #[instrument(skip(self), fields(delivery_id = %id))]
    pub async fn claim(&self, id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE deliveries
             SET status = 'processing', updated_at = ?1, last_error = NULL
             WHERE id = ?2 AND status = 'pending'",
            rusqlite::params![now, id],
        )?;
        Ok(rows_changed == 1)
    }

    /// Record a successful dispatch, clearing any error text.
    #[instrument(skip(self), fields(delivery_id = %id))]
    pub async fn mark_sent(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE deliveries
             SET status = 'sent', updated_at = ?1, last_error = NULL
             WHERE id = ?2",
            rusqlite::params![now, id],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                entity: "delivery",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Record a failed dispatch with the error text capped at 1000 bytes.
    #[instrument(skip(self, error), fields(delivery_id = %id))]
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let text = truncate_error(error);
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE deliveries
             SET status = 'failed', updated_at = ?1, last_error = ?2
             WHERE id = ?3",
            rusqlite::params![now, text, id],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                entity: "delivery",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Release deliveries stuck in `processing` back to `pending`.
    ///
    /// A crash between claim and terminal update leaves a row orphaned
    /// in `processing`; rows idle longer than `minutes` are made
    /// pickable again by a later run. Returns the number released.
    #[instrument(skip(self))]
    pub async fn release_stale(&self, minutes: i64) -> Result<usize> {
        let now = Utc::now();
        let cutoff = (now - chrono::Duration::minutes(minutes)).to_rfc3339();
        let db = self.db.lock().unwrap();
        let released = db.execute(
            "UPDATE deliveries
             SET status = 'pending', updated_at = ?1
             WHERE status = 'processing' AND updated_at < ?2",
            rusqlite::params![now.to_rfc3339(), cutoff],
        )?;
        if released > 0 {
            warn!(count = released, "stale processing deliveries released");
        }
        Ok(released)
    }

    // ── Compose / check-in flows ──────────────────────────────────────────
    // Row creation lives outside the worker; these are the entry points
    // the compose and check-in surfaces (and the test suites) go through.

    /// Create a message. Returns the fully populated row.
    pub async fn insert_message(&self, new: NewMessage) -> Result<Message> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO messages
             (id, user_id, title, body_text, media_key, deliver_at, lifecheck_enabled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id,
                new.user_id,
                new.title,
                new.body_text,
                new.media_key,
                new.deliver_at,
                new.lifecheck_enabled,
                now
            ],
        )?;
        Ok(Message {
            id,
            user_id: new.user_id,
            title: new.title,
            body_text: new.body_text,
            media_key: new.media_key,
            deliver_at: new.deliver_at,
            lifecheck_enabled: new.lifecheck_enabled,
        })
    }

    /// Create a recipient.
    pub async fn insert_recipient(&self, email: &str, name: Option<&str>) -> Result<Recipient> {
        let id = Uuid::now_v7().to_string();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO recipients (id, email, name) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, email, name],
        )?;
        Ok(Recipient {
            id,
            email: email.to_string(),
            name: name.map(String::from),
        })
    }

    /// Create a pending delivery for a (message, recipient) pair.
    pub async fn insert_delivery(
        &self,
        user_id: &str,
        message_id: &str,
        recipient_id: &str,
    ) -> Result<Delivery> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO deliveries
             (id, user_id, message_id, recipient_id, status, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, ?5)",
            rusqlite::params![id, user_id, message_id, recipient_id, now],
        )?;
        Ok(Delivery {
            id,
            user_id: user_id.to_string(),
            message_id: message_id.to_string(),
            recipient_id: recipient_id.to_string(),
            status: DeliveryStatus::Pending,
            last_error: None,
            updated_at: now,
        })
    }

    /// Upsert a user's lifecheck settings.
    pub async fn set_lifecheck(
        &self,
        user_id: &str,
        last_ping_at: Option<&str>,
        grace_minutes: Option<i64>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO lifecheck_settings (user_id, last_ping_at, grace_minutes)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE
             SET last_ping_at = excluded.last_ping_at,
                 grace_minutes = excluded.grace_minutes",
            rusqlite::params![user_id, last_ping_at, grace_minutes],
        )?;
        Ok(())
    }

    /// Record a user check-in, resetting the inactivity clock.
    pub async fn record_ping(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO lifecheck_settings (user_id, last_ping_at, grace_minutes)
             VALUES (?1, ?2, NULL)
             ON CONFLICT(user_id) DO UPDATE SET last_ping_at = excluded.last_ping_at",
            rusqlite::params![user_id, now],
        )?;
        Ok(())
    }
}

/// Cap error text at `LAST_ERROR_MAX_BYTES`, respecting char boundaries.
fn truncate_error(error: &str) -> &str {
    if error.len() <= LAST_ERROR_MAX_BYTES {
        return error;
    }
    let mut end = LAST_ERROR_MAX_BYTES;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    &error[..end]
}

/// Map a `QueryReturnedNoRows` to `NotFound`, passing other errors through.
fn not_found_or(entity: &'static str, id: &str, e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
            entity,
            id: id.to_string(),
        },
        other => StoreError::Database(other),
    }
}

/// Map a SQLite row to a `Delivery`.
fn row_to_delivery(row: &rusqlite::Row<'_>) -> rusqlite::Result<Delivery> {
    let status_str: String = row.get(4)?;
    // An unknown status string means manual DB surgery; surface the row
    // as failed rather than dropping it silently.
    let status = status_str.parse().unwrap_or(DeliveryStatus::Failed);
    Ok(Delivery {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message_id: row.get(2)?,
        recipient_id: row.get(3)?,
        status,
        last_error: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Map a SQLite row to a `Message`.
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body_text: row.get(3)?,
        media_key: row.get(4)?,
        deliver_at: row.get(5)?,
        lifecheck_enabled: row.get(6)?,
    })
}
