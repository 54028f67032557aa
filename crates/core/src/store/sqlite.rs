//! SQLite-backed production state store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{Channel, PassRecord, PassStatus, ProductionStore, StatusCounts, StoreError};

const PASS_COLUMNS: &str = "p.id, p.ticket_id, t.ticket_tailor_id, t.purchaser_email, p.status, \
     p.produced_at, p.delivered_at, p.error_message, p.metadata, p.created_at, p.updated_at";

/// SQLite-backed production store.
///
/// `mark_produced` takes the database write lock up front (`BEGIN IMMEDIATE`),
/// so processes sharing the file serialize on it.
pub struct SqliteProductionStore {
    conn: Mutex<Connection>,
}

impl SqliteProductionStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                ticket_tailor_id TEXT NOT NULL UNIQUE,
                purchaser_email TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ticket_passes (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                produced_at TEXT,
                delivered_at TEXT,
                error_message TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ticket_passes_ticket_channel
                ON ticket_passes(ticket_id, channel);
            CREATE INDEX IF NOT EXISTS idx_ticket_passes_status ON ticket_passes(status);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_record(channel: Channel, row: &rusqlite::Row) -> rusqlite::Result<PassRecord> {
        let status: String = row.get(4)?;
        let produced_at: Option<String> = row.get(5)?;
        let delivered_at: Option<String> = row.get(6)?;
        let metadata: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(PassRecord {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            ticket_tailor_id: row.get(2)?,
            purchaser_email: row.get(3)?,
            channel,
            status: PassStatus::parse(&status).unwrap_or(PassStatus::Pending),
            produced_at: produced_at.as_deref().and_then(parse_timestamp),
            delivered_at: delivered_at.as_deref().and_then(parse_timestamp),
            error_message: row.get(7)?,
            metadata: serde_json::from_str(&metadata)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
        })
    }

    /// Look up the pass row ID and its current metadata for (ticket, channel).
    fn find_pass(
        conn: &Connection,
        channel: Channel,
        ticket_tailor_id: &str,
    ) -> Result<(String, serde_json::Value), StoreError> {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT p.id, p.metadata FROM ticket_passes p
                 JOIN tickets t ON t.id = p.ticket_id
                 WHERE t.ticket_tailor_id = ? AND p.channel = ?",
                params![ticket_tailor_id, channel.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (id, metadata) = row.ok_or_else(|| StoreError::NotFound {
            channel,
            ticket_id: ticket_tailor_id.to_string(),
        })?;
        let metadata = serde_json::from_str(&metadata)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
        Ok((id, metadata))
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn require(name: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{} is required", name)));
    }
    Ok(())
}

/// Shallow-merge `patch` into `base`. Non-object patches replace `base`.
fn merge_metadata(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base.as_object_mut(), patch) {
        (Some(base), serde_json::Value::Object(patch)) => {
            for (k, v) in patch {
                base.insert(k, v);
            }
        }
        (_, serde_json::Value::Null) => {}
        (_, patch) => *base = patch,
    }
}

impl ProductionStore for SqliteProductionStore {
    fn list_produced(&self, channel: Channel) -> Result<HashMap<String, PassRecord>, StoreError> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {} FROM ticket_passes p
             JOIN tickets t ON t.id = p.ticket_id
             WHERE p.channel = ? AND p.status IN (?, ?)",
            PASS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                channel.as_str(),
                PassStatus::Produced.as_str(),
                PassStatus::Sent.as_str()
            ],
            |row| Self::row_to_record(channel, row),
        )?;

        let mut produced = HashMap::new();
        for row in rows {
            let record = row?;
            produced.insert(record.ticket_tailor_id.clone(), record);
        }

        debug!(channel = %channel, count = produced.len(), "Loaded produced set");
        Ok(produced)
    }

    fn mark_produced(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        purchaser_email: &str,
        produced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        require("ticket id", ticket_tailor_id)?;
        require("purchaser email", purchaser_email)?;
        if produced_at.timestamp() <= 0 {
            return Err(StoreError::InvalidInput(
                "produced_at must be set".to_string(),
            ));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now().to_rfc3339();

        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT id, purchaser_email FROM tickets WHERE ticket_tailor_id = ?",
                params![ticket_tailor_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let ticket_id = match existing {
            Some((id, email)) => {
                if email != purchaser_email {
                    tx.execute(
                        "UPDATE tickets SET purchaser_email = ?, updated_at = ? WHERE id = ?",
                        params![purchaser_email, now, id],
                    )?;
                }
                id
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO tickets (id, ticket_tailor_id, purchaser_email, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                    params![id, ticket_tailor_id, purchaser_email, now, now],
                )?;
                id
            }
        };

        let pass_id: Option<String> = tx
            .query_row(
                "SELECT id FROM ticket_passes WHERE ticket_id = ? AND channel = ?",
                params![ticket_id, channel.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let produced_at = produced_at.to_rfc3339();
        match pass_id {
            Some(id) => {
                tx.execute(
                    "UPDATE ticket_passes
                     SET status = ?, produced_at = ?, error_message = NULL, updated_at = ?
                     WHERE id = ?",
                    params![PassStatus::Produced.as_str(), produced_at, now, id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO ticket_passes
                     (id, ticket_id, channel, status, produced_at, metadata, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, '{}', ?, ?)",
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        ticket_id,
                        channel.as_str(),
                        PassStatus::Produced.as_str(),
                        produced_at,
                        now,
                        now
                    ],
                )?;
            }
        }

        tx.commit()?;
        debug!(channel = %channel, ticket_id = ticket_tailor_id, "Marked pass produced");
        Ok(())
    }

    fn record_delivery(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        delivered_at: Option<DateTime<Utc>>,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError> {
        require("ticket id", ticket_tailor_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (pass_id, mut merged) = Self::find_pass(&tx, channel, ticket_tailor_id)?;
        merge_metadata(&mut merged, metadata);
        let now = Utc::now().to_rfc3339();

        match delivered_at {
            Some(at) => {
                tx.execute(
                    "UPDATE ticket_passes
                     SET status = ?, delivered_at = ?, metadata = ?, error_message = NULL, updated_at = ?
                     WHERE id = ?",
                    params![
                        PassStatus::Sent.as_str(),
                        at.to_rfc3339(),
                        merged.to_string(),
                        now,
                        pass_id
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "UPDATE ticket_passes SET metadata = ?, updated_at = ? WHERE id = ?",
                    params![merged.to_string(), now, pass_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn mark_failed(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        require("ticket id", ticket_tailor_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (pass_id, _) = Self::find_pass(&tx, channel, ticket_tailor_id)?;

        tx.execute(
            "UPDATE ticket_passes SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
            params![
                PassStatus::Failed.as_str(),
                message,
                Utc::now().to_rfc3339(),
                pass_id
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_pass(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
    ) -> Result<Option<PassRecord>, StoreError> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {} FROM ticket_passes p
             JOIN tickets t ON t.id = p.ticket_id
             WHERE t.ticket_tailor_id = ? AND p.channel = ?",
            PASS_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![ticket_tailor_id, channel.as_str()], |row| {
                Self::row_to_record(channel, row)
            })
            .optional()?;

        Ok(record)
    }

    fn count_by_status(&self, channel: Channel) -> Result<StatusCounts, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM ticket_passes WHERE channel = ? GROUP BY status",
        )?;
        let rows = stmt.query_map(params![channel.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            let count = count.max(0) as u64;
            match PassStatus::parse(&status) {
                Some(PassStatus::Pending) => counts.pending += count,
                Some(PassStatus::Produced) => counts.produced += count,
                Some(PassStatus::Sent) => counts.sent += count,
                Some(PassStatus::Failed) => counts.failed += count,
                None => {}
            }
        }

        Ok(counts)
    }
}
