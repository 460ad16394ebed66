//! Keyed record store (spec C3 / §3).
//!
//! Persistence is treated as an external collaborator by the specification;
//! `rusqlite` (bundled SQLite) supplies the transactional semantics and
//! CHECK-constraint-enforced singleton rows that `original_source/.../app/models.py`
//! expresses through SQLAlchemy, while the on-disk file location follows the
//! teacher's `config.rs`-derived data directory.

mod schema;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub use schema::SCHEMA;

pub struct VaultMetadataRow {
    pub schema_version: i64,
    pub hint: Option<String>,
    pub argon2_salt: Option<Vec<u8>>,
    pub argon2_memory_cost: Option<u32>,
    pub argon2_time_cost: Option<u32>,
    pub argon2_parallelism: Option<u32>,
    pub pw_verifier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct EntryRow {
    pub id: String,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SettingsRow {
    pub auto_lock_minutes: u32,
    pub clipboard_clear_seconds: u32,
    pub require_reauth_for_copy: bool,
    pub updated_at: DateTime<Utc>,
}

pub struct AuditRow {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub outcome: String,
    pub meta: Option<String>,
}

pub struct ThrottleRow {
    pub failed_attempts: u32,
    pub next_allowed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Wraps a single `rusqlite::Connection` behind a mutex. SQLite serializes
/// writers regardless; the mutex exists so axum's shared `AppState` (cloned
/// across tokio worker threads) can hold the connection behind `&self`
/// without `unsafe`.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction, committing on `Ok`
    /// and rolling back on `Err`, mirroring the original's
    /// session-per-request commit/rollback discipline.
    pub fn transaction<F, T>(&self, f: F) -> rusqlite::Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> rusqlite::Result<T>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub fn get_vault_metadata(&self) -> rusqlite::Result<Option<VaultMetadataRow>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT schema_version, hint, argon2_salt, argon2_memory_cost, argon2_time_cost,
                    argon2_parallelism, pw_verifier, created_at, updated_at
             FROM vault_metadata WHERE id = 1",
            [],
            |row| {
                Ok(VaultMetadataRow {
                    schema_version: row.get(0)?,
                    hint: row.get(1)?,
                    argon2_salt: row.get(2)?,
                    argon2_memory_cost: row.get::<_, Option<i64>>(3)?.map(|v| v as u32),
                    argon2_time_cost: row.get::<_, Option<i64>>(4)?.map(|v| v as u32),
                    argon2_parallelism: row.get::<_, Option<i64>>(5)?.map(|v| v as u32),
                    pw_verifier: row.get(6)?,
                    created_at: parse_ts(row.get::<_, String>(7)?),
                    updated_at: parse_ts(row.get::<_, String>(8)?),
                })
            },
        )
        .optional()
    }

    pub fn put_vault_metadata(&self, tx: &rusqlite::Transaction, row: &VaultMetadataRow) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO vault_metadata
                (id, schema_version, hint, argon2_salt, argon2_memory_cost, argon2_time_cost,
                 argon2_parallelism, pw_verifier, created_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                schema_version = excluded.schema_version,
                hint = excluded.hint,
                argon2_salt = excluded.argon2_salt,
                argon2_memory_cost = excluded.argon2_memory_cost,
                argon2_time_cost = excluded.argon2_time_cost,
                argon2_parallelism = excluded.argon2_parallelism,
                pw_verifier = excluded.pw_verifier,
                updated_at = excluded.updated_at",
            params![
                row.schema_version,
                row.hint,
                row.argon2_salt,
                row.argon2_memory_cost,
                row.argon2_time_cost,
                row.argon2_parallelism,
                row.pw_verifier,
                row.created_at.to_rfc3339(),
                row.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_entry(&self, id: &str) -> rusqlite::Result<Option<EntryRow>> {
        let conn = self.conn.lock().unwrap();
        query_entry(&conn, id)
    }

    /// Same lookup as [`Self::get_entry`], but against an already-open
    /// transaction instead of taking `self.conn`'s lock again — needed by
    /// callers that must re-check a row's state from inside their own
    /// `transaction()` closure.
    pub fn get_entry_in_tx(&self, tx: &rusqlite::Transaction, id: &str) -> rusqlite::Result<Option<EntryRow>> {
        query_entry(tx, id)
    }

    pub fn list_entries(&self) -> rusqlite::Result<Vec<EntryRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, nonce, ciphertext, created_at, updated_at FROM entries ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        rows.collect()
    }

    pub fn put_entry(&self, tx: &rusqlite::Transaction, row: &EntryRow) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO entries (id, nonce, ciphertext, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                nonce = excluded.nonce,
                ciphertext = excluded.ciphertext,
                updated_at = excluded.updated_at",
            params![row.id, row.nonce, row.ciphertext, row.created_at.to_rfc3339(), row.updated_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_entry(&self, tx: &rusqlite::Transaction, id: &str) -> rusqlite::Result<bool> {
        let affected = tx.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn get_settings(&self) -> rusqlite::Result<Option<SettingsRow>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT auto_lock_minutes, clipboard_clear_seconds, require_reauth_for_copy, updated_at
             FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(SettingsRow {
                    auto_lock_minutes: row.get::<_, i64>(0)? as u32,
                    clipboard_clear_seconds: row.get::<_, i64>(1)? as u32,
                    require_reauth_for_copy: row.get::<_, i64>(2)? != 0,
                    updated_at: parse_ts(row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
    }

    pub fn put_settings(&self, tx: &rusqlite::Transaction, row: &SettingsRow) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO settings (id, auto_lock_minutes, clipboard_clear_seconds, require_reauth_for_copy, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                auto_lock_minutes = excluded.auto_lock_minutes,
                clipboard_clear_seconds = excluded.clipboard_clear_seconds,
                require_reauth_for_copy = excluded.require_reauth_for_copy,
                updated_at = excluded.updated_at",
            params![
                row.auto_lock_minutes,
                row.clipboard_clear_seconds,
                row.require_reauth_for_copy as i64,
                row.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_audit(&self, tx: &rusqlite::Transaction, row: &AuditRow) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO audit (id, ts, type, outcome, meta) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.id, row.ts.to_rfc3339(), row.event_type, row.outcome, row.meta],
        )?;
        Ok(())
    }

    pub fn list_audit(&self, limit: u32) -> rusqlite::Result<Vec<AuditRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, ts, type, outcome, meta FROM audit ORDER BY ts DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(AuditRow {
                id: row.get(0)?,
                ts: parse_ts(row.get::<_, String>(1)?),
                event_type: row.get(2)?,
                outcome: row.get(3)?,
                meta: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    pub fn get_throttle(&self) -> rusqlite::Result<ThrottleRow> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT failed_attempts, next_allowed_at, updated_at FROM unlock_throttle WHERE id = 1",
                [],
                |row| {
                    Ok(ThrottleRow {
                        failed_attempts: row.get::<_, i64>(0)? as u32,
                        next_allowed_at: row.get::<_, Option<String>>(1)?.map(parse_ts),
                        updated_at: parse_ts(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(found.unwrap_or_else(|| ThrottleRow {
            failed_attempts: 0,
            next_allowed_at: None,
            updated_at: Utc::now(),
        }))
    }

    pub fn put_throttle(&self, tx: &rusqlite::Transaction, row: &ThrottleRow) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO unlock_throttle (id, failed_attempts, next_allowed_at, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                failed_attempts = excluded.failed_attempts,
                next_allowed_at = excluded.next_allowed_at,
                updated_at = excluded.updated_at",
            params![
                row.failed_attempts,
                row.next_allowed_at.map(|t| t.to_rfc3339()),
                row.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn query_entry(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<EntryRow>> {
    conn.query_row(
        "SELECT id, nonce, ciphertext, created_at, updated_at FROM entries WHERE id = ?1",
        params![id],
        row_to_entry,
    )
    .optional()
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        nonce: row.get(1)?,
        ciphertext: row.get(2)?,
        created_at: parse_ts(row.get::<_, String>(3)?),
        updated_at: parse_ts(row.get::<_, String>(4)?),
    })
}

/// Storage always round-trips RFC 3339 strings written by this module, so a
/// parse failure here indicates on-disk corruption rather than a normal
/// error path; falling back to `now()` keeps row shapes total without
/// panicking.
fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_metadata_roundtrip() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(store.get_vault_metadata().unwrap().is_none());

        let now = Utc::now();
        store
            .transaction(|tx| {
                store.put_vault_metadata(
                    tx,
                    &VaultMetadataRow {
                        schema_version: 1,
                        hint: Some("hint".into()),
                        argon2_salt: Some(vec![0u8; 16]),
                        argon2_memory_cost: Some(65536),
                        argon2_time_cost: Some(3),
                        argon2_parallelism: Some(4),
                        pw_verifier: Some("verifier".into()),
                        created_at: now,
                        updated_at: now,
                    },
                )
            })
            .unwrap();

        let fetched = store.get_vault_metadata().unwrap().unwrap();
        assert_eq!(fetched.hint.as_deref(), Some("hint"));
        assert_eq!(fetched.argon2_salt.unwrap().len(), 16);
    }

    #[test]
    fn entries_crud() {
        let store = RecordStore::open_in_memory().unwrap();
        let now = Utc::now();
        let row = EntryRow {
            id: "00000000-0000-4000-8000-000000000000".into(),
            nonce: vec![1u8; 12],
            ciphertext: vec![2u8; 32],
            created_at: now,
            updated_at: now,
        };
        store.transaction(|tx| store.put_entry(tx, &row)).unwrap();
        assert_eq!(store.list_entries().unwrap().len(), 1);

        let deleted = store.transaction(|tx| store.delete_entry(tx, &row.id)).unwrap();
        assert!(deleted);
        assert!(store.get_entry(&row.id).unwrap().is_none());
    }

    #[test]
    fn throttle_defaults_to_zero_attempts() {
        let store = RecordStore::open_in_memory().unwrap();
        let throttle = store.get_throttle().unwrap();
        assert_eq!(throttle.failed_attempts, 0);
        assert!(throttle.next_allowed_at.is_none());
    }

    #[test]
    fn audit_is_append_only_and_newest_first() {
        let store = RecordStore::open_in_memory().unwrap();
        for i in 0..3 {
            let row = AuditRow {
                id: format!("audit-{i}"),
                ts: Utc::now(),
                event_type: "vault.unlock".into(),
                outcome: "SUCCESS".into(),
                meta: None,
            };
            store.transaction(|tx| store.insert_audit(tx, &row)).unwrap();
        }
        assert_eq!(store.list_audit(10).unwrap().len(), 3);
    }
}
