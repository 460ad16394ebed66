//! Audit writer (spec C9 / §4.9).
//!
//! Grounded on `original_source/.../app/audit.py` for the sanitize-then-append
//! semantics; persistence goes through [`crate::store`] rather than a
//! SQLAlchemy session.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::{AuditRow, RecordStore};

const FORBIDDEN_HINTS: [&str; 5] = ["password", "secret", "token", "key", "master"];

/// A scalar-or-null meta value, the tagged-value representation spec.md §9
/// calls for in place of an open-ended dynamic JSON map.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

pub type Meta = BTreeMap<String, MetaValue>;

/// Drops any key whose lowercase form contains a forbidden hint, and
/// collapses an empty map to `None`.
fn sanitize(meta: Option<Meta>) -> Option<String> {
    let meta = meta?;
    let filtered: BTreeMap<String, MetaValue> = meta
        .into_iter()
        .filter(|(key, _)| {
            let lowered = key.to_lowercase();
            !FORBIDDEN_HINTS.iter().any(|hint| lowered.contains(hint))
        })
        .collect();

    if filtered.is_empty() {
        return None;
    }

    serde_json::to_string(&filtered).ok()
}

/// Appends an audit record inside the caller's transaction.
pub fn write(
    tx: &rusqlite::Transaction,
    store: &RecordStore,
    event_type: &str,
    outcome: &str,
    meta: Option<Meta>,
) -> rusqlite::Result<()> {
    let row = AuditRow {
        id: Uuid::new_v4().to_string(),
        ts: Utc::now(),
        event_type: event_type.to_string(),
        outcome: outcome.to_string(),
        meta: sanitize(meta),
    };
    store.insert_audit(tx, &row)
}

/// Audit events are written in their own committing transaction when the
/// surrounding operation failed and rolled back — this is the "separate
/// transaction" path spec.md §4.3/§7 require for failure audits.
pub fn write_standalone(
    store: &RecordStore,
    event_type: &str,
    outcome: &str,
    meta: Option<Meta>,
) -> rusqlite::Result<()> {
    store.transaction(|tx| write(tx, store, event_type, outcome, meta))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEvent {
    pub id: String,
    pub ts: chrono::DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub outcome: String,
    #[schema(value_type = Object, nullable)]
    pub meta: Option<Value>,
}

pub fn list(store: &RecordStore, limit: u32) -> rusqlite::Result<Vec<AuditEvent>> {
    let rows = store.list_audit(limit)?;
    Ok(rows
        .into_iter()
        .map(|row| AuditEvent {
            id: row.id,
            ts: row.ts,
            event_type: row.event_type,
            outcome: row.outcome,
            meta: row.meta.and_then(|raw| serde_json::from_str(&raw).ok()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_keys_are_dropped() {
        let mut meta = Meta::new();
        meta.insert("masterPassword".into(), MetaValue::String("x".into()));
        meta.insert("attempt".into(), MetaValue::Int(3));
        let sanitized = sanitize(Some(meta)).unwrap();
        assert!(!sanitized.to_lowercase().contains("password"));
        assert!(sanitized.contains("attempt"));
    }

    #[test]
    fn empty_meta_after_filtering_becomes_none() {
        let mut meta = Meta::new();
        meta.insert("secretToken".into(), MetaValue::String("x".into()));
        assert!(sanitize(Some(meta)).is_none());
    }

    #[test]
    fn write_then_list_round_trips() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut meta = Meta::new();
        meta.insert("attempt".into(), MetaValue::Int(1));
        write_standalone(&store, "vault.unlock", "FAILURE", Some(meta)).unwrap();

        let events = list(&store, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "vault.unlock");
        assert_eq!(events[0].outcome, "FAILURE");
    }
}
