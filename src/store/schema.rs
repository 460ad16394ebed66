//! Schema for the keyed record store (spec C3 / §3).
//!
//! Grounded on `original_source/.../app/models.py` (table shapes and CHECK
//! constraints) using `rusqlite` (dependency choice grounded on
//! `blocksense-network-agent-harbor`'s workspace, which pins
//! `rusqlite = { version = "0.37", features = ["bundled"] }`).

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vault_metadata (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL DEFAULT 1,
    hint TEXT,
    argon2_salt BLOB,
    argon2_memory_cost INTEGER,
    argon2_time_cost INTEGER,
    argon2_parallelism INTEGER,
    pw_verifier TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    nonce BLOB NOT NULL,
    ciphertext BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    auto_lock_minutes INTEGER NOT NULL CHECK (auto_lock_minutes BETWEEN 1 AND 120),
    clipboard_clear_seconds INTEGER NOT NULL CHECK (clipboard_clear_seconds BETWEEN 5 AND 120),
    require_reauth_for_copy INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit (
    id TEXT PRIMARY KEY,
    ts TEXT NOT NULL,
    type TEXT NOT NULL,
    outcome TEXT NOT NULL,
    meta TEXT
);
CREATE INDEX IF NOT EXISTS idx_audit_ts ON audit (ts);
CREATE INDEX IF NOT EXISTS idx_audit_type ON audit (type);
CREATE INDEX IF NOT EXISTS idx_audit_outcome ON audit (outcome);

CREATE TABLE IF NOT EXISTS unlock_throttle (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    failed_attempts INTEGER NOT NULL DEFAULT 0,
    next_allowed_at TEXT,
    updated_at TEXT NOT NULL
);
"#;
