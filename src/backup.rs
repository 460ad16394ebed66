//! Backup envelope codec (spec C8 / §4.8).
//!
//! Grounded on `original_source/.../app/backup.py` for the exact
//! envelope/bundle shape and on the teacher's `api/recovery.rs` for the
//! encrypted-envelope-with-optional-password idiom (a recovery key wraps
//! the vault key the same way an export password wraps the backup key
//! here).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroize;

use crate::audit::{self, Meta, MetaValue};
use crate::crypto::{self, Argon2Params, KEY_LEN};
use crate::entries::Entry;
use crate::error::{AppError, AppResult};
use crate::settings::SettingsModel;
use crate::store::{EntryRow, RecordStore};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
struct KdfParamsDto {
    #[serde(rename = "memoryCost")]
    memory_cost: u32,
    #[serde(rename = "timeCost")]
    time_cost: u32,
    parallelism: u32,
}

impl From<Argon2Params> for KdfParamsDto {
    fn from(params: Argon2Params) -> Self {
        Self {
            memory_cost: params.memory_cost,
            time_cost: params.time_cost,
            parallelism: params.parallelism,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
struct ExportDto {
    nonce: String,
    ciphertext: String,
}

/// The versioned, strict-schema JSON envelope carried by `/backup/export`
/// and `/backup/import/*`. `#[serde(deny_unknown_fields)]` enforces spec.md
/// §4.8's "unknown keys rejected".
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    version: u32,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "kdfParams")]
    kdf_params: Option<KdfParamsDto>,
    salt: Option<String>,
    export: ExportDto,
    note: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Bundle {
    entries: Vec<Entry>,
    settings: SettingsModel,
    #[serde(rename = "exportedAt")]
    exported_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ImportSummary {
    pub added: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

enum Disposition {
    Added,
    Updated,
    Skipped,
}

/// Builds and encrypts the export envelope. When `export_password` is
/// `None`, the backup key IS the session encryption key and `kdfParams`/
/// `salt` are left null, per spec.md §4.8.
pub fn export(store: &RecordStore, enc_key: &[u8; KEY_LEN], export_password: Option<&str>) -> AppResult<Envelope> {
    let rows = store.list_entries()?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        entries.push(crypto::decrypt_json::<Entry>(enc_key, &row.nonce, &row.ciphertext)?);
    }
    let settings = crate::settings::get(store)?;
    let bundle = Bundle {
        entries,
        settings,
        exported_at: Utc::now(),
    };

    let (backup_key, kdf_params, salt) = match export_password {
        Some(password) => {
            let salt = crypto::generate_salt(16)?;
            let params = Argon2Params::default();
            let mut master = crypto::derive_master_key(password, &salt, params)?;
            let backup_key = crypto::derive_backup_key(&master)?;
            master.zeroize();
            (backup_key, Some(params.into()), Some(STANDARD.encode(&salt)))
        }
        None => (*enc_key, None, None),
    };

    let payload = crypto::encrypt_json(&backup_key, &bundle)?;

    audit::write_standalone(store, "backup.export", "SUCCESS", Some(entry_count_meta(rows.len())))?;

    Ok(Envelope {
        version: 1,
        created_at: Utc::now(),
        kdf_params,
        salt,
        export: ExportDto {
            nonce: STANDARD.encode(payload.nonce),
            ciphertext: STANDARD.encode(payload.ciphertext),
        },
        note: "encrypted-only".to_string(),
    })
}

/// Recovers the backup key and decrypts the bundle. Any failure — bad
/// base64, mixed kdfParams/salt presence, missing import password, AEAD
/// integrity — collapses to `None`, letting callers fold it into the
/// user-visible `errors: ["Invalid backup file."]` shape instead of an
/// HTTP-level error.
fn decrypt_envelope(envelope: &Envelope, enc_key: &[u8; KEY_LEN], password: Option<&str>) -> Option<Bundle> {
    let backup_key = match (&envelope.kdf_params, &envelope.salt) {
        (Some(params), Some(salt_b64)) => {
            let password = password?;
            let salt = STANDARD.decode(salt_b64).ok()?;
            let argon_params = Argon2Params {
                memory_cost: params.memory_cost,
                time_cost: params.time_cost,
                parallelism: params.parallelism,
            };
            let mut master = crypto::derive_master_key(password, &salt, argon_params).ok()?;
            let derived = crypto::derive_backup_key(&master).ok()?;
            master.zeroize();
            derived
        }
        (None, None) => *enc_key,
        _ => return None,
    };

    let nonce = STANDARD.decode(&envelope.export.nonce).ok()?;
    let ciphertext = STANDARD.decode(&envelope.export.ciphertext).ok()?;
    crypto::decrypt_json::<Bundle>(&backup_key, &nonce, &ciphertext).ok()
}

fn parse_envelope(raw: &[u8]) -> Option<Envelope> {
    serde_json::from_slice(raw).ok()
}

fn disposition_for(existing: Option<&EntryRow>, incoming: &Entry) -> Disposition {
    match existing {
        None => Disposition::Added,
        Some(row) => {
            if incoming.updated_at > row.updated_at {
                Disposition::Updated
            } else {
                Disposition::Skipped
            }
        }
    }
}

fn summarize(store: &RecordStore, bundle: &Bundle) -> AppResult<ImportSummary> {
    let mut summary = ImportSummary::default();
    for entry in &bundle.entries {
        let existing = store.get_entry(&entry.id.to_string())?;
        match disposition_for(existing.as_ref(), entry) {
            Disposition::Added => summary.added += 1,
            Disposition::Updated => summary.updated += 1,
            Disposition::Skipped => summary.skipped += 1,
        }
    }
    Ok(summary)
}

/// Decrypts the uploaded file and computes dispositions without mutating
/// any stored state.
pub fn preview(store: &RecordStore, enc_key: &[u8; KEY_LEN], raw: &[u8], password: Option<&str>) -> AppResult<ImportSummary> {
    let Some(envelope) = parse_envelope(raw) else {
        return Ok(invalid_file_summary());
    };
    let Some(bundle) = decrypt_envelope(&envelope, enc_key, password) else {
        return Ok(invalid_file_summary());
    };
    summarize(store, &bundle)
}

/// Recomputes the same summary inside a single transaction and applies it:
/// INSERT for added entries, UPDATE only for strictly-newer entries, and an
/// unconditional overwrite of the settings singleton.
pub fn apply(store: &RecordStore, enc_key: &[u8; KEY_LEN], raw: &[u8], password: Option<&str>) -> AppResult<ImportSummary> {
    let Some(envelope) = parse_envelope(raw) else {
        audit::write_standalone(store, "backup.import", "FAILURE", Some(reason_meta("invalid_envelope")))?;
        return Ok(invalid_file_summary());
    };
    let Some(bundle) = decrypt_envelope(&envelope, enc_key, password) else {
        audit::write_standalone(store, "backup.import", "FAILURE", Some(reason_meta("decrypt_failed")))?;
        return Ok(invalid_file_summary());
    };

    let result = store.transaction(|tx| {
        let mut summary = ImportSummary::default();
        for entry in &bundle.entries {
            let existing = store.get_entry_in_tx(tx, &entry.id.to_string())?;
            match disposition_for(existing.as_ref(), entry) {
                Disposition::Added => {
                    let row = encrypt_for_store(enc_key, entry)?;
                    store.put_entry(tx, &row)?;
                    summary.added += 1;
                }
                Disposition::Updated => {
                    let row = encrypt_for_store(enc_key, entry)?;
                    store.put_entry(tx, &row)?;
                    summary.updated += 1;
                }
                Disposition::Skipped => summary.skipped += 1,
            }
        }

        store.put_settings(
            tx,
            &crate::store::SettingsRow {
                auto_lock_minutes: bundle.settings.auto_lock_minutes,
                clipboard_clear_seconds: bundle.settings.clipboard_clear_seconds,
                require_reauth_for_copy: bundle.settings.require_reauth_for_copy,
                updated_at: Utc::now(),
            },
        )?;

        audit::write(tx, store, "backup.import", "SUCCESS", None)?;
        Ok(summary)
    });

    match result {
        Ok(summary) => Ok(summary),
        Err(_) => {
            audit::write_standalone(store, "backup.import", "FAILURE", Some(reason_meta("apply_failed")))?;
            Err(AppError::ImportFailed)
        }
    }
}

fn encrypt_for_store(enc_key: &[u8], entry: &Entry) -> rusqlite::Result<EntryRow> {
    let payload = crypto::encrypt_json(enc_key, entry)
        .map_err(|_| rusqlite::Error::InvalidParameterName("encryption failed".into()))?;
    Ok(EntryRow {
        id: entry.id.to_string(),
        nonce: payload.nonce.to_vec(),
        ciphertext: payload.ciphertext,
        created_at: entry.updated_at,
        updated_at: entry.updated_at,
    })
}

fn invalid_file_summary() -> ImportSummary {
    ImportSummary {
        added: 0,
        updated: 0,
        skipped: 0,
        errors: vec!["Invalid backup file.".to_string()],
    }
}

fn reason_meta(reason: &str) -> Meta {
    let mut meta = Meta::new();
    meta.insert("reason".into(), MetaValue::String(reason.to_string()));
    meta
}

fn entry_count_meta(count: usize) -> Meta {
    let mut meta = Meta::new();
    meta.insert("entryCount".into(), MetaValue::Int(count as i64));
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{self, EntryCreate};

    fn fixture_entry() -> EntryCreate {
        EntryCreate {
            title: "Example".into(),
            url: None,
            username: "alice".into(),
            password: "S3cur3!P4ss".into(),
            notes: String::new(),
            tags: vec![],
            favorite: false,
        }
    }

    #[test]
    fn export_without_password_leaves_kdf_params_null() {
        let store = RecordStore::open_in_memory().unwrap();
        let enc_key = [1u8; KEY_LEN];
        let envelope = export(&store, &enc_key, None).unwrap();
        assert!(envelope.kdf_params.is_none());
        assert!(envelope.salt.is_none());
    }

    #[test]
    fn preview_then_apply_then_second_apply_is_idempotent() {
        let store = RecordStore::open_in_memory().unwrap();
        let enc_key = [2u8; KEY_LEN];
        entries::create(&store, &enc_key, fixture_entry()).unwrap();

        let envelope = export(&store, &enc_key, None).unwrap();
        let raw = serde_json::to_vec(&envelope).unwrap();

        // Wipe the store's only entry so "preview" reports it as new again.
        store
            .transaction(|tx| {
                let rows = store.list_entries()?;
                for row in rows {
                    store.delete_entry(tx, &row.id)?;
                }
                Ok(())
            })
            .unwrap();

        let preview_summary = preview(&store, &enc_key, &raw, None).unwrap();
        assert_eq!(preview_summary.added, 1);

        let apply_summary = apply(&store, &enc_key, &raw, None).unwrap();
        assert_eq!(apply_summary.added, 1);

        let second_apply = apply(&store, &enc_key, &raw, None).unwrap();
        assert_eq!(second_apply.added, 0);
        assert_eq!(second_apply.updated, 0);
        assert_eq!(second_apply.skipped, 1);
    }

    #[test]
    fn malformed_blob_never_errors_at_transport_level() {
        let store = RecordStore::open_in_memory().unwrap();
        let enc_key = [3u8; KEY_LEN];
        for blob in [&b""[..], &b"not json"[..], &[0u8, 1, 2, 255][..]] {
            let summary = preview(&store, &enc_key, blob, None).unwrap();
            assert_eq!(summary.added, 0);
            assert_eq!(summary.updated, 0);
            assert_eq!(summary.skipped, 0);
            assert_eq!(summary.errors, vec!["Invalid backup file.".to_string()]);
        }
    }
}
