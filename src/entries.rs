//! Entry service (spec C7 / §4.7).
//!
//! Grounded on `original_source/.../app/routes/entries.py` for the CRUD
//! contract and on the teacher's `api_service/files.rs`-style CRUD service
//! shape (validate → mutate store → audit, all inside one transaction).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{self, Meta, MetaValue};
use crate::crypto;
use crate::error::{AppError, AppResult};
use crate::store::{EntryRow, RecordStore};

const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Entry {
    pub id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub favorite: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EntryCreate {
    pub title: String,
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
}

pub type EntryUpdate = EntryCreate;

#[derive(Debug, Serialize, ToSchema)]
pub struct EntrySummary {
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub url: Option<String>,
    pub favorite: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Entry> for EntrySummary {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            username: entry.username.clone(),
            url: entry.url.clone(),
            favorite: entry.favorite,
            updated_at: entry.updated_at,
        }
    }
}

fn validate_fields(title: &str, url: &Option<String>, username: &str, password: &str, notes: &str, tags: &[String]) -> AppResult<()> {
    if !(1..=128).contains(&title.len()) {
        return Err(AppError::Validation("title must be between 1 and 128 characters".into()));
    }
    if !(1..=128).contains(&username.len()) {
        return Err(AppError::Validation("username must be between 1 and 128 characters".into()));
    }
    if !(1..=256).contains(&password.len()) {
        return Err(AppError::Validation("password must be between 1 and 256 characters".into()));
    }
    if notes.len() > 2000 {
        return Err(AppError::Validation("notes must be at most 2000 characters".into()));
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!("at most {MAX_TAGS} tags are allowed")));
    }
    for tag in tags {
        let valid_len = (1..=24).contains(&tag.len());
        let valid_chars = tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'));
        if !valid_len || !valid_chars {
            return Err(AppError::Validation(format!("invalid tag: {tag}")));
        }
    }
    if let Some(url) = url {
        let parsed = url::Url::parse(url).map_err(|_| AppError::Validation("url must be a valid http(s) URL".into()))?;
        let scheme_ok = matches!(parsed.scheme(), "http" | "https");
        let host_ok = parsed.host_str().is_some_and(|h| !h.is_empty());
        if !scheme_ok || !host_ok {
            return Err(AppError::Validation("url must be a valid http(s) URL".into()));
        }
    }
    Ok(())
}

fn encrypt_entry(enc_key: &[u8], entry: &Entry) -> AppResult<EntryRow> {
    let payload = crypto::encrypt_json(enc_key, entry)?;
    Ok(EntryRow {
        id: entry.id.to_string(),
        nonce: payload.nonce.to_vec(),
        ciphertext: payload.ciphertext,
        created_at: entry.updated_at,
        updated_at: entry.updated_at,
    })
}

fn decrypt_entry(enc_key: &[u8], row: &EntryRow) -> AppResult<Entry> {
    let entry: Entry = crypto::decrypt_json(enc_key, &row.nonce, &row.ciphertext)?;
    Ok(entry)
}

pub fn create(store: &RecordStore, enc_key: &[u8], input: EntryCreate) -> AppResult<Entry> {
    validate_fields(&input.title, &input.url, &input.username, &input.password, &input.notes, &input.tags)?;

    let entry = Entry {
        id: Uuid::new_v4(),
        title: input.title,
        url: input.url,
        username: input.username,
        password: input.password,
        notes: input.notes,
        tags: input.tags,
        favorite: input.favorite,
        updated_at: Utc::now(),
    };

    let row = encrypt_entry(enc_key, &entry)?;

    store.transaction(|tx| {
        store.put_entry(tx, &row)?;
        audit::write(tx, store, "entry.create", "SUCCESS", Some(entry_id_meta(entry.id)))
    })?;

    Ok(entry)
}

pub fn get(store: &RecordStore, enc_key: &[u8], id: Uuid) -> AppResult<Entry> {
    let row = store.get_entry(&id.to_string())?;
    let Some(row) = row else {
        audit::write_standalone(store, "entry.get", "FAILURE", Some(not_found_meta()))?;
        return Err(AppError::EntryNotFound);
    };

    // A decrypt failure here is structural damage, not a user-content
    // error: no audit event is written, and the caller gets 500
    // ENTRY_UNAVAILABLE instead of a successful read.
    let entry = decrypt_entry(enc_key, &row)?;
    audit::write_standalone(store, "entry.get", "SUCCESS", Some(entry_id_meta(id)))?;
    Ok(entry)
}

pub fn list(store: &RecordStore, enc_key: &[u8]) -> AppResult<Vec<EntrySummary>> {
    let rows = store.list_entries()?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        entries.push(decrypt_entry(enc_key, row)?);
    }
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    audit::write_standalone(store, "entry.list", "SUCCESS", Some(entry_count_meta(entries.len())))?;
    Ok(entries.iter().map(EntrySummary::from).collect())
}

pub fn update(store: &RecordStore, enc_key: &[u8], id: Uuid, input: EntryUpdate) -> AppResult<Entry> {
    validate_fields(&input.title, &input.url, &input.username, &input.password, &input.notes, &input.tags)?;

    let existing = store.get_entry(&id.to_string())?;
    if existing.is_none() {
        audit::write_standalone(store, "entry.update", "FAILURE", Some(not_found_meta()))?;
        return Err(AppError::EntryNotFound);
    }

    let entry = Entry {
        id,
        title: input.title,
        url: input.url,
        username: input.username,
        password: input.password,
        notes: input.notes,
        tags: input.tags,
        favorite: input.favorite,
        updated_at: Utc::now(),
    };

    let row = encrypt_entry(enc_key, &entry)?;

    store.transaction(|tx| {
        store.put_entry(tx, &row)?;
        audit::write(tx, store, "entry.update", "SUCCESS", Some(entry_id_meta(entry.id)))
    })?;

    Ok(entry)
}

pub fn delete(store: &RecordStore, id: Uuid) -> AppResult<()> {
    let deleted = store.transaction(|tx| store.delete_entry(tx, &id.to_string()))?;
    if !deleted {
        audit::write_standalone(store, "entry.delete", "FAILURE", Some(not_found_meta()))?;
        return Err(AppError::EntryNotFound);
    }
    audit::write_standalone(store, "entry.delete", "SUCCESS", Some(entry_id_meta(id)))?;
    Ok(())
}

fn entry_id_meta(id: Uuid) -> Meta {
    let mut meta = Meta::new();
    meta.insert("entryId".into(), MetaValue::String(id.to_string()));
    meta
}

fn not_found_meta() -> Meta {
    let mut meta = Meta::new();
    meta.insert("reason".into(), MetaValue::String("not_found".into()));
    meta
}

fn entry_count_meta(count: usize) -> Meta {
    let mut meta = Meta::new();
    meta.insert("count".into(), MetaValue::Int(count as i64));
    meta
}
