//! Settings service (spec C11 / §4.11).
//!
//! Grounded on `original_source/.../app/routes/settings.py` for the
//! auto-create-defaults-on-first-get behaviour.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::store::{RecordStore, SettingsRow};

const DEFAULT_AUTO_LOCK_MINUTES: u32 = 5;
const DEFAULT_CLIPBOARD_CLEAR_SECONDS: u32 = 15;
const DEFAULT_REQUIRE_REAUTH_FOR_COPY: bool = true;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsModel {
    #[serde(rename = "autoLockMinutes")]
    pub auto_lock_minutes: u32,
    #[serde(rename = "clipboardClearSeconds")]
    pub clipboard_clear_seconds: u32,
    #[serde(rename = "requireReauthForCopy")]
    pub require_reauth_for_copy: bool,
}

impl From<SettingsRow> for SettingsModel {
    fn from(row: SettingsRow) -> Self {
        Self {
            auto_lock_minutes: row.auto_lock_minutes,
            clipboard_clear_seconds: row.clipboard_clear_seconds,
            require_reauth_for_copy: row.require_reauth_for_copy,
        }
    }
}

/// Writes the default settings row if one does not already exist. Called
/// both from vault setup and lazily from the first `GET /settings`.
pub fn ensure_defaults(tx: &rusqlite::Transaction, store: &RecordStore) -> rusqlite::Result<()> {
    store.put_settings(
        tx,
        &SettingsRow {
            auto_lock_minutes: DEFAULT_AUTO_LOCK_MINUTES,
            clipboard_clear_seconds: DEFAULT_CLIPBOARD_CLEAR_SECONDS,
            require_reauth_for_copy: DEFAULT_REQUIRE_REAUTH_FOR_COPY,
            updated_at: Utc::now(),
        },
    )
}

pub fn get(store: &RecordStore) -> AppResult<SettingsModel> {
    if let Some(row) = store.get_settings()? {
        return Ok(row.into());
    }

    store.transaction(|tx| ensure_defaults(tx, store))?;
    let row = store.get_settings()?.ok_or(AppError::Internal)?;
    Ok(row.into())
}

pub fn put(store: &RecordStore, model: SettingsModel) -> AppResult<SettingsModel> {
    validate(&model)?;

    store.transaction(|tx| {
        store.put_settings(
            tx,
            &SettingsRow {
                auto_lock_minutes: model.auto_lock_minutes,
                clipboard_clear_seconds: model.clipboard_clear_seconds,
                require_reauth_for_copy: model.require_reauth_for_copy,
                updated_at: Utc::now(),
            },
        )
    })?;

    Ok(model)
}

fn validate(model: &SettingsModel) -> AppResult<()> {
    if !(1..=120).contains(&model.auto_lock_minutes) {
        return Err(AppError::Validation("autoLockMinutes must be between 1 and 120".into()));
    }
    if !(5..=120).contains(&model.clipboard_clear_seconds) {
        return Err(AppError::Validation("clipboardClearSeconds must be between 5 and 120".into()));
    }
    Ok(())
}
