//! Vault lifecycle state machine (spec C6 / §4.6).
//!
//! Grounded on `original_source/.../app/routes/vault.py` for the transition
//! table and on the teacher's `api_service/vault.rs::VaultService` for the
//! service-struct shape (a zero-state unit struct whose methods take the
//! shared collaborators explicitly rather than reaching for process globals).

use chrono::Utc;
use utoipa::ToSchema;
use zeroize::Zeroize;

use crate::audit::{self, Meta, MetaValue};
use crate::crypto::{self, Argon2Params};
use crate::error::{AppError, AppResult};
use crate::session::{SessionData, SessionRegistry};
use crate::settings;
use crate::store::{RecordStore, ThrottleRow, VaultMetadataRow};
use crate::throttle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum VaultStatus {
    NoVault,
    Locked,
    Unlocked,
}

pub struct VaultService;

impl VaultService {
    pub fn new() -> Self {
        Self
    }

    pub fn status(&self, store: &RecordStore, sessions: &SessionRegistry, token: Option<&str>) -> AppResult<VaultStatus> {
        let metadata = store.get_vault_metadata()?;
        if metadata.and_then(|m| m.pw_verifier).is_none() {
            return Ok(VaultStatus::NoVault);
        }
        Ok(match sessions.peek(token) {
            Some(_) => VaultStatus::Unlocked,
            None => VaultStatus::Locked,
        })
    }

    pub fn setup(&self, store: &RecordStore, password: &str, hint: Option<String>) -> AppResult<()> {
        if !(crypto::MIN_PASSWORD_LEN..=crypto::MAX_PASSWORD_LEN).contains(&password.len()) {
            return Err(AppError::Validation(format!(
                "masterPassword must be between {} and {} characters",
                crypto::MIN_PASSWORD_LEN,
                crypto::MAX_PASSWORD_LEN
            )));
        }
        if let Some(hint) = &hint {
            if hint.len() > 64 {
                return Err(AppError::Validation("hint must be at most 64 characters".into()));
            }
        }

        let existing = store.get_vault_metadata()?;
        if existing.and_then(|m| m.pw_verifier).is_some() {
            audit::write_standalone(store, "vault.setup", "FAILURE", Some(already_initialized_meta()))?;
            return Err(AppError::VaultExists);
        }

        let params = Argon2Params::default();
        let salt = crypto::generate_salt(16)?;
        let verifier = crypto::hash_password_verifier(password, params)?;
        let now = Utc::now();

        store.transaction(|tx| {
            store.put_vault_metadata(
                tx,
                &VaultMetadataRow {
                    schema_version: 1,
                    hint,
                    argon2_salt: Some(salt),
                    argon2_memory_cost: Some(params.memory_cost),
                    argon2_time_cost: Some(params.time_cost),
                    argon2_parallelism: Some(params.parallelism),
                    pw_verifier: Some(verifier),
                    created_at: now,
                    updated_at: now,
                },
            )?;
            settings::ensure_defaults(tx, store)?;
            store.put_throttle(
                tx,
                &ThrottleRow {
                    failed_attempts: 0,
                    next_allowed_at: None,
                    updated_at: now,
                },
            )?;
            audit::write(tx, store, "vault.setup", "SUCCESS", None)
        })?;

        Ok(())
    }

    /// On success, returns the newly created session. The caller (HTTP
    /// handler) is responsible for setting cookies from it.
    pub fn unlock(&self, store: &RecordStore, sessions: &SessionRegistry, password: &str) -> AppResult<SessionData> {
        let metadata = store.get_vault_metadata()?.ok_or(AppError::VaultNotInitialized)?;
        let verifier = metadata.pw_verifier.clone().ok_or(AppError::VaultNotInitialized)?;
        let salt = metadata.argon2_salt.clone().ok_or(AppError::VaultInvalid)?;
        let params = Argon2Params {
            memory_cost: metadata.argon2_memory_cost.ok_or(AppError::VaultInvalid)?,
            time_cost: metadata.argon2_time_cost.ok_or(AppError::VaultInvalid)?,
            parallelism: metadata.argon2_parallelism.ok_or(AppError::VaultInvalid)?,
        };

        let now = Utc::now();
        let throttle_row = store.get_throttle()?;
        if let Some(next_allowed_at) = throttle_row.next_allowed_at {
            if now < next_allowed_at {
                let retry_after = throttle::retry_after_seconds(now, next_allowed_at);
                audit::write_standalone(store, "vault.unlock", "FAILURE", Some(throttled_meta(retry_after)))?;
                return Err(AppError::RateLimited);
            }
        }

        if !crypto::verify_password(password, &verifier) {
            let failed_attempts = throttle_row.failed_attempts + 1;
            let next_allowed_at = throttle::next_allowed_at(now, failed_attempts);
            let delay = throttle::backoff_seconds(failed_attempts);
            store.transaction(|tx| {
                store.put_throttle(
                    tx,
                    &ThrottleRow {
                        failed_attempts,
                        next_allowed_at: Some(next_allowed_at),
                        updated_at: now,
                    },
                )?;
                audit::write(tx, store, "vault.unlock", "FAILURE", Some(failed_attempt_meta(failed_attempts, delay)))
            })?;
            return Err(AppError::Unauthorized);
        }

        let mut master_key = crypto::derive_master_key(password, &salt, params)?;
        let enc_key = crypto::derive_enc_key(&master_key)?;
        master_key.zeroize();

        store.transaction(|tx| {
            store.put_throttle(
                tx,
                &ThrottleRow {
                    failed_attempts: 0,
                    next_allowed_at: None,
                    updated_at: now,
                },
            )?;
            audit::write(tx, store, "vault.unlock", "SUCCESS", None)
        })?;

        Ok(sessions.create(enc_key))
    }

    pub fn lock(&self, store: &RecordStore, sessions: &SessionRegistry, token: Option<&str>) -> AppResult<()> {
        sessions.destroy(token);
        audit::write_standalone(store, "vault.lock", "SUCCESS", None)?;
        Ok(())
    }
}

impl Default for VaultService {
    fn default() -> Self {
        Self::new()
    }
}

fn already_initialized_meta() -> Meta {
    let mut meta = Meta::new();
    meta.insert("reason".into(), MetaValue::String("already_initialized".into()));
    meta
}

fn throttled_meta(retry_after_seconds: i64) -> Meta {
    let mut meta = Meta::new();
    meta.insert("retryAfterSeconds".into(), MetaValue::Int(retry_after_seconds));
    meta
}

fn failed_attempt_meta(failed_attempts: u32, delay_seconds: i64) -> Meta {
    let mut meta = Meta::new();
    meta.insert("failedAttempts".into(), MetaValue::Int(failed_attempts as i64));
    meta.insert("delaySeconds".into(), MetaValue::Int(delay_seconds));
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (RecordStore, SessionRegistry) {
        (RecordStore::open_in_memory().unwrap(), SessionRegistry::new(15))
    }

    #[test]
    fn lifecycle_scenario_one() {
        let (store, sessions) = fixtures();
        let service = VaultService::new();

        assert_eq!(service.status(&store, &sessions, None).unwrap(), VaultStatus::NoVault);

        service.setup(&store, "CorrectHorseBatteryStaple!", None).unwrap();
        assert_eq!(service.status(&store, &sessions, None).unwrap(), VaultStatus::Locked);

        let session = service.unlock(&store, &sessions, "CorrectHorseBatteryStaple!").unwrap();
        assert_eq!(
            service.status(&store, &sessions, Some(&session.token)).unwrap(),
            VaultStatus::Unlocked
        );

        service.lock(&store, &sessions, Some(&session.token)).unwrap();
        assert_eq!(service.status(&store, &sessions, Some(&session.token)).unwrap(), VaultStatus::Locked);
    }

    #[test]
    fn setup_twice_is_rejected() {
        let (store, _sessions) = fixtures();
        let service = VaultService::new();
        service.setup(&store, "CorrectHorseBatteryStaple!", None).unwrap();
        let result = service.setup(&store, "AnotherPassword!!", None);
        assert!(matches!(result, Err(AppError::VaultExists)));
    }

    #[test]
    fn wrong_password_then_throttled() {
        let (store, sessions) = fixtures();
        let service = VaultService::new();
        service.setup(&store, "CorrectHorseBatteryStaple!", None).unwrap();

        let first = service.unlock(&store, &sessions, "wrong-password");
        assert!(matches!(first, Err(AppError::Unauthorized)));

        let second = service.unlock(&store, &sessions, "CorrectHorseBatteryStaple!");
        assert!(matches!(second, Err(AppError::RateLimited)));

        let throttle_row = store.get_throttle().unwrap();
        assert_eq!(throttle_row.failed_attempts, 1);
    }
}
