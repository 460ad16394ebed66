//! Key derivation, password verification and authenticated encryption.
//!
//! Mirrors the security core of the teacher's `api/security.rs`, retuned to
//! the exact KDF/AEAD/HKDF parameters pinned by the specification.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const MIN_SALT_LEN: usize = 16;
pub const MIN_PASSWORD_LEN: usize = 12;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Associated data bound into every entry/backup AEAD ciphertext.
const AEAD_AAD: &[u8] = b"local-vault-entry-v1";

const HKDF_ENC_KEY_INFO: &[u8] = b"vault/enc_key/v1";
const HKDF_AUDIT_KEY_INFO: &[u8] = b"vault/audit_key/v1";
const HKDF_BACKUP_KEY_INFO: &[u8] = b"vault/backup_key/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Argon2Params {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Errors raised by the crypto layer. Kept distinct from [`crate::error::AppError`]
/// so integrity failures never leak whether the cause was an auth-tag
/// mismatch or a malformed plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material")]
    InvalidKeyMaterial,
    #[error("ciphertext integrity check failed")]
    Integrity,
    #[error("password hashing failed")]
    Hashing,
    #[error("master password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters")]
    PasswordLength,
    #[error("salt must be at least {MIN_SALT_LEN} bytes")]
    SaltLength,
}

pub type CryptoResult<T> = Result<T, CryptoError>;

fn argon2_for(params: Argon2Params) -> CryptoResult<Argon2<'static>> {
    let params = Params::new(params.memory_cost, params.time_cost, params.parallelism, Some(KEY_LEN))
        .map_err(|_| CryptoError::Hashing)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Generates a fresh random salt (CSPRNG) of the given length (>= 16 bytes).
pub fn generate_salt(length: usize) -> CryptoResult<Vec<u8>> {
    if length < MIN_SALT_LEN {
        return Err(CryptoError::SaltLength);
    }
    let mut salt = vec![0u8; length];
    OsRng.fill_bytes(&mut salt);
    Ok(salt)
}

/// Derives the 32-byte master key from a password and salt via Argon2id.
pub fn derive_master_key(password: &str, salt: &[u8], params: Argon2Params) -> CryptoResult<[u8; KEY_LEN]> {
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len()) {
        return Err(CryptoError::PasswordLength);
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::SaltLength);
    }

    let argon2 = argon2_for(params)?;
    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|_| CryptoError::Hashing)?;
    Ok(key)
}

fn hkdf_expand(master_key: &[u8; KEY_LEN], info: &[u8]) -> CryptoResult<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, master_key);
    let mut out = [0u8; KEY_LEN];
    hk.expand(info, &mut out).map_err(|_| CryptoError::InvalidKeyMaterial)?;
    Ok(out)
}

/// Derives the session encryption key from the master key (HKDF-SHA256).
pub fn derive_enc_key(master_key: &[u8; KEY_LEN]) -> CryptoResult<[u8; KEY_LEN]> {
    hkdf_expand(master_key, HKDF_ENC_KEY_INFO)
}

/// Derives the audit key. Reserved for forward-compat; intentionally unused.
pub fn derive_audit_key(master_key: &[u8; KEY_LEN]) -> CryptoResult<[u8; KEY_LEN]> {
    hkdf_expand(master_key, HKDF_AUDIT_KEY_INFO)
}

/// Derives the backup export/import key from a master key.
pub fn derive_backup_key(master_key: &[u8; KEY_LEN]) -> CryptoResult<[u8; KEY_LEN]> {
    hkdf_expand(master_key, HKDF_BACKUP_KEY_INFO)
}

/// Encoded Argon2id hash of the master password, independent from the
/// KDF-derived master key, used for constant-time password verification.
pub fn hash_password_verifier(password: &str, params: Argon2Params) -> CryptoResult<String> {
    let argon2 = argon2_for(params)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| CryptoError::Hashing)?;
    Ok(hash.to_string())
}

/// Verifies a password against an encoded Argon2id hash in constant time.
/// A malformed `verifier_hash` is treated the same as a mismatch.
pub fn verify_password(password: &str, verifier_hash: &str) -> bool {
    let parsed = match PasswordHash::new(verifier_hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Compares two byte slices in constant time (used where verification
/// shortcuts would otherwise leak timing information).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}

/// AEAD output: a fresh nonce plus the ciphertext+tag.
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encodes `obj` as canonical JSON (sorted keys, no whitespace) and
/// encrypts it with AES-256-GCM under a freshly generated nonce.
pub fn encrypt_json<T: Serialize>(enc_key: &[u8], obj: &T) -> CryptoResult<EncryptedPayload> {
    if enc_key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial);
    }

    let plaintext = canonical_json(obj)?;

    let cipher = Aes256Gcm::new_from_slice(enc_key).map_err(|_| CryptoError::InvalidKeyMaterial)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: &plaintext,
                aad: AEAD_AAD,
            },
        )
        .map_err(|_| CryptoError::Integrity)?;

    Ok(EncryptedPayload {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts and JSON-parses a payload. Any failure — bad key/nonce length,
/// AEAD tag mismatch, non-UTF8 plaintext, invalid JSON — collapses to the
/// single [`CryptoError::Integrity`] variant so callers cannot distinguish
/// "tampered" from "malformed".
pub fn decrypt_json<T: serde::de::DeserializeOwned>(enc_key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<T> {
    if enc_key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial);
    }
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Integrity);
    }

    let cipher = Aes256Gcm::new_from_slice(enc_key).map_err(|_| CryptoError::InvalidKeyMaterial)?;
    let nonce = Nonce::from_slice(nonce);

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: AEAD_AAD,
            },
        )
        .map_err(|_| CryptoError::Integrity)?;

    serde_json::from_slice(&plaintext).map_err(|_| CryptoError::Integrity)
}

/// Canonical JSON: UTF-8, keys sorted lexicographically, no insignificant
/// whitespace. Required so AEAD plaintext (and backup bundle hashing) is
/// bit-stable.
fn canonical_json<T: Serialize>(obj: &T) -> CryptoResult<Vec<u8>> {
    let value = serde_json::to_value(obj).map_err(|_| CryptoError::Hashing)?;
    let canonical = sort_json(value);
    serde_json::to_vec(&canonical).map_err(|_| CryptoError::Hashing)
}

fn sort_json(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                let v = map.get(&key).cloned().unwrap_or(serde_json::Value::Null);
                sorted.insert(key, sort_json(v));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.into_iter().map(sort_json).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Payload {
        b: u32,
        a: String,
    }

    #[test]
    fn derive_master_key_roundtrip_with_enc_key() {
        let salt = generate_salt(16).unwrap();
        let master = derive_master_key("CorrectHorseBatteryStaple!", &salt, Argon2Params::default()).unwrap();
        let enc_key = derive_enc_key(&master).unwrap();
        assert_eq!(enc_key.len(), KEY_LEN);
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = [7u8; KEY_LEN];
        let payload = Payload {
            b: 42,
            a: "alice@example.com".to_string(),
        };
        let encrypted = encrypt_json(&key, &payload).unwrap();
        assert_eq!(encrypted.nonce.len(), NONCE_LEN);

        let decrypted: Payload = decrypt_json(&key, &encrypted.nonce, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let key = [3u8; KEY_LEN];
        let payload = Payload { b: 1, a: "x".into() };
        let mut encrypted = encrypt_json(&key, &payload).unwrap();
        let last = encrypted.ciphertext.len() - 1;
        encrypted.ciphertext[last] ^= 0x01;

        let result: CryptoResult<Payload> = decrypt_json(&key, &encrypted.nonce, &encrypted.ciphertext);
        assert!(matches!(result, Err(CryptoError::Integrity)));
    }

    #[test]
    fn password_verifier_constant_time_semantics() {
        let verifier = hash_password_verifier("CorrectHorseBatteryStaple!", Argon2Params::default()).unwrap();
        assert!(verify_password("CorrectHorseBatteryStaple!", &verifier));
        assert!(!verify_password("incorrect-password", &verifier));
    }

    #[test]
    fn malformed_verifier_hash_is_not_a_match() {
        assert!(!verify_password("anything", "not-a-real-hash"));
    }
}
