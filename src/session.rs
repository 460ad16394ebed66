//! In-memory session registry (spec C4).
//!
//! Grounded on `original_source/.../app/sessions.py` for the exact
//! create/get/peek/destroy/clear semantics and idle-eviction rule, and on
//! the teacher's `Arc<Mutex<...>>`-guarded global state idiom
//! (`api_service/vault.rs::VAULT_FS`) for how a process-wide mutable
//! structure is shared across request handlers via dependency injection
//! rather than a bare global.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::RngCore;
use zeroize::Zeroize;

use crate::crypto::KEY_LEN;

fn generate_token() -> String {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone)]
pub struct SessionData {
    pub token: String,
    pub csrf_token: String,
    pub enc_key: [u8; KEY_LEN],
    created_at: Instant,
    last_seen: Instant,
}

impl SessionData {
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl Drop for SessionData {
    fn drop(&mut self) {
        self.enc_key.zeroize();
    }
}

struct Entry {
    session: SessionData,
    last_seen: Instant,
}

/// Process-wide session store, guarded by a single mutex. All operations
/// execute under the lock; none of them block on I/O, so contention is
/// bounded by in-memory map work only.
pub struct SessionRegistry {
    idle_timeout: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(idle_timeout_minutes: u32) -> Self {
        Self {
            idle_timeout: Duration::from_secs(idle_timeout_minutes as u64 * 60),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, enc_key: [u8; KEY_LEN]) -> SessionData {
        let now = Instant::now();
        let session = SessionData {
            token: generate_token(),
            csrf_token: generate_token(),
            enc_key,
            created_at: now,
            last_seen: now,
        };

        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(
            session.token.clone(),
            Entry {
                session: session.clone(),
                last_seen: now,
            },
        );
        session
    }

    /// Looks up a session, bumping `last_seen` on success and evicting it
    /// if it has been idle longer than the configured timeout.
    pub fn get(&self, token: Option<&str>) -> Option<SessionData> {
        let token = token?;
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap();

        let expired = sessions
            .get(token)
            .map(|entry| now.duration_since(entry.last_seen) > self.idle_timeout)
            .unwrap_or(false);

        if expired {
            sessions.remove(token);
            return None;
        }

        if let Some(entry) = sessions.get_mut(token) {
            entry.last_seen = now;
            Some(entry.session.clone())
        } else {
            None
        }
    }

    /// Same lookup and eviction rule as [`Self::get`], without bumping
    /// `last_seen` — used by read-only status checks.
    pub fn peek(&self, token: Option<&str>) -> Option<SessionData> {
        let token = token?;
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap();

        let expired = sessions
            .get(token)
            .map(|entry| now.duration_since(entry.last_seen) > self.idle_timeout)
            .unwrap_or(false);

        if expired {
            sessions.remove(token);
            return None;
        }

        sessions.get(token).map(|entry| entry.session.clone())
    }

    pub fn destroy(&self, token: Option<&str>) {
        if let Some(token) = token {
            self.sessions.lock().unwrap().remove(token);
        }
    }

    pub fn clear(&self) {
        self.sessions.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_returns_same_session() {
        let registry = SessionRegistry::new(15);
        let created = registry.create([1u8; KEY_LEN]);
        let fetched = registry.get(Some(&created.token)).expect("session present");
        assert_eq!(fetched.token, created.token);
        assert_eq!(fetched.csrf_token, created.csrf_token);
    }

    #[test]
    fn unknown_token_returns_none() {
        let registry = SessionRegistry::new(15);
        assert!(registry.get(Some("bogus")).is_none());
        assert!(registry.get(None).is_none());
    }

    #[test]
    fn destroy_removes_session() {
        let registry = SessionRegistry::new(15);
        let created = registry.create([2u8; KEY_LEN]);
        registry.destroy(Some(&created.token));
        assert!(registry.get(Some(&created.token)).is_none());
    }

    #[test]
    fn idle_timeout_evicts_session() {
        let registry = SessionRegistry::new(0);
        let created = registry.create([3u8; KEY_LEN]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(registry.peek(Some(&created.token)).is_none());
    }

    #[test]
    fn tokens_are_unique_across_sessions() {
        let registry = SessionRegistry::new(15);
        let a = registry.create([4u8; KEY_LEN]);
        let b = registry.create([5u8; KEY_LEN]);
        assert_ne!(a.token, b.token);
        assert_ne!(a.csrf_token, b.csrf_token);
    }
}
