//! Process configuration, loaded from the environment (spec §6).
//!
//! Grounded on `original_source/.../app/config.py` for the variable names
//! and defaults, and on the teacher's `config.rs` for the `VaultPaths`-style
//! derivation of on-disk locations from a data directory.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub app_host: String,
    pub app_port: u16,
    pub app_log_level: String,
    pub app_cors_allowed_origin: String,
    pub app_session_idle_minutes: u32,
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Loads configuration from the process environment, falling back to
    /// the defaults pinned by spec §6.
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Local Vault API"),
            app_env: env_or("APP_ENV", "development"),
            app_host: env_or("APP_HOST", "127.0.0.1"),
            app_port: env_or("APP_PORT", "8000").parse().unwrap_or(8000),
            app_log_level: env_or("APP_LOG_LEVEL", "info"),
            app_cors_allowed_origin: env_or("APP_CORS_ALLOWED_ORIGIN", "http://localhost:5173"),
            app_session_idle_minutes: env_or("APP_SESSION_IDLE_MINUTES", "15").parse().unwrap_or(15),
            data_dir: default_data_dir(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("vault.db")
    }

    /// Creates the data directory if it does not already exist.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn default_data_dir() -> PathBuf {
    if let Ok(value) = std::env::var("APP_DATA_DIR") {
        return PathBuf::from(value);
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("local-vault")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        std::env::remove_var("APP_SESSION_IDLE_MINUTES");
        let config = AppConfig {
            app_name: "x".into(),
            app_env: "x".into(),
            app_host: "x".into(),
            app_port: 0,
            app_log_level: "x".into(),
            app_cors_allowed_origin: "x".into(),
            app_session_idle_minutes: 15,
            data_dir: PathBuf::from("/tmp/local-vault-test"),
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/local-vault-test/vault.db"));
    }
}
