//! Client configuration, loaded from environment variables at startup.

use crate::api::DEFAULT_BASE_URL;
use crate::db::{Database, DbError};
use crate::doc_processor::DEFAULT_MAX_UPLOAD_MB;
use std::path::PathBuf;

/// Settings-table key for a persisted backend URL.
pub const BASE_URL_SETTING: &str = "base_url";

/// Settings that may be written with `config set`.
pub const SETTING_KEYS: &[&str] = &[BASE_URL_SETTING];

/// Runtime configuration for the client.
///
/// Every field has a default so the client works without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the SQLite file (default: `".paper-chat"`).
    pub data_dir: PathBuf,

    /// Backend base URL given explicitly. `None` defers to the settings
    /// table, then to [`DEFAULT_BASE_URL`].
    pub base_url: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"paper_chat_lib=debug"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Largest accepted upload, in MiB.
    pub max_upload_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".paper-chat"),
            base_url: None,
            log_level: "info".to_string(),
            log_json: false,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("PAPER_CHAT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            base_url: std::env::var("PAPER_CHAT_BASE_URL").ok(),
            log_level: env_or("PAPER_CHAT_LOG", &defaults.log_level),
            log_json: std::env::var("PAPER_CHAT_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_upload_mb: parse_env("PAPER_CHAT_MAX_UPLOAD_MB", defaults.max_upload_mb),
        }
    }

    /// Explicit value first, then the persisted setting, then the default.
    pub fn resolve_base_url(&self, db: &Database) -> Result<String, DbError> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        Ok(db
            .get_setting(BASE_URL_SETTING)?
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
