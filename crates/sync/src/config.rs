use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Settings of the local side. Every field has a default, so a TOML
/// `[sync]` table may name only what it changes. The retry count is fixed
/// at one and is not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Upstream HTTP root, without the `/api` suffix.
    pub base_url: String,
    pub shadow_db_path: PathBuf,
    pub request_timeout_secs: u64,
    pub retry_backoff_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            base_url: "http://localhost:5555".to_string(),
            shadow_db_path: PathBuf::from("shadow.db"),
            request_timeout_secs: 10,
            retry_backoff_secs: 2,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_secs(self.retry_backoff_secs),
            ..RetryPolicy::default()
        }
    }

    /// Apply `CRM_BASE_URL` and `SHADOW_DB_PATH` overrides; empty values are
    /// ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("CRM_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(path) = var("SHADOW_DB_PATH").filter(|v| !v.is_empty()) {
            self.shadow_db_path = PathBuf::from(path);
        }
    }
}
