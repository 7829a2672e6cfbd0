use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::admission::AdmissionPolicy;
use crate::service::Latency;

/// Upstream simulator settings. Every field has a default, so a TOML
/// `[upstream]` table may name only what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// SQLite file holding the upstream records.
    pub db_path: PathBuf,
    pub port: u16,
    /// Simulated latency of list operations, in seconds.
    pub read_delay_secs: f64,
    /// Simulated latency of create operations, in seconds.
    pub write_delay_secs: f64,
    pub rate_limit: usize,
    pub rate_window_secs: f64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            db_path: PathBuf::from("crm_data.db"),
            port: 5555,
            read_delay_secs: 2.0,
            write_delay_secs: 1.5,
            rate_limit: crate::admission::DEFAULT_RATE_LIMIT,
            rate_window_secs: crate::admission::DEFAULT_RATE_WINDOW.as_secs_f64(),
        }
    }
}

impl UpstreamConfig {
    pub fn latency(&self) -> Latency {
        Latency {
            read: secs(self.read_delay_secs),
            write: secs(self.write_delay_secs),
        }
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            limit: self.rate_limit,
            window: secs(self.rate_window_secs),
        }
    }

    /// Apply `CRM_DB_PATH`, `CRM_PORT` and `CRM_RATE_LIMIT` overrides.
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("CRM_DB_PATH").filter(|p| !p.is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(port) = var("CRM_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(limit) = var("CRM_RATE_LIMIT").and_then(|v| v.parse().ok()) {
            self.rate_limit = limit;
        }
    }
}

/// Negative or non-finite settings collapse to zero.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_simulated_crm() {
        let config = UpstreamConfig::default();
        assert_eq!(config.latency().read, Duration::from_secs(2));
        assert_eq!(config.latency().write, Duration::from_millis(1500));
        assert_eq!(config.admission_policy(), AdmissionPolicy::default());
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let mut config = UpstreamConfig::default();
        config.apply_env(|key| match key {
            "CRM_DB_PATH" => Some("/tmp/other.db".into()),
            "CRM_RATE_LIMIT" => Some("many".into()),
            "CRM_PORT" => Some("6000".into()),
            _ => None,
        });
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn negative_delay_is_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }
}
