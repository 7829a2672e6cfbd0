//! Settings file plus environment overrides.

use std::path::Path;

use serde::Deserialize;
use shadowcrm_sync::SyncConfig;
use shadowcrm_upstream::UpstreamConfig;

/// Everything the binary can be configured with. Both tables are optional
/// and every key inside them has a default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) upstream: UpstreamConfig,
    pub(crate) sync: SyncConfig,
}

impl Settings {
    /// Read `path` if given, otherwise use defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config '{}': {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
    }

    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub(crate) fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.upstream.apply_env(&var);
        self.sync.apply_env(&var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn partial_tables_keep_defaults() {
        let settings = Settings::parse(
            r#"
            [upstream]
            read_delay_secs = 0.0
            rate_limit = 50

            [sync]
            shadow_db_path = "/tmp/mirror.db"
            "#,
        )
        .unwrap();
        assert_eq!(settings.upstream.rate_limit, 50);
        assert_eq!(settings.upstream.port, 5555);
        assert_eq!(settings.upstream.write_delay_secs, 1.5);
        assert_eq!(settings.sync.shadow_db_path, PathBuf::from("/tmp/mirror.db"));
        assert_eq!(settings.sync.base_url, "http://localhost:5555");
    }

    #[test]
    fn unknown_table_is_rejected() {
        assert!(Settings::parse("[agent]\nmodel = \"x\"\n").is_err());
    }

    #[test]
    fn retry_count_is_not_configurable() {
        let err = Settings::parse("[sync]\nmax_retries = 5\n").unwrap_err();
        assert!(err.to_string().contains("max_retries"), "{err}");

        let settings = Settings::parse("[sync]\nretry_backoff_secs = 0\n").unwrap();
        let policy = settings.sync.retry_policy();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.backoff, std::time::Duration::ZERO);
    }

    #[test]
    fn env_wins_over_file() {
        let mut settings = Settings::parse("[upstream]\nrate_limit = 50\n").unwrap();
        settings.apply_env(|name| match name {
            "CRM_RATE_LIMIT" => Some("3".to_string()),
            "SHADOW_DB_PATH" => Some("other.db".to_string()),
            _ => None,
        });
        assert_eq!(settings.upstream.rate_limit, 3);
        assert_eq!(settings.sync.shadow_db_path, PathBuf::from("other.db"));
    }
}
