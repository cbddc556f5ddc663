use anyhow::Result;
use regsync::{ScopeFilter, SyncPolicy};
use regsync_core::{DirectorySettings, TargetSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Configuration for the sync binary, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub directory: DirectorySettings,
    pub target: TargetSettings,
    #[serde(default)]
    pub policy: SyncPolicy,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Delay between passes when running with `--repeat`.
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily-rolling log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Emit console output as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            directory: DirectorySettings::default(),
            target: TargetSettings::default(),
            policy: SyncPolicy::default(),
            schedule: ScheduleSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            json: false,
        }
    }
}

impl AppConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.directory.issuer)?;
        url::Url::parse(&self.directory.clients_endpoint)?;
        url::Url::parse(&self.target.admin_base_url)?;
        if let Some(proxy) = &self.directory.https_proxy {
            url::Url::parse(proxy)?;
        }

        if self.directory.client_id.is_empty() {
            anyhow::bail!("Directory client_id cannot be empty");
        }
        if self.target.username.is_empty() {
            anyhow::bail!("Admin username cannot be empty");
        }

        // Compiles the filter patterns and reports list conflicts.
        let filter = ScopeFilter::new(&self.policy)?;
        for client_id in filter.conflicting_ids() {
            warn!(
                "Client {} is on both the ignore list and the disabled list; the ignore list wins",
                client_id
            );
        }

        if !self.directory.client_cert.exists() {
            anyhow::bail!(
                "Transport certificate does not exist: {}",
                self.directory.client_cert.display()
            );
        }
        if !self.directory.client_key.exists() {
            anyhow::bail!(
                "Transport key does not exist: {}",
                self.directory.client_key.display()
            );
        }
        if let Some(bundle) = &self.directory.ca_bundle {
            if !bundle.exists() {
                anyhow::bail!("CA bundle does not exist: {}", bundle.display());
            }
        }
        if let Some(definition) = &self.target.client_definition {
            if !definition.exists() {
                anyhow::bail!("Client definition does not exist: {}", definition.display());
            }
        }

        if self.directory.accept_invalid_certs || self.target.accept_invalid_certs {
            warn!("TLS certificate verification is disabled in this configuration");
        }

        Ok(())
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regsync.toml");

        let mut config = AppConfig::default();
        config.policy.ignore_list = vec!["pingfederate_admin".to_string()];
        config.schedule.interval = Duration::from_secs(300);
        config.save(&path).await.unwrap();

        let loaded = AppConfig::load(&path).await.unwrap();
        assert_eq!(loaded.directory.issuer, config.directory.issuer);
        assert_eq!(loaded.policy.ignore_list, config.policy.ignore_list);
        assert_eq!(loaded.schedule.interval, Duration::from_secs(300));
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let content = r#"
            [directory]
            issuer = "https://auth.directory.test"
            client_id = "https://rp.directory.test/openid_relying_party/1234"
            clients_endpoint = "https://api.directory.test/clients"
            client_cert = "certs/transport.pem"
            client_key = "certs/transport.key"

            [target]
            admin_base_url = "https://pf.test:9999/pf-admin-api/v1/oauth/clients"
            username = "Administrator"
            password = "secret"
        "#;

        let config: AppConfig = toml::from_str(content).unwrap();
        assert_eq!(config.directory.role, "RP-CORE");
        assert_eq!(config.directory.scope, "directory:software");
        assert_eq!(config.schedule.interval, Duration::from_secs(15 * 60));
        assert_eq!(config.log.level, "info");
        assert!(config.policy.filter_patterns.is_empty());
        assert!(!config.policy.force_resync);
    }

    #[test]
    fn interval_accepts_humantime_strings() {
        let content = r#"interval = "90s""#;
        let schedule: ScheduleSettings = toml::from_str(content).unwrap();
        assert_eq!(schedule.interval, Duration::from_secs(90));
    }

    #[test]
    fn validation_rejects_invalid_filter_pattern() {
        let mut config = AppConfig::default();
        config.policy.filter_patterns = vec!["ob-[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_requires_transport_certificate_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.directory.client_cert = dir.path().join("missing.pem");
        config.directory.client_key = dir.path().join("missing.key");

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Transport certificate"));
    }

    #[test]
    fn validation_accepts_complete_config() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("transport.pem");
        let key = dir.path().join("transport.key");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let mut config = AppConfig::default();
        config.directory.client_cert = cert;
        config.directory.client_key = key;
        config.policy.filter_patterns = vec!["^rp-".to_string()];
        config.validate().unwrap();
    }
}
