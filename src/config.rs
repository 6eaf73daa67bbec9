use crate::batch::BatchLimits;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name for the cached disposable-domain list inside the data dir.
pub const DISPOSABLE_CACHE_FILE: &str = "disposable_domains.txt";
/// Directory for per-source IP blacklist cache files inside the data dir.
pub const BLACKLIST_CACHE_DIR: &str = "ip_blacklists";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_sync_interval_hours")]
    pub sync_interval_hours: u64,
    #[serde(default)]
    pub email_source: EmailSourceConfig,
    #[serde(default = "default_ip_sources")]
    pub ip_sources: Vec<IpSourceConfig>,
    #[serde(default)]
    pub batch: BatchLimits,
    #[serde(default = "default_metrics_flush_seconds")]
    pub metrics_flush_seconds: u64,
}

/// The disposable-domain list source. Fast source class, short timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSourceConfig {
    #[serde(default = "default_email_source_url")]
    pub url: String,
    #[serde(default = "default_email_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// One IP blacklist source. Bulk source class, long timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_ip_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_sync_interval_hours() -> u64 {
    24
}

fn default_metrics_flush_seconds() -> u64 {
    60
}

fn default_email_source_url() -> String {
    "https://raw.githubusercontent.com/disposable-email-domains/disposable-email-domains/master/disposable_email_blocklist.conf".to_string()
}

fn default_email_timeout_seconds() -> u64 {
    30
}

fn default_ip_timeout_seconds() -> u64 {
    60
}

fn default_ip_sources() -> Vec<IpSourceConfig> {
    vec![
        IpSourceConfig {
            name: "ipsum".to_string(),
            url: "https://raw.githubusercontent.com/stamparm/ipsum/master/ipsum.txt".to_string(),
            timeout_seconds: default_ip_timeout_seconds(),
        },
        IpSourceConfig {
            name: "bruteforceblocker".to_string(),
            url: "https://danger.rulez.sk/projects/bruteforceblocker/blist.php".to_string(),
            timeout_seconds: default_ip_timeout_seconds(),
        },
    ]
}

impl Default for EmailSourceConfig {
    fn default() -> Self {
        Self {
            url: default_email_source_url(),
            timeout_seconds: default_email_timeout_seconds(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_interval_hours: default_sync_interval_hours(),
            email_source: EmailSourceConfig::default(),
            ip_sources: default_ip_sources(),
            batch: BatchLimits::default(),
            metrics_flush_seconds: default_metrics_flush_seconds(),
        }
    }
}

impl EmailSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl IpSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.email_source.url.is_empty() {
            anyhow::bail!("email_source.url must not be empty");
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.ip_sources {
            if source.name.is_empty() {
                anyhow::bail!("ip_sources entries need a non-empty name");
            }
            if source.url.is_empty() {
                anyhow::bail!("ip_sources entry '{}' needs a url", source.name);
            }
            if !seen.insert(source.name.as_str()) {
                anyhow::bail!("duplicate ip_sources name '{}'", source.name);
            }
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_hours * 60 * 60)
    }

    /// Cache file for the disposable-domain list.
    pub fn email_cache_path(&self) -> PathBuf {
        self.data_dir.join(DISPOSABLE_CACHE_FILE)
    }

    /// Cache file for one IP blacklist source.
    pub fn ip_cache_path(&self, source_name: &str) -> PathBuf {
        self.data_dir
            .join(BLACKLIST_CACHE_DIR)
            .join(format!("{source_name}.txt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources() {
        let config = Config::default();
        assert_eq!(config.sync_interval_hours, 24);
        assert_eq!(config.ip_sources.len(), 2);
        assert_eq!(config.ip_sources[0].name, "ipsum");
        assert_eq!(config.ip_sources[1].name, "bruteforceblocker");
        assert_eq!(config.email_source.timeout_seconds, 30);
        assert_eq!(config.ip_sources[0].timeout_seconds, 60);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let reloaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.ip_sources.len(), config.ip_sources.len());
        assert_eq!(reloaded.batch.max_records, 10_000);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("data_dir: /var/lib/repguard\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/repguard"));
        assert_eq!(config.sync_interval_hours, 24);
        assert_eq!(config.ip_sources.len(), 2);
    }

    #[test]
    fn test_cache_paths() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/rg"),
            ..Config::default()
        };
        assert_eq!(
            config.email_cache_path(),
            PathBuf::from("/tmp/rg/disposable_domains.txt")
        );
        assert_eq!(
            config.ip_cache_path("ipsum"),
            PathBuf::from("/tmp/rg/ip_blacklists/ipsum.txt")
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_source_names() {
        let mut config = Config::default();
        config.ip_sources.push(IpSourceConfig {
            name: "ipsum".to_string(),
            url: "https://example.com/list.txt".to_string(),
            timeout_seconds: 60,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("repguard.yaml");
        Config::default().to_file(path.to_str().unwrap()).unwrap();

        let loaded = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.ip_sources.len(), 2);
    }
}
