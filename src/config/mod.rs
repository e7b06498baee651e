//! Configuration management for the esinti scheduler
//!
//! Configuration is read once at startup, from a TOML file and/or
//! environment variables, then validated before anything is scheduled.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Group, WorkerIdentity};
use crate::scheduler::{DistributionPolicy, ExclusionRange, SettleDelay};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-event worker exclusion fraction range
    #[serde(default)]
    pub exclusion: ExclusionRange,

    /// Distribution policy (bucket table or mixture)
    #[serde(default)]
    pub distribution: DistributionPolicy,

    /// Extra per-action settle delay range
    #[serde(default)]
    pub settle: SettleDelay,

    /// Dedup ledger configuration
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Configured worker identities
    #[serde(default)]
    pub workers: Vec<WorkerEntry>,

    /// Configured groups
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

/// Dedup ledger settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Hours an admitted event identity is retained before eviction
    pub retention_hours: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { retention_hours: 48 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// One worker in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEntry {
    /// Unique worker name
    pub name: String,

    /// Optional session label (defaults to the name)
    #[serde(default)]
    pub session: Option<String>,
}

/// One group in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Group name
    pub name: String,

    /// Member worker names
    #[serde(default)]
    pub workers: Vec<String>,

    /// Subjects the group acts on
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclusion: ExclusionRange::default(),
            distribution: DistributionPolicy::default(),
            settle: SettleDelay::default(),
            ledger: LedgerConfig::default(),
            logging: LoggingConfig::default(),
            workers: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables over defaults.
    ///
    /// Only scalar knobs are settable this way; workers, groups and policy
    /// tables come from the file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(min) = env_parse::<f64>("ESINTI_EXCLUSION_MIN") {
            config.exclusion.min = min;
        }
        if let Some(max) = env_parse::<f64>("ESINTI_EXCLUSION_MAX") {
            config.exclusion.max = max;
        }
        if let Some(hours) = env_parse::<i64>("ESINTI_LEDGER_RETENTION_HOURS") {
            config.ledger.retention_hours = hours;
        }
        if let Some(min) = env_parse::<u64>("ESINTI_SETTLE_MIN_SECS") {
            config.settle.min_secs = min;
        }
        if let Some(max) = env_parse::<u64>("ESINTI_SETTLE_MAX_SECS") {
            config.settle.max_secs = max;
        }
        if let Ok(level) = std::env::var("ESINTI_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("ESINTI_LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.exclusion
            .validate()
            .context("Invalid exclusion range")?;
        self.distribution
            .validate()
            .context("Invalid distribution policy")?;

        if self.settle.min_secs > self.settle.max_secs {
            anyhow::bail!(
                "settle min_secs {} exceeds max_secs {}",
                self.settle.min_secs,
                self.settle.max_secs
            );
        }

        if self.ledger.retention_hours <= 0 {
            anyhow::bail!("ledger retention_hours must be positive");
        }

        let mut names = std::collections::HashSet::new();
        for worker in &self.workers {
            if !names.insert(worker.name.as_str()) {
                anyhow::bail!("duplicate worker name '{}'", worker.name);
            }
        }

        for group in &self.groups {
            for member in &group.workers {
                if !names.contains(member.as_str()) {
                    anyhow::bail!(
                        "group '{}' references unknown worker '{}'",
                        group.name,
                        member
                    );
                }
            }
        }

        Ok(())
    }

    /// Materialize the configured worker identities
    pub fn worker_identities(&self) -> Vec<WorkerIdentity> {
        self.workers
            .iter()
            .map(|w| match &w.session {
                Some(session) => WorkerIdentity::with_session(&w.name, session),
                None => WorkerIdentity::new(&w.name),
            })
            .collect()
    }

    /// Materialize the configured groups
    pub fn group_models(&self) -> Vec<Group> {
        self.groups
            .iter()
            .map(|g| {
                let mut group = Group::new(&g.name);
                for worker in &g.workers {
                    group = group.with_worker(worker);
                }
                for subject in &g.subjects {
                    group = group.with_subject(subject);
                }
                group
            })
            .collect()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.retention_hours, 48);
        assert_eq!(config.settle.min_secs, 2);
        assert_eq!(config.settle.max_secs, 5);
    }

    #[test]
    fn test_validate_rejects_bad_exclusion() {
        let mut config = Config::default();
        config.exclusion.min = 0.5;
        config.exclusion.max = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_group_member() {
        let mut config = Config::default();
        config.groups.push(GroupEntry {
            name: "a".to_string(),
            workers: vec!["ghost".to_string()],
            subjects: vec!["chan1".to_string()],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_workers() {
        let mut config = Config::default();
        config.workers.push(WorkerEntry {
            name: "w1".to_string(),
            session: None,
        });
        config.workers.push(WorkerEntry {
            name: "w1".to_string(),
            session: Some("other".to_string()),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_materialize_workers_and_groups() {
        let config: Config = toml::from_str(
            r#"
            [[workers]]
            name = "w1"

            [[workers]]
            name = "w2"
            session = "sessions/w2.session"

            [[groups]]
            name = "a"
            workers = ["w1", "w2"]
            subjects = ["chan1", "chan2"]
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        let workers = config.worker_identities();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].session, "w1");
        assert_eq!(workers[1].session, "sessions/w2.session");

        let groups = config.group_models();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].owns_subject("chan2"));
    }

    #[test]
    fn test_policy_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [distribution]
            kind = "mixture"

            [distribution.mixture]
            first_share = 0.25
            early_weight = 0.7
            early_window = { start = 0, end = 3600 }
            late_window = { start = 3600, end = 10800 }
            rest_window = { start = 10800, end = 86400 }
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.distribution,
            DistributionPolicy::Mixture { .. }
        ));
        assert!(config.validate().is_ok());
    }
}
