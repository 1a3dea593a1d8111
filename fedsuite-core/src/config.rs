//! Suite configuration
//!
//! Layered as built-in defaults, then `config/default` and `config/local`
//! (or an explicit file), then `FEDSUITE_*` environment variables with `__`
//! separating nested keys, e.g. `FEDSUITE_WAITER__POLL_INTERVAL_MS=250`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

const ENV_PREFIX: &str = "FEDSUITE";

/// Top-level suite configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub instances: Vec<InstanceConfig>,
    /// Password shared by all seed accounts and registered users.
    pub password: String,
    pub waiter: WaiterConfig,
    pub http: HttpConfig,
    pub setup: SetupConfig,
    pub logging: LoggingConfig,
}

/// One instance endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    pub base_url: String,
    pub domain: String,
    pub seed_user: String,
}

impl InstanceConfig {
    pub fn new(name: &str, base_url: &str, domain: &str, seed_user: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            domain: domain.to_string(),
            seed_user: seed_user.to_string(),
        }
    }
}

/// Convergence waiter defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaiterConfig {
    pub poll_interval_ms: u64,
    /// Budget for a single hop between two instances.
    pub propagation_timeout_ms: u64,
    /// Budget for remote-home-remote relay through a third instance.
    pub relay_timeout_ms: u64,
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

/// Suite setup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Delay after the first creation of the shared communities, letting
    /// federation workers pick up new peers.
    pub federation_settle_ms: u64,
    /// Delay after a follow is accepted, covering the server's follower
    /// recheck interval.
    pub follow_recheck_ms: u64,
    pub main_community: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            instances: vec![
                InstanceConfig::new("alpha", "http://127.0.0.1:8541", "lemmy-alpha:8541", "lemmy_alpha"),
                InstanceConfig::new("beta", "http://127.0.0.1:8551", "lemmy-beta:8551", "lemmy_beta"),
                InstanceConfig::new("gamma", "http://127.0.0.1:8561", "lemmy-gamma:8561", "lemmy_gamma"),
                InstanceConfig::new("delta", "http://127.0.0.1:8571", "lemmy-delta:8571", "lemmy_delta"),
                InstanceConfig::new("epsilon", "http://127.0.0.1:8581", "lemmy-epsilon:8581", "lemmy_epsilon"),
            ],
            password: "lemmylemmy".to_string(),
            waiter: WaiterConfig::default(),
            http: HttpConfig::default(),
            setup: SetupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            propagation_timeout_ms: 10_000,
            relay_timeout_ms: 60_000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            user_agent: concat!("fedsuite/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            federation_settle_ms: 10_000,
            follow_recheck_ms: 2_000,
            main_community: "main".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl SuiteConfig {
    /// Load configuration from config files and environment
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(Self::environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        debug!(instances = config.instances.len(), "Loaded suite configuration");
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path).required(true))
            .add_source(Self::environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        debug!(path = %path.display(), "Loaded suite configuration from file");
        config.validate()?;
        Ok(config)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Reject configurations the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(Error::configuration("no instances configured"));
        }

        let mut names = HashSet::new();
        for instance in &self.instances {
            if !names.insert(instance.name.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate instance name: {}",
                    instance.name
                )));
            }
            Url::parse(&instance.base_url).map_err(|e| {
                Error::configuration(format!(
                    "instance {} has invalid base_url {}: {}",
                    instance.name, instance.base_url, e
                ))
            })?;
            if instance.domain.is_empty() {
                return Err(Error::configuration(format!(
                    "instance {} has no federation domain",
                    instance.name
                )));
            }
        }

        if self.password.is_empty() {
            return Err(Error::configuration("seed password must not be empty"));
        }

        let waiter = &self.waiter;
        if waiter.poll_interval_ms == 0 {
            return Err(Error::configuration("waiter.poll_interval_ms must be positive"));
        }
        if waiter.poll_interval_ms >= waiter.propagation_timeout_ms
            || waiter.poll_interval_ms >= waiter.relay_timeout_ms
        {
            return Err(Error::configuration(
                "waiter.poll_interval_ms must be smaller than the waiter timeouts",
            ));
        }

        Ok(())
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceConfig> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn poll_interval(&self) -> Duration {
        self.waiter.poll_interval()
    }

    pub fn propagation_timeout(&self) -> Duration {
        self.waiter.propagation_timeout()
    }

    pub fn relay_timeout(&self) -> Duration {
        self.waiter.relay_timeout()
    }

    pub fn federation_settle(&self) -> Duration {
        self.setup.federation_settle()
    }

    pub fn follow_recheck(&self) -> Duration {
        self.setup.follow_recheck()
    }
}

impl WaiterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn propagation_timeout(&self) -> Duration {
        Duration::from_millis(self.propagation_timeout_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SetupConfig {
    pub fn federation_settle(&self) -> Duration {
        Duration::from_millis(self.federation_settle_ms)
    }

    pub fn follow_recheck(&self) -> Duration {
        Duration::from_millis(self.follow_recheck_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SuiteConfig::default();
        config.validate().unwrap();
        assert_eq!(config.instances.len(), 5);
        assert_eq!(config.instance("delta").unwrap().domain, "lemmy-delta:8571");
        assert_eq!(config.waiter.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.waiter.propagation_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_suite_level_durations_follow_sections() {
        let mut config = SuiteConfig::default();
        config.waiter.poll_interval_ms = 100;
        config.waiter.relay_timeout_ms = 90_000;
        config.setup.federation_settle_ms = 0;
        config.setup.follow_recheck_ms = 1_500;

        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.propagation_timeout(), Duration::from_secs(10));
        assert_eq!(config.relay_timeout(), Duration::from_secs(90));
        assert_eq!(config.federation_settle(), Duration::ZERO);
        assert_eq!(config.follow_recheck(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = SuiteConfig::default();
        config.instances.clear();
        assert!(config.validate().is_err());

        let mut config = SuiteConfig::default();
        config.instances[1].name = "alpha".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate instance name"));

        let mut config = SuiteConfig::default();
        config.instances[0].base_url = "nope".into();
        assert!(config.validate().is_err());

        let mut config = SuiteConfig::default();
        config.waiter.poll_interval_ms = config.waiter.propagation_timeout_ms;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        env::set_var("FEDSUITE_WAITER__POLL_INTERVAL_MS", "250");
        env::set_var("FEDSUITE_PASSWORD", "hunter22");

        let result = SuiteConfig::load();

        env::remove_var("FEDSUITE_WAITER__POLL_INTERVAL_MS");
        env::remove_var("FEDSUITE_PASSWORD");

        let config = result.unwrap();
        assert_eq!(config.waiter.poll_interval_ms, 250);
        assert_eq!(config.password, "hunter22");
        assert_eq!(config.instances.len(), 5);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
password = "secret"

[setup]
federation_settle_ms = 0

[[instances]]
name = "one"
base_url = "http://localhost:9001"
domain = "one:9001"
seed_user = "admin_one"
"#
        )
        .unwrap();

        let config = SuiteConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.password, "secret");
        assert_eq!(config.instances.len(), 1);
        assert_eq!(config.instances[0].domain, "one:9001");
        assert_eq!(config.setup.federation_settle_ms, 0);
        assert_eq!(config.setup.main_community, "main");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_configuration_error() {
        let err = SuiteConfig::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert_eq!(err.category(), "configuration");
    }
}
