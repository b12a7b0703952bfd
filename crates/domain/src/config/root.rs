use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::resolver::ResolverConfig;

const LOCAL_CONFIG_PATH: &str = "resolv-send.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/resolv-send/config.toml";

/// Main configuration structure for resolv-send
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Name servers, retry budget, timeout and option flags
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. resolv-send.toml in current directory
    /// 3. /etc/resolv-send/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(found) = Self::get_config_path() {
            Self::from_file(&found)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply command-line overrides to configuration
    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if !overrides.servers.is_empty() {
            self.resolver.servers = overrides.servers;
        }
        if let Some(retry) = overrides.retry {
            self.resolver.retry = retry;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.resolver.timeout_ms = timeout_ms;
        }

        let options = &mut self.resolver.options;
        options.use_vc |= overrides.use_vc;
        options.ignore_tc |= overrides.ignore_tc;
        options.stay_open |= overrides.stay_open;
        options.debug |= overrides.debug;

        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        if self.resolver.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if let Some(unspecified) = self
            .resolver
            .servers
            .iter()
            .find(|s| s.ip().is_unspecified() || s.port() == 0)
        {
            return Err(ConfigError::UnusableServer(*unspecified));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::FileWrite {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        [LOCAL_CONFIG_PATH, SYSTEM_CONFIG_PATH]
            .into_iter()
            .find(|p| std::path::Path::new(p).exists())
            .map(str::to_string)
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub servers: Vec<SocketAddr>,
    pub retry: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub use_vc: bool,
    pub ignore_tc: bool,
    pub stay_open: bool,
    pub debug: bool,
    pub log_level: Option<String>,
}
