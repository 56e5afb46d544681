//! Director Configuration
//!
//! Loaded from `<home>/config/config.toml`:
//! - Database location and logging options
//! - RPC listen address
//! - State machine heartbeat
//! - One `[testnets.<chain_id>]` table per testnet to bootstrap

use crate::error::{DirectorError, DirectorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default home folder, relative to the user's home directory
pub const DEFAULT_DIRECTOR_DIR: &str = ".director";
pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:27001";

/// Interval between two global sweeps of the state machine
pub const DEFAULT_STATEMACHINE_HEARTBEAT_SECS: u64 = 15;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable text
    #[default]
    Plain,
    Json,
}

/// Top level configuration for the director
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Root directory for all data, set from the command line
    #[serde(skip)]
    pub home: PathBuf,
    /// Database directory, relative to `home` unless absolute
    #[serde(default = "default_db_dir")]
    pub db_dir: String,
    /// Tracing filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Seconds between two global sweeps
    #[serde(default = "default_heartbeat_secs")]
    pub statemachine_heartbeat_secs: u64,
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Testnet descriptions keyed by chain ID
    #[serde(default)]
    pub testnets: BTreeMap<String, TestnetConfig>,
}

fn default_db_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

fn default_log_level() -> String {
    "testnet_director=info,warn".to_string()
}

fn default_heartbeat_secs() -> u64 {
    DEFAULT_STATEMACHINE_HEARTBEAT_SECS
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::new(),
            db_dir: default_db_dir(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            statemachine_heartbeat_secs: default_heartbeat_secs(),
            rpc: RpcConfig::default(),
            testnets: BTreeMap::new(),
        }
    }
}

impl DirectorConfig {
    /// Load the configuration from a TOML file
    pub fn load(path: &Path) -> DirectorResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> DirectorResult<Self> {
        toml::from_str(content)
            .map_err(|err| DirectorError::Config(format!("unable to parse config: {err}")))
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> DirectorResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| DirectorError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Path of the configuration file below `home`
    pub fn config_file(home: &Path) -> PathBuf {
        home.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE_NAME)
    }

    /// Full path of the database directory
    pub fn db_path(&self) -> PathBuf {
        rootify(&self.db_dir, &self.home)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.statemachine_heartbeat_secs)
    }

    /// Check parameter bounds before anything is started
    pub fn validate(&self) -> DirectorResult<()> {
        if self.statemachine_heartbeat_secs == 0 {
            return Err(DirectorError::Config("no heartbeat set".to_string()));
        }
        self.rpc
            .validate()
            .map_err(|e| DirectorError::Config(format!("error in [rpc] section: {}", e)))?;
        for (chain_id, testnet) in &self.testnets {
            if chain_id.is_empty() {
                return Err(DirectorError::Config("empty chain ID".to_string()));
            }
            testnet.validate().map_err(|e| {
                DirectorError::Config(format!("error in [testnets.{}] section: {}", chain_id, e))
            })?;
        }
        Ok(())
    }
}

/// RPC server options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// `host:port` to listen on; empty disables the RPC server
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl RpcConfig {
    /// Listen address without a `tcp://` scheme
    pub fn listen_addr(&self) -> &str {
        self.listen_address
            .strip_prefix("tcp://")
            .unwrap_or(&self.listen_address)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_address.is_empty() {
            return Ok(());
        }
        self.listen_addr()
            .parse::<std::net::SocketAddr>()
            .map(|_| ())
            .map_err(|e| format!("invalid listen_address {}: {}", self.listen_address, e))
    }
}

/// Conditions under which a testnet leaves the gathering state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestnetConfig {
    /// Seconds after director start before the testnet is served regardless of sign-ups
    #[serde(default)]
    pub timeout_secs: u64,
    /// Number of validators that triggers serving
    #[serde(default)]
    pub required_validators: u32,
}

impl TestnetConfig {
    pub fn new(required_validators: u32, timeout: Duration) -> Self {
        Self {
            timeout_secs: timeout.as_secs(),
            required_validators,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 && self.required_validators == 0 {
            return Err(
                "at least timeout_secs or required_validators must be greater than 0".to_string(),
            );
        }
        Ok(())
    }
}

fn rootify(path: &str, root: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
