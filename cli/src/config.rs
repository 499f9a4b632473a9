use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sovreddit_sync::TxDetails;

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Base URL of the sequencer accepting signed transactions
    #[serde(default = "default_sequencer_url")]
    pub sequencer_url: String,
    /// Base URL of the read-model API
    #[serde(default = "default_read_url")]
    pub read_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_max_fee")]
    pub max_fee: String,
    #[serde(default)]
    pub max_priority_fee_bips: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_sequencer_url() -> String {
    "http://localhost:12346".to_string()
}

fn default_read_url() -> String {
    "http://localhost:3006".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_chain_id() -> u64 {
    sovreddit_sync::envelope::DEFAULT_CHAIN_ID
}

fn default_max_fee() -> String {
    sovreddit_sync::envelope::DEFAULT_MAX_FEE.to_string()
}

fn default_key_file() -> PathBuf {
    PathBuf::from("./sovreddit-key.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            sequencer_url: default_sequencer_url(),
            read_url: default_read_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            max_fee: default_max_fee(),
            max_priority_fee_bips: 0,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EndpointsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl TransactionConfig {
    pub fn tx_details(&self) -> TxDetails {
        TxDetails {
            max_priority_fee_bips: self.max_priority_fee_bips,
            max_fee: self.max_fee.clone(),
            gas_limit: None,
            chain_id: self.chain_id,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => toml::from_str(&content).context("Failed to parse config file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).context("Failed to read config file"),
        }
    }
}
