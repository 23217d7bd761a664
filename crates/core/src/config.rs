//! Startup configuration for the trading credentials.
//!
//! Credentials come from a config file when one exists at the configured
//! path, otherwise from the environment. A missing private key is fatal.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub const ENV_CONFIG_FILE: &str = "CONFIG_FILE";
pub const ENV_PRIVATE_KEY: &str = "HYPERLIQUID_PRIVATE_KEY";
pub const ENV_ACCOUNT_ADDRESS: &str = "HYPERLIQUID_ACCOUNT_ADDRESS";
pub const ENV_TESTNET: &str = "HYPERLIQUID_TESTNET";

/// Errors raised while assembling startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingCredential(&'static str),
    #[error("REQUIRE_AUTH is enabled but API_KEY is empty")]
    MissingApiKey,
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Interpret an environment flag the way the deployment scripts set them:
/// only a case-insensitive "true" enables it.
pub fn parse_flag(value: Option<&str>) -> bool {
    value
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// On-disk credential file layout.
#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    private_key: Option<String>,
    account_address: Option<String>,
    #[serde(default)]
    testnet: bool,
}

/// Where the credentials were loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    File(PathBuf),
    Environment,
}

/// Exchange signer credentials.
#[derive(Clone)]
pub struct TradingCredentials {
    pub private_key: String,
    /// Account to query; defaults to the signer's own address when absent.
    pub account_address: Option<String>,
    pub testnet: bool,
    pub source: CredentialSource,
}

impl fmt::Debug for TradingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingCredentials")
            .field("private_key", &"<redacted>")
            .field("account_address", &self.account_address)
            .field("testnet", &self.testnet)
            .field("source", &self.source)
            .finish()
    }
}

impl TradingCredentials {
    /// Load credentials from `config_file` if it exists, else from `env`.
    pub fn load<F>(config_file: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (file, source) = if config_file.exists() {
            info!(path = %config_file.display(), "Loading credentials from config file");
            (read_credential_file(config_file)?, CredentialSource::File(config_file.to_path_buf()))
        } else {
            let file = CredentialFile {
                private_key: env(ENV_PRIVATE_KEY),
                account_address: env(ENV_ACCOUNT_ADDRESS),
                testnet: parse_flag(env(ENV_TESTNET).as_deref()),
            };
            (file, CredentialSource::Environment)
        };

        let private_key = file
            .private_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential(ENV_PRIVATE_KEY))?;

        let account_address = file
            .account_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        Ok(Self {
            private_key,
            account_address,
            testnet: file.testnet,
            source,
        })
    }
}

fn read_credential_file(path: &Path) -> Result<CredentialFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let parsed = if is_toml {
        toml::from_str(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
