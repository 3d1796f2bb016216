use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TokenError;

/// Property keys used to persist credentials in the host's data-source settings
pub const PROP_SECRET: &str = "secret";
pub const PROP_ADDRESS: &str = "address";
pub const PROP_TOKEN_FILE: &str = "token_file";

pub const ENV_VAULT_AGENT_ADDR: &str = "VAULT_AGENT_ADDR";
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_CONFIG_PATH: &str = "VAULT_CONFIG_PATH";

const DEFAULT_VAULT_CONFIG_FILE: &str = ".vault";
const DEFAULT_VAULT_TOKEN_FILE: &str = ".vault-token";

/// Vault settings attached to a single data source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_token_file(mut self, token_file: impl Into<PathBuf>) -> Self {
        self.token_file = Some(token_file.into());
        self
    }

    /// Load credentials from the host's auth property bag
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        Self {
            secret: props.get(PROP_SECRET).cloned(),
            address: props.get(PROP_ADDRESS).cloned(),
            token_file: props.get(PROP_TOKEN_FILE).map(PathBuf::from),
        }
    }

    /// Save credentials into the host's auth property bag
    pub fn save_properties(&self, props: &mut HashMap<String, String>) {
        let entries = [
            (PROP_SECRET, self.secret.clone()),
            (PROP_ADDRESS, self.address.clone()),
            (
                PROP_TOKEN_FILE,
                self.token_file
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            ),
        ];

        for (key, value) in entries {
            match value {
                Some(value) => {
                    props.insert(key.to_string(), value);
                }
                None => {
                    props.remove(key);
                }
            }
        }
    }

    /// Load a data-source profile from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read profile: {:?}", path.as_ref()))?;

        toml::from_str(&contents).context("Failed to parse profile")
    }

    /// Create a sample data-source profile
    pub fn create_sample<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample = Self {
            secret: Some("database/creds/readonly".to_string()),
            address: Some("http://127.0.0.1:8200".to_string()),
            token_file: None,
        };

        let toml_string =
            toml::to_string_pretty(&sample).context("Failed to serialize sample profile")?;
        fs::write(path.as_ref(), toml_string)
            .with_context(|| format!("Failed to write sample profile to {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Snapshot of the process environment that resolution depends on
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub vault_agent_addr: Option<String>,
    pub vault_addr: Option<String>,
    pub vault_config_path: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
}

impl Environment {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        Self {
            vault_agent_addr: env_var(ENV_VAULT_AGENT_ADDR),
            vault_addr: env_var(ENV_VAULT_ADDR),
            vault_config_path: env_var(ENV_VAULT_CONFIG_PATH).map(PathBuf::from),
            home_dir: env_var("HOME").map(PathBuf::from),
        }
    }

    /// Location of the Vault CLI config file holding the token helper
    pub fn config_file(&self) -> Option<PathBuf> {
        self.vault_config_path
            .clone()
            .or_else(|| self.home_dir.as_ref().map(|h| h.join(DEFAULT_VAULT_CONFIG_FILE)))
    }

    pub fn default_token_file(&self) -> Option<PathBuf> {
        self.home_dir.as_ref().map(|h| h.join(DEFAULT_VAULT_TOKEN_FILE))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Subset of the Vault CLI config file that matters for token lookup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultConfig {
    #[serde(default, rename = "token_helper", alias = "tokenHelper")]
    pub token_helper: Option<String>,
}

impl VaultConfig {
    /// Parse the JSON config file; it is read fresh on every call
    pub fn from_file(path: &Path) -> Result<Self, TokenError> {
        let contents = fs::read_to_string(path).map_err(|source| TokenError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| TokenError::InvalidConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configured helper command, ignoring blank values
    pub fn token_helper(&self) -> Option<&str> {
        self.token_helper
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}
