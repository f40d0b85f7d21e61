//! Configuration
//!
//! Config is loaded with a three-layer resolution:
//! 1. An explicit path (`--config`), which must exist
//! 2. The override file in the config dir (~/.config/sift/config.toml)
//! 3. Embedded defaults (compiled into the binary)
//!
//! Missing keys in a file fall back to the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/sift.toml");

pub const DEFAULT_BASE_URL: &str = "https://my.sevdesk.de/api/v1";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_NAME_TEMPLATE: &str = "Wise ({currency}, {identifier})";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub accounts: AccountsConfig,
    pub classifier: ClassifierConfig,
}

/// Remote ledger connection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub base_url: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    /// Set transactions back to open before deleting them. Whether the
    /// ledger needs this is unconfirmed, so it is off by default.
    pub reopen_before_delete: bool,
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
            reopen_before_delete: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Account display name; `{identifier}` and `{currency}` are substituted
    pub name_template: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Replaces the built-in card-settlement pattern when set
    pub card_settlement_pattern: Option<String>,
    pub exact_purpose: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            card_settlement_pattern: None,
            exact_purpose: true,
        }
    }
}

impl Config {
    /// Load from `path` if given, else the override file, else the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::NotFound(format!(
                        "config file {}",
                        path.display()
                    )));
                }
                debug!("Loading config from {}", path.display());
                fs::read_to_string(path)?
            }
            None => match default_config_path().filter(|p| p.exists()) {
                Some(default_path) => {
                    debug!("Loading config from {}", default_path.display());
                    fs::read_to_string(&default_path)?
                }
                None => DEFAULT_CONFIG.to_string(),
            },
        };

        Self::parse(&content)
    }

    /// Parse and validate TOML config text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ledger.page_size == 0 {
            return Err(Error::InvalidData("ledger.page_size must be at least 1".into()));
        }
        if self.ledger.base_url.trim().is_empty() {
            return Err(Error::InvalidData("ledger.base_url must not be empty".into()));
        }
        Ok(())
    }
}

/// Get the default override path (~/.config/sift/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sift").join("config.toml"))
}
