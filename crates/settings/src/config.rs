//! Configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use geomarket_core::{parse_address, Address};

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Market and node settings
    #[serde(default)]
    pub market: MarketSettings,

    /// Resolution service settings
    #[serde(default)]
    pub resolution: ResolutionSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

/// Market and node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Node JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Market contract address (`0x`-prefixed hex)
    #[serde(default)]
    pub address: Option<String>,

    /// Market deployment block; scans without it only cover recent history
    #[serde(default)]
    pub deploy_block: Option<u64>,

    /// Sender account for submissions (the node holds its key)
    #[serde(default)]
    pub sender: Option<String>,
}

fn default_rpc_url() -> String {
    "https://sepolia.base.org".to_string()
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            address: None,
            deploy_block: None,
            sender: None,
        }
    }
}

/// Resolution service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionSettings {
    /// Base URL of the resolution service; without one the claim path
    /// uses the degraded fallback
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("loaded settings from {:?}", path);
            settings
        } else {
            Self::default()
        };
        settings.config_path = Some(path.clone());
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("saved settings to {:?}", path);
        Ok(())
    }

    /// Apply environment-variable overrides on top of file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GEOMARKET_RPC_URL") {
            self.market.rpc_url = url;
        }
        if let Ok(addr) = std::env::var("GEOMARKET_MARKET_ADDRESS") {
            self.market.address = Some(addr);
        }
        if let Ok(block) = std::env::var("GEOMARKET_DEPLOY_BLOCK") {
            if let Ok(block) = block.parse() {
                self.market.deploy_block = Some(block);
            }
        }
        if let Ok(sender) = std::env::var("GEOMARKET_SENDER") {
            self.market.sender = Some(sender);
        }
        if let Ok(url) = std::env::var("GEOMARKET_RESOLUTION_API") {
            self.resolution.api_url = Some(url);
        }
    }

    /// Parsed market address; missing or malformed is a configuration
    /// error before any network call.
    pub fn market_address(&self) -> Result<Address> {
        let raw = self
            .market
            .address
            .as_deref()
            .ok_or(SettingsError::MissingMarketAddress)?;
        parse_address(raw).map_err(|_| SettingsError::InvalidAddress(raw.to_string()))
    }

    /// Parsed sender address, if configured.
    pub fn sender_address(&self) -> Result<Option<Address>> {
        match self.market.sender.as_deref() {
            None => Ok(None),
            Some(raw) => parse_address(raw)
                .map(Some)
                .map_err(|_| SettingsError::InvalidAddress(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.market.rpc_url, "https://sepolia.base.org");
        assert!(settings.market.address.is_none());
        assert!(settings.resolution.api_url.is_none());
    }

    #[test]
    fn test_missing_market_address_is_config_error() {
        let settings = Settings::default();
        assert!(matches!(
            settings.market_address(),
            Err(SettingsError::MissingMarketAddress)
        ));
    }

    #[test]
    fn test_malformed_market_address_is_config_error() {
        let mut settings = Settings::default();
        settings.market.address = Some("0x1234".to_string());
        assert!(matches!(
            settings.market_address(),
            Err(SettingsError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_known_fields() {
        let json = r#"{
            "market": {
                "rpc_url": "http://localhost:8545",
                "address": "0x3300000000000000000000000000000000000033",
                "deploy_block": 123,
                "sender": "0x0b00000000000000000000000000000000000000"
            },
            "resolution": { "api_url": "http://localhost:9000" }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.market.rpc_url, "http://localhost:8545");
        assert_eq!(settings.market.deploy_block, Some(123));
        assert!(settings.market_address().is_ok());
        assert!(settings.sender_address().unwrap().is_some());
        assert_eq!(settings.resolution.api_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.market.rpc_url, "https://sepolia.base.org");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join("geomarket-settings-test");
        let path = dir.join("settings.json");
        let _ = std::fs::remove_file(&path);

        let mut settings = Settings::default();
        settings.market.address = Some("0x3300000000000000000000000000000000000033".to_string());
        settings.save_to(&path).unwrap();

        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(
            reloaded.market.address.as_deref(),
            Some("0x3300000000000000000000000000000000000033")
        );
        let _ = std::fs::remove_file(&path);
    }
}
