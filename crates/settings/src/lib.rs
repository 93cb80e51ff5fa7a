//! GeoMarket Settings
//!
//! Configuration for the CLI and any embedding application: node RPC
//! endpoint, market contract address, optional deployment block, sender
//! account, and the optional resolution service URL.
//!
//! Settings load from a JSON file (`~/.geomarket/settings.json` by
//! default) and individual values can be overridden through environment
//! variables, so one-off runs don't need a file at all.

mod config;

pub use config::{MarketSettings, ResolutionSettings, Settings};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("market address is not configured")]
    MissingMarketAddress,

    #[error("invalid address in settings: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".geomarket").join("settings.json"),
        None => PathBuf::from("geomarket-settings.json"),
    }
}
