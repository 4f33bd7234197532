use std::collections::HashMap;
use std::path::PathBuf;

use crate::model::{RoomBounds, RoomId};

/// Where the store lives and who opens it.
#[derive(Clone)]
pub struct StoreConfig {
    /// Data directory holding the WAL.
    pub endpoint: PathBuf,
    pub principal: String,
    pub secret: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub store: StoreConfig,
    pub rooms: RoomBounds,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing required setting {key}"),
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const STORE_URL: &str = "ROOMBOOK_STORE_URL";
pub const STORE_USER: &str = "ROOMBOOK_STORE_USER";
pub const STORE_PASSWORD: &str = "ROOMBOOK_STORE_PASSWORD";

impl Config {
    /// Load from the process environment, after merging a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(ConfigError::Missing(key))
        };

        let store = StoreConfig {
            endpoint: PathBuf::from(required(STORE_URL)?),
            principal: required(STORE_USER)?,
            secret: required(STORE_PASSWORD)?,
        };

        let min_room: RoomId = parse_or(&vars, "ROOMBOOK_MIN_ROOM", 1)?;
        let max_room: RoomId = parse_or(&vars, "ROOMBOOK_MAX_ROOM", 10)?;
        if min_room > max_room {
            return Err(ConfigError::Invalid {
                key: "ROOMBOOK_MAX_ROOM",
                value: max_room.to_string(),
            });
        }

        Ok(Self {
            bind: vars
                .get("ROOMBOOK_BIND")
                .cloned()
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&vars, "ROOMBOOK_PORT", 8080)?,
            store,
            rooms: RoomBounds::new(min_room, max_room),
            compact_threshold: parse_or(&vars, "ROOMBOOK_COMPACT_THRESHOLD", 1000)?,
            metrics_port: vars
                .get("ROOMBOOK_METRICS_PORT")
                .map(|v| parse_value("ROOMBOOK_METRICS_PORT", v))
                .transpose()?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        Some(v) => parse_value(key, v),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
