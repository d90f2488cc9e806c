//! setting config file
//! `ENV` picks config_{ENV}.toml, every section falls back to defaults

use std::{fs::File, io::Read};
use lazy_static::lazy_static;
use serde_derive::Deserialize;
use std::env;
use super::error::{ErrorCode, PanelError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub application_name: String,
    pub scenario_name: String,
}

impl Default for Meta {
    fn default() -> Self {
        Meta {
            application_name: String::from("panel-device-engine"),
            scenario_name: String::from("panel_electric"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Env {
    pub debug: bool,
    pub env: String,
    pub log_level: String,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            debug: false,
            env: String::from("dev"),
            log_level: String::from("info"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Serial {
    pub port: String,
    pub baudrate: u32,
    // response timeout of one modbus request
    pub timeout_ms: u64,
}

impl Default for Serial {
    fn default() -> Self {
        Serial {
            port: String::from("/dev/ttyUSB0"),
            baudrate: 57600,
            timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Panel {
    // "real" opens the serial port, "dummy" simulates the resource handler
    pub mode: String,
    pub slave_id: u8,
    pub channel_count: usize,
    pub tick_interval_ms: u64,
    // delay between writing the final relays and stopping the worker
    pub exit_grace_ms: u64,
    // ticks a pending request may still take once shutdown is requested
    pub shutdown_grace_ticks: u32,
}

impl Default for Panel {
    fn default() -> Self {
        Panel {
            mode: String::from("real"),
            slave_id: 1,
            channel_count: crate::panel::prelude::MAX_CHANNELS,
            tick_interval_ms: 300,
            exit_grace_ms: 500,
            shutdown_grace_ticks: 10,
        }
    }
}

impl Panel {
    /// the `mode` env var wins over the config file
    pub fn is_dummy(&self) -> bool {
        let mode = env::var("mode").unwrap_or(self.mode.clone());
        mode == "dummy"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub meta: Meta,
    pub env: Env,
    pub serial: Serial,
    pub panel: Panel,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Settings, PanelError> {
        toml::from_str(content).map_err(|e| {
            PanelError::new(ErrorCode::ConfigError, &format!("config file format invalid: {}", e))
        })
    }

    pub fn load(file_path: &str) -> Result<Settings, PanelError> {
        let mut file = File::open(file_path).map_err(|e| {
            PanelError::new(ErrorCode::ConfigError, &format!("no such file {} exception: {}", file_path, e))
        })?;

        let mut str_val = String::new();
        file.read_to_string(&mut str_val).map_err(|e| {
            PanelError::new(ErrorCode::ConfigError, &format!("cannot read config file: {}", e))
        })?;

        Self::from_toml_str(&str_val)
    }

    fn from_env() -> Settings {
        let env = match env::var("ENV") {
            Ok(e) => e,
            Err(_) => String::from("dev"),
        };
        let file_path = format!("config_{}.toml", env);

        match Self::load(file_path.as_str()) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}, using default settings", e);
                Settings::default()
            }
        }
    }

    pub fn get<'a>() -> &'a Self {
        lazy_static! {
            static ref CACHE: Settings = Settings::from_env();
        }
        &CACHE
    }
}
