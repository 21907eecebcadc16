use anyhow::{Context, Result};
use config::{Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub broker: BrokerConfig,
    pub bus: BusConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
    pub log_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Prefix put in front of every topic and service name.
    pub namespace: String,
    /// Unset means a service call waits for its response forever.
    pub call_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub refresh_hz: u32,
    pub feedback_ms: u64,
    pub dark: bool,
}

impl BusConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

impl UiConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.refresh_hz.max(1)))
    }

    pub fn feedback_delay(&self) -> Duration {
        Duration::from_millis(self.feedback_ms)
    }
}

impl Config {
    /// Loads defaults, then the environment file, then `explicit` (if any),
    /// then `MAV_TOOLS__SECTION__KEY` variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config_path = PathBuf::from(format!("config/{}.toml", env));
        let fallback_path = PathBuf::from(format!("/etc/mav-tools/{}.toml", env));

        let env_file = if config_path.exists() {
            config_path
        } else {
            fallback_path
        };

        let mut builder = Self::defaults()?.add_source(File::from(env_file).required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix("MAV_TOOLS").separator("__"))
            .build()
            .context("Failed to build configuration")?;
        let config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = config::Config::builder()
            .set_default("general.log_level", "info")?
            .set_default("general.log_file", "mav-tools.log")?
            .set_default("broker.host", "localhost")?
            .set_default("broker.port", 1883)?
            .set_default("broker.client_id", "mav-tools")?
            .set_default("broker.keep_alive_secs", 30)?
            .set_default("broker.connect_timeout_secs", 10)?
            .set_default("bus.namespace", "")?
            .set_default("ui.refresh_hz", 60)?
            .set_default("ui.feedback_ms", 1500)?
            .set_default("ui.dark", true)?;
        Ok(builder)
    }
}

#[cfg(test)]
mod tests;
