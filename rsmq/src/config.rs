//! Configuration management

use rsmq_queue::RsmqOptions;
use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub queue: RsmqOptions,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_port() -> u16 {
    6380
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    /// Load configuration from `rsmq.{toml,yaml,json}` and `RSMQ_*` variables,
    /// e.g. `RSMQ_QUEUE__REAL_TIME=true`
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("rsmq").required(false))
            .add_source(config::Environment::with_prefix("RSMQ").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }
}
