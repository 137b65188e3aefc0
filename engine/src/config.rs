use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub fetch_timeout_secs: u64,
    pub whois_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub user_agent: String,
    pub metrics_enabled: bool,
    /// Fixed WHOIS server; when unset the registry is discovered through IANA.
    pub whois_server: Option<String>,
    pub psl_path: Option<String>,
    pub psl_url: Option<String>,
}

impl Config {
    /// Defaults, then `phishscan.toml` if present, then `PHISHSCAN_*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("phishscan")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("model_path", "engine/data/model.json")?
            .set_default("fetch_timeout_secs", 5)?
            .set_default("whois_timeout_secs", 5)?
            .set_default("max_body_bytes", 5 * 1024 * 1024)?
            .set_default(
                "user_agent",
                concat!("phishscan-engine/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("metrics_enabled", true)?
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("PHISHSCAN").try_parsing(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.fetch_timeout_secs == 0 || self.whois_timeout_secs == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "timeouts must be at least one second".to_string(),
            )));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_secs)
    }
}
