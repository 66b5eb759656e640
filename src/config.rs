use crate::cli::Cli;
use crate::error::{ProxyError, ProxyResult};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

const TRACE_LEVELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
const LOCAL_SETTINGS_YAML_FILE: &str = ".env.local.yaml";

// All settings may be configured via environment variables. Example:
// CACHE_TTL_MS=60000 would set cache_ttl_ms to one minute.
// Command-line flags take precedence over everything else.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_trace_level")]
    trace_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_melon_chart_url")]
    pub melon_chart_url: String,
    // Sent as Referer, Melon filters requests not coming from its own pages
    #[serde(default = "default_melon_referer")]
    pub melon_referer: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
}

impl Settings {
    pub fn new(cli: Cli) -> ProxyResult<Self> {
        let mut figment = Figment::new();
        if Path::new(LOCAL_SETTINGS_YAML_FILE).exists() {
            println!(
                "\n######################################\n\
                   ##   Found '.env.local.yaml' file,  ##\n\
                   ##   loading local configuration.   ##\n\
                   ######################################\n\
                "
            );
            figment = figment.merge(Yaml::file(LOCAL_SETTINGS_YAML_FILE));
        }
        let figment = figment.merge(Env::raw()).merge(Serialized::defaults(cli));

        Settings::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> ProxyResult<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> ProxyResult<()> {
        if self.fetch_attempts == 0 {
            return Err(ProxyError::Config(
                "fetch_attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ProxyError::Config(
                "fetch_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if reqwest::Url::parse(&self.melon_chart_url).is_err() {
            return Err(ProxyError::Config(format!(
                "melon_chart_url is not a valid url: {}",
                self.melon_chart_url
            )));
        }
        Ok(())
    }

    pub fn get_trace_level(&self) -> Level {
        get_trace_level(&self.trace_level)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn get_trace_level(level_str: &str) -> Level {
    match level_str.to_uppercase().as_str() {
        level if level == TRACE_LEVELS[0] => Level::TRACE,
        level if level == TRACE_LEVELS[1] => Level::DEBUG,
        level if level == TRACE_LEVELS[2] => Level::INFO,
        level if level == TRACE_LEVELS[3] => Level::WARN,
        level if level == TRACE_LEVELS[4] => Level::ERROR,
        // Default trace level
        _ => Level::INFO,
    }
}

fn default_trace_level() -> String {
    "INFO".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_melon_chart_url() -> String {
    "https://www.melon.com/chart/index.htm".to_string()
}

fn default_melon_referer() -> String {
    "https://www.melon.com/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36".to_string()
}

fn default_cache_ttl_ms() -> u64 {
    30_000
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_attempts() -> u32 {
    1
}
