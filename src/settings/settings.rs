use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub http: Http,
    pub store: Store,
    pub cache: Cache,
    pub auth: Auth,
    pub notifier: Notifier,
    pub invitation: Invitation,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    // TLS is enabled only when both are set
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub backend: String, // "memory" or "redis"
    pub redis_dsn: Option<String>,
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub backend: String, // "fake" or "jwt"
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Falls back to the `JWT_SIGNING_KEY` environment variable.
    pub signing_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Notifier {
    pub backend: String, // "log" or "kafka"
    pub topic: String,
    pub bootstrap_servers: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct Invitation {
    pub code_length: usize,
    pub max_attempts: u32,
}

fn default_cache_prefix() -> String {
    "waymark".to_owned()
}

fn default_batch_size() -> u32 {
    256
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_retry_backoff_secs() -> i64 {
    2
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
