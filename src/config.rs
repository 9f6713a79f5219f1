use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt;
use url::Url;

use crate::error::{ApplicationError, ConfigLoadSnafu};

/// Process configuration, read from the environment.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(flatten)]
    pub database: DatabaseConfig,

    /// MaxMind country database used to attribute clicks.
    #[serde(default = "default_geoip_db_path")]
    pub geoip_db_path: PathBuf,
    /// How long the rendered page data stays cached, e.g. `10s` or `500ms`.
    #[serde(default = "default_cache_ttl", deserialize_with = "human_duration")]
    pub cache_ttl: Duration,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// When set, logs are also written here as JSON, one file per day.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// e.g. `ws://root:root@localhost:8000?ns=clickmap&db=clickmap`
    #[serde(rename = "database_url")]
    pub url: Url,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Config, ApplicationError> {
        envy::from_iter::<_, Config>(vars).context(ConfigLoadSnafu)
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

fn default_geoip_db_path() -> PathBuf {
    PathBuf::from("ip-to-country.mmdb")
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(10)
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn human_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
