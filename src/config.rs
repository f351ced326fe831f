use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use snafu::ResultExt as _;

use crate::auth::AuthConfig;
use crate::database::SurrealConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::media::MediaConfig;
use crate::payment::PaymentConfig;

/// Settings read from the process environment (and `.env`, when present).
///
/// Nested settings are flattened, so every key is a plain variable such as `SURREAL_ENDPOINT` or `STRIPE_SECRET_KEY`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Upper bound for a single call to the media service or the payment gateway.
    #[serde(default = "default_external_timeout")]
    pub external_timeout_secs: u64,
    /// How long a request waits for records another request is modifying.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
    /// Upper bound for a whole HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(flatten)]
    pub surreal: SurrealConfig,
    #[serde(flatten)]
    pub media: MediaConfig,
    #[serde(flatten)]
    pub payment: PaymentConfig,
    #[serde(flatten)]
    pub auth: AuthConfig,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_external_timeout() -> u64 {
    15
}

fn default_lock_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    60
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
