//! Runtime configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use mailgate_core::{ConnectSettings, RetryPolicy};

/// Default public ISP database.
pub const DEFAULT_AUTOCONFIG_URL: &str = "https://autoconfig.thunderbird.net/v1.1";

/// Gateway settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address.
    pub bind: SocketAddr,
    /// Directory holding previously uploaded draft attachments.
    pub upload_dir: PathBuf,
    /// Idle time after which a session expires.
    pub session_ttl: Duration,
    /// IMAP timeouts and retry policy.
    pub connect: ConnectSettings,
    /// ISP database index used by the settings wizard.
    pub autoconfig_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3030)),
            upload_dir: PathBuf::from("storage/app"),
            session_ttl: Duration::from_secs(7200),
            connect: ConnectSettings::default(),
            autoconfig_url: DEFAULT_AUTOCONFIG_URL.to_string(),
        }
    }
}

impl Config {
    /// Reads `MAILGATE_*` variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            get(key).map_or(Ok(default), |v| parse::<u64>(key, &v).map(Duration::from_secs))
        };

        let attempts = get("MAILGATE_CONNECT_ATTEMPTS")
            .map_or(Ok(defaults.connect.retry.attempts), |v| parse::<u32>("MAILGATE_CONNECT_ATTEMPTS", &v))?;
        if attempts == 0 {
            anyhow::bail!("MAILGATE_CONNECT_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            bind: get("MAILGATE_BIND").map_or(Ok(defaults.bind), |v| parse("MAILGATE_BIND", &v))?,
            upload_dir: get("MAILGATE_UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
            session_ttl: secs("MAILGATE_SESSION_TTL_SECS", defaults.session_ttl)?,
            connect: ConnectSettings {
                connect_timeout: secs("MAILGATE_CONNECT_TIMEOUT_SECS", defaults.connect.connect_timeout)?,
                io_timeout: secs("MAILGATE_IO_TIMEOUT_SECS", defaults.connect.io_timeout)?,
                retry: RetryPolicy {
                    attempts,
                    ..defaults.connect.retry
                },
            },
            autoconfig_url: get("MAILGATE_AUTOCONFIG_URL")
                .map_or(defaults.autoconfig_url, |v| v.trim_end_matches('/').to_string()),
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().with_context(|| format!("invalid {key}: {value:?}"))
}
