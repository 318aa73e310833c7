//! Opening authenticated IMAP connections.

use std::future::Future;
use std::time::Duration;

use mailgate_imap::{Authenticated, Client, ImapStream};
use tracing::{info, warn};

use crate::account::Account;
use crate::error::{Error, Result};
use crate::transport::ImapTransport;

/// Bounded exponential backoff for transient connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th failed attempt (1-based).
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Timeouts and retry policy for new connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectSettings {
    /// TCP connect, TLS handshake and greeting.
    pub connect_timeout: Duration,
    /// Each command round trip.
    pub io_timeout: Duration,
    /// Retries for transient failures.
    pub retry: RetryPolicy,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Connects and logs in to the account's IMAP server.
///
/// # Errors
///
/// [`Error::Authentication`] when the server rejects the credentials, which
/// is never retried. [`Error::Connection`] once network, TLS or timeout
/// failures exhaust the retry policy.
pub async fn connect(account: &Account, settings: &ConnectSettings) -> Result<ImapTransport> {
    let config = account.imap_config(settings.connect_timeout, settings.io_timeout);
    let client = with_retry(&settings.retry, || login(&config, account))
        .await
        .map_err(Error::from_connect)?;
    info!(host = %config.host, port = config.port, "IMAP session opened");
    Ok(ImapTransport::new(client))
}

async fn login(
    config: &mailgate_imap::Config,
    account: &Account,
) -> mailgate_imap::Result<Client<ImapStream, Authenticated>> {
    let client = mailgate_imap::connect(config).await?;
    client.login(account.login_name(), &account.password).await
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
pub(crate) async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> mailgate_imap::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = mailgate_imap::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut failures = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && failures + 1 < attempts => {
                failures += 1;
                let delay = policy.delay(failures);
                warn!(attempt = failures, ?delay, error = %err, "transient connection failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
