//! Shared application state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mailgate_core::{Account, ConnectSettings, ImapTransport, MailTransport, SessionStore};
use tracing::debug;

use crate::config::Config;
use crate::wizard::Autoconfig;

/// How often expired sessions are swept.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Opens a mail transport for an account.
pub trait Connector: Send + Sync + 'static {
    /// Transport handed to the services.
    type Transport: MailTransport + 'static;

    /// Connects and logs in.
    fn connect(&self, account: &Account) -> impl Future<Output = mailgate_core::Result<Self::Transport>> + Send;
}

/// Connects over IMAP with the configured timeouts and retry policy.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    settings: ConnectSettings,
}

impl ImapConnector {
    /// Connector using `settings`.
    #[must_use]
    pub const fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }
}

impl Connector for ImapConnector {
    type Transport = ImapTransport;

    async fn connect(&self, account: &Account) -> mailgate_core::Result<ImapTransport> {
        mailgate_core::connect(account, &self.settings).await
    }
}

/// State shared by every handler.
pub struct AppState<C = ImapConnector> {
    /// Gateway settings.
    pub config: Config,
    /// Logged-in users.
    pub sessions: SessionStore,
    /// Transport factory.
    pub connector: C,
    /// Settings wizard client.
    pub autoconfig: Autoconfig,
}

impl<C: Connector> AppState<C> {
    /// Builds the state with an empty session store.
    #[must_use]
    pub fn new(config: Config, connector: C, autoconfig: Autoconfig) -> Self {
        Self {
            sessions: SessionStore::new(config.session_ttl),
            config,
            connector,
            autoconfig,
        }
    }
}

/// Ends a transport's session, logging failures.
pub async fn close<T: MailTransport>(transport: T) {
    if let Err(err) = transport.logout().await {
        debug!(error = %err, "logout failed");
    }
}

/// Periodically drops expired sessions until the state is gone.
pub fn spawn_session_purge<C: Connector>(state: &Arc<AppState<C>>) {
    let state = Arc::downgrade(state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else { break };
            let purged = state.sessions.purge_expired().await;
            if purged > 0 {
                let remaining = state.sessions.len().await;
                debug!(purged, remaining, "expired sessions purged");
            }
        }
        debug!("session purge stopped");
    });
}
