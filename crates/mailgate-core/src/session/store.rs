//! In-memory session store.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::account::Account;

const TOKEN_LEN: usize = 48;

/// A logged-in user.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token presented by the client.
    pub token: String,
    /// Credential used to open IMAP connections.
    pub account: Account,
    /// Drafts folder recorded while listing folders.
    pub draft_folder: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    last_used: Instant,
}

/// Sessions keyed by token, expiring after an idle TTL.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Idle time after which a session expires.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `account` under a new random token.
    pub async fn create(&self, account: Account) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let session = Session {
            token: token.clone(),
            account,
            draft_folder: None,
            created_at: Utc::now(),
            last_used: Instant::now(),
        };
        info!(email = %session.account.email, "session created");
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// Returns a live session and marks it used. Expired sessions are dropped.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let session = sessions.get_mut(token)?;
        if now.duration_since(session.last_used) > self.ttl {
            debug!(email = %session.account.email, "session expired");
            sessions.remove(token);
            return None;
        }
        session.last_used = now;
        Some(session.clone())
    }

    /// Records the drafts folder for a session. Returns false if absent.
    pub async fn set_draft_folder(&self, token: &str, path: impl Into<String>) -> bool {
        match self.sessions.write().await.get_mut(token) {
            Some(session) => {
                session.draft_folder = Some(path.into());
                true
            }
            None => false,
        }
    }

    /// Ends a session.
    pub async fn remove(&self, token: &str) -> Option<Session> {
        let removed = self.sessions.write().await.remove(token);
        if let Some(session) = &removed {
            info!(email = %session.account.email, "session removed");
        }
        removed
    }

    /// Drops every expired session and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.last_used) <= self.ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "expired sessions purged");
        }
        purged
    }

    /// Number of stored sessions, expired or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True when no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            email: "alice@example.com".into(),
            host: "imap.example.com".into(),
            password: "secret".into(),
            ..Account::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_get() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(account()).await;
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let session = store.get(&token).await.unwrap();
        assert_eq!(session.account.email, "alice@example.com");
        assert!(session.draft_folder.is_none());
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_expiry_and_touch() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(account()).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(&token).await.is_some());
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(&token).await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get(&token).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = SessionStore::new(Duration::from_secs(10));
        let old = store.create(account()).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        let fresh = store.create(account()).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&fresh).await.is_some());
        assert!(store.remove(&old).await.is_none());
    }

    #[tokio::test]
    async fn test_draft_folder_and_remove() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(account()).await;
        assert!(store.set_draft_folder(&token, "INBOX.Drafts").await);
        assert_eq!(store.get(&token).await.unwrap().draft_folder.as_deref(), Some("INBOX.Drafts"));

        assert!(store.remove(&token).await.is_some());
        assert!(!store.set_draft_folder(&token, "Drafts").await);
    }
}
