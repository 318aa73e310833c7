//! Account model types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport security requested at login.
///
/// `tls` follows the historical webmail meaning of STARTTLS on the plain
/// port; `ssl` is implicit TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// Plain text (not recommended).
    #[serde(alias = "plain")]
    None,
    /// Implicit TLS.
    #[default]
    Ssl,
    /// STARTTLS upgrade.
    Tls,
    /// STARTTLS upgrade.
    StartTls,
}

impl Encryption {
    /// IMAP connection security for this mode.
    #[must_use]
    pub const fn security(self) -> mailgate_imap::Security {
        match self {
            Self::None => mailgate_imap::Security::None,
            Self::Ssl => mailgate_imap::Security::Implicit,
            Self::Tls | Self::StartTls => mailgate_imap::Security::StartTls,
        }
    }
}

/// Mail access protocol. Only IMAP is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// IMAP4rev1.
    #[default]
    Imap,
}

/// Stored mail-account credential.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Account {
    /// The user's email address.
    pub email: String,
    /// IMAP server host name.
    pub host: String,
    /// IMAP port; 0 selects the default for `encryption`.
    #[serde(default)]
    pub port: u16,
    /// Transport security.
    #[serde(default)]
    pub encryption: Encryption,
    /// Login name; empty means the email address.
    #[serde(default)]
    pub username: String,
    /// Password.
    pub password: String,
    /// Access protocol.
    #[serde(default)]
    pub protocol: Protocol,
}

impl Account {
    /// Name sent with LOGIN.
    #[must_use]
    pub fn login_name(&self) -> &str {
        if self.username.trim().is_empty() {
            self.email.trim()
        } else {
            self.username.trim()
        }
    }

    /// IMAP connection parameters for this account.
    #[must_use]
    pub fn imap_config(&self, connect_timeout: Duration, io_timeout: Duration) -> mailgate_imap::Config {
        let mut config = mailgate_imap::Config::new(self.host.trim(), self.encryption.security())
            .with_timeouts(connect_timeout, io_timeout);
        if self.port != 0 {
            config = config.with_port(self.port);
        }
        config
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("protocol", &self.protocol)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_names() {
        let parsed: Encryption = serde_json::from_str("\"starttls\"").unwrap();
        assert_eq!(parsed, Encryption::StartTls);
        let parsed: Encryption = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(parsed, Encryption::None);
        assert_eq!(Encryption::Tls.security(), mailgate_imap::Security::StartTls);
        assert_eq!(Encryption::Ssl.security(), mailgate_imap::Security::Implicit);
    }

    #[test]
    fn test_port_defaults_by_security() {
        let account = Account {
            host: "imap.example.com".into(),
            encryption: Encryption::Tls,
            ..Account::default()
        };
        let config = account.imap_config(Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(config.port, 143);

        let account = Account { port: 10993, ..account };
        let config = account.imap_config(Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(config.port, 10993);
    }

    #[test]
    fn test_login_name_falls_back_to_email() {
        let mut account = Account {
            email: "alice@example.com".into(),
            ..Account::default()
        };
        assert_eq!(account.login_name(), "alice@example.com");
        account.username = "alice".into();
        assert_eq!(account.login_name(), "alice");
    }

    #[test]
    fn test_debug_redacts_password() {
        let account = Account {
            password: "hunter2".into(),
            ..Account::default()
        };
        assert!(!format!("{account:?}").contains("hunter2"));
    }
}
