//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network, TLS or timeout failure while connecting.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A folder could not be found or created.
    #[error("Mailbox unavailable: {0}")]
    MailboxUnavailable(String),

    /// A copy, move, expunge or append produced nothing.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Attachment, part or upload not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request data that cannot be acted on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IMAP command failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailgate_imap::Error),

    /// MIME decoding failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailgate_mime::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classifies an error raised while connecting or logging in.
    pub(crate) fn from_connect(err: mailgate_imap::Error) -> Self {
        match err {
            mailgate_imap::Error::Auth(text) => Self::Authentication(text),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
