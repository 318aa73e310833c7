//! # mailgate-core
//!
//! Mailbox, message and session services behind the mailgate webmail
//! gateway.
//!
//! This crate provides:
//! - Account credentials and validation
//! - Session storage keyed by bearer token, with idle expiry
//! - Connection setup with retry on transient failures
//! - Mailbox directory with role tags and fuzzy folder resolution
//! - Seven-day listing and search grouped into subject threads
//! - Message mutations: trash, spam, star, move, copy and draft saving
//! - Attachment download
//!
//! Services are generic over [`MailTransport`]; [`ImapTransport`] is the
//! production implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod attachment;
pub mod directory;
mod error;
pub mod mutator;
pub mod query;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
mod transport;

pub use account::{Account, Encryption, Protocol, ValidationError, ValidationResult, validate_account};
pub use attachment::{AttachmentContent, get_attachment};
pub use directory::{Mailbox, MailboxRole};
pub use error::{Error, Result};
pub use session::{ConnectSettings, RetryPolicy, Session, SessionStore, connect};
pub use transport::{ImapTransport, MailTransport, TransportCapabilities};
