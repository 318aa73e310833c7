//! # mailgate
//!
//! Webmail API gateway. Proxies folder listing, message listing and search,
//! message fetch, trash/spam/star/move/copy, draft saving and attachment
//! download to the user's IMAP server over a JSON/HTTP surface, plus a
//! mail-server settings wizard.
//!
//! Sessions are held in memory and identified by a bearer token issued at
//! login. Each request opens its own IMAP connection and logs it out when
//! done.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod routes;
pub mod state;
pub mod wizard;

pub use config::Config;
pub use routes::router;
pub use state::{AppState, Connector, ImapConnector};
