//! # mailgate-imap
//!
//! A compact async IMAP4rev1 client covering what a webmail gateway needs:
//! LOGIN, LIST, CREATE, SELECT, UID SEARCH/THREAD/FETCH/STORE/COPY/MOVE,
//! EXPUNGE and APPEND, with the MOVE, UIDPLUS, WITHIN, THREAD and
//! SPECIAL-USE extensions.
//!
//! ## Example
//!
//! ```ignore
//! use mailgate_imap::{Config, FetchAttribute, SearchCriteria, Security, UidSet};
//!
//! let config = Config::new("imap.example.com", Security::Implicit);
//! let client = mailgate_imap::connect(&config).await?;
//! let client = client.login("user@example.com", "secret").await?;
//! let mut inbox = client.select("INBOX").await?;
//! let uids = inbox.uid_search(SearchCriteria::Younger(604_800)).await?;
//! let messages = inbox
//!     .uid_fetch(&UidSet::from_uids(uids), vec![FetchAttribute::Envelope])
//!     .await?;
//! inbox.logout().await?;
//! ```
//!
//! ## Connection states
//!
//! ```text
//! NotAuthenticated ── login() ──▶ Authenticated ── select() ──▶ Selected
//!                                        ▲                         │
//!                                        └──── list/create/append ─┘
//! ```
//!
//! Mailbox names are UTF-8 throughout the API; modified UTF-7 is applied
//! only on the wire.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchCriteria, StoreAction, TagGenerator, ThreadAlgorithm, Wire};
pub use connection::{
    Authenticated, Authorized, Client, Config, FramedStream, ImapStream, NotAuthenticated, Security,
    Selected, connect,
};
pub use error::{Error, Result};
pub use parser::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, FetchResponse, Response,
    ResponseCode, UntaggedResponse, parse_response,
};
pub use types::{Capability, Flag, ListResponse, MailboxAttribute, MailboxStatus, Status, Uid, UidSet};
