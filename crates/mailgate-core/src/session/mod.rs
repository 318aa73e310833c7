//! Credential and session handling.
//!
//! [`connect`] turns a stored [`Account`](crate::Account) into an
//! authenticated transport; [`SessionStore`] keeps those accounts between
//! requests, keyed by bearer token.

mod connect;
mod store;

pub use connect::{ConnectSettings, RetryPolicy, connect};
pub use store::{Session, SessionStore};
