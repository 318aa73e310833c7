//! Mail account credentials.
//!
//! An [`Account`] is created at login, kept in the session store and used
//! to open a fresh IMAP connection per request.

mod model;
mod validation;

pub use model::{Account, Encryption, Protocol};
pub use validation::{ValidationError, ValidationResult, validate_account};
