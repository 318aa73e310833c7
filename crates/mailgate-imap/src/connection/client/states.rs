//! Type-state markers for the client connection.

use crate::types::MailboxStatus;

/// Connected, not yet logged in. Only LOGIN, STARTTLS and LOGOUT apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in with no mailbox selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// Logged in with a mailbox selected.
#[derive(Debug, Clone, Default)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Counters reported when the mailbox was selected.
    #[must_use]
    pub const fn status(&self) -> MailboxStatus {
        self.status
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which mailbox-level commands (LIST, CREATE, SELECT, APPEND) are valid.
pub trait Authorized: sealed::Sealed {}

impl Authorized for Authenticated {}
impl Authorized for Selected {}
