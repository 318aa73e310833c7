//! Core IMAP types shared by commands and responses.

mod capability;
mod flags;
pub(crate) mod mailbox;
mod uid;

pub use capability::{Capability, Status};
pub use flags::Flag;
pub use mailbox::{ListResponse, MailboxAttribute, MailboxStatus};
pub use uid::{Uid, UidSet};
