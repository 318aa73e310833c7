//! Message mutations: move, copy, trash, spam and star.
//!
//! These operations never fail with an error. Server and resolution
//! failures are logged and reported through [`Outcome`].

mod draft;

use mailgate_imap::{Flag, StoreAction, Uid, UidSet};
use serde::Serialize;
use tracing::{info, warn};

pub use draft::{DraftRequest, resolve_draft_folder, resolve_upload, save_draft};

use crate::directory::{Mailbox, resolve_mailbox};
use crate::error::{Error, Result};
use crate::transport::MailTransport;

/// Fallback path for the starred folder.
pub const STARRED_FALLBACK: &str = "INBOX.Starred";

/// `status` of an [`Outcome`]: a flag, or a reason for refusing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Status {
    /// Whether the server operation succeeded.
    Done(bool),
    /// Why nothing was done.
    Message(String),
}

/// Result of a mutation as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// 1 when the operation was attempted, 0 when it was refused or failed.
    pub result: u8,
    /// Operation status.
    pub status: Status,
}

impl Outcome {
    /// Attempted; `done` tells whether the server carried it out.
    #[must_use]
    pub const fn attempted(done: bool) -> Self {
        Self {
            result: 1,
            status: Status::Done(done),
        }
    }

    /// Not attempted or failed outright.
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            result: 0,
            status: Status::Done(false),
        }
    }

    /// Refused with a reason.
    #[must_use]
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            result: 0,
            status: Status::Message(reason.into()),
        }
    }

    /// True when the server carried the operation out.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.status, Status::Done(true))
    }
}

/// Moves messages, with MOVE when available and COPY, `\Deleted` and
/// expunge otherwise.
///
/// # Errors
///
/// Returns an error if any step fails.
pub async fn move_uids<T: MailTransport>(
    transport: &mut T,
    source: &str,
    uids: &UidSet,
    destination: &str,
) -> Result<()> {
    if uids.is_empty() {
        return Err(Error::InvalidInput("no messages given".into()));
    }
    if transport.capabilities().move_messages {
        transport.move_messages(source, uids, destination).await?;
    } else {
        transport.copy(source, uids, destination).await?;
        transport.store(source, uids, StoreAction::Add, &[Flag::Deleted]).await?;
        transport.expunge(source, uids).await?;
    }
    info!(source, destination, count = uids.len(), "messages moved");
    Ok(())
}

async fn move_logged<T: MailTransport>(transport: &mut T, source: &str, uids: &UidSet, destination: &str) -> bool {
    match move_uids(transport, source, uids, destination).await {
        Ok(()) => true,
        Err(err) => {
            warn!(source, destination, error = %err, "unable to move messages");
            false
        }
    }
}

async fn resolve_logged<T: MailTransport>(transport: &mut T, reference: &str) -> Option<Mailbox> {
    match resolve_mailbox(transport, reference).await {
        Ok(mailbox) => Some(mailbox),
        Err(err) => {
            warn!(reference, error = %err, "mailbox unavailable");
            None
        }
    }
}

async fn resolve_pair<T: MailTransport>(transport: &mut T, first: &str, second: &str) -> Option<(Mailbox, Mailbox)> {
    let first = resolve_logged(transport, first).await?;
    let second = resolve_logged(transport, second).await?;
    Some((first, second))
}

/// Moves messages from `source` to `destination`, resolving both.
pub async fn move_to<T: MailTransport>(transport: &mut T, source: &str, destination: &str, uids: &[Uid]) -> Outcome {
    if uids.is_empty() {
        return Outcome::failed();
    }
    let Some((source, destination)) = resolve_pair(transport, source, destination).await else {
        return Outcome::failed();
    };
    let uids = UidSet::from_uids(uids.iter().copied());
    Outcome::attempted(move_logged(transport, &source.path, &uids, &destination.path).await)
}

/// Copies messages to `destination`, creating it when missing.
pub async fn copy_to<T: MailTransport>(transport: &mut T, source: &str, destination: &str, uids: &[Uid]) -> Outcome {
    if uids.is_empty() {
        return Outcome::failed();
    }
    let Some((source, destination)) = resolve_pair(transport, source, destination).await else {
        return Outcome::failed();
    };
    let uids = UidSet::from_uids(uids.iter().copied());
    match transport.copy(&source.path, &uids, &destination.path).await {
        Ok(()) => {
            info!(source = %source.path, destination = %destination.path, count = uids.len(), "messages copied");
            Outcome::attempted(true)
        }
        Err(err) => {
            warn!(source = %source.path, destination = %destination.path, error = %err, "unable to copy messages");
            Outcome::attempted(false)
        }
    }
}

/// Moves messages to trash, or deletes them permanently when they are
/// already there.
pub async fn trash<T: MailTransport>(transport: &mut T, uids: &[Uid], current: &str, trash: &str) -> Outcome {
    if uids.is_empty() {
        return Outcome::failed();
    }
    let Some((trash, current)) = resolve_pair(transport, trash, current).await else {
        return Outcome::failed();
    };
    let uids = UidSet::from_uids(uids.iter().copied());

    if trash.path != current.path {
        return Outcome::attempted(move_logged(transport, &current.path, &uids, &trash.path).await);
    }

    if let Err(err) = transport.store(&trash.path, &uids, StoreAction::Add, &[Flag::Deleted]).await {
        warn!(mailbox = %trash.path, error = %err, "unable to flag messages deleted");
        return Outcome::failed();
    }
    match transport.expunge(&trash.path, &uids).await {
        Ok(expunged) if !expunged.is_empty() => {
            info!(mailbox = %trash.path, count = expunged.len(), "messages deleted permanently");
            Outcome::attempted(true)
        }
        Ok(_) => Outcome::failed(),
        Err(err) => {
            warn!(mailbox = %trash.path, error = %err, "expunge failed");
            Outcome::failed()
        }
    }
}

/// Moves messages from trash back to `current`.
pub async fn untrash<T: MailTransport>(transport: &mut T, uids: &[Uid], current: &str, trash: &str) -> Outcome {
    move_to(transport, trash, current, uids).await
}

/// Moves messages to spam; refused when they are already there.
pub async fn spam<T: MailTransport>(transport: &mut T, uids: &[Uid], current: &str, spam: &str) -> Outcome {
    if uids.is_empty() {
        return Outcome::failed();
    }
    let Some((spam, current)) = resolve_pair(transport, spam, current).await else {
        return Outcome::failed();
    };
    if spam.path == current.path {
        info!(mailbox = %spam.path, "messages already in spam");
        return Outcome::failed();
    }
    let uids = UidSet::from_uids(uids.iter().copied());
    Outcome::attempted(move_logged(transport, &current.path, &uids, &spam.path).await)
}

/// Moves messages from spam back to `current`.
pub async fn unspam<T: MailTransport>(transport: &mut T, uids: &[Uid], current: &str, spam: &str) -> Outcome {
    move_to(transport, spam, current, uids).await
}

/// Stars (`star = true`) or unstars messages by moving them in or out of
/// the starred folder.
pub async fn star<T: MailTransport>(
    transport: &mut T,
    uids: &[Uid],
    current: &str,
    starred: &str,
    star: bool,
) -> Outcome {
    if uids.is_empty() {
        return Outcome::failed();
    }
    let Some(current) = resolve_logged(transport, current).await else {
        return Outcome::failed();
    };
    let starred = match resolve_logged(transport, starred).await {
        Some(mailbox) => Some(mailbox),
        None => resolve_logged(transport, STARRED_FALLBACK).await,
    };
    let Some(starred) = starred else {
        return Outcome::refused("Unable to create starred folder");
    };
    let uids = UidSet::from_uids(uids.iter().copied());

    match (current.path == starred.path, star) {
        (true, true) => Outcome::refused("Message is already in starred folder"),
        (true, false) => {
            let Some(inbox) = resolve_logged(transport, "inbox").await else {
                return Outcome::failed();
            };
            Outcome::attempted(move_logged(transport, &starred.path, &uids, &inbox.path).await)
        }
        (false, true) => Outcome::attempted(move_logged(transport, &current.path, &uids, &starred.path).await),
        (false, false) => Outcome::attempted(true),
    }
}
