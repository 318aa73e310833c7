//! Saving drafts.

use std::path::{Component, Path, PathBuf};

use mailgate_imap::{Flag, SearchCriteria, StoreAction, Uid, UidSet};
use mailgate_mime::{Attachment, MessageBuilder};
use tracing::{debug, info, warn};

use crate::directory::{MailboxRole, find_by_role, list_mailboxes, resolve_mailbox};
use crate::error::{Error, Result};
use crate::transport::MailTransport;

/// Form data for a draft.
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    /// Previous copy of this draft, deleted before saving.
    pub draft_id: Option<Uid>,
    /// Sender address.
    pub from: String,
    /// Recipients, comma or semicolon separated.
    pub to: String,
    /// Carbon-copy recipients.
    pub cc: String,
    /// Blind-copy recipients.
    pub bcc: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub body: String,
    /// Files uploaded with this request.
    pub uploads: Vec<Attachment>,
    /// Names of files stored earlier in the upload directory. Used only
    /// when nothing was uploaded with the request.
    pub stored_files: Vec<String>,
}

/// Picks the drafts folder: the one recorded for the session, else the
/// folder with the drafts role, else `Drafts` (created if needed).
///
/// # Errors
///
/// Returns an error if listing fails or `Drafts` cannot be resolved.
pub async fn resolve_draft_folder<T: MailTransport>(transport: &mut T, recorded: Option<&str>) -> Result<String> {
    if let Some(path) = recorded.filter(|p| !p.trim().is_empty()) {
        return Ok(path.to_string());
    }
    let mailboxes = list_mailboxes(transport).await?;
    if let Some(drafts) = find_by_role(&mailboxes, MailboxRole::Drafts) {
        return Ok(drafts.path.clone());
    }
    Ok(resolve_mailbox(transport, "Drafts").await?.path)
}

/// Maps a stored file name to a path inside `upload_dir`.
///
/// # Errors
///
/// [`Error::InvalidInput`] for empty or absolute names and names that
/// climb out of the directory.
pub fn resolve_upload(upload_dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let safe = !name.trim().is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(Error::InvalidInput(format!("invalid attachment path: {name}")));
    }
    Ok(upload_dir.join(relative))
}

async fn load_stored(upload_dir: &Path, names: &[String]) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(names.len());
    for name in names {
        let path = resolve_upload(upload_dir, name)?;
        let data = tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("attachment {name}"))
            } else {
                Error::Io(err)
            }
        })?;
        let file_name = Path::new(name)
            .file_name()
            .map_or_else(|| name.clone(), |f| f.to_string_lossy().into_owned());
        attachments.push(Attachment::new(file_name, data));
    }
    Ok(attachments)
}

/// Replaces a draft: deletes the previous copy, appends the new one with
/// `\Draft \Seen`, and returns its UID.
///
/// # Errors
///
/// Returns an error if a stored attachment cannot be read, the append
/// fails, or the new draft's UID cannot be determined.
pub async fn save_draft<T: MailTransport>(
    transport: &mut T,
    folder: &str,
    upload_dir: &Path,
    request: DraftRequest,
) -> Result<Uid> {
    let attachments = if request.uploads.is_empty() {
        load_stored(upload_dir, &request.stored_files).await?
    } else {
        request.uploads
    };

    if let Some(old) = request.draft_id {
        let ids = UidSet::from_uids([old]);
        let removed = async {
            transport.store(folder, &ids, StoreAction::Add, &[Flag::Deleted]).await?;
            transport.expunge(folder, &ids).await
        }
        .await;
        match removed {
            Ok(expunged) => debug!(folder, uid = %old, expunged = expunged.len(), "previous draft removed"),
            Err(err) => warn!(folder, uid = %old, error = %err, "unable to remove previous draft"),
        }
    }

    let mut builder = MessageBuilder::new()
        .from(request.from)
        .to(&request.to)
        .cc(&request.cc)
        .bcc(&request.bcc)
        .subject(request.subject)
        .html_body(request.body);
    for attachment in attachments {
        builder = builder.attach(attachment);
    }
    let message = builder.build();

    let appended = transport
        .append(folder, &[Flag::Draft, Flag::Seen], &message.bytes)
        .await?;
    let uid = match appended {
        Some(uid) => uid,
        None => {
            let criteria = SearchCriteria::Header("Message-ID".into(), format!("<{}>", message.message_id));
            transport
                .search(folder, criteria)
                .await?
                .into_iter()
                .max()
                .ok_or_else(|| Error::OperationFailed("appended draft not found".into()))?
        }
    };
    info!(folder, %uid, "draft saved");
    Ok(uid)
}
