//! Attachment download.

use mailgate_imap::{FetchAttribute, Uid, UidSet};
use mailgate_mime::TransferEncoding;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::MailTransport;

/// Decoded attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentContent {
    /// `type/subtype` of the part.
    pub content_type: String,
    /// File name as requested.
    pub file_name: String,
    /// Content with the transfer encoding removed.
    pub data: Vec<u8>,
}

/// Fetches part `part_id` of message `uid`, provided its file name is
/// `file_name`.
///
/// # Errors
///
/// [`Error::NotFound`] if the message or part does not exist or the part
/// carries a different file name; transport errors otherwise.
pub async fn get_attachment<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    uid: Uid,
    part_id: &str,
    file_name: &str,
) -> Result<AttachmentContent> {
    let fetched = transport
        .fetch(
            mailbox,
            &UidSet::from_uids([uid]),
            vec![
                FetchAttribute::BodyStructure,
                FetchAttribute::BodyPeek(part_id.to_string()),
            ],
        )
        .await?;
    let response = fetched
        .iter()
        .find(|r| r.uid() == Some(uid))
        .ok_or_else(|| Error::NotFound(format!("message {uid} in {mailbox}")))?;

    let part = response
        .body_structure()
        .and_then(|s| s.part(part_id))
        .ok_or_else(|| Error::NotFound(format!("part {part_id} of message {uid}")))?;
    if part.file_name().as_deref() != Some(file_name) {
        warn!(mailbox, %uid, part_id, file_name, "attachment name does not match part");
        return Err(Error::NotFound(format!("attachment {file_name}")));
    }
    let raw = response
        .section(part_id)
        .ok_or_else(|| Error::NotFound(format!("content of part {part_id}")))?;

    let data = TransferEncoding::parse(&part.encoding).decode(raw)?;
    debug!(mailbox, %uid, part_id, bytes = data.len(), "attachment fetched");
    Ok(AttachmentContent {
        content_type: part.mime_type(),
        file_name: file_name.to_string(),
        data,
    })
}
