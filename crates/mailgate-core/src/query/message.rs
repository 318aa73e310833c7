//! Full message fetch: envelope, decoded body and attachment list.

use mailgate_imap::{BodyPart, BodyStructure, FetchAttribute, Uid, UidSet};
use mailgate_mime::{TransferEncoding, decode_text};
use serde::Serialize;
use tracing::{debug, warn};

use super::{EnvelopeFields, human_file_size};
use crate::error::Result;
use crate::transport::MailTransport;

/// A file part listed with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    /// File name.
    pub file: String,
    /// `type/subtype`.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Human-readable encoded size.
    pub size: String,
    /// IMAP part number, e.g. `2` or `1.3`.
    pub part_id: String,
}

/// A message with its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMessage {
    /// Message UID.
    pub uid: u32,
    /// Sender addresses, comma-joined.
    pub from: String,
    /// Recipient addresses, comma-joined.
    pub to: String,
    /// Carbon-copy addresses, comma-joined.
    pub cc: String,
    /// Blind-copy addresses, comma-joined.
    pub bcc: String,
    /// Unix timestamp.
    pub date: i64,
    /// Decoded subject.
    pub subject: String,
    /// HTML body, or the plain body when there is no HTML part.
    pub body: String,
    /// Whether [`FullMessage::attachments`] is non-empty.
    pub has_attachments: bool,
    /// Mailbox the UID belongs to.
    pub folder: String,
    /// `Message-ID` header with angle brackets.
    pub message_id: String,
    /// File parts other than the bodies.
    #[serde(rename = "attachment")]
    pub attachments: Vec<AttachmentInfo>,
}

/// Fetches the given messages with decoded bodies.
///
/// UIDs the server no longer has are skipped.
///
/// # Errors
///
/// Returns an error if a fetch fails.
pub async fn get_messages<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    uids: &[Uid],
) -> Result<Vec<FullMessage>> {
    let set = UidSet::from_uids(uids.iter().copied());
    if set.is_empty() {
        return Ok(Vec::new());
    }
    let fetched = transport
        .fetch(
            mailbox,
            &set,
            vec![
                FetchAttribute::Envelope,
                FetchAttribute::BodyStructure,
                FetchAttribute::InternalDate,
            ],
        )
        .await?;

    let mut messages = Vec::with_capacity(fetched.len());
    for response in &fetched {
        let Some(uid) = response.uid() else { continue };
        let structure = response.body_structure();
        let html = structure.and_then(|s| s.find_text("html"));
        let plain = structure.and_then(|s| s.find_text("plain"));

        let mut body = String::new();
        if let (Some(s), Some(id)) = (structure, &html) {
            body = fetch_text(transport, mailbox, uid, s, id).await?;
        }
        if body.is_empty()
            && let (Some(s), Some(id)) = (structure, &plain)
        {
            body = fetch_text(transport, mailbox, uid, s, id).await?;
        }

        let attachments = structure
            .map(|s| list_attachments(s, &[html.as_deref(), plain.as_deref()]))
            .unwrap_or_default();
        let fields = EnvelopeFields::from_fetch(response);
        messages.push(FullMessage {
            uid: uid.get(),
            from: fields.from,
            to: fields.to,
            cc: fields.cc,
            bcc: fields.bcc,
            date: fields.date,
            subject: fields.subject,
            body,
            has_attachments: !attachments.is_empty(),
            folder: mailbox.to_string(),
            message_id: fields.message_id,
            attachments,
        });
    }
    debug!(mailbox, count = messages.len(), "messages fetched");
    Ok(messages)
}

async fn fetch_text<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    uid: Uid,
    structure: &BodyStructure,
    part_id: &str,
) -> Result<String> {
    let Some(part) = structure.part(part_id) else {
        return Ok(String::new());
    };
    let fetched = transport
        .fetch(
            mailbox,
            &UidSet::from_uids([uid]),
            vec![FetchAttribute::BodyPeek(part_id.to_string())],
        )
        .await?;
    let Some(raw) = fetched.iter().find_map(|r| r.section(part_id)) else {
        return Ok(String::new());
    };
    Ok(decode_part(part, raw))
}

fn decode_part(part: &BodyPart, raw: &[u8]) -> String {
    let bytes = TransferEncoding::parse(&part.encoding)
        .decode(raw)
        .unwrap_or_else(|err| {
            warn!(encoding = %part.encoding, error = %err, "undecodable body part, using raw bytes");
            raw.to_vec()
        });
    decode_text(&bytes, part.param("charset"))
}

/// Named parts other than the chosen body parts.
fn list_attachments(structure: &BodyStructure, bodies: &[Option<&str>]) -> Vec<AttachmentInfo> {
    structure
        .parts()
        .into_iter()
        .filter(|(id, _)| !bodies.contains(&Some(id.as_str())))
        .filter_map(|(id, part)| {
            Some(AttachmentInfo {
                file: part.file_name()?,
                content_type: part.mime_type(),
                size: human_file_size(u64::from(part.size)),
                part_id: id,
            })
        })
        .collect()
}
