//! Message queries: the seven-day listing and search, subject threading,
//! and full message fetch.
//!
//! Results are never cached; every call goes to the server.

mod message;
mod size;
mod thread;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use mailgate_imap::{
    Address, BodyStructure, FetchAttribute, FetchResponse, Flag, SearchCriteria, Uid, UidSet,
};
use mailgate_mime::encoding::decode_rfc2047;
use serde::Serialize;
use tracing::{debug, info};

pub use message::{AttachmentInfo, FullMessage, get_messages};
pub use size::human_file_size;
pub use thread::base_subject;
pub(crate) use thread::group_by_subject;

use crate::error::Result;
use crate::transport::MailTransport;

/// Listing and search only cover messages younger than this.
pub const WINDOW_SECS: u64 = 604_800;

/// Thread membership of a listed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    /// Every UID in the thread, comma-joined, in thread order.
    pub uids: String,
    /// Number of messages in the thread.
    pub count: usize,
}

/// One row of a listing: a thread, shown through its newest message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// UID of the newest message in the thread.
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
    /// Whether any part is an attachment.
    pub has_attachments: bool,
    /// Mailbox the UID belongs to.
    pub folder: String,
    /// Always empty in listings.
    pub body: String,
    /// `Message-ID` header with angle brackets.
    pub message_id: String,
    /// The thread this row stands for.
    pub thread: ThreadInfo,
    /// Lowercased flag names, e.g. `\seen`.
    pub flags: Vec<String>,
}

/// Threads received in the last [`WINDOW_SECS`] seconds.
///
/// # Errors
///
/// Returns an error if a search, thread or fetch command fails.
pub async fn list_messages<T: MailTransport>(transport: &mut T, mailbox: &str) -> Result<Vec<MessageRecord>> {
    run_query(transport, mailbox, None).await
}

/// Like [`list_messages`], restricted to messages whose text contains `term`.
///
/// # Errors
///
/// Returns an error if a search, thread or fetch command fails.
pub async fn search_messages<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    term: &str,
) -> Result<Vec<MessageRecord>> {
    let term = term.trim();
    run_query(transport, mailbox, (!term.is_empty()).then_some(term)).await
}

async fn run_query<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    term: Option<&str>,
) -> Result<Vec<MessageRecord>> {
    let caps = transport.capabilities();
    let cutoff = Utc::now() - TimeDelta::seconds(WINDOW_SECS.cast_signed());

    let mut keys = vec![if caps.within {
        SearchCriteria::Younger(WINDOW_SECS)
    } else {
        SearchCriteria::Since(cutoff.date_naive())
    }];
    if let Some(term) = term {
        keys.push(SearchCriteria::Text(term.to_string()));
    }
    let criteria = SearchCriteria::all_of(keys);

    // SINCE matches whole days, so without WITHIN members older than the
    // cutoff are dropped by internal date.
    let cutoff_filter = (!caps.within).then_some(cutoff);
    let threads = if caps.ordered_subject {
        let threads = transport.thread(mailbox, criteria).await?;
        match cutoff_filter {
            Some(cutoff) => trim_to_window(transport, mailbox, threads, cutoff).await?,
            None => threads,
        }
    } else {
        local_threads(transport, mailbox, criteria, cutoff_filter).await?
    };
    debug!(mailbox, threads = threads.len(), "threads found");

    let representatives: Vec<Uid> = threads.iter().filter_map(|t| t.iter().max().copied()).collect();
    if representatives.is_empty() {
        return Ok(Vec::new());
    }

    let fetched = transport
        .fetch(
            mailbox,
            &UidSet::from_uids(representatives),
            vec![
                FetchAttribute::Flags,
                FetchAttribute::Envelope,
                FetchAttribute::BodyStructure,
                FetchAttribute::InternalDate,
            ],
        )
        .await?;
    let by_uid: HashMap<Uid, &FetchResponse> = fetched.iter().filter_map(|r| Some((r.uid()?, r))).collect();

    let mut records: Vec<MessageRecord> = threads
        .iter()
        .filter_map(|thread| {
            let newest = thread.iter().max()?;
            let response = by_uid.get(newest)?;
            if !caps.within && response.internal_date().is_some_and(|d| d < cutoff) {
                return None;
            }
            Some(summary_record(response, mailbox, thread))
        })
        .collect();
    records.sort_by(|a, b| b.uid.cmp(&a.uid));

    info!(mailbox, count = records.len(), searched = term.is_some(), "messages listed");
    Ok(records)
}

/// Threads built locally when the server cannot thread.
async fn local_threads<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    criteria: SearchCriteria,
    cutoff: Option<DateTime<Utc>>,
) -> Result<Vec<Vec<Uid>>> {
    let uids = transport.search(mailbox, criteria).await?;
    if uids.is_empty() {
        return Ok(Vec::new());
    }
    let fetched = transport
        .fetch(
            mailbox,
            &UidSet::from_uids(uids),
            vec![FetchAttribute::Envelope, FetchAttribute::InternalDate],
        )
        .await?;
    Ok(group_by_subject(
        fetched
            .iter()
            .filter(|r| within_cutoff(r, cutoff))
            .filter_map(|r| {
                Some((
                    r.uid()?,
                    r.envelope().and_then(|e| e.subject.clone()),
                    r.internal_date(),
                ))
            }),
    ))
}

/// Removes server-threaded members received before `cutoff`, dropping
/// threads left empty.
async fn trim_to_window<T: MailTransport>(
    transport: &mut T,
    mailbox: &str,
    threads: Vec<Vec<Uid>>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Vec<Uid>>> {
    let members = UidSet::from_uids(threads.iter().flatten().copied());
    if members.is_empty() {
        return Ok(threads);
    }
    let fetched = transport
        .fetch(mailbox, &members, vec![FetchAttribute::InternalDate])
        .await?;
    let stale: HashSet<Uid> = fetched
        .iter()
        .filter(|r| !within_cutoff(r, Some(cutoff)))
        .filter_map(FetchResponse::uid)
        .collect();
    if !stale.is_empty() {
        debug!(mailbox, stale = stale.len(), "thread members outside the window dropped");
    }
    Ok(threads
        .into_iter()
        .map(|thread| thread.into_iter().filter(|uid| !stale.contains(uid)).collect::<Vec<_>>())
        .filter(|thread| !thread.is_empty())
        .collect())
}

/// False only for a message known to be received before `cutoff`.
fn within_cutoff(response: &FetchResponse, cutoff: Option<DateTime<Utc>>) -> bool {
    match (cutoff, response.internal_date()) {
        (Some(cutoff), Some(date)) => date >= cutoff,
        _ => true,
    }
}

fn summary_record(response: &FetchResponse, mailbox: &str, thread: &[Uid]) -> MessageRecord {
    let fields = EnvelopeFields::from_fetch(response);
    MessageRecord {
        uid: response.uid().map_or(0, Uid::get),
        from: fields.from,
        to: fields.to,
        cc: fields.cc,
        bcc: fields.bcc,
        date: fields.date,
        subject: fields.subject,
        has_attachments: response.body_structure().is_some_and(has_attachments),
        folder: mailbox.to_string(),
        body: String::new(),
        message_id: fields.message_id,
        thread: ThreadInfo {
            uids: thread.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            count: thread.len(),
        },
        flags: flag_names(response.flags()),
    }
}

/// Envelope data shared by listing rows and full messages.
pub(crate) struct EnvelopeFields {
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub date: i64,
    pub subject: String,
    pub message_id: String,
}

impl EnvelopeFields {
    pub(crate) fn from_fetch(response: &FetchResponse) -> Self {
        let envelope = response.envelope().cloned().unwrap_or_default();
        let date = envelope
            .date
            .as_deref()
            .and_then(parse_date)
            .or_else(|| response.internal_date().map(|d| d.timestamp()))
            .unwrap_or_default();
        Self {
            from: bare_addresses(&envelope.from),
            to: bare_addresses(&envelope.to),
            cc: bare_addresses(&envelope.cc),
            bcc: bare_addresses(&envelope.bcc),
            date,
            subject: decode_rfc2047(envelope.subject.as_deref().unwrap_or_default()),
            message_id: envelope.message_id.unwrap_or_default(),
        }
    }
}

/// Parses an RFC 2822 date, ignoring a trailing `(Zone)` comment.
fn parse_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let raw = raw.split_once(" (").map_or(raw, |(head, _)| head);
    DateTime::parse_from_rfc2822(raw).ok().map(|d| d.timestamp())
}

fn bare_addresses(addresses: &[Address]) -> String {
    addresses.iter().filter_map(Address::email).collect::<Vec<_>>().join(",")
}

fn flag_names(flags: &[Flag]) -> Vec<String> {
    flags.iter().map(|f| f.as_str().to_lowercase()).collect()
}

/// True when any leaf part is an attachment or carries a file name.
pub(crate) fn has_attachments(structure: &BodyStructure) -> bool {
    structure
        .parts()
        .iter()
        .any(|(_, part)| part.is_attachment() || part.file_name().is_some())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeMessage, FakeTransport};
    use crate::transport::TransportCapabilities;

    #[test]
    fn test_parse_date_with_comment() {
        assert_eq!(parse_date("Tue, 2 Jul 2024 10:00:00 +0000 (UTC)"), Some(1_719_914_400));
        assert_eq!(parse_date("not a date"), None);
    }

    #[tokio::test]
    async fn test_list_groups_threads_newest_first() {
        let mut transport = FakeTransport::new();
        let first = transport.add_message("INBOX", FakeMessage::new("Plan").days_old(3));
        let other = transport.add_message("INBOX", FakeMessage::new("Lunch").days_old(2));
        let reply = transport.add_message("INBOX", FakeMessage::new("Re: Plan").days_old(1));

        let records = list_messages(&mut transport, "INBOX").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uid, reply.get());
        assert_eq!(records[0].thread.uids, format!("{first},{reply}"));
        assert_eq!(records[0].thread.count, 2);
        assert_eq!(records[0].subject, "Re: Plan");
        assert_eq!(records[1].uid, other.get());
        assert_eq!(records[1].folder, "INBOX");
        assert!(records.iter().all(|r| r.body.is_empty()));
    }

    #[tokio::test]
    async fn test_list_excludes_old_messages() {
        let mut transport = FakeTransport::new();
        transport.add_message("INBOX", FakeMessage::new("Ancient").days_old(10));
        let fresh = transport.add_message("INBOX", FakeMessage::new("Fresh"));

        let records = list_messages(&mut transport, "INBOX").await.unwrap();
        assert_eq!(records.iter().map(|r| r.uid).collect::<Vec<_>>(), vec![fresh.get()]);
    }

    #[tokio::test]
    async fn test_list_without_extensions_filters_and_groups_locally() {
        let mut transport = FakeTransport::new().with_capabilities(TransportCapabilities::default());
        transport.add_message("INBOX", FakeMessage::new("Old plan").days_old(9));
        let a = transport.add_message("INBOX", FakeMessage::new("Plan").days_old(2));
        let b = transport.add_message("INBOX", FakeMessage::new("Fwd: plan").days_old(1));

        let records = list_messages(&mut transport, "INBOX").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, b.get());
        assert_eq!(records[0].thread.uids, format!("{a},{b}"));
    }

    fn just_outside_window() -> FakeMessage {
        let received = Utc::now() - TimeDelta::seconds(WINDOW_SECS.cast_signed() + 60);
        FakeMessage::new("Plan").received(received.fixed_offset())
    }

    #[tokio::test]
    async fn test_local_threads_drop_members_outside_window() {
        let mut transport = FakeTransport::new().with_capabilities(TransportCapabilities::default());
        transport.add_message("INBOX", just_outside_window());
        let reply = transport.add_message("INBOX", FakeMessage::new("Re: Plan"));

        let records = list_messages(&mut transport, "INBOX").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].thread.uids, reply.to_string());
        assert_eq!(records[0].thread.count, 1);
    }

    #[tokio::test]
    async fn test_server_threads_drop_members_outside_window() {
        let caps = TransportCapabilities {
            ordered_subject: true,
            ..TransportCapabilities::default()
        };
        let mut transport = FakeTransport::new().with_capabilities(caps);
        transport.add_message("INBOX", just_outside_window());
        let reply = transport.add_message("INBOX", FakeMessage::new("Re: Plan"));

        let records = list_messages(&mut transport, "INBOX").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, reply.get());
        assert_eq!(records[0].thread.uids, reply.to_string());
    }

    #[tokio::test]
    async fn test_search_applies_term() {
        let mut transport = FakeTransport::new();
        transport.add_message("INBOX", FakeMessage::new("Invoice March"));
        transport.add_message("INBOX", FakeMessage::new("Holiday"));

        let records = search_messages(&mut transport, "INBOX", "invoice").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject, "Invoice March");

        let all = search_messages(&mut transport, "INBOX", "  ").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_record_fields() {
        let mut transport = FakeTransport::new();
        transport.add_message(
            "INBOX",
            FakeMessage::new("=?utf-8?B?R3LDvMOfZQ==?=")
                .from("carol@example.org")
                .cc("dave@example.org")
                .cc("erin@example.org")
                .message_id("<m1@example.org>")
                .flag(Flag::Seen)
                .attachment("a.pdf", "application/pdf", b"%PDF"),
        );

        let records = list_messages(&mut transport, "INBOX").await.unwrap();
        let record = &records[0];
        assert_eq!(record.subject, "Grüße");
        assert_eq!(record.from, "carol@example.org");
        assert_eq!(record.to, "bob@example.com");
        assert_eq!(record.cc, "dave@example.org,erin@example.org");
        assert_eq!(record.bcc, "");
        assert_eq!(record.message_id, "<m1@example.org>");
        assert_eq!(record.flags, vec!["\\seen"]);
        assert!(record.has_attachments);
        assert!(record.date > 0);

        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["hasAttachments"], true);
        assert_eq!(json["messageId"], "<m1@example.org>");
        assert_eq!(json["thread"]["count"], 1);
    }

    #[tokio::test]
    async fn test_single_batched_fetch_for_representatives() {
        let mut transport = FakeTransport::new();
        for subject in ["A", "Re: A", "B", "Re: B", "Re: Re: B"] {
            transport.add_message("INBOX", FakeMessage::new(subject));
        }
        list_messages(&mut transport, "INBOX").await.unwrap();
        let fetches: Vec<&String> = transport.calls().iter().filter(|c| c.starts_with("fetch")).collect();
        assert_eq!(fetches, vec!["fetch INBOX 2,5"]);
    }

    #[tokio::test]
    async fn test_empty_mailbox() {
        let mut transport = FakeTransport::new();
        assert!(list_messages(&mut transport, "INBOX").await.unwrap().is_empty());
        assert!(transport.calls().is_empty());
    }
}
