//! In-memory [`MailTransport`] for tests.
//!
//! Mailboxes keep list order, UIDs are assigned per mailbox from 1, and
//! every mutating call is recorded so tests can assert on the exact
//! sequence of server operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use mailgate_imap::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchAttribute, FetchItem,
    FetchResponse, Flag, ListResponse, MailboxAttribute, SearchCriteria, StoreAction, Uid, UidSet,
};
use mailgate_mime::encoding::encode_base64_lines;

use crate::error::{Error, Result};
use crate::query::group_by_subject;
use crate::transport::{MailTransport, TransportCapabilities};

/// A message stored in a [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct FakeMessage {
    /// Current flags.
    pub flags: Vec<Flag>,
    /// Arrival time.
    pub internal_date: DateTime<FixedOffset>,
    /// Envelope returned by FETCH.
    pub envelope: Envelope,
    parts: Vec<(BodyPart, Vec<u8>)>,
}

impl FakeMessage {
    /// A plain-text message from `alice@example.com` received now.
    #[must_use]
    pub fn new(subject: &str) -> Self {
        let now = Utc::now().fixed_offset();
        Self {
            flags: Vec::new(),
            internal_date: now,
            envelope: Envelope {
                date: Some(now.to_rfc2822()),
                subject: Some(subject.to_string()),
                from: vec![address("alice@example.com")],
                to: vec![address("bob@example.com")],
                message_id: Some(format!("<{:x}@example.com>", rand::random::<u64>())),
                ..Envelope::default()
            },
            parts: vec![text_part("plain", b"hello")],
        }
    }

    /// Replaces the sender.
    #[must_use]
    pub fn from(mut self, email: &str) -> Self {
        self.envelope.from = vec![address(email)];
        self
    }

    /// Adds a carbon-copy recipient.
    #[must_use]
    pub fn cc(mut self, email: &str) -> Self {
        self.envelope.cc.push(address(email));
        self
    }

    /// Sets both the envelope date and the internal date.
    #[must_use]
    pub fn received(mut self, date: DateTime<FixedOffset>) -> Self {
        self.internal_date = date;
        self.envelope.date = Some(date.to_rfc2822());
        self
    }

    /// Received `days` days ago.
    #[must_use]
    pub fn days_old(self, days: i64) -> Self {
        let date = (Utc::now() - ChronoDuration::days(days)).fixed_offset();
        self.received(date)
    }

    /// Sets the Message-ID (with angle brackets).
    #[must_use]
    pub fn message_id(mut self, id: &str) -> Self {
        self.envelope.message_id = Some(id.to_string());
        self
    }

    /// Adds a flag.
    #[must_use]
    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Replaces the plain body.
    #[must_use]
    pub fn text(mut self, body: &str) -> Self {
        self.parts.retain(|(p, _)| !(p.media_type == "text" && p.media_subtype == "plain"));
        self.parts.insert(0, text_part("plain", body.as_bytes()));
        self
    }

    /// Adds an HTML alternative after the plain body.
    #[must_use]
    pub fn html(mut self, body: &str) -> Self {
        let at = usize::from(!self.parts.is_empty());
        self.parts.insert(at, text_part("html", body.as_bytes()));
        self
    }

    /// Adds a base64 attachment.
    #[must_use]
    pub fn attachment(mut self, file_name: &str, mime: &str, data: &[u8]) -> Self {
        let (media_type, media_subtype) = mime.split_once('/').unwrap_or(("application", "octet-stream"));
        let encoded = encode_base64_lines(data).into_bytes();
        let part = BodyPart {
            media_type: media_type.to_string(),
            media_subtype: media_subtype.to_string(),
            params: vec![("name".into(), file_name.to_string())],
            encoding: "base64".into(),
            size: u32::try_from(encoded.len()).unwrap_or(u32::MAX),
            disposition: Some(Disposition {
                kind: "attachment".into(),
                params: vec![("filename".into(), file_name.to_string())],
            }),
            ..BodyPart::default()
        };
        self.parts.push((part, encoded));
        self
    }

    fn from_append(flags: &[Flag], raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let (head, _) = text.split_once("\r\n\r\n").unwrap_or((&text, ""));
        let header = |name: &str| {
            head.lines().find_map(|line| {
                let (n, v) = line.split_once(':')?;
                n.eq_ignore_ascii_case(name).then(|| v.trim().to_string())
            })
        };
        let now = Utc::now().fixed_offset();
        let part = BodyPart {
            media_type: "text".into(),
            media_subtype: "html".into(),
            encoding: "7bit".into(),
            size: u32::try_from(raw.len()).unwrap_or(u32::MAX),
            ..BodyPart::default()
        };
        Self {
            flags: flags.to_vec(),
            internal_date: now,
            envelope: Envelope {
                date: Some(now.to_rfc2822()),
                subject: header("Subject"),
                message_id: header("Message-ID"),
                ..Envelope::default()
            },
            parts: vec![(part, raw.to_vec())],
        }
    }

    fn body_structure(&self) -> BodyStructure {
        if let [(part, _)] = self.parts.as_slice() {
            BodyStructure::Single(Box::new(part.clone()))
        } else {
            BodyStructure::Multipart {
                subtype: "mixed".into(),
                parts: self
                    .parts
                    .iter()
                    .map(|(p, _)| BodyStructure::Single(Box::new(p.clone())))
                    .collect(),
            }
        }
    }

    fn section(&self, section: &str) -> Option<Vec<u8>> {
        let index: usize = section.parse().ok()?;
        self.parts.get(index.checked_sub(1)?).map(|(_, data)| data.clone())
    }

    fn matches(&self, uid: Uid, criteria: &SearchCriteria) -> bool {
        match criteria {
            SearchCriteria::All => true,
            SearchCriteria::Younger(secs) => {
                let secs = i64::try_from(*secs).unwrap_or(i64::MAX);
                Utc::now().timestamp() - self.internal_date.timestamp() <= secs
            }
            SearchCriteria::Since(date) => self.internal_date.date_naive() >= *date,
            SearchCriteria::Text(term) => {
                let term = term.to_lowercase();
                self.envelope
                    .subject
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&term))
                    || self
                        .parts
                        .iter()
                        .any(|(_, data)| String::from_utf8_lossy(data).to_lowercase().contains(&term))
            }
            SearchCriteria::Header(name, value) if name.eq_ignore_ascii_case("Message-ID") => {
                self.envelope.message_id.as_deref() == Some(value.as_str())
            }
            SearchCriteria::Header(name, value) if name.eq_ignore_ascii_case("Subject") => self
                .envelope
                .subject
                .as_deref()
                .is_some_and(|s| s.contains(value.as_str())),
            SearchCriteria::Header(..) => false,
            SearchCriteria::Uid(set) => set.iter().any(|u| u == uid),
            SearchCriteria::Deleted => self.flags.contains(&Flag::Deleted),
            SearchCriteria::Not(inner) => !self.matches(uid, inner),
            SearchCriteria::And(keys) => keys.iter().all(|k| self.matches(uid, k)),
        }
    }
}

fn address(email: &str) -> Address {
    let (mailbox, host) = email.split_once('@').unwrap_or((email, "example.com"));
    Address {
        mailbox: Some(mailbox.to_string()),
        host: Some(host.to_string()),
        ..Address::default()
    }
}

fn text_part(subtype: &str, body: &[u8]) -> (BodyPart, Vec<u8>) {
    let part = BodyPart {
        media_type: "text".into(),
        media_subtype: subtype.to_string(),
        params: vec![("charset".into(), "utf-8".into())],
        encoding: "8bit".into(),
        size: u32::try_from(body.len()).unwrap_or(u32::MAX),
        ..BodyPart::default()
    };
    (part, body.to_vec())
}

#[derive(Debug, Clone)]
struct FakeMailbox {
    attributes: Vec<MailboxAttribute>,
    messages: BTreeMap<Uid, FakeMessage>,
    next_uid: u32,
}

impl FakeMailbox {
    fn new(attributes: Vec<MailboxAttribute>) -> Self {
        Self {
            attributes,
            messages: BTreeMap::new(),
            next_uid: 1,
        }
    }

    fn insert(&mut self, message: FakeMessage) -> Uid {
        let uid = Uid::new(self.next_uid).unwrap_or(Uid::MIN);
        self.next_uid += 1;
        self.messages.insert(uid, message);
        uid
    }
}

/// In-memory mail server.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    capabilities: TransportCapabilities,
    mailboxes: Vec<(String, FakeMailbox)>,
    fail_create: bool,
    calls: Vec<String>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTransport {
    /// A server with an empty `INBOX` and every extension enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: TransportCapabilities {
                move_messages: true,
                uidplus: true,
                within: true,
                ordered_subject: true,
            },
            mailboxes: vec![("INBOX".into(), FakeMailbox::new(Vec::new()))],
            fail_create: false,
            calls: Vec::new(),
        }
    }

    /// Overrides the advertised extensions.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: TransportCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Makes every CREATE fail.
    #[must_use]
    pub const fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Adds a mailbox unless one with the same path exists.
    pub fn add_mailbox(&mut self, path: &str, attributes: Vec<MailboxAttribute>) {
        if !self.has_mailbox(path) {
            self.mailboxes.push((path.to_string(), FakeMailbox::new(attributes)));
        }
    }

    /// Stores a message and returns its UID.
    ///
    /// # Panics
    ///
    /// Panics if the mailbox does not exist.
    #[allow(clippy::expect_used)]
    pub fn add_message(&mut self, mailbox: &str, message: FakeMessage) -> Uid {
        self.mailbox_mut(mailbox).expect("mailbox exists").insert(message)
    }

    /// True if `path` exists.
    #[must_use]
    pub fn has_mailbox(&self, path: &str) -> bool {
        self.mailboxes.iter().any(|(p, _)| p == path)
    }

    /// Mailbox paths in list order.
    #[must_use]
    pub fn mailbox_paths(&self) -> Vec<String> {
        self.mailboxes.iter().map(|(p, _)| p.clone()).collect()
    }

    /// UIDs in `mailbox`, ascending. Empty if the mailbox is missing.
    #[must_use]
    pub fn uids(&self, mailbox: &str) -> Vec<u32> {
        self.mailbox(mailbox)
            .map(|m| m.messages.keys().map(|u| u.get()).collect())
            .unwrap_or_default()
    }

    /// A stored message.
    #[must_use]
    pub fn message(&self, mailbox: &str, uid: u32) -> Option<&FakeMessage> {
        self.mailbox(mailbox)?.messages.get(&Uid::new(uid)?)
    }

    /// Mutating and listing calls, in order, e.g. `"move INBOX 3 -> Trash"`.
    #[must_use]
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    fn mailbox(&self, path: &str) -> Option<&FakeMailbox> {
        self.mailboxes.iter().find(|(p, _)| p == path).map(|(_, m)| m)
    }

    fn mailbox_mut(&mut self, path: &str) -> Option<&mut FakeMailbox> {
        self.mailboxes.iter_mut().find(|(p, _)| p == path).map(|(_, m)| m)
    }

    fn existing(&self, path: &str) -> Result<&FakeMailbox> {
        self.mailbox(path).ok_or_else(|| no_mailbox(path))
    }

    fn existing_mut(&mut self, path: &str) -> Result<&mut FakeMailbox> {
        self.mailbox_mut(path).ok_or_else(|| no_mailbox(path))
    }

    fn copy_into(&mut self, mailbox: &str, uids: &UidSet, destination: &str) -> Result<Vec<FakeMessage>> {
        let source = self.existing(mailbox)?;
        let copied: Vec<FakeMessage> = uids
            .iter()
            .filter_map(|u| source.messages.get(&u).cloned())
            .collect();
        if copied.is_empty() {
            return Err(Error::Imap(mailgate_imap::Error::No("No matching messages".into())));
        }
        let target = self.existing_mut(destination)?;
        for mut message in copied.clone() {
            message.flags.retain(|f| *f != Flag::Deleted);
            target.insert(message);
        }
        Ok(copied)
    }
}

fn no_mailbox(path: &str) -> Error {
    Error::Imap(mailgate_imap::Error::No(format!("[NONEXISTENT] Mailbox doesn't exist: {path}")))
}

impl MailTransport for FakeTransport {
    fn capabilities(&self) -> TransportCapabilities {
        self.capabilities
    }

    async fn list_mailboxes(&mut self) -> Result<Vec<ListResponse>> {
        Ok(self
            .mailboxes
            .iter()
            .map(|(path, m)| ListResponse {
                attributes: m.attributes.clone(),
                delimiter: Some('.'),
                name: path.clone(),
            })
            .collect())
    }

    async fn create_mailbox(&mut self, name: &str) -> Result<()> {
        self.calls.push(format!("create {name}"));
        if self.fail_create || self.has_mailbox(name) {
            return Err(Error::Imap(mailgate_imap::Error::No("[CANNOT] Create failed".into())));
        }
        self.add_mailbox(name, Vec::new());
        Ok(())
    }

    async fn search(&mut self, mailbox: &str, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let source = self.existing(mailbox)?;
        Ok(source
            .messages
            .iter()
            .filter(|(uid, m)| m.matches(**uid, &criteria))
            .map(|(uid, _)| *uid)
            .collect())
    }

    async fn thread(&mut self, mailbox: &str, criteria: SearchCriteria) -> Result<Vec<Vec<Uid>>> {
        if !self.capabilities.ordered_subject {
            return Err(Error::Imap(mailgate_imap::Error::InvalidState(
                "server does not support THREAD=ORDEREDSUBJECT".into(),
            )));
        }
        let source = self.existing(mailbox)?;
        Ok(group_by_subject(
            source
                .messages
                .iter()
                .filter(|(uid, m)| m.matches(**uid, &criteria))
                .map(|(uid, m)| (*uid, m.envelope.subject.clone(), Some(m.internal_date))),
        ))
    }

    async fn fetch(
        &mut self,
        mailbox: &str,
        uids: &UidSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<FetchResponse>> {
        self.calls.push(format!("fetch {mailbox} {uids}"));
        let source = self.existing(mailbox)?;
        let mut responses = Vec::new();
        for (seq, (uid, message)) in source.messages.iter().enumerate() {
            if !uids.iter().any(|u| u == *uid) {
                continue;
            }
            let mut fetched = vec![FetchItem::Uid(*uid)];
            for item in &items {
                fetched.push(match item {
                    FetchAttribute::Uid => continue,
                    FetchAttribute::Flags => FetchItem::Flags(message.flags.clone()),
                    FetchAttribute::InternalDate => FetchItem::InternalDate(message.internal_date),
                    FetchAttribute::Rfc822Size => FetchItem::Rfc822Size(
                        message.parts.iter().map(|(p, _)| p.size).sum(),
                    ),
                    FetchAttribute::Envelope => FetchItem::Envelope(Box::new(message.envelope.clone())),
                    FetchAttribute::BodyStructure => FetchItem::BodyStructure(message.body_structure()),
                    FetchAttribute::BodyPeek(section) => FetchItem::Section {
                        section: section.clone(),
                        data: message.section(section),
                    },
                });
            }
            responses.push(FetchResponse {
                seq: u32::try_from(seq + 1).unwrap_or(u32::MAX),
                items: fetched,
            });
        }
        Ok(responses)
    }

    async fn copy(&mut self, mailbox: &str, uids: &UidSet, destination: &str) -> Result<()> {
        self.calls.push(format!("copy {mailbox} {uids} -> {destination}"));
        self.copy_into(mailbox, uids, destination).map(drop)
    }

    async fn move_messages(&mut self, mailbox: &str, uids: &UidSet, destination: &str) -> Result<()> {
        self.calls.push(format!("move {mailbox} {uids} -> {destination}"));
        if !self.capabilities.move_messages {
            return Err(Error::Imap(mailgate_imap::Error::InvalidState(
                "server does not support MOVE".into(),
            )));
        }
        self.copy_into(mailbox, uids, destination)?;
        let source = self.existing_mut(mailbox)?;
        for uid in uids.iter() {
            source.messages.remove(&uid);
        }
        Ok(())
    }

    async fn store(&mut self, mailbox: &str, uids: &UidSet, action: StoreAction, flags: &[Flag]) -> Result<()> {
        self.calls.push(format!("store {mailbox} {uids}"));
        let source = self.existing_mut(mailbox)?;
        for uid in uids.iter() {
            let Some(message) = source.messages.get_mut(&uid) else { continue };
            match action {
                StoreAction::Add => {
                    for flag in flags {
                        if !message.flags.contains(flag) {
                            message.flags.push(flag.clone());
                        }
                    }
                }
                StoreAction::Remove => message.flags.retain(|f| !flags.contains(f)),
                StoreAction::Replace => message.flags = flags.to_vec(),
            }
        }
        Ok(())
    }

    async fn expunge(&mut self, mailbox: &str, uids: &UidSet) -> Result<Vec<u32>> {
        self.calls.push(format!("expunge {mailbox} {uids}"));
        let restrict = self.capabilities.uidplus;
        let source = self.existing_mut(mailbox)?;
        let doomed: Vec<Uid> = source
            .messages
            .iter()
            .filter(|(uid, m)| m.flags.contains(&Flag::Deleted) && (!restrict || uids.iter().any(|u| u == **uid)))
            .map(|(uid, _)| *uid)
            .collect();
        let mut expunged = Vec::new();
        for uid in doomed {
            if let Some(pos) = source.messages.keys().position(|u| *u == uid) {
                expunged.push(u32::try_from(pos + 1).unwrap_or(u32::MAX));
            }
            source.messages.remove(&uid);
        }
        Ok(expunged)
    }

    async fn append(&mut self, mailbox: &str, flags: &[Flag], message: &[u8]) -> Result<Option<Uid>> {
        self.calls.push(format!("append {mailbox}"));
        let uidplus = self.capabilities.uidplus;
        let target = self.existing_mut(mailbox)?;
        let uid = target.insert(FakeMessage::from_append(flags, message));
        Ok(uidplus.then_some(uid))
    }

    async fn logout(self) -> Result<()> {
        Ok(())
    }
}
