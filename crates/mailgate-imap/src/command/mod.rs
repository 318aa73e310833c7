//! IMAP commands and their wire form.

mod search;
mod tag;

pub use search::SearchCriteria;
pub use tag::TagGenerator;

use crate::types::mailbox::encode_name;
use crate::types::{Flag, UidSet};

/// FETCH data item to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `BODY.PEEK[<section>]`, which does not set `\Seen`.
    BodyPeek(String),
}

impl FetchAttribute {
    fn as_wire(&self) -> String {
        match self {
            Self::Uid => "UID".into(),
            Self::Flags => "FLAGS".into(),
            Self::InternalDate => "INTERNALDATE".into(),
            Self::Rfc822Size => "RFC822.SIZE".into(),
            Self::Envelope => "ENVELOPE".into(),
            Self::BodyStructure => "BODYSTRUCTURE".into(),
            Self::BodyPeek(section) => format!("BODY.PEEK[{section}]"),
        }
    }
}

/// How STORE changes flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`
    Add,
    /// `-FLAGS`
    Remove,
    /// `FLAGS`
    Replace,
}

/// Threading algorithm for `UID THREAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadAlgorithm {
    /// `ORDEREDSUBJECT`
    OrderedSubject,
    /// `REFERENCES`
    References,
}

impl ThreadAlgorithm {
    /// Capability suffix and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderedSubject => "ORDEREDSUBJECT",
            Self::References => "REFERENCES",
        }
    }
}

/// A command the client can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CAPABILITY`
    Capability,
    /// `NOOP`
    Noop,
    /// `LOGOUT`
    Logout,
    /// `STARTTLS`
    StartTls,
    /// `LOGIN user pass`
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// `LIST ref pattern`
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern with wildcards.
        pattern: String,
    },
    /// `CREATE mailbox`
    Create {
        /// Mailbox to create (UTF-8).
        mailbox: String,
    },
    /// `SELECT mailbox`
    Select {
        /// Mailbox to select (UTF-8).
        mailbox: String,
    },
    /// `UID SEARCH criteria`
    UidSearch {
        /// Search keys.
        criteria: SearchCriteria,
    },
    /// `UID THREAD alg UTF-8 criteria`
    UidThread {
        /// Threading algorithm.
        algorithm: ThreadAlgorithm,
        /// Search keys.
        criteria: SearchCriteria,
    },
    /// `UID FETCH set (items)`
    UidFetch {
        /// Messages.
        uids: UidSet,
        /// Data items.
        items: Vec<FetchAttribute>,
    },
    /// `UID STORE set [+-]FLAGS[.SILENT] (flags)`
    UidStore {
        /// Messages.
        uids: UidSet,
        /// Add, remove or replace.
        action: StoreAction,
        /// Flags to apply.
        flags: Vec<Flag>,
        /// Suppress untagged FETCH replies.
        silent: bool,
    },
    /// `UID COPY set mailbox`
    UidCopy {
        /// Messages.
        uids: UidSet,
        /// Destination (UTF-8).
        mailbox: String,
    },
    /// `UID MOVE set mailbox` (RFC 6851)
    UidMove {
        /// Messages.
        uids: UidSet,
        /// Destination (UTF-8).
        mailbox: String,
    },
    /// `EXPUNGE`
    Expunge,
    /// `UID EXPUNGE set` (RFC 4315)
    UidExpunge {
        /// Messages to expunge, restricted to those flagged `\Deleted`.
        uids: UidSet,
    },
}

impl Command {
    /// Command verb for logs. Never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::List { .. } => "LIST",
            Self::Create { .. } => "CREATE",
            Self::Select { .. } => "SELECT",
            Self::UidSearch { .. } => "UID SEARCH",
            Self::UidThread { .. } => "UID THREAD",
            Self::UidFetch { .. } => "UID FETCH",
            Self::UidStore { .. } => "UID STORE",
            Self::UidCopy { .. } => "UID COPY",
            Self::UidMove { .. } => "UID MOVE",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
        }
    }

    /// Serializes the command with its tag and trailing CRLF.
    ///
    /// Strings that cannot travel as atoms or quoted strings are sent as
    /// synchronizing literals; see [`Wire::segments`].
    #[must_use]
    pub fn encode(&self, tag: &str) -> Wire {
        let mut buf = Wire::default();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_quoted(&mut buf, &encode_name(reference));
                buf.push(b' ');
                write_quoted(&mut buf, &encode_name(pattern));
            }
            Self::Create { mailbox } => {
                buf.extend_from_slice(b"CREATE ");
                write_mailbox(&mut buf, mailbox);
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_mailbox(&mut buf, mailbox);
            }
            Self::UidSearch { criteria } => {
                buf.extend_from_slice(b"UID SEARCH ");
                if needs_charset(criteria) {
                    buf.extend_from_slice(b"CHARSET UTF-8 ");
                }
                criteria.write(&mut buf, true);
            }
            Self::UidThread {
                algorithm,
                criteria,
            } => {
                buf.extend_from_slice(b"UID THREAD ");
                buf.extend_from_slice(algorithm.as_str().as_bytes());
                buf.extend_from_slice(b" UTF-8 ");
                criteria.write(&mut buf, true);
            }
            Self::UidFetch { uids, items } => {
                buf.extend_from_slice(format!("UID FETCH {uids} (").as_bytes());
                let items: Vec<String> = items.iter().map(FetchAttribute::as_wire).collect();
                buf.extend_from_slice(items.join(" ").as_bytes());
                buf.push(b')');
            }
            Self::UidStore {
                uids,
                action,
                flags,
                silent,
            } => {
                let op = match action {
                    StoreAction::Add => "+FLAGS",
                    StoreAction::Remove => "-FLAGS",
                    StoreAction::Replace => "FLAGS",
                };
                let suffix = if *silent { ".SILENT" } else { "" };
                buf.extend_from_slice(format!("UID STORE {uids} {op}{suffix} (").as_bytes());
                write_flags(&mut buf, flags);
                buf.push(b')');
            }
            Self::UidCopy { uids, mailbox } => {
                buf.extend_from_slice(format!("UID COPY {uids} ").as_bytes());
                write_mailbox(&mut buf, mailbox);
            }
            Self::UidMove { uids, mailbox } => {
                buf.extend_from_slice(format!("UID MOVE {uids} ").as_bytes());
                write_mailbox(&mut buf, mailbox);
            }
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),
            Self::UidExpunge { uids } => {
                buf.extend_from_slice(format!("UID EXPUNGE {uids}").as_bytes());
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Like [`Command::encode`], flattened into one buffer.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        self.encode(tag).into_bytes()
    }
}

/// An encoded command.
///
/// A synchronizing literal (`{n}` CRLF) must be acknowledged by a `+`
/// continuation before its bytes are sent, so the command is kept split at
/// each announcement.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Wire {
    bytes: Vec<u8>,
    breaks: Vec<usize>,
}

impl Wire {
    pub(crate) fn extend_from_slice(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn literal(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.breaks.push(self.bytes.len());
        self.bytes.extend_from_slice(data);
    }

    /// Pieces to write in order. Every piece but the last ends with a
    /// literal announcement and must wait for a continuation request.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        let bytes = &self.bytes;
        let mut start = 0;
        self.breaks
            .iter()
            .copied()
            .chain(std::iter::once(bytes.len()))
            .map(move |end| {
                let segment = &bytes[start..end];
                start = end;
                segment
            })
    }

    /// All bytes, literals inline.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// First line of an APPEND, announcing a synchronizing literal of `len` bytes.
#[must_use]
pub fn append_prefix(tag: &str, mailbox: &str, flags: &[Flag], len: usize) -> Vec<u8> {
    let mut buf = Wire::default();
    buf.extend_from_slice(tag.as_bytes());
    buf.extend_from_slice(b" APPEND ");
    write_mailbox(&mut buf, mailbox);
    if !flags.is_empty() {
        buf.extend_from_slice(b" (");
        write_flags(&mut buf, flags);
        buf.push(b')');
    }
    buf.extend_from_slice(format!(" {{{len}}}\r\n").as_bytes());
    buf.into_bytes()
}

fn write_flags(buf: &mut Wire, flags: &[Flag]) {
    let flags: Vec<&str> = flags.iter().map(Flag::as_str).collect();
    buf.extend_from_slice(flags.join(" ").as_bytes());
}

fn write_mailbox(buf: &mut Wire, mailbox: &str) {
    write_astring(buf, &encode_name(mailbox));
}

/// Writes an atom when possible, a quoted string or literal otherwise.
pub(crate) fn write_astring(buf: &mut Wire, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        write_quoted(buf, s);
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes a quoted string, or a literal when `s` holds bytes a quoted
/// string cannot carry (CR, LF, NUL or 8-bit). NUL cannot be sent at all
/// and is dropped.
fn write_quoted(buf: &mut Wire, s: &str) {
    if s.bytes().any(needs_literal) {
        let data: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
        buf.literal(&data);
        return;
    }
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | 0) || b >= 0x80
}

fn needs_charset(criteria: &SearchCriteria) -> bool {
    match criteria {
        SearchCriteria::Text(s) => !s.is_ascii(),
        SearchCriteria::Header(f, v) => !f.is_ascii() || !v.is_ascii(),
        SearchCriteria::Not(inner) => needs_charset(inner),
        SearchCriteria::And(keys) => keys.iter().any(needs_charset),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Uid;

    fn set(values: &[u32]) -> UidSet {
        UidSet::from_uids(values.iter().map(|&v| Uid::new(v).unwrap()))
    }

    fn wire(cmd: &Command) -> String {
        String::from_utf8(cmd.serialize("A0001")).unwrap()
    }

    #[test]
    fn test_login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "alice@example.com".into(),
            password: "p a\"ss".into(),
        };
        assert_eq!(wire(&cmd), "A0001 LOGIN alice@example.com \"p a\\\"ss\"\r\n");
    }

    #[test]
    fn test_list_all() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".into(),
        };
        assert_eq!(wire(&cmd), "A0001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_select_encodes_utf7() {
        let cmd = Command::Select {
            mailbox: "Entwürfe".into(),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT Entw&APw-rfe\r\n");
    }

    #[test]
    fn test_uid_fetch() {
        let cmd = Command::UidFetch {
            uids: set(&[3, 4, 5, 9]),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::BodyStructure,
                FetchAttribute::BodyPeek("1.2".into()),
            ],
        };
        assert_eq!(wire(&cmd), "A0001 UID FETCH 3:5,9 (UID BODYSTRUCTURE BODY.PEEK[1.2])\r\n");
    }

    #[test]
    fn test_uid_store_silent() {
        let cmd = Command::UidStore {
            uids: set(&[7]),
            action: StoreAction::Add,
            flags: vec![Flag::Deleted],
            silent: true,
        };
        assert_eq!(wire(&cmd), "A0001 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n");
    }

    #[test]
    fn test_uid_thread() {
        let cmd = Command::UidThread {
            algorithm: ThreadAlgorithm::OrderedSubject,
            criteria: SearchCriteria::Younger(604_800),
        };
        assert_eq!(wire(&cmd), "A0001 UID THREAD ORDEREDSUBJECT UTF-8 YOUNGER 604800\r\n");
    }

    #[test]
    fn test_search_sends_non_ascii_as_literal() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::Text("café".into()),
        };
        let encoded = cmd.encode("A0001");
        let segments: Vec<&[u8]> = encoded.segments().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], b"A0001 UID SEARCH CHARSET UTF-8 TEXT {5}\r\n");
        assert_eq!(segments[1], "café\r\n".as_bytes());
        assert!(segments[0].is_ascii());
    }

    #[test]
    fn test_line_breaks_never_leave_a_literal() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::Text("x\r\nA0002 DELETE INBOX".into()),
        };
        let encoded = cmd.encode("A0001");
        let segments: Vec<&[u8]> = encoded.segments().collect();
        assert_eq!(segments[0], b"A0001 UID SEARCH TEXT {21}\r\n");
        assert_eq!(segments[1], b"x\r\nA0002 DELETE INBOX\r\n");
    }

    #[test]
    fn test_login_password_with_control_bytes() {
        let cmd = Command::Login {
            username: "alice".into(),
            password: "a\nb\0c".into(),
        };
        let encoded = cmd.encode("A0001");
        let segments: Vec<&[u8]> = encoded.segments().collect();
        assert_eq!(segments, vec![&b"A0001 LOGIN alice {4}\r\n"[..], &b"a\nbc\r\n"[..]]);
    }

    #[test]
    fn test_plain_command_is_one_segment() {
        let encoded = Command::Noop.encode("A0001");
        assert_eq!(encoded.segments().count(), 1);
        assert_eq!(encoded.into_bytes(), b"A0001 NOOP\r\n");
    }

    #[test]
    fn test_move_and_copy() {
        let mv = Command::UidMove {
            uids: set(&[1, 2]),
            mailbox: "INBOX.Trash".into(),
        };
        assert_eq!(wire(&mv), "A0001 UID MOVE 1:2 INBOX.Trash\r\n");
        let cp = Command::UidCopy {
            uids: set(&[1]),
            mailbox: "Junk Mail".into(),
        };
        assert_eq!(wire(&cp), "A0001 UID COPY 1 \"Junk Mail\"\r\n");
    }

    #[test]
    fn test_append_prefix() {
        let line = append_prefix("A0009", "Drafts", &[Flag::Draft, Flag::Seen], 310);
        assert_eq!(line, b"A0009 APPEND Drafts (\\Draft \\Seen) {310}\r\n");
    }
}
