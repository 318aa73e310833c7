//! FETCH data items: envelope, body structure and body sections.

use chrono::{DateTime, FixedOffset};

use super::value::Value;
use crate::types::{Flag, Uid};

/// A single FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID`
    Uid(Uid),
    /// `FLAGS`
    Flags(Vec<Flag>),
    /// `INTERNALDATE`
    InternalDate(DateTime<FixedOffset>),
    /// `RFC822.SIZE`
    Rfc822Size(u32),
    /// `ENVELOPE`
    Envelope(Box<Envelope>),
    /// `BODYSTRUCTURE` (or non-extensible `BODY`)
    BodyStructure(BodyStructure),
    /// `BODY[<section>]`; `data` is `None` when the server sent `NIL`.
    Section {
        /// Section specifier without brackets, e.g. `1.2` or `HEADER`.
        section: String,
        /// Raw section bytes.
        data: Option<Vec<u8>>,
    },
}

/// FETCH data for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Message sequence number.
    pub seq: u32,
    /// Data items in server order.
    pub items: Vec<FetchItem>,
}

impl FetchResponse {
    /// The `UID` item.
    #[must_use]
    pub fn uid(&self) -> Option<Uid> {
        self.items.iter().find_map(|i| match i {
            FetchItem::Uid(uid) => Some(*uid),
            _ => None,
        })
    }

    /// The `FLAGS` item, empty when absent.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        self.items
            .iter()
            .find_map(|i| match i {
                FetchItem::Flags(flags) => Some(flags.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// The `INTERNALDATE` item.
    #[must_use]
    pub fn internal_date(&self) -> Option<DateTime<FixedOffset>> {
        self.items.iter().find_map(|i| match i {
            FetchItem::InternalDate(d) => Some(*d),
            _ => None,
        })
    }

    /// The `ENVELOPE` item.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        self.items.iter().find_map(|i| match i {
            FetchItem::Envelope(e) => Some(e.as_ref()),
            _ => None,
        })
    }

    /// The `BODYSTRUCTURE` item.
    #[must_use]
    pub fn body_structure(&self) -> Option<&BodyStructure> {
        self.items.iter().find_map(|i| match i {
            FetchItem::BodyStructure(b) => Some(b),
            _ => None,
        })
    }

    /// Bytes of `BODY[section]`, if returned and not `NIL`.
    #[must_use]
    pub fn section(&self, section: &str) -> Option<&[u8]> {
        self.items.iter().find_map(|i| match i {
            FetchItem::Section { section: s, data } if s.eq_ignore_ascii_case(section) => {
                data.as_deref()
            }
            _ => None,
        })
    }
}

/// Message envelope. Header strings are kept as sent (RFC 2047 words intact).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// `Date` header.
    pub date: Option<String>,
    /// `Subject` header.
    pub subject: Option<String>,
    /// `From` addresses.
    pub from: Vec<Address>,
    /// `Sender` addresses.
    pub sender: Vec<Address>,
    /// `Reply-To` addresses.
    pub reply_to: Vec<Address>,
    /// `To` addresses.
    pub to: Vec<Address>,
    /// `Cc` addresses.
    pub cc: Vec<Address>,
    /// `Bcc` addresses.
    pub bcc: Vec<Address>,
    /// `In-Reply-To` header.
    pub in_reply_to: Option<String>,
    /// `Message-ID` header.
    pub message_id: Option<String>,
}

/// Envelope address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain part. `None` marks group syntax.
    pub host: Option<String>,
}

impl Address {
    /// Returns `local@domain`, or `None` for group markers.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// MIME structure of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// A leaf part.
    Single(Box<BodyPart>),
    /// A `multipart/*` container.
    Multipart {
        /// Lowercased subtype (`mixed`, `alternative`...).
        subtype: String,
        /// Child parts in order.
        parts: Vec<Self>,
    },
}

/// A leaf MIME part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyPart {
    /// Lowercased media type.
    pub media_type: String,
    /// Lowercased media subtype.
    pub media_subtype: String,
    /// Content-Type parameters with lowercased names.
    pub params: Vec<(String, String)>,
    /// `Content-ID`.
    pub id: Option<String>,
    /// `Content-Description`.
    pub description: Option<String>,
    /// Lowercased `Content-Transfer-Encoding`.
    pub encoding: String,
    /// Encoded size in bytes.
    pub size: u32,
    /// `Content-Disposition`, when the server sent extension data.
    pub disposition: Option<Disposition>,
}

/// `Content-Disposition` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disposition {
    /// Lowercased disposition type (`attachment`, `inline`).
    pub kind: String,
    /// Parameters with lowercased names.
    pub params: Vec<(String, String)>,
}

impl BodyPart {
    /// Returns `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.media_subtype)
    }

    /// Looks up a Content-Type parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    /// File name from the disposition, falling back to the `name` parameter.
    ///
    /// RFC 2231 `filename*` values are percent-decoded.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        let from_disposition = self.disposition.as_ref().and_then(|d| {
            lookup(&d.params, "filename")
                .map(str::to_string)
                .or_else(|| lookup(&d.params, "filename*").map(decode_rfc2231))
        });
        from_disposition
            .or_else(|| self.param("name").map(str::to_string))
            .or_else(|| self.param("name*").map(decode_rfc2231))
            .filter(|n| !n.is_empty())
    }

    /// True when the disposition explicitly says `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition.as_ref().is_some_and(|d| d.kind == "attachment")
    }
}

impl BodyStructure {
    /// Leaf parts paired with their IMAP part numbers (`1`, `1.2`, ...).
    ///
    /// Nested `message/rfc822` parts are reported as leaves.
    #[must_use]
    pub fn parts(&self) -> Vec<(String, &BodyPart)> {
        let mut out = Vec::new();
        match self {
            Self::Single(part) => out.push(("1".to_string(), part.as_ref())),
            Self::Multipart { .. } => self.walk("", &mut out),
        }
        out
    }

    fn walk<'s>(&'s self, prefix: &str, out: &mut Vec<(String, &'s BodyPart)>) {
        if let Self::Multipart { parts, .. } = self {
            for (i, child) in parts.iter().enumerate() {
                let id = if prefix.is_empty() {
                    (i + 1).to_string()
                } else {
                    format!("{prefix}.{}", i + 1)
                };
                match child {
                    Self::Single(part) => out.push((id, part.as_ref())),
                    Self::Multipart { .. } => child.walk(&id, out),
                }
            }
        }
    }

    /// Finds a part by its number.
    #[must_use]
    pub fn part(&self, id: &str) -> Option<&BodyPart> {
        self.parts()
            .into_iter()
            .find_map(|(pid, part)| (pid == id).then_some(part))
    }

    /// Number of the first inline `text/<subtype>` part.
    #[must_use]
    pub fn find_text(&self, subtype: &str) -> Option<String> {
        self.parts().into_iter().find_map(|(id, part)| {
            (part.media_type == "text" && part.media_subtype == subtype && !part.is_attachment())
                .then_some(id)
        })
    }
}

fn lookup<'p>(params: &'p [(String, String)], name: &str) -> Option<&'p str> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Decodes `charset'lang'percent-encoded` into UTF-8 (lossy).
fn decode_rfc2231(value: &str) -> String {
    let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(byte) = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Interprets the parenthesized attribute list of a FETCH response.
pub(crate) fn parse_items(list: Vec<Value>) -> Vec<FetchItem> {
    let mut items = Vec::new();
    let mut iter = list.into_iter();
    while let Some(key) = iter.next() {
        let Some(key) = key.into_text() else { continue };
        let Some(value) = iter.next() else { break };
        let upper = key.to_ascii_uppercase();

        let item = match upper.as_str() {
            "UID" => value
                .as_number()
                .and_then(|n| u32::try_from(n).ok())
                .and_then(Uid::new)
                .map(FetchItem::Uid),
            "FLAGS" => value.as_list().map(|flags| {
                FetchItem::Flags(
                    flags
                        .iter()
                        .filter_map(Value::to_text)
                        .map(|f| Flag::parse(&f))
                        .collect(),
                )
            }),
            "INTERNALDATE" => value
                .to_text()
                .and_then(|s| parse_internal_date(&s))
                .map(FetchItem::InternalDate),
            "RFC822.SIZE" => value
                .as_number()
                .and_then(|n| u32::try_from(n).ok())
                .map(FetchItem::Rfc822Size),
            "ENVELOPE" => value
                .as_list()
                .map(|fields| FetchItem::Envelope(Box::new(parse_envelope(fields)))),
            "BODYSTRUCTURE" | "BODY" => value.as_list().and_then(parse_body).map(FetchItem::BodyStructure),
            _ if upper.starts_with("BODY[") => {
                let section = key
                    .get(5..)
                    .and_then(|s| s.split(']').next())
                    .unwrap_or_default()
                    .to_string();
                let data = match value {
                    Value::String(bytes) => Some(bytes),
                    Value::Atom(s) => Some(s.into_bytes()),
                    _ => None,
                };
                Some(FetchItem::Section { section, data })
            }
            _ => None,
        };

        if let Some(item) = item {
            items.push(item);
        }
    }
    items
}

/// Parses `dd-Mon-yyyy hh:mm:ss +zzzz`.
fn parse_internal_date(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s.trim(), "%d-%b-%Y %H:%M:%S %z").ok()
}

fn nstring(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::to_text).map(std::borrow::Cow::into_owned)
}

fn parse_envelope(fields: &[Value]) -> Envelope {
    Envelope {
        date: nstring(fields.first()),
        subject: nstring(fields.get(1)),
        from: parse_addresses(fields.get(2)),
        sender: parse_addresses(fields.get(3)),
        reply_to: parse_addresses(fields.get(4)),
        to: parse_addresses(fields.get(5)),
        cc: parse_addresses(fields.get(6)),
        bcc: parse_addresses(fields.get(7)),
        in_reply_to: nstring(fields.get(8)),
        message_id: nstring(fields.get(9)),
    }
}

fn parse_addresses(value: Option<&Value>) -> Vec<Address> {
    value
        .and_then(Value::as_list)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_list)
                .map(|a| Address {
                    name: nstring(a.first()),
                    adl: nstring(a.get(1)),
                    mailbox: nstring(a.get(2)),
                    host: nstring(a.get(3)),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_params(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(list) = value.and_then(Value::as_list) else {
        return Vec::new();
    };
    list.chunks(2)
        .filter_map(|pair| match pair {
            [k, v] => Some((k.to_text()?.to_ascii_lowercase(), v.to_text()?.into_owned())),
            _ => None,
        })
        .collect()
}

fn parse_body(list: &[Value]) -> Option<BodyStructure> {
    if matches!(list.first(), Some(Value::List(_))) {
        let mut parts = Vec::new();
        let mut rest = list.iter();
        let mut subtype = String::from("mixed");
        for item in rest.by_ref() {
            match item {
                Value::List(child) => parts.push(parse_body(child)?),
                other => {
                    if let Some(s) = other.to_text() {
                        subtype = s.to_ascii_lowercase();
                    }
                    break;
                }
            }
        }
        return Some(BodyStructure::Multipart { subtype, parts });
    }

    let media_type = list.first()?.to_text()?.to_ascii_lowercase();
    let media_subtype = list.get(1)?.to_text()?.to_ascii_lowercase();
    let extension_start = match (media_type.as_str(), media_subtype.as_str()) {
        ("text", _) => 8,
        ("message", "rfc822" | "global") => 10,
        _ => 7,
    };
    let disposition = list
        .get(extension_start + 1)
        .and_then(Value::as_list)
        .and_then(|d| {
            Some(Disposition {
                kind: d.first()?.to_text()?.to_ascii_lowercase(),
                params: parse_params(d.get(1)),
            })
        });

    Some(BodyStructure::Single(Box::new(BodyPart {
        params: parse_params(list.get(2)),
        id: nstring(list.get(3)),
        description: nstring(list.get(4)),
        encoding: nstring(list.get(5))
            .unwrap_or_else(|| "7bit".to_string())
            .to_ascii_lowercase(),
        size: list
            .get(6)
            .and_then(Value::as_number)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        media_type,
        media_subtype,
        disposition,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::value::Reader;

    fn items(input: &str) -> Vec<FetchItem> {
        let Value::List(list) = Reader::new(input.as_bytes()).read_value().unwrap() else {
            panic!("not a list");
        };
        parse_items(list)
    }

    const MIXED: &str = concat!(
        "(BODYSTRUCTURE ((\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 12 1 NIL NIL NIL NIL)",
        "(\"text\" \"html\" (\"charset\" \"utf-8\") NIL NIL \"quoted-printable\" 40 2 NIL NIL NIL NIL) \"alternative\" (\"boundary\" \"b1\") NIL NIL NIL)",
        "(\"application\" \"pdf\" (\"name\" \"report.pdf\") NIL NIL \"base64\" 4096 NIL (\"attachment\" (\"filename\" \"Q3 report.pdf\")) NIL NIL)",
        " \"mixed\" (\"boundary\" \"b0\") NIL NIL NIL))"
    );

    #[test]
    fn test_uid_flags_date() {
        let parsed = items("(UID 42 FLAGS (\\Seen $Junk) INTERNALDATE \" 7-Jul-2024 02:44:25 -0700\")");
        assert_eq!(parsed[0], FetchItem::Uid(Uid::new(42).unwrap()));
        assert_eq!(
            parsed[1],
            FetchItem::Flags(vec![Flag::Seen, Flag::Keyword("$Junk".into())])
        );
        let FetchItem::InternalDate(date) = &parsed[2] else { panic!() };
        assert_eq!(date.timestamp(), 1_720_345_465);
    }

    #[test]
    fn test_envelope() {
        let parsed = items(concat!(
            "(ENVELOPE (\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Hello\" ",
            "((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) NIL NIL ",
            "((NIL NIL \"imap\" \"cac.washington.edu\")) NIL NIL NIL \"<B27397-0100000@cac.washington.edu>\"))"
        ));
        let FetchItem::Envelope(env) = &parsed[0] else { panic!() };
        assert_eq!(env.subject.as_deref(), Some("Hello"));
        assert_eq!(env.from[0].email().as_deref(), Some("gray@cac.washington.edu"));
        assert_eq!(env.from[0].name.as_deref(), Some("Terry Gray"));
        assert_eq!(env.to[0].email().as_deref(), Some("imap@cac.washington.edu"));
        assert!(env.cc.is_empty());
        assert_eq!(env.message_id.as_deref(), Some("<B27397-0100000@cac.washington.edu>"));
    }

    #[test]
    fn test_bodystructure_numbering() {
        let parsed = items(MIXED);
        let FetchItem::BodyStructure(structure) = &parsed[0] else { panic!() };
        let ids: Vec<String> = structure.parts().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1.1", "1.2", "2"]);
        assert_eq!(structure.find_text("html").as_deref(), Some("1.2"));
        assert_eq!(structure.find_text("plain").as_deref(), Some("1.1"));
        let pdf = structure.part("2").unwrap();
        assert_eq!(pdf.mime_type(), "application/pdf");
        assert_eq!(pdf.size, 4096);
        assert_eq!(pdf.file_name().as_deref(), Some("Q3 report.pdf"));
        assert!(pdf.is_attachment());
    }

    #[test]
    fn test_single_part_is_part_one() {
        let parsed = items("(BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 3028 92))");
        let FetchItem::BodyStructure(structure) = &parsed[0] else { panic!() };
        assert_eq!(structure.find_text("plain").as_deref(), Some("1"));
        assert_eq!(structure.part("1").unwrap().param("charset"), Some("US-ASCII"));
    }

    #[test]
    fn test_name_param_and_rfc2231() {
        let part = BodyPart {
            params: vec![("name*".into(), "utf-8''r%C3%A9sum%C3%A9.txt".into())],
            ..BodyPart::default()
        };
        assert_eq!(part.file_name().as_deref(), Some("résumé.txt"));
    }

    #[test]
    fn test_body_section_with_literal() {
        let parsed = items("(UID 9 BODY[2] {4}\r\nAQID)");
        assert_eq!(
            parsed[1],
            FetchItem::Section {
                section: "2".into(),
                data: Some(b"AQID".to_vec())
            }
        );
    }

    #[test]
    fn test_fetch_response_accessors() {
        let response = FetchResponse {
            seq: 4,
            items: items("(UID 17 FLAGS (\\Flagged) BODY[1.2] \"<p>hi</p>\")"),
        };
        assert_eq!(response.uid(), Uid::new(17));
        assert_eq!(response.flags(), &[Flag::Flagged]);
        assert_eq!(response.section("1.2"), Some(&b"<p>hi</p>"[..]));
        assert!(response.section("2").is_none());
        assert!(response.envelope().is_none());
    }

    #[test]
    fn test_nil_section() {
        let parsed = items("(BODY[3] NIL)");
        assert_eq!(
            parsed[0],
            FetchItem::Section {
                section: "3".into(),
                data: None
            }
        );
    }
}
