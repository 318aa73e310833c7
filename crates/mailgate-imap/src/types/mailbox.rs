//! Mailbox listing types and modified UTF-7 name coding (RFC 3501 §5.1.3).

use base64::Engine;
use base64::alphabet::IMAP_MUTF7;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

const MUTF7: GeneralPurpose = GeneralPurpose::new(
    &IMAP_MUTF7,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One LIST response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Name attributes, including RFC 6154 special-use markers.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, if the server uses one.
    pub delimiter: Option<char>,
    /// Mailbox name, decoded to UTF-8.
    pub name: String,
}

impl ListResponse {
    /// Returns true if the mailbox can be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }
}

/// Mailbox name attributes from LIST.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NonExistent`
    NonExistent,
    /// `\HasChildren`
    HasChildren,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\All` (special-use)
    All,
    /// `\Archive` (special-use)
    Archive,
    /// `\Drafts` (special-use)
    Drafts,
    /// `\Flagged` (special-use)
    Flagged,
    /// `\Junk` (special-use)
    Junk,
    /// `\Sent` (special-use)
    Sent,
    /// `\Trash` (special-use)
    Trash,
    /// Anything else.
    Other(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            _ => Self::Other(s.to_string()),
        }
    }
}

/// Counters reported by SELECT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// `UIDVALIDITY` value.
    pub uid_validity: Option<u32>,
    /// Predicted next UID.
    pub uid_next: Option<u32>,
}

/// Decodes a modified UTF-7 mailbox name. Malformed shifts are kept verbatim.
#[must_use]
pub fn decode_name(wire: &str) -> String {
    let mut out = String::with_capacity(wire.len());
    let mut rest = wire;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('-') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let chunk = &after[..end];
        if chunk.is_empty() {
            out.push('&');
        } else if let Some(decoded) = decode_utf16_chunk(chunk) {
            out.push_str(&decoded);
        } else {
            out.push('&');
            out.push_str(chunk);
            out.push('-');
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn decode_utf16_chunk(chunk: &str) -> Option<String> {
    let bytes = MUTF7.decode(chunk).ok()?;
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

/// Encodes a UTF-8 mailbox name into modified UTF-7.
#[must_use]
pub fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending: Vec<u16> = Vec::new();

    let flush = |pending: &mut Vec<u16>, out: &mut String| {
        if pending.is_empty() {
            return;
        }
        let bytes: Vec<u8> = pending.iter().flat_map(|u| u.to_be_bytes()).collect();
        out.push('&');
        out.push_str(&MUTF7.encode(bytes));
        out.push('-');
        pending.clear();
    };

    for ch in name.chars() {
        if (' '..='~').contains(&ch) {
            flush(&mut pending, &mut out);
            if ch == '&' {
                out.push_str("&-");
            } else {
                out.push(ch);
            }
        } else {
            let mut buf = [0u16; 2];
            pending.extend_from_slice(ch.encode_utf16(&mut buf));
        }
    }
    flush(&mut pending, &mut out);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_parse() {
        assert_eq!(MailboxAttribute::parse("\\Trash"), MailboxAttribute::Trash);
        assert_eq!(MailboxAttribute::parse("\\spam"), MailboxAttribute::Junk);
        assert_eq!(
            MailboxAttribute::parse("\\Custom"),
            MailboxAttribute::Other("\\Custom".into())
        );
    }

    #[test]
    fn test_selectable() {
        let list = ListResponse {
            attributes: vec![MailboxAttribute::NoSelect],
            delimiter: Some('/'),
            name: "[Gmail]".into(),
        };
        assert!(!list.is_selectable());
    }

    #[test]
    fn test_decode_rfc_example() {
        assert_eq!(decode_name("~peter/mail/&U,BTFw-/&ZeVnLIqe-"), "~peter/mail/台北/日本語");
        assert_eq!(decode_name("Tom &- Jerry"), "Tom & Jerry");
        assert_eq!(decode_name("Entw&APw-rfe"), "Entwürfe");
    }

    #[test]
    fn test_encode_matches_decode() {
        for name in ["INBOX", "Entwürfe", "台北/日本語", "R&D", "Papierkorb"] {
            assert_eq!(decode_name(&encode_name(name)), name);
        }
        assert_eq!(encode_name("Entwürfe"), "Entw&APw-rfe");
        assert_eq!(encode_name("R&D"), "R&-D");
    }

    #[test]
    fn test_decode_malformed_is_verbatim() {
        assert_eq!(decode_name("Broken&shift"), "Broken&shift");
    }
}
