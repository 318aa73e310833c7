//! Draft composition.
//!
//! Builds an RFC 5322 message with an HTML body and optional attachments.
//! Without attachments the message is a single `text/html` part; with them
//! it is `multipart/mixed` with the HTML body first.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Utc};

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_rfc2047};
use crate::header::Headers;

const FALLBACK_DOMAIN: &str = "mailgate.local";

/// A file attached to a composed message.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub file_name: String,
    /// Declared media type.
    pub content_type: ContentType,
    /// Raw file content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an `application/octet-stream` attachment.
    #[must_use]
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: ContentType::octet_stream(),
            data,
        }
    }

    /// Overrides the media type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }
}

/// Output of [`MessageBuilder::build`].
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    /// Message-ID without angle brackets.
    pub message_id: String,
    /// Complete message, CRLF line endings.
    pub bytes: Vec<u8>,
}

/// Builder for HTML messages with attachments.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    html_body: String,
    attachments: Vec<Attachment>,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Adds recipients from a comma or semicolon separated list.
    #[must_use]
    pub fn to(mut self, list: &str) -> Self {
        self.to.extend(parse_address_list(list));
        self
    }

    /// Adds carbon-copy recipients.
    #[must_use]
    pub fn cc(mut self, list: &str) -> Self {
        self.cc.extend(parse_address_list(list));
        self
    }

    /// Adds blind carbon-copy recipients. Drafts keep the `Bcc` header.
    #[must_use]
    pub fn bcc(mut self, list: &str) -> Self {
        self.bcc.extend(parse_address_list(list));
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = html.into();
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Fixes the `Date` header instead of using the current time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Fixes the Message-ID (without angle brackets).
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Renders the message.
    #[must_use]
    pub fn build(self) -> ComposedMessage {
        let message_id = self.message_id.clone().unwrap_or_else(|| {
            let domain = self
                .from
                .as_deref()
                .and_then(|f| f.rsplit_once('@'))
                .map(|(_, d)| d.trim_end_matches('>').trim())
                .filter(|d| !d.is_empty())
                .unwrap_or(FALLBACK_DOMAIN);
            format!("{:032x}@{domain}", rand::random::<u128>())
        });
        let date = self.date.unwrap_or_else(|| Utc::now().fixed_offset());

        let mut headers = Headers::new();
        headers.add("Date", date.to_rfc2822());
        if let Some(from) = &self.from {
            headers.add("From", sanitize(from));
        }
        for (name, list) in [("To", &self.to), ("Cc", &self.cc), ("Bcc", &self.bcc)] {
            if !list.is_empty() {
                headers.add(name, sanitize(&list.join(", ")));
            }
        }
        headers.add("Subject", encode_rfc2047(&sanitize(&self.subject)));
        headers.add("Message-ID", format!("<{message_id}>"));
        headers.add("MIME-Version", "1.0");

        let mut out = String::new();
        if self.attachments.is_empty() {
            headers.add("Content-Type", ContentType::text_html().to_string());
            headers.add("Content-Transfer-Encoding", "base64");
            out.push_str(&headers.to_string());
            out.push_str("\r\n");
            out.push_str(&encode_base64_lines(self.html_body.as_bytes()));
        } else {
            let boundary = format!("=_mailgate_{:032x}", rand::random::<u128>());
            headers.add("Content-Type", ContentType::multipart_mixed(&boundary).to_string());
            out.push_str(&headers.to_string());
            out.push_str("\r\nThis is a multi-part message in MIME format.\r\n");

            let _ = write!(out, "\r\n--{boundary}\r\n");
            let mut body_headers = Headers::new();
            body_headers.add("Content-Type", ContentType::text_html().to_string());
            body_headers.add("Content-Transfer-Encoding", "base64");
            out.push_str(&body_headers.to_string());
            out.push_str("\r\n");
            out.push_str(&encode_base64_lines(self.html_body.as_bytes()));

            for attachment in &self.attachments {
                let _ = write!(out, "\r\n--{boundary}\r\n");
                out.push_str(&attachment_headers(attachment).to_string());
                out.push_str("\r\n");
                out.push_str(&encode_base64_lines(&attachment.data));
            }
            let _ = write!(out, "\r\n--{boundary}--\r\n");
        }

        ComposedMessage {
            message_id,
            bytes: out.into_bytes(),
        }
    }
}

fn attachment_headers(attachment: &Attachment) -> Headers {
    let name = sanitize(&attachment.file_name);
    let mut headers = Headers::new();
    if name.is_ascii() {
        let ct = attachment.content_type.clone().with_parameter("name", name.as_str());
        headers.add("Content-Type", ct.to_string());
        headers.add("Content-Disposition", format!("attachment; filename=\"{}\"", escape_quoted(&name)));
    } else {
        // RFC 2231 for the disposition, an encoded word for legacy readers.
        headers.add(
            "Content-Type",
            format!("{}; name=\"{}\"", attachment.content_type, encode_rfc2047(&name).replace("\r\n ", " ")),
        );
        headers.add(
            "Content-Disposition",
            format!("attachment; filename*=utf-8''{}", percent_encode(&name)),
        );
    }
    headers.add("Content-Transfer-Encoding", "base64");
    headers
}

/// Splits a recipient list on commas and semicolons outside quoted strings.
#[must_use]
pub fn parse_address_list(list: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in list.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' | ';' if !in_quotes => {
                push_trimmed(&mut out, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push_trimmed(&mut out, &current);
    out
}

fn push_trimmed(out: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() {
        out.push(item.to_string());
    }
}

/// Header values must not carry line breaks.
fn sanitize(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encoding::decode_base64;

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc2822("Tue, 2 Jul 2024 10:00:00 +0000").unwrap()
    }

    fn text(message: &ComposedMessage) -> String {
        String::from_utf8(message.bytes.clone()).unwrap()
    }

    #[test]
    fn test_parse_address_list() {
        assert_eq!(
            parse_address_list("a@x.com, b@x.com;c@x.com ,,"),
            vec!["a@x.com", "b@x.com", "c@x.com"]
        );
        assert_eq!(
            parse_address_list("\"Doe, Jane\" <jane@x.com>, bob@x.com"),
            vec!["\"Doe, Jane\" <jane@x.com>", "bob@x.com"]
        );
        assert!(parse_address_list("  ").is_empty());
    }

    #[test]
    fn test_single_part_html() {
        let message = MessageBuilder::new()
            .from("alice@example.com")
            .to("bob@example.com, carol@example.com")
            .bcc("dave@example.com")
            .subject("Plan")
            .html_body("<p>Hi</p>")
            .date(fixed_date())
            .message_id("abc@example.com")
            .build();
        let raw = text(&message);

        assert!(raw.starts_with("Date: Tue, "));
        assert!(raw.contains("Jul 2024 10:00:00 +0000\r\n"));
        assert!(raw.contains("To: bob@example.com, carol@example.com\r\n"));
        assert!(raw.contains("Bcc: dave@example.com\r\n"));
        assert!(!raw.contains("Cc: "));
        assert!(raw.contains("Message-ID: <abc@example.com>\r\n"));
        assert!(raw.contains("Content-Type: text/html; charset=utf-8\r\n"));

        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        assert_eq!(decode_base64(body.as_bytes()).unwrap(), b"<p>Hi</p>");
    }

    #[test]
    fn test_generated_message_id_uses_sender_domain() {
        let message = MessageBuilder::new().from("Alice <alice@example.org>").build();
        assert!(message.message_id.ends_with("@example.org"));
        assert!(text(&message).contains(&format!("<{}>", message.message_id)));
    }

    #[test]
    fn test_multipart_with_attachments() {
        let message = MessageBuilder::new()
            .to("bob@example.com")
            .subject("Files")
            .html_body("<p>see attached</p>")
            .attach(Attachment::new("notes.txt", b"hello".to_vec()))
            .attach(Attachment::new("résumé.pdf", vec![0, 1, 2]))
            .build();
        let raw = text(&message);

        let boundary_line = raw
            .lines()
            .find(|l| l.starts_with("Content-Type: multipart/mixed"))
            .unwrap();
        let boundary = boundary_line.split("boundary=").nth(1).unwrap().trim().trim_matches('"');
        assert_eq!(raw.matches(&format!("--{boundary}\r\n")).count(), 3);
        assert!(raw.ends_with(&format!("--{boundary}--\r\n")));

        assert!(raw.contains("Content-Disposition: attachment; filename=\"notes.txt\""));
        assert!(raw.contains("filename*=utf-8''r%C3%A9sum%C3%A9.pdf"));
        assert!(raw.contains("aGVsbG8=\r\n"));
    }

    #[test]
    fn test_subject_encoded_and_sanitized() {
        let message = MessageBuilder::new().subject("Grüße\r\nBcc: evil@x.com").build();
        let raw = text(&message);
        assert!(raw.contains("Subject: =?utf-8?B?"));
        assert!(!raw.contains("\r\nBcc: evil"));
    }
}
