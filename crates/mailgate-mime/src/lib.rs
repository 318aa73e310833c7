//! # mailgate-mime
//!
//! MIME support for the mailgate gateway.
//!
//! ## Features
//!
//! - **Transfer decoding**: Base64 and Quoted-Printable bodies as found in
//!   fetched message parts
//! - **Charset decoding**: UTF-8, US-ASCII and the Latin-1 family, lossy
//!   UTF-8 for anything else
//! - **Header words**: RFC 2047 encoded-word decoding and encoding
//! - **Composition**: HTML drafts with attachments as `multipart/mixed`
//!
//! ## Composing a draft
//!
//! ```ignore
//! use mailgate_mime::{Attachment, MessageBuilder};
//!
//! let draft = MessageBuilder::new()
//!     .from("alice@example.com")
//!     .to("bob@example.com, carol@example.com")
//!     .subject("Quarterly numbers")
//!     .html_body("<p>See attached.</p>")
//!     .attach(Attachment::new("q3.pdf", pdf_bytes))
//!     .build();
//!
//! client.append("Drafts", &[Flag::Draft, Flag::Seen], &draft.bytes).await?;
//! ```
//!
//! ## Decoding a fetched part
//!
//! ```ignore
//! use mailgate_mime::{TransferEncoding, decode_text};
//!
//! let raw = TransferEncoding::parse("quoted-printable").decode(&section)?;
//! let html = decode_text(&raw, Some("iso-8859-1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod compose;
mod content_type;
mod error;
mod header;

pub mod encoding;

pub use compose::{Attachment, ComposedMessage, MessageBuilder, parse_address_list};
pub use content_type::ContentType;
pub use encoding::{TransferEncoding, decode_text};
pub use error::{Error, Result};
pub use header::Headers;
