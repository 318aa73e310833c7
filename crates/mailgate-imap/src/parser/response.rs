//! Parsing of complete server responses.

use super::fetch::{FetchResponse, parse_items};
use super::value::{Reader, Value};
use crate::types::mailbox::decode_name;
use crate::types::{Capability, Flag, ListResponse, MailboxAttribute, Status, Uid};
use crate::Result;

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion of a command.
    Tagged {
        /// Tag of the command being completed.
        tag: String,
        /// Completion status.
        status: Status,
        /// Bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request (`+`).
    Continuation(String),
}

/// Bracketed response codes this client acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `UIDVALIDITY n`
    UidValidity(u32),
    /// `UIDNEXT n`
    UidNext(u32),
    /// `APPENDUID validity uid` (RFC 4315)
    AppendUid {
        /// `UIDVALIDITY` of the destination.
        uid_validity: u32,
        /// UID assigned to the appended message.
        uid: Uid,
    },
    /// `COPYUID validity source dest` (RFC 4315)
    CopyUid {
        /// `UIDVALIDITY` of the destination.
        uid_validity: u32,
        /// Source UIDs, in order.
        source: Vec<Uid>,
        /// Destination UIDs, positionally matching `source`.
        destination: Vec<Uid>,
    },
    /// `TRYCREATE`
    TryCreate,
    /// Any other code, verbatim.
    Other(String),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE [code] text`
    Condition {
        /// Condition status.
        status: Status,
        /// Bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* LIST ...`
    List(ListResponse),
    /// `* SEARCH ...` (UIDs when issued as `UID SEARCH`)
    Search(Vec<Uid>),
    /// `* THREAD ...`, each thread flattened to its members in tree order.
    Thread(Vec<Vec<Uid>>),
    /// `* n FETCH (...)`
    Fetch(FetchResponse),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* FLAGS (...)`
    Flags(Vec<Flag>),
    /// Anything this client does not interpret.
    Other(String),
}

/// Parses one complete response as returned by the framed reader.
pub fn parse_response(input: &[u8]) -> Result<Response> {
    let mut reader = Reader::new(input);
    match reader.peek() {
        Some(b'*') => {
            reader.eat(b'*');
            reader.expect_space()?;
            parse_untagged(&mut reader).map(Response::Untagged)
        }
        Some(b'+') => {
            reader.eat(b'+');
            reader.skip_spaces();
            Ok(Response::Continuation(reader.rest_of_line()))
        }
        Some(_) => {
            let tag = reader.read_atom()?.to_string();
            reader.expect_space()?;
            let status_atom = reader.read_atom()?;
            let status = Status::parse(status_atom)
                .ok_or_else(|| reader.error("expected OK, NO or BAD"))?;
            let (code, text) = parse_resp_text(&mut reader)?;
            Ok(Response::Tagged {
                tag,
                status,
                code,
                text,
            })
        }
        None => Err(reader.error("empty response")),
    }
}

fn parse_untagged(reader: &mut Reader<'_>) -> Result<UntaggedResponse> {
    let first = reader.read_atom()?;

    if let Ok(number) = first.parse::<u32>() {
        reader.expect_space()?;
        let keyword = reader.read_atom()?.to_ascii_uppercase();
        return Ok(match keyword.as_str() {
            "EXISTS" => UntaggedResponse::Exists(number),
            "EXPUNGE" => UntaggedResponse::Expunge(number),
            "FETCH" => {
                reader.expect_space()?;
                let Value::List(list) = reader.read_value()? else {
                    return Err(reader.error("FETCH data must be a list"));
                };
                UntaggedResponse::Fetch(FetchResponse {
                    seq: number,
                    items: parse_items(list),
                })
            }
            _ => UntaggedResponse::Other(format!("{number} {keyword}")),
        });
    }

    let keyword = first.to_ascii_uppercase();
    if let Some(status) = Status::parse(&keyword) {
        let (code, text) = parse_resp_text(reader)?;
        return Ok(UntaggedResponse::Condition { status, code, text });
    }

    match keyword.as_str() {
        "CAPABILITY" => {
            let rest = reader.rest_of_line();
            Ok(UntaggedResponse::Capability(parse_capabilities(&rest)))
        }
        "LIST" | "LSUB" => parse_list(reader).map(UntaggedResponse::List),
        "SEARCH" => {
            let rest = reader.rest_of_line();
            Ok(UntaggedResponse::Search(
                rest.split_whitespace()
                    .filter_map(|n| n.parse::<Uid>().ok())
                    .collect(),
            ))
        }
        "THREAD" => {
            let mut threads = Vec::new();
            loop {
                reader.skip_spaces();
                if reader.peek() != Some(b'(') {
                    break;
                }
                let mut members = Vec::new();
                flatten_thread(&reader.read_value()?, &mut members);
                if !members.is_empty() {
                    threads.push(members);
                }
            }
            Ok(UntaggedResponse::Thread(threads))
        }
        "FLAGS" => {
            reader.expect_space()?;
            let value = reader.read_value()?;
            Ok(UntaggedResponse::Flags(
                value
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::to_text)
                    .map(|f| Flag::parse(&f))
                    .collect(),
            ))
        }
        _ => Ok(UntaggedResponse::Other(format!(
            "{keyword}{}",
            reader.rest_of_line()
        ))),
    }
}

fn flatten_thread(value: &Value, out: &mut Vec<Uid>) {
    match value {
        Value::Number(n) => {
            if let Some(uid) = u32::try_from(*n).ok().and_then(Uid::new) {
                out.push(uid);
            }
        }
        Value::List(items) => {
            for item in items {
                flatten_thread(item, out);
            }
        }
        _ => {}
    }
}

fn parse_list(reader: &mut Reader<'_>) -> Result<ListResponse> {
    reader.expect_space()?;
    let attributes = reader
        .read_value()?
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::to_text)
        .map(|a| MailboxAttribute::parse(&a))
        .collect();
    reader.expect_space()?;
    let delimiter = reader.read_value()?.to_text().and_then(|d| d.chars().next());
    reader.expect_space()?;
    let wire_name = reader
        .read_value()?
        .into_text()
        .ok_or_else(|| reader.error("LIST mailbox name missing"))?;

    Ok(ListResponse {
        attributes,
        delimiter,
        name: decode_name(&wire_name),
    })
}

fn parse_resp_text(reader: &mut Reader<'_>) -> Result<(Option<ResponseCode>, String)> {
    reader.skip_spaces();
    let code = if reader.peek() == Some(b'[') {
        let inner = reader.read_bracketed()?;
        reader.skip_spaces();
        Some(parse_code(&String::from_utf8_lossy(inner)))
    } else {
        None
    };
    Ok((code, reader.rest_of_line()))
}

fn parse_capabilities(text: &str) -> Vec<Capability> {
    text.split_whitespace().map(Capability::parse).collect()
}

fn parse_code(inner: &str) -> ResponseCode {
    let mut words = inner.split_whitespace();
    let name = words.next().unwrap_or_default().to_ascii_uppercase();
    let args: Vec<&str> = words.collect();
    let number = |i: usize| args.get(i).and_then(|s| s.parse::<u32>().ok());

    let parsed = match name.as_str() {
        "CAPABILITY" => Some(ResponseCode::Capability(
            args.iter().map(|c| Capability::parse(c)).collect(),
        )),
        "UIDVALIDITY" => number(0).map(ResponseCode::UidValidity),
        "UIDNEXT" => number(0).map(ResponseCode::UidNext),
        "APPENDUID" => number(0).zip(
            args.get(1)
                .and_then(|s| expand_uid_set(s))
                .and_then(|uids| uids.first().copied()),
        )
        .map(|(uid_validity, uid)| ResponseCode::AppendUid { uid_validity, uid }),
        "COPYUID" => number(0).and_then(|uid_validity| {
            Some(ResponseCode::CopyUid {
                uid_validity,
                source: expand_uid_set(args.get(1)?)?,
                destination: expand_uid_set(args.get(2)?)?,
            })
        }),
        "TRYCREATE" => Some(ResponseCode::TryCreate),
        _ => None,
    };
    parsed.unwrap_or_else(|| ResponseCode::Other(inner.to_string()))
}

/// Expands `1:3,7` into individual UIDs, keeping range direction.
fn expand_uid_set(s: &str) -> Option<Vec<Uid>> {
    let mut out = Vec::new();
    for piece in s.split(',') {
        if let Some((a, b)) = piece.split_once(':') {
            let (a, b): (u32, u32) = (a.parse().ok()?, b.parse().ok()?);
            if a <= b {
                out.extend((a..=b).filter_map(Uid::new));
            } else {
                out.extend((b..=a).rev().filter_map(Uid::new));
            }
        } else {
            out.push(piece.parse().ok()?);
        }
    }
    Some(out)
}

/// Collects capabilities from an untagged CAPABILITY line or a code.
pub(crate) fn capabilities_in(response: &Response) -> Option<&[Capability]> {
    match response {
        Response::Untagged(UntaggedResponse::Capability(caps))
        | Response::Untagged(UntaggedResponse::Condition {
            code: Some(ResponseCode::Capability(caps)),
            ..
        })
        | Response::Tagged {
            code: Some(ResponseCode::Capability(caps)),
            ..
        } => Some(caps),
        _ => None,
    }
}
