//! Type-state IMAP client.
//!
//! `Client<S, NotAuthenticated>` turns into `Client<S, Authenticated>` on
//! LOGIN and into `Client<S, Selected>` on SELECT. Each state exposes only
//! the commands valid in it.

#![allow(clippy::missing_errors_doc)]

mod authorized;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

pub use self::states::{Authenticated, Authorized, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator, ThreadAlgorithm};
use crate::parser::{Response, ResponseCode, UntaggedResponse, capabilities_in, parse_response};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// IMAP client connection in state `State`.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tags: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Outcome of a command that completed with OK.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    pub untagged: Vec<UntaggedResponse>,
    pub code: Option<ResponseCode>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Capabilities last advertised by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// True if the server advertised `cap`.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// True if `UID MOVE` is available.
    #[must_use]
    pub fn supports_move(&self) -> bool {
        self.has_capability(&Capability::Move)
    }

    /// True if `UID EXPUNGE` and `APPENDUID` are available.
    #[must_use]
    pub fn supports_uidplus(&self) -> bool {
        self.has_capability(&Capability::UidPlus)
    }

    /// True if `YOUNGER`/`OLDER` search keys are available.
    #[must_use]
    pub fn supports_within(&self) -> bool {
        self.has_capability(&Capability::Within)
    }

    /// True if `UID THREAD` supports `algorithm`.
    #[must_use]
    pub fn supports_thread(&self, algorithm: ThreadAlgorithm) -> bool {
        self.has_capability(&Capability::Thread(algorithm.as_str().to_string()))
    }

    /// Refreshes the capability list.
    pub async fn capability(&mut self) -> Result<&[Capability]> {
        let completion = self.run(&Command::Capability).await?;
        for response in completion.untagged {
            if let UntaggedResponse::Capability(caps) = response {
                self.capabilities = caps;
            }
        }
        Ok(&self.capabilities)
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.run(&Command::Noop).await.map(drop)
    }

    /// Sends LOGOUT and drops the connection. Errors after sending are ignored.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next_tag();
        self.stream.write_all(&Command::Logout.serialize(&tag)).await?;
        if let Err(e) = self.read_completion(&tag).await {
            debug!(error = %e, "ignoring error after LOGOUT");
        }
        Ok(())
    }

    /// Sends a command and waits for its tagged completion.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<Completion> {
        let tag = self.tags.next_tag();
        debug!(tag = %tag, command = command.name(), "sending command");
        let wire = command.encode(&tag);
        let mut segments = wire.segments().peekable();
        while let Some(segment) = segments.next() {
            self.stream.write_all(segment).await?;
            if segments.peek().is_some() {
                self.await_continuation(&tag).await?;
            }
        }
        self.read_completion(&tag).await
    }

    /// Waits for the `+` that lets a literal through. A tagged completion
    /// for `tag` in its place means the server refused the command.
    pub(crate) async fn await_continuation(&mut self, tag: &str) -> Result<()> {
        loop {
            let raw = self.stream.read_response().await?;
            match parse_response(&raw)? {
                Response::Continuation(_) => return Ok(()),
                Response::Tagged {
                    tag: got,
                    status,
                    text,
                    ..
                } if got == tag => {
                    return Err(match status {
                        Status::Bad => Error::Bad(text),
                        _ => Error::No(text),
                    });
                }
                _ => {}
            }
        }
    }

    /// Collects untagged data until the completion for `tag` arrives.
    pub(crate) async fn read_completion(&mut self, tag: &str) -> Result<Completion> {
        let mut untagged = Vec::new();
        loop {
            let raw = self.stream.read_response().await?;
            let response = match parse_response(&raw) {
                Ok(response) => response,
                Err(e) if is_tagged_for(&raw, tag) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "skipping unparseable response");
                    continue;
                }
            };

            if let Some(caps) = capabilities_in(&response) {
                self.capabilities = caps.to_vec();
            }

            match response {
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => {
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(Completion { untagged, code }),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Response::Tagged { tag: got, .. } => {
                    warn!(tag = %got, "ignoring completion for unknown tag");
                }
                Response::Untagged(data) => untagged.push(data),
                Response::Continuation(_) => {
                    return Err(Error::Protocol("unexpected continuation request".into()));
                }
            }
        }
    }

    pub(crate) fn into_state<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            capabilities: self.capabilities,
            state,
        }
    }
}

fn is_tagged_for(raw: &[u8], tag: &str) -> bool {
    raw.strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tagged_for() {
        assert!(is_tagged_for(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged_for(b"A00012 OK done\r\n", "A0001"));
        assert!(!is_tagged_for(b"* OK\r\n", "A0001"));
    }
}
