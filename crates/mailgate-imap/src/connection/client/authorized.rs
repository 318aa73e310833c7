//! Commands valid once logged in, whether or not a mailbox is selected.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authorized, Selected};
use crate::command::{Command, append_prefix};
use crate::parser::{ResponseCode, UntaggedResponse};
use crate::types::{Flag, ListResponse, MailboxStatus, Uid};
use crate::Result;

impl<S, St> Client<S, St>
where
    S: AsyncRead + AsyncWrite + Unpin,
    St: Authorized,
{
    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let completion = self
            .run(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::List(list) => Some(list),
                _ => None,
            })
            .collect())
    }

    /// Creates a mailbox.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.run(&Command::Create {
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// Selects `mailbox` for read-write access.
    pub async fn select(mut self, mailbox: &str) -> Result<Client<S, Selected>> {
        let completion = self
            .run(&Command::Select {
                mailbox: mailbox.to_string(),
            })
            .await?;

        let mut status = MailboxStatus::default();
        for response in completion.untagged {
            match response {
                UntaggedResponse::Exists(n) => status.exists = n,
                UntaggedResponse::Condition {
                    code: Some(ResponseCode::UidValidity(v)),
                    ..
                } => status.uid_validity = Some(v),
                UntaggedResponse::Condition {
                    code: Some(ResponseCode::UidNext(v)),
                    ..
                } => status.uid_next = Some(v),
                _ => {}
            }
        }
        debug!(mailbox, exists = status.exists, "mailbox selected");

        Ok(self.into_state(Selected {
            mailbox: mailbox.to_string(),
            status,
        }))
    }

    /// Appends a complete RFC 5322 message to `mailbox`.
    ///
    /// Returns the assigned UID when the server reports `APPENDUID`.
    pub async fn append(&mut self, mailbox: &str, flags: &[Flag], message: &[u8]) -> Result<Option<Uid>> {
        let tag = self.tags.next_tag();
        debug!(tag = %tag, mailbox, bytes = message.len(), "sending command APPEND");
        self.stream
            .write_all(&append_prefix(&tag, mailbox, flags, message.len()))
            .await?;

        self.await_continuation(&tag).await?;

        let mut payload = Vec::with_capacity(message.len() + 2);
        payload.extend_from_slice(message);
        payload.extend_from_slice(b"\r\n");
        self.stream.write_all(&payload).await?;

        let completion = self.read_completion(&tag).await?;
        Ok(match completion.code {
            Some(ResponseCode::AppendUid { uid, .. }) => Some(uid),
            _ => None,
        })
    }
}
