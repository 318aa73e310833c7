//! Commands valid with a mailbox selected. All message addressing is by UID.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::command::{Command, FetchAttribute, SearchCriteria, StoreAction, ThreadAlgorithm};
use crate::parser::{FetchResponse, UntaggedResponse};
use crate::types::{Flag, MailboxStatus, Uid, UidSet};
use crate::{Error, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Counters from SELECT.
    #[must_use]
    pub const fn mailbox_status(&self) -> MailboxStatus {
        self.state.status()
    }

    /// `UID SEARCH`.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let completion = self.run(&Command::UidSearch { criteria }).await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Search(uids) => Some(uids),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// `UID THREAD`. Each inner vector is one thread in tree order.
    pub async fn uid_thread(
        &mut self,
        algorithm: ThreadAlgorithm,
        criteria: SearchCriteria,
    ) -> Result<Vec<Vec<Uid>>> {
        if !self.supports_thread(algorithm) {
            return Err(Error::InvalidState(format!(
                "server does not support THREAD={}",
                algorithm.as_str()
            )));
        }
        let completion = self
            .run(&Command::UidThread {
                algorithm,
                criteria,
            })
            .await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Thread(threads) => Some(threads),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// `UID FETCH`. Unsolicited FETCH lines without a UID are dropped.
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        mut items: Vec<FetchAttribute>,
    ) -> Result<Vec<FetchResponse>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        if !items.contains(&FetchAttribute::Uid) {
            items.insert(0, FetchAttribute::Uid);
        }
        let completion = self
            .run(&Command::UidFetch {
                uids: uids.clone(),
                items,
            })
            .await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Fetch(fetch) if fetch.uid().is_some() => Some(fetch),
                _ => None,
            })
            .collect())
    }

    /// `UID STORE ... .SILENT`.
    pub async fn uid_store(&mut self, uids: &UidSet, action: StoreAction, flags: &[Flag]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        self.run(&Command::UidStore {
            uids: uids.clone(),
            action,
            flags: flags.to_vec(),
            silent: true,
        })
        .await
        .map(drop)
    }

    /// `UID COPY`.
    pub async fn uid_copy(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.run(&Command::UidCopy {
            uids: uids.clone(),
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// `UID MOVE`. Requires the MOVE capability.
    pub async fn uid_move(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        if !self.supports_move() {
            return Err(Error::InvalidState("server does not support MOVE".into()));
        }
        self.run(&Command::UidMove {
            uids: uids.clone(),
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// `EXPUNGE`. Returns the expunged sequence numbers.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        let completion = self.run(&Command::Expunge).await?;
        Ok(expunged(completion.untagged))
    }

    /// `UID EXPUNGE` (UIDPLUS). Only `uids` flagged `\Deleted` are removed.
    pub async fn uid_expunge(&mut self, uids: &UidSet) -> Result<Vec<u32>> {
        if !self.supports_uidplus() {
            return Err(Error::InvalidState("server does not support UIDPLUS".into()));
        }
        let completion = self.run(&Command::UidExpunge { uids: uids.clone() }).await?;
        Ok(expunged(completion.untagged))
    }
}

fn expunged(untagged: Vec<UntaggedResponse>) -> Vec<u32> {
    untagged
        .into_iter()
        .filter_map(|r| match r {
            UntaggedResponse::Expunge(seq) => Some(seq),
            _ => None,
        })
        .collect()
}
