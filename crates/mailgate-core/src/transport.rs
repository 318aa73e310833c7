//! The mail-server operations the services are written against.
//!
//! Services take any [`MailTransport`]; production code uses
//! [`ImapTransport`], tests use an in-memory fake. Every operation names
//! the mailbox it acts on, so callers never track selection state.

use std::future::Future;

use mailgate_imap::{
    Authenticated, Client, FetchAttribute, FetchResponse, Flag, ImapStream, ListResponse,
    SearchCriteria, Selected, StoreAction, ThreadAlgorithm, Uid, UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Server extensions that change how services behave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// `MOVE` (RFC 6851).
    pub move_messages: bool,
    /// `UIDPLUS` (RFC 4315): `UID EXPUNGE` and `APPENDUID`.
    pub uidplus: bool,
    /// `WITHIN` (RFC 5032): `YOUNGER` search key.
    pub within: bool,
    /// `THREAD=ORDEREDSUBJECT` (RFC 5256).
    pub ordered_subject: bool,
}

/// Primitive mailbox operations.
pub trait MailTransport: Send {
    /// Extensions advertised by the server.
    fn capabilities(&self) -> TransportCapabilities;

    /// `LIST "" "*"`
    fn list_mailboxes(&mut self) -> impl Future<Output = Result<Vec<ListResponse>>> + Send;

    /// Creates a mailbox.
    fn create_mailbox(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// UIDs in `mailbox` matching `criteria`.
    fn search(
        &mut self,
        mailbox: &str,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<Vec<Uid>>> + Send;

    /// Server-side `ORDEREDSUBJECT` threads, each in thread order.
    fn thread(
        &mut self,
        mailbox: &str,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<Vec<Vec<Uid>>>> + Send;

    /// Fetches data items for `uids`.
    fn fetch(
        &mut self,
        mailbox: &str,
        uids: &UidSet,
        items: Vec<FetchAttribute>,
    ) -> impl Future<Output = Result<Vec<FetchResponse>>> + Send;

    /// Copies messages to `destination`.
    fn copy(
        &mut self,
        mailbox: &str,
        uids: &UidSet,
        destination: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Moves messages with the MOVE extension.
    fn move_messages(
        &mut self,
        mailbox: &str,
        uids: &UidSet,
        destination: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Changes flags.
    fn store(
        &mut self,
        mailbox: &str,
        uids: &UidSet,
        action: StoreAction,
        flags: &[Flag],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Permanently removes `\Deleted` messages among `uids`. Returns the
    /// expunged sequence numbers.
    fn expunge(&mut self, mailbox: &str, uids: &UidSet) -> impl Future<Output = Result<Vec<u32>>> + Send;

    /// Appends a message; returns the assigned UID when the server reports it.
    fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        message: &[u8],
    ) -> impl Future<Output = Result<Option<Uid>>> + Send;

    /// Ends the session.
    fn logout(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

enum Conn<S> {
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

/// [`MailTransport`] over an authenticated IMAP connection.
///
/// A failed SELECT leaves the connection unusable; later calls return
/// [`Error::Connection`].
pub struct ImapTransport<S = ImapStream> {
    conn: Option<Conn<S>>,
    capabilities: TransportCapabilities,
}

impl<S> ImapTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a logged-in client.
    #[must_use]
    pub fn new(client: Client<S, Authenticated>) -> Self {
        let capabilities = TransportCapabilities {
            move_messages: client.supports_move(),
            uidplus: client.supports_uidplus(),
            within: client.supports_within(),
            ordered_subject: client.supports_thread(ThreadAlgorithm::OrderedSubject),
        };
        debug!(?capabilities, "IMAP transport ready");
        Self {
            conn: Some(Conn::Authenticated(client)),
            capabilities,
        }
    }

    async fn selected(&mut self, mailbox: &str) -> Result<&mut Client<S, Selected>> {
        let client = match self.conn.take().ok_or_else(closed)? {
            Conn::Selected(client) if client.mailbox() == mailbox => client,
            Conn::Selected(client) => client.select(mailbox).await?,
            Conn::Authenticated(client) => client.select(mailbox).await?,
        };
        self.conn = Some(Conn::Selected(client));
        match self.conn.as_mut() {
            Some(Conn::Selected(client)) => Ok(client),
            _ => Err(closed()),
        }
    }
}

fn closed() -> Error {
    Error::Connection("IMAP connection is no longer usable".into())
}

impl<S> MailTransport for ImapTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn capabilities(&self) -> TransportCapabilities {
        self.capabilities
    }

    async fn list_mailboxes(&mut self) -> Result<Vec<ListResponse>> {
        let list = match self.conn.as_mut().ok_or_else(closed)? {
            Conn::Authenticated(client) => client.list("", "*").await?,
            Conn::Selected(client) => client.list("", "*").await?,
        };
        Ok(list)
    }

    async fn create_mailbox(&mut self, name: &str) -> Result<()> {
        match self.conn.as_mut().ok_or_else(closed)? {
            Conn::Authenticated(client) => client.create(name).await?,
            Conn::Selected(client) => client.create(name).await?,
        }
        Ok(())
    }

    async fn search(&mut self, mailbox: &str, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        Ok(self.selected(mailbox).await?.uid_search(criteria).await?)
    }

    async fn thread(&mut self, mailbox: &str, criteria: SearchCriteria) -> Result<Vec<Vec<Uid>>> {
        Ok(self
            .selected(mailbox)
            .await?
            .uid_thread(ThreadAlgorithm::OrderedSubject, criteria)
            .await?)
    }

    async fn fetch(
        &mut self,
        mailbox: &str,
        uids: &UidSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<FetchResponse>> {
        Ok(self.selected(mailbox).await?.uid_fetch(uids, items).await?)
    }

    async fn copy(&mut self, mailbox: &str, uids: &UidSet, destination: &str) -> Result<()> {
        Ok(self.selected(mailbox).await?.uid_copy(uids, destination).await?)
    }

    async fn move_messages(&mut self, mailbox: &str, uids: &UidSet, destination: &str) -> Result<()> {
        Ok(self.selected(mailbox).await?.uid_move(uids, destination).await?)
    }

    async fn store(&mut self, mailbox: &str, uids: &UidSet, action: StoreAction, flags: &[Flag]) -> Result<()> {
        Ok(self.selected(mailbox).await?.uid_store(uids, action, flags).await?)
    }

    async fn expunge(&mut self, mailbox: &str, uids: &UidSet) -> Result<Vec<u32>> {
        let uidplus = self.capabilities.uidplus;
        let client = self.selected(mailbox).await?;
        if uidplus {
            Ok(client.uid_expunge(uids).await?)
        } else {
            warn!(mailbox, "server lacks UIDPLUS, expunging every deleted message");
            Ok(client.expunge().await?)
        }
    }

    async fn append(&mut self, mailbox: &str, flags: &[Flag], message: &[u8]) -> Result<Option<Uid>> {
        let uid = match self.conn.as_mut().ok_or_else(closed)? {
            Conn::Authenticated(client) => client.append(mailbox, flags, message).await?,
            Conn::Selected(client) => client.append(mailbox, flags, message).await?,
        };
        Ok(uid)
    }

    async fn logout(self) -> Result<()> {
        match self.conn {
            Some(Conn::Authenticated(client)) => client.logout().await?,
            Some(Conn::Selected(client)) => client.logout().await?,
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    async fn transport(script: &mut Builder) -> ImapTransport<tokio_test::io::Mock> {
        let client = Client::from_stream(script.build()).await.unwrap();
        ImapTransport::new(client.login("u", "p").await.unwrap())
    }

    fn greeting(caps: &str) -> Builder {
        let mut b = Builder::new();
        b.read(format!("* OK [CAPABILITY IMAP4rev1 {caps}] hi\r\n").as_bytes())
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK done\r\n");
        b
    }

    #[tokio::test]
    async fn test_capabilities_reflect_server() {
        let mut script = greeting("MOVE WITHIN THREAD=ORDEREDSUBJECT");
        let t = transport(&mut script).await;
        let caps = t.capabilities();
        assert!(caps.move_messages && caps.within && caps.ordered_subject);
        assert!(!caps.uidplus);
    }

    #[tokio::test]
    async fn test_selects_once_per_mailbox() {
        let mut script = greeting("UIDPLUS");
        script
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"A0002 OK selected\r\n")
            .write(b"A0003 UID SEARCH ALL\r\n")
            .read(b"* SEARCH 4 5\r\nA0003 OK\r\n")
            .write(b"A0004 UID STORE 4 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK\r\n")
            .write(b"A0005 SELECT Trash\r\n")
            .read(b"A0005 OK selected\r\n")
            .write(b"A0006 UID EXPUNGE 9\r\n")
            .read(b"* 1 EXPUNGE\r\nA0006 OK\r\n");
        let mut t = transport(&mut script).await;

        let uids = t.search("INBOX", SearchCriteria::All).await.unwrap();
        assert_eq!(uids.len(), 2);
        let four = UidSet::from_uids([Uid::new(4).unwrap()]);
        t.store("INBOX", &four, StoreAction::Add, &[Flag::Deleted]).await.unwrap();
        let nine = UidSet::from_uids([Uid::new(9).unwrap()]);
        assert_eq!(t.expunge("Trash", &nine).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_select_closes_transport() {
        let mut script = greeting("");
        script
            .write(b"A0002 SELECT Nope\r\n")
            .read(b"A0002 NO no such mailbox\r\n");
        let mut t = transport(&mut script).await;

        let err = t.search("Nope", SearchCriteria::All).await.unwrap_err();
        assert!(matches!(err, Error::Imap(mailgate_imap::Error::No(_))));
        let err = t.list_mailboxes().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_expunge_without_uidplus_uses_plain_expunge() {
        let mut script = greeting("");
        script
            .write(b"A0002 SELECT Trash\r\n")
            .read(b"A0002 OK\r\n")
            .write(b"A0003 EXPUNGE\r\n")
            .read(b"* 3 EXPUNGE\r\nA0003 OK\r\n");
        let mut t = transport(&mut script).await;
        let set = UidSet::from_uids([Uid::new(7).unwrap()]);
        assert_eq!(t.expunge("Trash", &set).await.unwrap(), vec![3]);
    }
}
