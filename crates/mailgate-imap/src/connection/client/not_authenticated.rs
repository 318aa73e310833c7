//! Commands valid before login.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::connection::stream::ImapStream;
use crate::parser::{Response, UntaggedResponse, capabilities_in, parse_response};
use crate::types::{Capability, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and consumes the server greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_framed(FramedStream::new(stream)).await
    }

    pub(crate) async fn from_framed(mut stream: FramedStream<S>) -> Result<Self> {
        let greeting = parse_response(&stream.read_response().await?)?;
        let capabilities = capabilities_in(&greeting).map(<[Capability]>::to_vec).unwrap_or_default();

        match greeting {
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Ok | Status::PreAuth,
                ..
            }) => {}
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream,
            tags: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Logs in with a user name and password.
    ///
    /// A NO or BAD answer becomes [`Error::Auth`].
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        if self.has_capability(&Capability::LoginDisabled) {
            return Err(Error::Auth("server has disabled LOGIN on this connection".into()));
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.run(&command).await {
            Ok(_) => {}
            Err(Error::No(text) | Error::Bad(text)) => return Err(Error::Auth(text)),
            Err(e) => return Err(e),
        }
        info!(user = %username, "IMAP login succeeded");

        let mut client = self.into_state(Authenticated);
        if client.capabilities.is_empty() || !client.has_capability(&Capability::Imap4Rev1) {
            debug!("refreshing capabilities after login");
            client.capability().await?;
        }
        Ok(client)
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Upgrades the connection with STARTTLS and re-reads capabilities.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if !self.has_capability(&Capability::StartTls) {
            debug!("STARTTLS not advertised, attempting anyway");
        }
        self.run(&Command::StartTls).await?;

        let stream = self.stream.into_inner().start_tls(host).await?;
        let mut client = Self {
            stream: FramedStream::new(stream),
            tags: self.tags,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.capability().await?;
        Ok(client)
    }
}
