//! Connection management: configuration, TLS/plain streams, framing and the
//! type-state client.

mod client;
mod config;
mod framed;
mod stream;

use tracing::debug;

pub use client::{Authenticated, Authorized, Client, NotAuthenticated, Selected};
pub use config::{Config, Security};
pub use framed::FramedStream;
pub use stream::ImapStream;

use crate::{Error, Result};

/// Connects according to `config` and returns a client that has read the
/// greeting (and completed STARTTLS when configured).
///
/// The connect timeout covers TCP connect, TLS handshake and the greeting.
pub async fn connect(config: &Config) -> Result<Client<ImapStream, NotAuthenticated>> {
    let limit = config.connect_timeout;
    tokio::time::timeout(limit, open(config))
        .await
        .map_err(|_| Error::Timeout(limit))?
}

async fn open(config: &Config) -> Result<Client<ImapStream, NotAuthenticated>> {
    debug!(host = %config.host, port = config.port, security = ?config.security, "connecting");
    let stream = ImapStream::open(config).await?;

    let mut framed = FramedStream::new(stream);
    framed.set_io_timeout(Some(config.io_timeout));
    let client = Client::from_framed(framed).await?;

    match config.security {
        Security::StartTls => {
            let mut client = client.starttls(&config.host).await?;
            client.stream.set_io_timeout(Some(config.io_timeout));
            Ok(client)
        }
        Security::None | Security::Implicit => Ok(client),
    }
}
