//! The byte stream under a client: TCP, with TLS from the first byte or
//! after STARTTLS depending on [`Security`].

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::{Config, Security};
use crate::{Error, Result};

/// Client TLS settings trusting the webpki roots. Built once per process.
static TLS: LazyLock<TlsConnector> = LazyLock::new(|| {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
});

/// An IMAP connection's stream.
pub enum ImapStream {
    /// Plain TCP: `Security::None`, or `Security::StartTls` before the upgrade.
    Plain(TcpStream),
    /// TLS session over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Dials `config.host:config.port`. Implicit TLS handshakes here;
    /// STARTTLS connections stay plain until [`ImapStream::start_tls`].
    pub async fn open(config: &Config) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        tcp.set_nodelay(true)?;
        match config.security {
            Security::Implicit => handshake(tcp, &config.host).await,
            Security::None | Security::StartTls => Ok(Self::Plain(tcp)),
        }
    }

    /// Handshakes on a plain stream after the server accepted STARTTLS.
    pub async fn start_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => handshake(tcp, host).await,
            Self::Tls(_) => Err(Error::InvalidState("STARTTLS on an encrypted stream".into())),
        }
    }

    /// True once traffic is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = TLS.connect(server_name, tcp).await?;
    debug!(host, "TLS established");
    Ok(ImapStream::Tls(Box::new(tls)))
}

impl AsyncRead for ImapStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
