//! Mail server settings detection from the public ISP database.
//!
//! The provider is found through the domain's primary MX host: the longest
//! ISPDB domain contained in it wins, and that domain's config XML supplies
//! the IMAP and SMTP settings.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// One detected server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSettings {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Lowercased socket type: `ssl`, `starttls` or `plain`.
    pub encryption: String,
}

/// Incoming and outgoing servers for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailSettings {
    /// IMAP server.
    pub imap: ServerSettings,
    /// SMTP server.
    pub smtp: ServerSettings,
}

/// ISP database client.
#[derive(Clone)]
pub struct Autoconfig {
    http: reqwest::Client,
    resolver: TokioAsyncResolver,
    index_url: String,
}

impl Autoconfig {
    /// Client for the database at `index_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(index_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
            index_url: index_url.into(),
        })
    }

    /// Detects settings for `email`.
    ///
    /// # Errors
    ///
    /// Returns an error when the address has no domain, the MX lookup or an
    /// HTTP request fails, no database domain matches, or the config XML
    /// lacks a server.
    pub async fn detect(&self, email: &str) -> Result<MailSettings> {
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| anyhow!("no domain in {email:?}"))?;

        let mx = self.primary_mx(&domain).await?;
        let index = self.get(&self.index_url).await?;
        let domains = parse_index(&index);
        debug!(mx = %mx, domains = domains.len(), "ISP database index loaded");

        let provider = best_domain(&mx, &domains).ok_or_else(|| anyhow!("no provider matches MX {mx}"))?;
        let xml = self.get(&format!("{}/{provider}", self.index_url)).await?;
        let settings = parse_config(&xml, &domain)?;
        info!(domain = %domain, provider, imap = %settings.imap.host, "mail settings detected");
        Ok(settings)
    }

    async fn primary_mx(&self, domain: &str) -> Result<String> {
        let records = self
            .resolver
            .mx_lookup(domain)
            .await
            .with_context(|| format!("MX lookup for {domain}"))?;
        records
            .iter()
            .min_by_key(|r| r.preference())
            .map(|r| r.exchange().to_string().trim_end_matches('.').to_lowercase())
            .ok_or_else(|| anyhow!("no MX records for {domain}"))
    }

    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Domain names linked from the database index page.
fn parse_index(html: &str) -> Vec<String> {
    html.split("href=")
        .skip(1)
        .filter_map(|rest| {
            let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
            let value = rest.get(1..)?.split(quote).next()?;
            let value = value.trim_end_matches('/');
            let is_domain = value.contains('.')
                && !value.starts_with('.')
                && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            is_domain.then(|| value.to_lowercase())
        })
        .collect()
}

/// The longest domain contained in `mx`.
fn best_domain<'a>(mx: &str, domains: &'a [String]) -> Option<&'a str> {
    domains
        .iter()
        .filter(|d| mx.contains(d.as_str()))
        .max_by_key(|d| d.len())
        .map(String::as_str)
}

#[derive(Debug, Deserialize)]
struct ClientConfig {
    #[serde(rename = "emailProvider")]
    email_provider: EmailProvider,
}

#[derive(Debug, Deserialize)]
struct EmailProvider {
    #[serde(rename = "incomingServer", default)]
    incoming: Vec<Server>,
    #[serde(rename = "outgoingServer", default)]
    outgoing: Vec<Server>,
}

#[derive(Debug, Deserialize)]
struct Server {
    #[serde(rename = "@type")]
    kind: Option<String>,
    hostname: String,
    port: u16,
    #[serde(rename = "socketType")]
    socket_type: Option<String>,
}

impl Server {
    fn settings(&self, domain: &str) -> ServerSettings {
        ServerSettings {
            host: self.hostname.replace("%EMAILDOMAIN%", domain),
            port: self.port,
            encryption: self.socket_type.as_deref().unwrap_or("plain").to_lowercase(),
        }
    }
}

/// Parses an ISPDB `clientConfig` document.
fn parse_config(xml: &str, domain: &str) -> Result<MailSettings> {
    let config: ClientConfig = quick_xml::de::from_str(xml).context("parsing provider config")?;
    let provider = config.email_provider;
    let pick = |servers: &[Server], kind: &str| {
        servers
            .iter()
            .find(|s| s.kind.as_deref() == Some(kind))
            .or_else(|| servers.first())
            .map(|s| s.settings(domain))
    };
    Ok(MailSettings {
        imap: pick(&provider.incoming, "imap").ok_or_else(|| anyhow!("no incoming server"))?,
        smtp: pick(&provider.outgoing, "smtp").ok_or_else(|| anyhow!("no outgoing server"))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html><body><h1>Index of /v1.1</h1>
<a href="?C=N;O=D">Name</a>
<a href="../">Parent</a>
<a href="google.com">google.com</a>
<a href='googlemail.com'>googlemail.com</a>
<a href="aspmx.l.google.com">aspmx.l.google.com</a>
<a href="fastmail.com">fastmail.com</a>
</body></html>"#;

    const FASTMAIL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<clientConfig version="1.1">
  <emailProvider id="fastmail.com">
    <domain>fastmail.com</domain>
    <displayName>Fastmail</displayName>
    <incomingServer type="pop3">
      <hostname>pop.fastmail.com</hostname>
      <port>995</port>
      <socketType>SSL</socketType>
    </incomingServer>
    <incomingServer type="imap">
      <hostname>imap.%EMAILDOMAIN%</hostname>
      <port>993</port>
      <socketType>SSL</socketType>
      <username>%EMAILADDRESS%</username>
    </incomingServer>
    <outgoingServer type="smtp">
      <hostname>smtp.fastmail.com</hostname>
      <port>587</port>
      <socketType>STARTTLS</socketType>
    </outgoingServer>
  </emailProvider>
</clientConfig>"#;

    #[test]
    fn test_parse_index_keeps_domains() {
        let domains = parse_index(INDEX);
        assert_eq!(
            domains,
            vec!["google.com", "googlemail.com", "aspmx.l.google.com", "fastmail.com"]
        );
    }

    #[test]
    fn test_best_domain_is_longest_contained() {
        let domains = parse_index(INDEX);
        assert_eq!(best_domain("alt1.aspmx.l.google.com", &domains), Some("aspmx.l.google.com"));
        assert_eq!(best_domain("in1-smtp.messagingengine.com", &domains), None);
        assert_eq!(best_domain("mx1.fastmail.com", &domains), Some("fastmail.com"));
    }

    #[test]
    fn test_parse_config_prefers_imap_and_smtp() {
        let settings = parse_config(FASTMAIL, "example.org").unwrap();
        assert_eq!(
            settings.imap,
            ServerSettings {
                host: "imap.example.org".into(),
                port: 993,
                encryption: "ssl".into(),
            }
        );
        assert_eq!(settings.smtp.host, "smtp.fastmail.com");
        assert_eq!(settings.smtp.encryption, "starttls");
    }

    #[test]
    fn test_parse_config_without_servers_fails() {
        let xml = r#"<clientConfig><emailProvider id="x"><domain>x</domain></emailProvider></clientConfig>"#;
        assert!(parse_config(xml, "x").is_err());
        assert!(parse_config("not xml", "x").is_err());
    }
}
