use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::ExtractorConfig;
use crate::error::{ConfigError, SignalError, with_timeout};

const TLS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsRecord {
    pub certificate_age_days: i64,
}

#[derive(Clone)]
pub struct TlsProbe {
    connector: TlsConnector,
    timeout: Duration,
    port: u16,
}

impl TlsProbe {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self, ConfigError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots, cfg.tls_timeout())
    }

    fn with_roots(roots: RootCertStore, timeout: Duration) -> Result<Self, ConfigError> {
        let config =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .map_err(|err| ConfigError::Tls(err.to_string()))?
                .with_root_certificates(roots)
                .with_no_client_auth();
        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
            port: TLS_PORT,
        })
    }

    #[cfg(test)]
    fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub async fn certificate_age(
        &self,
        host: &str,
        now: DateTime<Utc>,
    ) -> Result<TlsRecord, SignalError> {
        if host.is_empty() {
            return Err(SignalError::Tls("no host to probe".to_string()));
        }
        let server_name = ServerName::try_from(host)
            .map(|name| name.to_owned())
            .map_err(|err| SignalError::Tls(format!("invalid server name {host}: {err}")))?;

        let not_before = with_timeout("tls", self.timeout, async {
            let tcp = TcpStream::connect((host, self.port))
                .await
                .map_err(|err| SignalError::Transport(err.to_string()))?;
            let stream = self
                .connector
                .connect(server_name, tcp)
                .await
                .map_err(|err| SignalError::Tls(err.to_string()))?;
            let (_, session) = stream.get_ref();
            let leaf = session
                .peer_certificates()
                .and_then(|certs| certs.first())
                .ok_or_else(|| SignalError::Tls("peer sent no certificate".to_string()))?;
            not_before_of(leaf.as_ref())
        })
        .await?;

        Ok(TlsRecord {
            certificate_age_days: (now - not_before).num_days(),
        })
    }
}

fn not_before_of(der: &[u8]) -> Result<DateTime<Utc>, SignalError> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|err| SignalError::Parse(format!("certificate: {err}")))?;
    let timestamp = cert.validity().not_before.timestamp();
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| SignalError::Parse(format!("notBefore out of range: {timestamp}")))
}
