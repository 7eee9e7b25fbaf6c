use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use hickory_resolver::TokioResolver;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::proto::xfer::Protocol;

use crate::config::ExtractorConfig;
use crate::error::{SignalError, with_timeout};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsRecord {
    pub ttl_seconds: u32,
    pub ip_count: usize,
}

pub struct DnsProbe {
    servers: Vec<SocketAddr>,
    timeout: Duration,
    lifetime: Duration,
}

impl DnsProbe {
    pub fn new(cfg: &ExtractorConfig) -> Self {
        Self {
            servers: cfg.dns_servers.clone(),
            timeout: cfg.dns_timeout(),
            lifetime: cfg.dns_lifetime(),
        }
    }

    // Fresh resolver per lookup: answers are never cached between URLs.
    fn resolver(&self) -> TokioResolver {
        let mut config = ResolverConfig::new();
        for addr in &self.servers {
            config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
            config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
        }
        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        opts.attempts = 1;

        TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }

    pub async fn lookup(&self, domain: &str) -> Result<DnsRecord, SignalError> {
        let domain = domain.trim().trim_end_matches('.');
        if domain.is_empty() {
            return Err(SignalError::Dns("no domain to resolve".to_string()));
        }
        if domain.parse::<IpAddr>().is_ok() {
            return Err(SignalError::Dns(format!("{domain} is an address literal")));
        }
        if self.servers.is_empty() {
            return Err(SignalError::Dns("no resolvers configured".to_string()));
        }

        let resolver = self.resolver();
        let name = format!("{domain}.");
        with_timeout("dns", self.lifetime, async move {
            let lookup = resolver
                .ipv4_lookup(name.as_str())
                .await
                .map_err(|err| SignalError::Dns(err.to_string()))?;
            let a_records = lookup
                .as_lookup()
                .records()
                .iter()
                .filter(|record| record.record_type() == RecordType::A)
                .collect::<Vec<_>>();
            if a_records.is_empty() {
                return Err(SignalError::Dns(format!("no A records for {domain}")));
            }
            Ok(DnsRecord {
                ttl_seconds: a_records[0].ttl(),
                ip_count: a_records.len(),
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(servers: Vec<SocketAddr>) -> DnsProbe {
        DnsProbe::new(&ExtractorConfig {
            dns_servers: servers,
            dns_timeout_secs: 1,
            dns_lifetime_secs: 1,
            ..ExtractorConfig::default()
        })
    }

    #[tokio::test]
    async fn empty_domain_fails_without_network() {
        let err = probe(Vec::new()).lookup("  ").await.unwrap_err();
        assert!(matches!(err, SignalError::Dns(_)));
    }

    #[tokio::test]
    async fn address_literal_is_not_resolved() {
        let err = probe(vec!["127.0.0.1:9".parse().unwrap()])
            .lookup("10.0.0.1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("address literal"));
    }

    #[tokio::test]
    async fn unreachable_resolver_degrades_within_lifetime() {
        let started = std::time::Instant::now();
        let result = probe(vec!["127.0.0.1:9".parse().unwrap()])
            .lookup("example.com")
            .await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.unwrap_or_default(), DnsRecord::default());
    }
}
