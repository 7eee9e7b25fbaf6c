use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MAX_CONCURRENCY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeToggles {
    pub dns: bool,
    pub whois: bool,
    pub tls: bool,
}

impl Default for ProbeToggles {
    fn default() -> Self {
        Self {
            dns: true,
            whois: true,
            tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub script_fetch_timeout_secs: u64,
    pub script_fetch_concurrency: usize,
    pub dns_servers: Vec<SocketAddr>,
    pub dns_timeout_secs: u64,
    pub dns_lifetime_secs: u64,
    pub tls_timeout_secs: u64,
    pub whois_timeout_secs: u64,
    pub whois_server: String,
    pub max_concurrent_urls: usize,
    pub per_host_requests_per_sec: u32,
    pub dictionary_path: Option<PathBuf>,
    pub probes: ProbeToggles,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "phishfeat/{} (+url feature extraction)",
                env!("CARGO_PKG_VERSION")
            ),
            fetch_timeout_secs: 10,
            script_fetch_timeout_secs: 10,
            script_fetch_concurrency: 4,
            dns_servers: default_dns_servers(),
            dns_timeout_secs: 10,
            dns_lifetime_secs: 10,
            tls_timeout_secs: 5,
            whois_timeout_secs: 30,
            whois_server: "whois.iana.org:43".to_string(),
            max_concurrent_urls: 8,
            per_host_requests_per_sec: 4,
            dictionary_path: None,
            probes: ProbeToggles::default(),
        }
    }
}

fn default_dns_servers() -> Vec<SocketAddr> {
    [
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888)),
        IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8844)),
    ]
    .into_iter()
    .map(|ip| SocketAddr::new(ip, 53))
    .collect()
}

impl ExtractorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ExtractorConfig = toml::from_str(&data).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(cfg.sanitized())
    }

    pub fn sanitized(mut self) -> Self {
        self.fetch_timeout_secs = self.fetch_timeout_secs.max(1);
        self.script_fetch_timeout_secs = self.script_fetch_timeout_secs.max(1);
        self.script_fetch_concurrency = sanitize_concurrency(self.script_fetch_concurrency);
        self.dns_timeout_secs = self.dns_timeout_secs.max(1);
        self.dns_lifetime_secs = self.dns_lifetime_secs.max(self.dns_timeout_secs);
        self.tls_timeout_secs = self.tls_timeout_secs.max(1);
        self.whois_timeout_secs = self.whois_timeout_secs.max(1);
        self.max_concurrent_urls = sanitize_concurrency(self.max_concurrent_urls);
        self.per_host_requests_per_sec = self.per_host_requests_per_sec.max(1);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn script_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.script_fetch_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn dns_lifetime(&self) -> Duration {
        Duration::from_secs(self.dns_lifetime_secs)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout_secs)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_secs)
    }
}

pub fn sanitize_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_CONCURRENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ExtractorConfig::default();
        assert_eq!(cfg.fetch_timeout_secs, 10);
        assert_eq!(cfg.dns_timeout_secs, 10);
        assert_eq!(cfg.dns_lifetime_secs, 10);
        assert_eq!(cfg.tls_timeout_secs, 5);
        assert_eq!(cfg.dns_servers.len(), 4);
        assert_eq!(cfg.dns_servers[0], "8.8.8.8:53".parse::<SocketAddr>().unwrap());
        assert_eq!(
            cfg.dns_servers[1],
            "[2001:4860:4860::8888]:53".parse::<SocketAddr>().unwrap()
        );
        assert!(cfg.probes.dns && cfg.probes.whois && cfg.probes.tls);
        assert!(cfg.user_agent.starts_with("phishfeat/"));
    }

    #[test]
    fn config_toml_partial_values_keep_defaults() {
        let toml = r#"
            fetch_timeout_secs = 3
            max_concurrent_urls = 2
            dns_servers = ["1.1.1.1:53"]

            [probes]
            whois = false
        "#;
        let cfg: ExtractorConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.fetch_timeout_secs, 3);
        assert_eq!(cfg.max_concurrent_urls, 2);
        assert_eq!(cfg.dns_servers, vec!["1.1.1.1:53".parse().unwrap()]);
        assert!(!cfg.probes.whois);
        assert!(cfg.probes.dns);
        assert_eq!(cfg.tls_timeout_secs, 5);
        assert!(cfg.dictionary_path.is_none());
    }

    #[test]
    fn sanitized_clamps_zero_values() {
        let cfg = ExtractorConfig {
            fetch_timeout_secs: 0,
            script_fetch_concurrency: 0,
            max_concurrent_urls: 10_000,
            per_host_requests_per_sec: 0,
            dns_timeout_secs: 4,
            dns_lifetime_secs: 1,
            ..ExtractorConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.fetch_timeout_secs, 1);
        assert_eq!(cfg.script_fetch_concurrency, 1);
        assert_eq!(cfg.max_concurrent_urls, MAX_CONCURRENCY);
        assert_eq!(cfg.per_host_requests_per_sec, 1);
        assert_eq!(cfg.dns_lifetime_secs, 4);
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phishfeat.toml");
        fs::write(&path, "tls_timeout_secs = 2\n").unwrap();
        let cfg = ExtractorConfig::load(&path).unwrap();
        assert_eq!(cfg.tls_timeout_secs, 2);

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ExtractorConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ExtractorConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ExtractorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.dns_servers, cfg.dns_servers);
        assert_eq!(parsed.whois_server, cfg.whois_server);
        assert_eq!(parsed.probes, cfg.probes);
    }
}
