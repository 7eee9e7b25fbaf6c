mod dns;
mod http;
mod tls;
mod whois;

pub use dns::{DnsProbe, DnsRecord};
pub use http::{FetchResult, HttpProbe};
pub use tls::{TlsProbe, TlsRecord};
pub use whois::{WhoisClient, WhoisFeatures, WhoisRecord, parse_whois_date};

use chrono::{DateTime, Utc};

use crate::config::{ExtractorConfig, ProbeToggles};
use crate::error::{ConfigError, SignalError};
use crate::url_context::UrlContext;

#[derive(Debug)]
pub struct Signals {
    pub fetch: Result<FetchResult, SignalError>,
    pub dns: Result<DnsRecord, SignalError>,
    pub whois: Result<WhoisRecord, SignalError>,
    pub tls: Result<TlsRecord, SignalError>,
}

impl Signals {
    pub fn resolve(self, url: &str) -> (FetchResult, DnsRecord, WhoisRecord, TlsRecord) {
        (
            or_default(self.fetch, url, "fetch"),
            or_default(self.dns, url, "dns"),
            or_default(self.whois, url, "whois"),
            or_default(self.tls, url, "tls"),
        )
    }
}

fn or_default<T: Default>(result: Result<T, SignalError>, url: &str, probe: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err @ SignalError::Disabled(_)) => {
            tracing::debug!("{url}: {err}");
            T::default()
        }
        Err(err) => {
            tracing::warn!("{url}: {probe} signal unavailable: {err}");
            T::default()
        }
    }
}

pub struct SignalCollector {
    http: HttpProbe,
    dns: DnsProbe,
    whois: WhoisClient,
    tls: TlsProbe,
    probes: ProbeToggles,
}

impl SignalCollector {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: HttpProbe::new(cfg)?,
            dns: DnsProbe::new(cfg),
            whois: WhoisClient::new(cfg),
            tls: TlsProbe::new(cfg)?,
            probes: cfg.probes,
        })
    }

    pub fn http(&self) -> &HttpProbe {
        &self.http
    }

    pub async fn collect(&self, ctx: &UrlContext, now: DateTime<Utc>) -> Signals {
        let fetch = async {
            match ctx.url() {
                Some(url) => self.http.fetch_page(url).await,
                None => Err(SignalError::Parse(format!("unusable url {:?}", ctx.raw()))),
            }
        };
        let dns = async {
            if !self.probes.dns {
                return Err(SignalError::Disabled("dns"));
            }
            self.dns.lookup(ctx.registrable_domain()).await
        };
        let whois = async {
            if !self.probes.whois {
                return Err(SignalError::Disabled("whois"));
            }
            self.whois.lookup(ctx.registrable_domain()).await
        };
        let tls = async {
            if !self.probes.tls {
                return Err(SignalError::Disabled("tls"));
            }
            self.tls.certificate_age(ctx.host(), now).await
        };

        let (fetch, dns, whois, tls) = tokio::join!(fetch, dns, whois, tls);
        Signals {
            fetch,
            dns,
            whois,
            tls,
        }
    }
}
