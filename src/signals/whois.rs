use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ExtractorConfig;
use crate::error::{SignalError, with_timeout};

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+").expect("email pattern")
});

const DOMAIN_KEYS: &[&str] = &["domain name", "domain"];
const REGISTRAR_KEYS: &[&str] = &["registrar", "registrar name", "sponsoring registrar"];
const COUNTRY_KEYS: &[&str] = &["registrant country", "registrant country code", "country"];
const CREATION_KEYS: &[&str] = &[
    "creation date",
    "created",
    "created on",
    "created date",
    "registered on",
    "registered",
    "registration time",
    "registration date",
    "domain registration date",
];
const EXPIRATION_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "expire date",
    "expires on",
    "expires",
    "paid-till",
    "renewal date",
];
const REFERRAL_KEYS: &[&str] = &["refer", "whois", "registrar whois server", "whois server"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisRecord {
    pub registrar: Option<String>,
    pub country: Option<String>,
    pub emails: Vec<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub registered_domain: Option<String>,
}

impl WhoisRecord {
    pub fn is_complete(&self) -> bool {
        self.registrar.is_some()
            && self.country.is_some()
            && !self.emails.is_empty()
            && self.creation_date.is_some()
    }

    fn is_empty(&self) -> bool {
        self.registrar.is_none()
            && self.creation_date.is_none()
            && self.expiration_date.is_none()
            && self.registered_domain.is_none()
    }

    pub fn parse(text: &str) -> Self {
        let fields = key_values(text);
        let first = |keys: &[&str]| -> Option<String> {
            fields
                .iter()
                .find(|(key, _)| keys.contains(&key.as_str()))
                .map(|(_, value)| value.clone())
        };
        let first_date = |keys: &[&str]| -> Option<DateTime<Utc>> {
            fields
                .iter()
                .filter(|(key, _)| keys.contains(&key.as_str()))
                .find_map(|(_, value)| parse_whois_date(value))
        };

        let mut emails = Vec::<String>::new();
        for found in EMAIL_PATTERN.find_iter(text) {
            let email = found.as_str().trim_end_matches('.').to_ascii_lowercase();
            if !emails.contains(&email) {
                emails.push(email);
            }
        }

        Self {
            registrar: first(REGISTRAR_KEYS),
            country: first(COUNTRY_KEYS),
            emails,
            creation_date: first_date(CREATION_KEYS),
            expiration_date: first_date(EXPIRATION_KEYS),
            registered_domain: first(DOMAIN_KEYS).map(|d| d.to_ascii_lowercase()),
        }
    }

    fn merge(self, fallback: WhoisRecord) -> Self {
        Self {
            registrar: self.registrar.or(fallback.registrar),
            country: self.country.or(fallback.country),
            emails: if self.emails.is_empty() {
                fallback.emails
            } else {
                self.emails
            },
            creation_date: self.creation_date.or(fallback.creation_date),
            expiration_date: self.expiration_date.or(fallback.expiration_date),
            registered_domain: self.registered_domain.or(fallback.registered_domain),
        }
    }
}

/// Lower-cased keys with their non-empty values. A key with an empty value
/// takes the next indented line as its value (the `.uk` block layout).
fn key_values(text: &str) -> Vec<(String, String)> {
    let lines = text.lines().collect::<Vec<_>>();
    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let mut value = value.trim().to_string();
        if value.is_empty() {
            match lines.get(idx + 1) {
                Some(next) if next.starts_with([' ', '\t']) && !next.trim().is_empty() => {
                    value = next.trim().to_string();
                }
                _ => continue,
            }
        }
        out.push((key, value));
    }
    out
}

fn referral(text: &str) -> Option<String> {
    key_values(text)
        .into_iter()
        .find(|(key, _)| REFERRAL_KEYS.contains(&key.as_str()))
        .map(|(_, value)| {
            value
                .trim_start_matches("whois://")
                .trim_start_matches("rwhois://")
                .trim_end_matches('/')
                .to_string()
        })
        .filter(|server| !server.is_empty() && !server.contains(' '))
}

pub fn parse_whois_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let head = value.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d.%m.%Y %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&head, fmt) {
            return Some(naive.and_utc());
        }
    }

    let first = value.split_whitespace().next().unwrap_or_default();
    let first = first.trim_end_matches('Z').trim_end_matches(',');
    let first = first.split('T').next().unwrap_or(first);
    for fmt in ["%Y-%m-%d", "%d-%b-%Y", "%d.%m.%Y", "%Y.%m.%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(first, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

pub struct WhoisClient {
    root_server: String,
    timeout: Duration,
}

impl WhoisClient {
    pub fn new(cfg: &ExtractorConfig) -> Self {
        Self {
            root_server: cfg.whois_server.clone(),
            timeout: cfg.whois_timeout(),
        }
    }

    pub async fn lookup(&self, domain: &str) -> Result<WhoisRecord, SignalError> {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() || !domain.contains('.') || domain.parse::<IpAddr>().is_ok() {
            return Err(SignalError::Whois(format!("not a registrable domain: {domain:?}")));
        }
        with_timeout("whois", self.timeout, self.walk(&domain)).await
    }

    async fn walk(&self, domain: &str) -> Result<WhoisRecord, SignalError> {
        let tld = domain.rsplit('.').next().unwrap_or(domain);
        let root_answer = query(&self.root_server, tld).await?;

        let Some(registry) = referral(&root_answer) else {
            return finish(WhoisRecord::parse(&root_answer), domain);
        };
        tracing::trace!("whois {domain}: registry {registry}");
        let registry_answer = query(&registry, domain).await?;
        let registry_record = WhoisRecord::parse(&registry_answer);

        let record = match referral(&registry_answer).filter(|next| *next != registry) {
            Some(registrar) => match query(&registrar, domain).await {
                Ok(answer) => WhoisRecord::parse(&answer).merge(registry_record),
                Err(err) => {
                    tracing::debug!("whois {domain}: registrar {registrar} failed: {err}");
                    registry_record
                }
            },
            None => registry_record,
        };
        finish(record, domain)
    }
}

fn finish(record: WhoisRecord, domain: &str) -> Result<WhoisRecord, SignalError> {
    if record.is_empty() {
        return Err(SignalError::Whois(format!("no registration data for {domain}")));
    }
    Ok(record)
}

async fn query(server: &str, request: &str) -> Result<String, SignalError> {
    let address = if has_port(server) {
        server.to_string()
    } else {
        format!("{server}:{WHOIS_PORT}")
    };
    let mut stream = TcpStream::connect(address.as_str())
        .await
        .map_err(|err| SignalError::Whois(format!("connect {address}: {err}")))?;
    stream
        .write_all(format!("{request}\r\n").as_bytes())
        .await
        .map_err(|err| SignalError::Whois(format!("write {address}: {err}")))?;

    let mut buf = Vec::new();
    stream
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut buf)
        .await
        .map_err(|err| SignalError::Whois(format!("read {address}: {err}")))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn has_port(server: &str) -> bool {
    server
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhoisFeatures {
    pub has_whois_info: bool,
    pub age_of_domain: i64,
    pub domain_registration_length: i64,
    pub abnormal_url: bool,
}

impl WhoisFeatures {
    /// `abnormal_url` is set only when the record names a domain whose first
    /// label is missing from the raw URL. An empty record contributes `0`.
    pub fn derive(record: &WhoisRecord, raw_url: &str, now: DateTime<Utc>) -> Self {
        let raw_url = raw_url.to_ascii_lowercase();
        let abnormal_url = record
            .registered_domain
            .as_deref()
            .and_then(|domain| domain.split('.').next())
            .filter(|label| !label.is_empty())
            .is_some_and(|label| !raw_url.contains(&label.to_ascii_lowercase()));

        Self {
            has_whois_info: record.is_complete(),
            age_of_domain: record
                .creation_date
                .map(|created| (now - created).num_days())
                .unwrap_or(0),
            domain_registration_length: record
                .expiration_date
                .map(|expires| (expires - now).num_days())
                .unwrap_or(0),
            abnormal_url,
        }
    }
}
