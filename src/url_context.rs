use std::net::IpAddr;

use url::Url;

/// Scheme, host and registrable domain of one raw URL.
///
/// Construction never fails. Unknown schemes fall back to `http`, a missing
/// scheme is assumed to be `http`, and input the URL parser rejects still gets
/// a best-effort host/path split (with `url` left empty, so fetches degrade).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlContext {
    raw: String,
    scheme: String,
    host: String,
    port: Option<u16>,
    registrable_domain: String,
    path: String,
    url: Option<Url>,
}

impl UrlContext {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match normalize_url(trimmed) {
            Some(url) => {
                let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
                let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
                Self {
                    raw: raw.to_string(),
                    scheme: url.scheme().to_string(),
                    registrable_domain: registrable_domain(&host),
                    port: url.port(),
                    path: url.path().to_string(),
                    host,
                    url: Some(url),
                }
            }
            None => {
                let (host, path) = split_host_path(trimmed);
                Self {
                    raw: raw.to_string(),
                    scheme: "http".to_string(),
                    registrable_domain: registrable_domain(&host),
                    port: None,
                    path,
                    host,
                    url: None,
                }
            }
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn registrable_domain(&self) -> &str {
        &self.registrable_domain
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn origin(&self) -> Option<String> {
        let url = self.url.as_ref()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        })
    }

    pub fn is_same_host(&self, other: &str) -> bool {
        strip_port(other).eq_ignore_ascii_case(&self.host)
    }
}

fn normalize_url(input: &str) -> Option<Url> {
    if input.is_empty() {
        return None;
    }

    let candidate = match input.split_once("://") {
        Some((scheme, rest)) => {
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
                input.to_string()
            } else {
                format!("http://{rest}")
            }
        }
        None => format!("http://{}", input.trim_start_matches("//")),
    };

    let url = Url::parse(&candidate).ok()?;
    url.host_str().filter(|h| !h.is_empty())?;
    Some(url)
}

fn split_host_path(input: &str) -> (String, String) {
    let without_scheme = input
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(input);
    let (authority, path) = match without_scheme.find(['/', '?', '#']) {
        Some(idx) => (&without_scheme[..idx], &without_scheme[idx..]),
        None => (without_scheme, ""),
    };
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    let host = strip_port(authority).to_ascii_lowercase();
    let path = if path.is_empty() { "/" } else { path };
    (host, path.to_string())
}

fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host
        }
        _ => authority,
    }
}

fn registrable_domain(host: &str) -> String {
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }
    let host = host.trim_end_matches('.');
    psl::domain_str(host)
        .map(ToString::to_string)
        .unwrap_or_else(|| host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_https_url() {
        let ctx = UrlContext::parse("https://Sub.Example.co.uk/login?next=1");
        assert_eq!(ctx.scheme(), "https");
        assert_eq!(ctx.host(), "sub.example.co.uk");
        assert_eq!(ctx.registrable_domain(), "example.co.uk");
        assert_eq!(ctx.path(), "/login");
        assert_eq!(ctx.raw(), "https://Sub.Example.co.uk/login?next=1");
        assert_eq!(ctx.origin().as_deref(), Some("https://sub.example.co.uk"));
    }

    #[test]
    fn missing_scheme_defaults_to_http() {
        let ctx = UrlContext::parse("www.example.com/a/b");
        assert_eq!(ctx.scheme(), "http");
        assert_eq!(ctx.host(), "www.example.com");
        assert_eq!(ctx.registrable_domain(), "example.com");
        assert_eq!(ctx.path(), "/a/b");
        assert!(ctx.url().is_some());
    }

    #[test]
    fn unknown_scheme_normalizes_to_http() {
        let ctx = UrlContext::parse("ftp://files.example.org/pub");
        assert_eq!(ctx.scheme(), "http");
        assert_eq!(ctx.host(), "files.example.org");
        assert_eq!(ctx.url().map(Url::as_str), Some("http://files.example.org/pub"));
    }

    #[test]
    fn keeps_port_in_origin_but_not_host() {
        let ctx = UrlContext::parse("http://127.0.0.1:8080/index.html");
        assert_eq!(ctx.host(), "127.0.0.1");
        assert_eq!(ctx.port(), Some(8080));
        assert_eq!(ctx.registrable_domain(), "127.0.0.1");
        assert_eq!(ctx.origin().as_deref(), Some("http://127.0.0.1:8080"));
        assert!(ctx.is_same_host("127.0.0.1:9999"));
        assert!(!ctx.is_same_host("cdn.example.com"));
    }

    #[test]
    fn malformed_input_yields_best_effort_split() {
        let ctx = UrlContext::parse("http://exa mple.com/path");
        assert!(ctx.url().is_none());
        assert_eq!(ctx.scheme(), "http");
        assert_eq!(ctx.host(), "exa mple.com");
        assert_eq!(ctx.path(), "/path");
        assert!(ctx.origin().is_none());
    }

    #[test]
    fn empty_input_does_not_panic() {
        let ctx = UrlContext::parse("   ");
        assert_eq!(ctx.host(), "");
        assert_eq!(ctx.registrable_domain(), "");
        assert!(ctx.url().is_none());
    }

    #[test]
    fn space_in_path_still_parses() {
        let ctx = UrlContext::parse("http://example.com/path with space");
        assert_eq!(ctx.host(), "example.com");
        assert_eq!(ctx.path(), "/path%20with%20space");
    }

    #[test]
    fn strip_port_handles_ipv6_and_plain_hosts() {
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("example.com:443"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
    }
}
