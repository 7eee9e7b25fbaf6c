use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use url::Url;

use crate::config::ExtractorConfig;
use crate::error::{ConfigError, SignalError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub status_code: Option<u16>,
    pub final_url: Option<Url>,
    pub body: Option<String>,
}

impl FetchResult {
    pub fn failed() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    page_timeout: Duration,
    script_timeout: Duration,
}

impl HttpProbe {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(cfg.fetch_timeout())
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        let rps = NonZeroU32::new(cfg.per_host_requests_per_sec).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::keyed(Quota::per_second(rps))),
            page_timeout: cfg.fetch_timeout(),
            script_timeout: cfg.script_fetch_timeout(),
        })
    }

    async fn throttle(&self, url: &Url) {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.limiter.until_key_ready(&host).await;
    }

    pub async fn fetch_page(&self, url: &Url) -> Result<FetchResult, SignalError> {
        self.throttle(url).await;
        let response = self
            .client
            .get(url.clone())
            .timeout(self.page_timeout)
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            tracing::warn!("fetch {url}: HTTP {}, page content skipped", status.as_u16());
            return Ok(FetchResult {
                status_code: Some(status.as_u16()),
                final_url: Some(final_url),
                body: None,
            });
        }

        self.limiter.retain_recent();

        let body = match response.text().await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!("fetch {url}: reading body failed: {err}");
                None
            }
        };
        Ok(FetchResult {
            status_code: Some(status.as_u16()),
            final_url: Some(final_url),
            body,
        })
    }

    pub async fn has_robots(&self, origin: &str) -> Result<bool, SignalError> {
        let robots_url = Url::parse(&format!("{}/robots.txt", origin.trim_end_matches('/')))
            .map_err(|err| SignalError::Parse(err.to_string()))?;
        self.throttle(&robots_url).await;
        let response = self
            .client
            .get(robots_url)
            .timeout(self.page_timeout)
            .send()
            .await?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }

    pub async fn fetch_script(&self, url: &Url) -> Result<String, SignalError> {
        self.throttle(url).await;
        let response = self
            .client
            .get(url.clone())
            .timeout(self.script_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::HttpStatus(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> HttpProbe {
        let cfg = ExtractorConfig {
            per_host_requests_per_sec: 1000,
            fetch_timeout_secs: 5,
            ..ExtractorConfig::default()
        };
        HttpProbe::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn fetch_page_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let result = probe().fetch_page(&url).await.unwrap();
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.body.as_deref(), Some("<p>hello</p>"));
        assert_eq!(result.final_url.unwrap().host_str(), url.host_str());
    }

    #[tokio::test]
    async fn fetch_page_drops_body_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let result = probe().fetch_page(&url).await.unwrap();
        assert_eq!(result.status_code, Some(404));
        assert!(result.final_url.is_some());
        assert!(result.body.is_none());
    }

    #[tokio::test]
    async fn fetch_page_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let result = probe().fetch_page(&url).await.unwrap();
        assert_eq!(result.final_url.unwrap().path(), "/new");
        assert_eq!(result.body.as_deref(), Some("moved"));
    }

    #[tokio::test]
    async fn fetch_page_forgets_idle_hosts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        let cfg = ExtractorConfig {
            per_host_requests_per_sec: 10,
            ..ExtractorConfig::default()
        };
        let probe = HttpProbe::new(&cfg).unwrap();
        assert!(probe.limiter.check_key(&"idle.test".to_string()).is_ok());
        tokio::time::sleep(Duration::from_millis(400)).await;

        let url = Url::parse(&server.uri()).unwrap();
        probe.fetch_page(&url).await.unwrap();
        assert_eq!(probe.limiter.len(), 1);
    }

    #[tokio::test]
    async fn fetch_page_reports_transport_failure() {
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        assert!(probe().fetch_page(&url).await.is_err());
    }

    #[tokio::test]
    async fn robots_requires_status_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *"))
            .mount(&server)
            .await;
        assert!(probe().has_robots(&server.uri()).await.unwrap());

        let empty = MockServer::start().await;
        assert!(!probe().has_robots(&empty.uri()).await.unwrap());
    }

    #[tokio::test]
    async fn fetch_script_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("let a = 1;"))
            .mount(&server)
            .await;

        let ok = Url::parse(&format!("{}/app.js", server.uri())).unwrap();
        assert_eq!(probe().fetch_script(&ok).await.unwrap(), "let a = 1;");

        let missing = Url::parse(&format!("{}/nope.js", server.uri())).unwrap();
        assert!(matches!(
            probe().fetch_script(&missing).await,
            Err(SignalError::HttpStatus(404))
        ));
    }
}
