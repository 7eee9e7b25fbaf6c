use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("{probe} timed out after {}ms", .after.as_millis())]
    Timeout {
        probe: &'static str,
        after: Duration,
    },
    #[error("transport: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("dns: {0}")]
    Dns(String),
    #[error("whois: {0}")]
    Whois(String),
    #[error("tls: {0}")]
    Tls(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("{0} probe disabled")]
    Disabled(&'static str),
}

impl From<reqwest::Error> for SignalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SignalError::Transport(format!("timed out: {err}"))
        } else if let Some(status) = err.status() {
            SignalError::HttpStatus(status.as_u16())
        } else {
            SignalError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("building HTTP client: {0}")]
    HttpClient(String),
    #[error("building TLS config: {0}")]
    Tls(String),
}

pub(crate) async fn with_timeout<T, F>(
    probe: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, SignalError>
where
    F: std::future::Future<Output = Result<T, SignalError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SignalError::Timeout {
            probe,
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_probe() {
        let err = SignalError::Timeout {
            probe: "tls",
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "tls timed out after 5000ms");
    }

    #[tokio::test]
    async fn with_timeout_reports_elapsed_deadline() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), SignalError>(())
        };
        let result = with_timeout("dns", Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(SignalError::Timeout { probe: "dns", .. })));
    }
}
