use chrono::{DateTime, Utc};
use url::Url;

use crate::config::ExtractorConfig;
use crate::document::Document;
use crate::error::ConfigError;
use crate::features::{FeatureVector, FeatureVectorBuilder};
use crate::scripts::{ScriptCorpus, ScriptFeatures};
use crate::signals::{SignalCollector, WhoisFeatures};
use crate::structural::StructuralFeatures;
use crate::text::{Dictionary, TextFeatures};
use crate::url_context::UrlContext;

pub struct FeatureExtractor {
    signals: SignalCollector,
    dictionary: Dictionary,
    script_fetch_concurrency: usize,
}

struct ContentReport {
    present: bool,
    structural: StructuralFeatures,
    text: TextFeatures,
    scripts: ScriptCorpus,
}

impl FeatureExtractor {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self, ConfigError> {
        let cfg = cfg.clone().sanitized();
        let dictionary = match &cfg.dictionary_path {
            Some(path) => Dictionary::from_path(path)?,
            None => Dictionary::bundled(),
        };
        Ok(Self {
            signals: SignalCollector::new(&cfg)?,
            dictionary,
            script_fetch_concurrency: cfg.script_fetch_concurrency,
        })
    }

    pub async fn extract(&self, raw_url: &str) -> FeatureVector {
        self.extract_at(raw_url, Utc::now()).await
    }

    pub async fn extract_at(&self, raw_url: &str, now: DateTime<Utc>) -> FeatureVector {
        tracing::debug!("extracting {raw_url}");
        let ctx = UrlContext::parse(raw_url);

        let (fetch, dns, whois, tls) = self.signals.collect(&ctx, now).await.resolve(raw_url);
        let is_https = fetch
            .final_url
            .as_ref()
            .is_some_and(|url| url.scheme() == "https");
        let base = fetch.final_url.clone().or_else(|| ctx.url().cloned());

        let content = analyze_content(fetch.body.as_deref(), &ctx, base.as_ref(), &self.dictionary);

        let (has_robots, scripts) = if content.present {
            let http = self.signals.http();
            let robots = async {
                let Some(origin) = ctx.origin() else {
                    return false;
                };
                match http.has_robots(&origin).await {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::warn!("{raw_url}: robots signal unavailable: {err}");
                        false
                    }
                }
            };
            let scripts = content.scripts.fetch(http, self.script_fetch_concurrency);
            tokio::join!(robots, scripts)
        } else {
            (false, Vec::new())
        };

        let vector = FeatureVectorBuilder::new()
            .url(raw_url.chars().count(), has_unusual_symbols(raw_url), is_https)
            .dns(dns)
            .tls(tls)
            .whois(WhoisFeatures::derive(&whois, raw_url, now))
            .scripts(ScriptFeatures::from_records(&scripts))
            .structural(content.structural)
            .text(content.text)
            .robots(has_robots)
            .build();

        tracing::info!(
            "{raw_url}: status {}, document {}, {} scripts",
            fetch
                .status_code
                .map_or_else(|| "none".to_string(), |code| code.to_string()),
            if content.present { "parsed" } else { "absent" },
            scripts.len()
        );
        vector
    }
}

fn analyze_content(
    body: Option<&str>,
    ctx: &UrlContext,
    base: Option<&Url>,
    dictionary: &Dictionary,
) -> ContentReport {
    let doc = Document::parse(body);
    ContentReport {
        present: doc.is_present(),
        structural: StructuralFeatures::analyze(&doc, ctx),
        text: TextFeatures::analyze(&doc, dictionary),
        scripts: ScriptCorpus::collect(&doc, base),
    }
}

pub fn has_unusual_symbols(url: &str) -> bool {
    url.chars().any(|c| {
        !c.is_ascii_alphanumeric()
            && !matches!(c, '-' | '.' | '_' | '~' | ':' | '/' | '?' | '#' | '&' | '=' | '%')
    })
}
