use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::document::{Document, element_text};
use crate::features::round_to;
use crate::signals::HttpProbe;

const ENTROPY_THRESHOLD: f64 = 6.0;
const MINIFIED_RATIO_THRESHOLD: f64 = 0.95;
const DYNAMIC_CODE_MARKERS: [&str; 3] = ["eval(", "function(", "atob("];

pub fn shannon_entropy(text: &str) -> f64 {
    let mut counts = HashMap::<char, usize>::new();
    let mut total = 0usize;
    for ch in text.chars() {
        *counts.entry(ch).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum::<f64>()
        .max(0.0)
}

/// High entropy together with either dynamic code evaluation or a body that
/// is nearly free of whitespace.
pub fn is_obfuscated(body: &str) -> bool {
    if shannon_entropy(body) <= ENTROPY_THRESHOLD {
        return false;
    }
    let lower = body.to_lowercase();
    if DYNAMIC_CODE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return true;
    }
    let raw_len = body.chars().count();
    let stripped_len = body.chars().filter(|ch| !ch.is_whitespace()).count();
    raw_len > 0 && stripped_len as f64 / raw_len as f64 > MINIFIED_RATIO_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource {
    Inline,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub source: ScriptSource,
    pub body: String,
}

impl ScriptRecord {
    pub fn inline(body: impl Into<String>) -> Self {
        Self {
            source: ScriptSource::Inline,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptCorpus {
    pub inline: Vec<ScriptRecord>,
    pub external: Vec<Url>,
}

impl ScriptCorpus {
    /// A `<script>` with a non-empty `src` counts only as external; relative
    /// sources resolve against `base`, and non-http(s) results are dropped.
    pub fn collect(doc: &Document, base: Option<&Url>) -> Self {
        let mut corpus = Self::default();
        for script in doc.select("script") {
            match script
                .value()
                .attr("src")
                .map(str::trim)
                .filter(|src| !src.is_empty())
            {
                Some(src) => {
                    let resolved = match base {
                        Some(base) => base.join(src).ok(),
                        None => Url::parse(src).ok(),
                    };
                    match resolved {
                        Some(url) if matches!(url.scheme(), "http" | "https") => {
                            if !corpus.external.contains(&url) {
                                corpus.external.push(url);
                            }
                        }
                        _ => tracing::debug!("skipping script source {src:?}"),
                    }
                }
                None => {
                    let body = element_text(&script);
                    if !body.is_empty() {
                        corpus.inline.push(ScriptRecord::inline(body));
                    }
                }
            }
        }
        corpus
    }

    pub async fn fetch(self, http: &HttpProbe, concurrency: usize) -> Vec<ScriptRecord> {
        let mut records = self.inline;
        if self.external.is_empty() {
            return records;
        }

        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut fetch_set = JoinSet::new();
        for (idx, url) in self.external.into_iter().enumerate() {
            let http = http.clone();
            let permits = Arc::clone(&permits);
            fetch_set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let result = http.fetch_script(&url).await;
                (idx, url, result)
            });
        }

        let mut fetched = Vec::new();
        while let Some(joined) = fetch_set.join_next().await {
            match joined {
                Ok((idx, _, Ok(body))) => fetched.push((idx, body)),
                Ok((_, url, Err(err))) => tracing::warn!("script {url} skipped: {err}"),
                Err(err) => tracing::warn!("script fetch task failed: {err}"),
            }
        }
        fetched.sort_by_key(|(idx, _)| *idx);
        records.extend(fetched.into_iter().map(|(_, body)| ScriptRecord {
            source: ScriptSource::External,
            body,
        }));
        records
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScriptFeatures {
    pub js_size_kb: f64,
    pub js_obfuscated_size_kb: f64,
}

impl ScriptFeatures {
    pub fn from_records(records: &[ScriptRecord]) -> Self {
        let total = records.iter().map(|r| r.body.len()).sum::<usize>();
        let obfuscated = records
            .iter()
            .filter(|r| is_obfuscated(&r.body))
            .map(|r| r.body.len())
            .sum::<usize>();
        Self {
            js_size_kb: kilobytes(total),
            js_obfuscated_size_kb: kilobytes(obfuscated),
        }
    }
}

fn kilobytes(bytes: usize) -> f64 {
    round_to(bytes as f64 / 1024.0, 3)
}
