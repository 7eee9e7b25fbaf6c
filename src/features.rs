use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::scripts::ScriptFeatures;
use crate::signals::{DnsRecord, TlsRecord, WhoisFeatures};
use crate::structural::StructuralFeatures;
use crate::text::TextFeatures;

/// Bumped whenever a key is added, removed, renamed or reordered.
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA: [&str; 34] = [
    "url_len",
    "url_whois_info",
    "url_certificate_age",
    "dns_TTL",
    "dns_IP_count",
    "domain_registration_length",
    "abnormal_url",
    "age_of_domain",
    "is_https",
    "url_unusual_symbols",
    "js_size",
    "js_obfuscated_size",
    "script_percentage",
    "link_percentage",
    "request_url_percentage",
    "spelling_mistakes_ratio",
    "content_richness",
    "has_robots",
    "is_responsive",
    "has_description",
    "no_of_popup",
    "no_of_iframe",
    "has_external_form_submit",
    "has_social_net",
    "has_hidden_fields",
    "has_insecure_form",
    "has_relative_form_action",
    "has_external_form_action",
    "percentage_of_null_self_redirect_hyperlinks",
    "right_click_disabled",
    "has_submit_info_to_email",
    "has_image_only_form",
    "has_password_field",
    "has_submit_button",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Flag(bool),
}

impl FeatureValue {
    pub fn as_f64(self) -> f64 {
        match self {
            FeatureValue::Int(v) => v as f64,
            FeatureValue::Float(v) => v,
            FeatureValue::Flag(v) => f64::from(u8::from(v)),
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{v}"),
            FeatureValue::Float(v) => write!(f, "{v}"),
            FeatureValue::Flag(v) => write!(f, "{}", u8::from(*v)),
        }
    }
}

impl Serialize for FeatureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FeatureValue::Int(v) => serializer.serialize_i64(*v),
            FeatureValue::Float(v) => serializer.serialize_f64(*v),
            FeatureValue::Flag(v) => serializer.serialize_u8(u8::from(*v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [FeatureValue; SCHEMA.len()],
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        SCHEMA
            .iter()
            .position(|key| *key == name)
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FeatureValue)> + '_ {
        SCHEMA.iter().copied().zip(self.values.iter().copied())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        SCHEMA.iter().copied()
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureVectorBuilder {
    url_len: i64,
    url_unusual_symbols: bool,
    is_https: bool,
    dns: DnsRecord,
    tls: TlsRecord,
    whois: WhoisFeatures,
    scripts: ScriptFeatures,
    structural: StructuralFeatures,
    text: TextFeatures,
    has_robots: bool,
}

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url_len: usize, unusual_symbols: bool, is_https: bool) -> Self {
        self.url_len = i64::try_from(url_len).unwrap_or(i64::MAX);
        self.url_unusual_symbols = unusual_symbols;
        self.is_https = is_https;
        self
    }

    pub fn dns(mut self, record: DnsRecord) -> Self {
        self.dns = record;
        self
    }

    pub fn tls(mut self, record: TlsRecord) -> Self {
        self.tls = record;
        self
    }

    pub fn whois(mut self, features: WhoisFeatures) -> Self {
        self.whois = features;
        self
    }

    pub fn scripts(mut self, features: ScriptFeatures) -> Self {
        self.scripts = features;
        self
    }

    pub fn structural(mut self, features: StructuralFeatures) -> Self {
        self.structural = features;
        self
    }

    pub fn text(mut self, features: TextFeatures) -> Self {
        self.text = features;
        self
    }

    pub fn robots(mut self, has_robots: bool) -> Self {
        self.has_robots = has_robots;
        self
    }

    pub fn build(self) -> FeatureVector {
        use FeatureValue::{Flag, Float, Int};

        let s = &self.structural;
        let forms = &s.forms;
        FeatureVector {
            values: [
                Int(self.url_len),
                Flag(self.whois.has_whois_info),
                Int(self.tls.certificate_age_days),
                Int(i64::from(self.dns.ttl_seconds)),
                Int(i64::try_from(self.dns.ip_count).unwrap_or(i64::MAX)),
                Int(self.whois.domain_registration_length),
                Flag(self.whois.abnormal_url),
                Int(self.whois.age_of_domain),
                Flag(self.is_https),
                Flag(self.url_unusual_symbols),
                Float(self.scripts.js_size_kb),
                Float(self.scripts.js_obfuscated_size_kb),
                Float(s.script_percentage),
                Float(s.link_percentage),
                Float(s.request_url_percentage),
                Float(self.text.spelling_mistakes_ratio),
                Float(self.text.content_richness),
                Flag(self.has_robots),
                Flag(s.is_responsive),
                Flag(s.has_description),
                Int(count(s.no_of_popup)),
                Int(count(s.no_of_iframe)),
                Flag(forms.has_external_form_submit),
                Flag(s.has_social_net),
                Flag(s.has_hidden_fields),
                Flag(forms.has_insecure_form),
                Flag(forms.has_relative_form_action),
                Flag(forms.has_external_form_action),
                Float(s.null_self_redirect_ratio),
                Flag(s.right_click_disabled),
                Flag(forms.has_submit_info_to_email),
                Flag(forms.has_image_only_form),
                Flag(forms.has_password_field),
                Flag(forms.has_submit_button),
            ],
        }
    }
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn ratio(numerator: usize, denominator: usize, places: i32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round_to(numerator as f64 / denominator as f64, places)
}
