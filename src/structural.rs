use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

use crate::document::{Document, element_text};
use crate::features::ratio;
use crate::url_context::UrlContext;

const SOCIAL_NETWORKS: [&str; 7] = [
    "facebook.com",
    "x.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "pinterest.com",
    "youtube.com",
];

static POPUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.open|alert|confirm|prompt").expect("popup pattern"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralFeatures {
    pub script_percentage: f64,
    pub link_percentage: f64,
    pub request_url_percentage: f64,
    pub is_responsive: bool,
    pub has_description: bool,
    pub no_of_popup: usize,
    pub no_of_iframe: usize,
    pub has_social_net: bool,
    pub has_hidden_fields: bool,
    pub null_self_redirect_ratio: f64,
    pub right_click_disabled: bool,
    pub forms: FormFeatures,
}

impl StructuralFeatures {
    pub fn analyze(doc: &Document, ctx: &UrlContext) -> Self {
        if !doc.is_present() {
            return Self::default();
        }
        Self {
            script_percentage: script_percentage(doc),
            link_percentage: ratio(doc.count("a"), doc.element_count(), 3),
            request_url_percentage: request_url_percentage(doc, ctx),
            is_responsive: is_responsive(doc),
            has_description: has_description(doc),
            no_of_popup: doc
                .elements_with_text_matching("script", &POPUP_PATTERN)
                .len(),
            no_of_iframe: doc.count("iframe"),
            has_social_net: has_social_net(doc),
            has_hidden_fields: doc
                .select("input")
                .iter()
                .any(|el| attr_is(el, "type", "hidden")),
            null_self_redirect_ratio: null_self_redirect_ratio(doc),
            right_click_disabled: right_click_disabled(doc.source()),
            forms: FormFeatures::analyze(doc, ctx),
        }
    }
}

fn script_percentage(doc: &Document) -> f64 {
    let script_bytes = doc
        .select("script")
        .iter()
        .map(|el| element_text(el).len())
        .sum::<usize>();
    ratio(script_bytes, doc.source().len(), 3)
}

fn request_url_percentage(doc: &Document, ctx: &UrlContext) -> f64 {
    let resources = doc
        .attr_values("a", "href")
        .into_iter()
        .chain(doc.attr_values("img", "src"))
        .chain(doc.attr_values("script", "src"));

    let mut total = 0usize;
    let mut external = 0usize;
    for resource in resources {
        let Some(location) = network_location(resource) else {
            continue;
        };
        total += 1;
        if !ctx.is_same_host(&location) {
            external += 1;
        }
    }
    ratio(external, total, 3)
}

fn is_responsive(doc: &Document) -> bool {
    doc.select("meta")
        .iter()
        .find(|el| attr_is(el, "name", "viewport"))
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.contains("width=device-width") || content.contains("initial-scale"))
        .unwrap_or(false)
}

fn has_description(doc: &Document) -> bool {
    doc.select("meta")
        .iter()
        .find(|el| attr_is(el, "name", "description"))
        .and_then(|el| el.value().attr("content"))
        .map(|content| !content.is_empty())
        .unwrap_or(false)
}

fn has_social_net(doc: &Document) -> bool {
    doc.attr_values("a[href]", "href")
        .into_iter()
        .any(|href| SOCIAL_NETWORKS.iter().any(|network| href.contains(network)))
}

fn null_self_redirect_ratio(doc: &Document) -> f64 {
    let hrefs = doc.attr_values("a[href]", "href");
    let null_links = hrefs
        .iter()
        .filter(|href| matches!(**href, "#" | "javascript:void(0)"))
        .count();
    ratio(null_links, hrefs.len(), 3)
}

fn right_click_disabled(source: &str) -> bool {
    source.contains("event.button==2") || source.contains("event.button == 2")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFeatures {
    pub has_external_form_submit: bool,
    pub has_insecure_form: bool,
    pub has_relative_form_action: bool,
    pub has_external_form_action: bool,
    pub has_submit_info_to_email: bool,
    pub has_image_only_form: bool,
    pub has_password_field: bool,
    pub has_submit_button: bool,
}

impl FormFeatures {
    pub fn analyze(doc: &Document, ctx: &UrlContext) -> Self {
        let forms = doc.select("form");
        if forms.is_empty() {
            return Self::default();
        }
        let actions = forms
            .iter()
            .filter_map(|form| form.value().attr("action"))
            .filter(|action| !action.is_empty())
            .collect::<Vec<_>>();

        let external_action = actions.iter().any(|action| {
            network_location(action).is_some_and(|location| !ctx.is_same_host(&location))
        });

        Self {
            has_external_form_submit: external_action,
            has_insecure_form: actions.iter().any(|action| action.starts_with("http://")),
            has_relative_form_action: actions
                .iter()
                .any(|action| network_location(action).is_none()),
            has_external_form_action: external_action,
            has_submit_info_to_email: actions.iter().any(|action| action.starts_with("mailto:")),
            has_image_only_form: forms.iter().any(is_image_only_form),
            has_password_field: forms.iter().any(has_password_field),
            has_submit_button: forms.iter().any(has_submit_button),
        }
    }
}

fn is_image_only_form(form: &ElementRef<'_>) -> bool {
    let inputs = descendants(form, "input");
    !inputs.is_empty() && inputs.iter().all(|el| attr_is(el, "type", "image"))
}

fn has_password_field(form: &ElementRef<'_>) -> bool {
    descendants(form, "input")
        .iter()
        .any(|el| attr_is(el, "type", "password"))
}

fn has_submit_button(form: &ElementRef<'_>) -> bool {
    descendants(form, "input")
        .iter()
        .any(|el| attr_is(el, "type", "submit"))
        || descendants(form, "button")
            .iter()
            .any(|el| attr_is(el, "type", "submit"))
}

fn descendants<'a>(el: &ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => el.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn attr_is(el: &ElementRef<'_>, name: &str, expected: &str) -> bool {
    el.value()
        .attr(name)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}

pub fn network_location(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let parsed = if link.starts_with("//") {
        Url::parse(&format!("http:{link}"))
    } else {
        Url::parse(link)
    };
    let url = parsed.ok()?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
