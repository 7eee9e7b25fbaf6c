use phishfeat::config::ProbeToggles;
use phishfeat::{ExtractorConfig, FeatureExtractor, FeatureValue, SCHEMA};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r##"<html>
<head>
  <title>Sign in</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta name="description" content="Account portal">
  <script src="/static/app.js"></script>
  <script>window.open('https://promo.test')</script>
</head>
<body>
  <p>Please sign in to your account</p>
  <a href="#">Home</a>
  <a href="https://facebook.com/acme">Follow us</a>
  <form action="http://collector.test/post">
    <input type="hidden" name="token" value="1">
    <input type="password" name="pass">
    <input type="submit" value="Go">
  </form>
  <iframe src="/frame"></iframe>
  <script>document.oncontextmenu = function (event) { return event.button == 2; }</script>
</body>
</html>"##;

const APP_JS: &str = "console.log('ready');";

fn offline_probes() -> ExtractorConfig {
    ExtractorConfig {
        probes: ProbeToggles {
            dns: false,
            whois: false,
            tls: false,
        },
        fetch_timeout_secs: 5,
        per_host_requests_per_sec: 1000,
        ..ExtractorConfig::default()
    }
}

async fn phishing_site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(APP_JS))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\n"))
        .mount(&server)
        .await;
    server
}

fn flag(value: Option<FeatureValue>) -> bool {
    matches!(value, Some(FeatureValue::Flag(true)))
}

#[tokio::test]
async fn extracts_page_features_from_live_site() {
    let server = phishing_site().await;
    let url = format!("{}/login", server.uri());
    let extractor = FeatureExtractor::new(&offline_probes()).unwrap();
    let vector = extractor.extract(&url).await;

    assert_eq!(vector.get("url_len"), Some(FeatureValue::Int(url.len() as i64)));
    assert!(!flag(vector.get("is_https")));
    assert!(!flag(vector.get("url_unusual_symbols")));
    assert!(flag(vector.get("has_robots")));
    assert!(flag(vector.get("is_responsive")));
    assert!(flag(vector.get("has_description")));
    assert!(flag(vector.get("has_social_net")));
    assert!(flag(vector.get("has_hidden_fields")));
    assert!(flag(vector.get("has_insecure_form")));
    assert!(flag(vector.get("has_external_form_action")));
    assert!(flag(vector.get("has_external_form_submit")));
    assert!(flag(vector.get("has_password_field")));
    assert!(flag(vector.get("has_submit_button")));
    assert!(flag(vector.get("right_click_disabled")));
    assert!(!flag(vector.get("has_relative_form_action")));
    assert!(!flag(vector.get("has_submit_info_to_email")));
    assert!(!flag(vector.get("has_image_only_form")));
    assert_eq!(vector.get("no_of_iframe"), Some(FeatureValue::Int(1)));
    assert_eq!(vector.get("no_of_popup"), Some(FeatureValue::Int(1)));
    assert_eq!(
        vector.get("percentage_of_null_self_redirect_hyperlinks"),
        Some(FeatureValue::Float(0.5))
    );
    // Only the facebook link carries a network location.
    assert_eq!(vector.get("request_url_percentage"), Some(FeatureValue::Float(1.0)));

    let js_size = vector.get("js_size").unwrap().as_f64();
    assert!(js_size > 0.0);
    assert_eq!(vector.get("js_obfuscated_size"), Some(FeatureValue::Float(0.0)));
    assert!(vector.get("content_richness").unwrap().as_f64() > 0.0);

    // Network probes were switched off.
    for key in ["dns_TTL", "dns_IP_count", "url_certificate_age", "age_of_domain"] {
        assert_eq!(vector.get(key), Some(FeatureValue::Int(0)), "{key}");
    }
}

#[tokio::test]
async fn unreachable_site_yields_complete_default_vector() {
    let url = "http://127.0.0.1:9/";
    let extractor = FeatureExtractor::new(&offline_probes()).unwrap();
    let vector = extractor.extract(url).await;

    assert_eq!(vector.keys().collect::<Vec<_>>(), SCHEMA.to_vec());
    for (key, value) in vector.iter() {
        if key == "url_len" {
            assert_eq!(value, FeatureValue::Int(url.len() as i64));
        } else {
            assert!(value.is_zero(), "{key} = {value}");
        }
    }
}

#[tokio::test]
async fn error_status_keeps_only_url_features() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;

    let extractor = FeatureExtractor::new(&offline_probes()).unwrap();
    let vector = extractor.extract(&format!("{}/login", server.uri())).await;
    for key in ["has_robots", "has_password_field", "no_of_iframe", "js_size", "content_richness"] {
        assert!(vector.get(key).unwrap().is_zero(), "{key}");
    }
}

#[tokio::test]
async fn unusual_symbols_and_malformed_input() {
    let extractor = FeatureExtractor::new(&offline_probes()).unwrap();
    let vector = extractor.extract("http://127.0.0.1:9/path with space").await;
    assert!(flag(vector.get("url_unusual_symbols")));

    let vector = extractor.extract("http://bad host:99999/login").await;
    assert_eq!(vector.len(), SCHEMA.len());
    assert!(flag(vector.get("url_unusual_symbols")));
}

#[tokio::test]
async fn extraction_is_deterministic() {
    let server = phishing_site().await;
    let url = format!("{}/login", server.uri());
    let extractor = FeatureExtractor::new(&offline_probes()).unwrap();
    let now = chrono::Utc::now();

    let first = extractor.extract_at(&url, now).await;
    let second = extractor.extract_at(&url, now).await;
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
