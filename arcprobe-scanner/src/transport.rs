use crate::error::{ProbeError, Result};
use futures::future::BoxFuture;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

static BARE_NAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i):\s*NaN,").expect("valid NaN pattern"));

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "arcprobe/0.1 (https://github.com/arcprobe/arcprobe)";

/// Source of JSON documents for the probers.
///
/// Implementations resolve to the parsed body or fail with a transport
/// level `ProbeError`. Application errors reported by the service inside a
/// successful body are not failures here.
pub trait Transport: Send + Sync {
    fn get_json<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value>>;

    /// The HTML of a services directory page. Non-success statuses fail.
    fn get_page<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    /// Fetch the HTML of a services directory page.
    pub async fn fetch_page(&self, url: &Url) -> Result<String> {
        debug!("Fetching page {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Transport(format!(
                "{} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }
        Ok(response.text().await?)
    }

    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;
        let body = response.text().await?;

        parse_json_body(&body).inspect_err(|e| {
            warn!("Unparseable response from {}: {}", url, e);
        })
    }
}

impl Transport for HttpTransport {
    fn get_json<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value>> {
        Box::pin(self.fetch_json(url))
    }

    fn get_page<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.fetch_page(url))
    }
}

/// Parse a service response body.
///
/// Services serialize missing doubles as a bare `NaN`, which is not JSON;
/// those are turned into the string `"NaN"`. An empty body is `{}`.
pub fn parse_json_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let sanitized = BARE_NAN.replace_all(body, ":\"NaN\",");
    Ok(serde_json::from_str(&sanitized)?)
}

/// Append `f=json` to a resource URL, keeping any existing query pairs.
pub fn json_url(resource: &str) -> Result<Url> {
    let mut url = Url::parse(resource)?;
    url.query_pairs_mut().append_pair("f", "json");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    #[test]
    fn test_parse_json_body_replaces_bare_nan() {
        let value = parse_json_body(r#"{"xmin": NaN, "ymin" :NaN, "count": 3}"#).unwrap();
        assert_eq!(value["xmin"], "NaN");
        assert_eq!(value["ymin"], "NaN");
        assert_eq!(value["count"], 3);
    }

    #[test]
    fn test_parse_json_body_empty_is_object() {
        assert!(parse_json_body("   ").unwrap().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_json_body_rejects_html() {
        let err = parse_json_body("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ProbeError::ParseError(_)));
    }

    #[test]
    fn test_json_url_appends_format() {
        let url = json_url("https://h/rest/services/X/MapServer/0").unwrap();
        assert_eq!(url.as_str(), "https://h/rest/services/X/MapServer/0?f=json");
    }

    #[tokio::test]
    async fn test_http_transport_fetches_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/services/X/MapServer"))
            .and(query_param("f", "json"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"currentVersion": 10.81, "extent": {"xmin": NaN, "ymin": 1}}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let url = json_url(&format!("{}/rest/services/X/MapServer", mock_server.uri())).unwrap();
        let value = transport.get_json(&url).await.unwrap();

        assert_eq!(value["extent"]["xmin"], "NaN");
        assert_eq!(value["currentVersion"], 10.81);
    }

    #[tokio::test]
    async fn test_http_transport_reports_unreachable_host() {
        let transport = HttpTransport::with_timeout(1).unwrap();
        let url = Url::parse("http://127.0.0.1:9/rest/services?f=json").unwrap();

        let result = transport.get_json(&url).await;

        assert!(matches!(result, Err(ProbeError::HttpError(_))));
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let url = Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();

        assert!(matches!(
            transport.fetch_page(&url).await,
            Err(ProbeError::Transport(_))
        ));
    }
}
