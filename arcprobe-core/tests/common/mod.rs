// Scripted transport shared by the integration tests

#![allow(dead_code)]

use arcprobe_scanner::{ProbeError, Result, Transport};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Answers requests from a route table after a fixed latency and records
/// every request it sees.
///
/// A request is keyed as `<path>` or `<path> where=<clause>`; routes and
/// failures match on a substring of that key. Unrouted requests get `{}`.
pub struct MockTransport {
    routes: Vec<(String, Value)>,
    pages: Vec<(String, String)>,
    failing: Vec<String>,
    latency: Duration,
    log: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            pages: Vec::new(),
            failing: Vec::new(),
            latency: Duration::from_millis(20),
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn route(mut self, key: &str, response: Value) -> Self {
        self.routes.push((key.to_string(), response));
        self
    }

    /// Serve `html` for page requests whose path contains `key`.
    pub fn page(mut self, key: &str, html: &str) -> Self {
        self.pages.push((key.to_string(), html.to_string()));
        self
    }

    /// Every count query answers `{"count": n}`.
    pub fn counts(self, n: u64) -> Self {
        self.route("/query where=", json!({ "count": n }))
    }

    pub fn fail(mut self, key: &str) -> Self {
        self.failing.push(key.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn request_key(url: &Url) -> String {
    match url.query_pairs().find(|(k, _)| k == "where") {
        Some((_, clause)) => format!("{} where={}", url.path(), clause),
        None => url.path().to_string(),
    }
}

impl MockTransport {
    async fn answer(&self, key: &str) -> Result<()> {
        self.log.lock().unwrap().push(key.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|f| key.contains(f.as_str())) {
            return Err(ProbeError::Transport(format!("connection reset: {}", key)));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn get_json<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let key = request_key(url);
            self.answer(&key).await?;

            let response = self
                .routes
                .iter()
                .find(|(route, _)| key.contains(route.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| json!({}));
            Ok(response)
        })
    }

    fn get_page<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let key = url.path().to_string();
            self.answer(&key).await?;

            self.pages
                .iter()
                .find(|(page, _)| key.contains(page.as_str()))
                .map(|(_, html)| html.clone())
                .ok_or_else(|| ProbeError::Transport(format!("{} returned HTTP 404", url)))
        })
    }
}
