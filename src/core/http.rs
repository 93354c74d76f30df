//! HTTP value types and the network boundary
//!
//! Information Hiding:
//! - reqwest client details hidden behind the `Network` trait
//! - Requests and responses are plain owned values so they can be cached,
//!   cloned and persisted without holding transport state

use crate::error::NetworkError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// How the request was issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    #[default]
    Cors,
    NoCors,
    SameOrigin,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: Url,
    /// Header names are stored lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_uppercase(),
            url,
            headers: BTreeMap::new(),
            body: None,
            mode: RequestMode::default(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: Url, body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", url).with_body(body)
    }

    /// A page navigation as issued by the browser address bar.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_header("accept", "text/html,application/xhtml+xml")
            .with_mode(RequestMode::Navigate)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Identity under which the response is cached: the URL without fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    pub fn html(status: u16, markup: &str) -> Self {
        Self::new(status, markup).with_header("content-type", "text/html; charset=utf-8")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    /// Mirrors `Response.ok`: status in 200..=299.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// The outbound network. A fetch only fails when no response was produced.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// reqwest-backed network used outside of tests.
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, NetworkError> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!("[HttpNetwork] {} {}", request.method, request.url);

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_drops_fragment() {
        let request = Request::get("https://shop.test/listings/4?page=2#reviews".parse().unwrap());
        assert_eq!(request.cache_key(), "https://shop.test/listings/4?page=2");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = Request::get("https://shop.test/".parse().unwrap())
            .with_header("Accept", "text/html");
        assert_eq!(request.header("accept"), Some("text/html"));
        assert_eq!(request.header("ACCEPT"), Some("text/html"));
    }

    #[test]
    fn test_response_success_range() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(302, "").is_success());
        assert!(!Response::new(503, "").is_success());
    }

    #[tokio::test]
    async fn test_http_network_fetch() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/messages"))
            .and(header("content-type", "application/json"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-request-id", "abc")
                    .set_body_string("created"),
            )
            .mount(&mock_server)
            .await;

        let network = HttpNetwork::new(None).unwrap();
        let url = format!("{}/rest/v1/messages", mock_server.uri());
        let request = Request::post(url.parse().unwrap(), r#"{"text":"hi"}"#)
            .with_header("Content-Type", "application/json");

        let response = network.fetch(&request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert_eq!(response.text(), "created");
    }

    #[tokio::test]
    async fn test_http_network_unreachable() {
        let network = HttpNetwork::new(Some(2)).unwrap();
        let request = Request::get("http://127.0.0.1:1/unreachable".parse().unwrap());

        let result = network.fetch(&request).await;
        assert!(matches!(result, Err(NetworkError::Transport(_))));
    }
}
