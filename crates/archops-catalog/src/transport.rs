//! HTTP transport seam
//!
//! The fetcher talks to the service through [`Transport`] so tests can script
//! responses without a socket. [`ReqwestTransport`] is the production
//! implementation.

use crate::error::{CatalogError, TransportError};
use archops_core::ApiConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

/// HTTP verb used by catalog calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read a resource
    Get,
    /// Submit a body
    Post,
}

impl Method {
    /// Upper-case verb as it appears in the signing string
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully resolved outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Verb
    pub method: Method,
    /// Absolute URL including query
    pub url: String,
    /// Extra headers (authentication)
    pub headers: Vec<(String, String)>,
    /// Body and its content type
    pub body: Option<(Vec<u8>, String)>,
}

impl HttpRequest {
    /// GET without body
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and text body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// 200 response with body
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the raw response
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request
    ///
    /// # Errors
    /// Returns [`TransportError`] when no response was received
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client honoring timeout, user agent and certificate settings
    ///
    /// # Errors
    /// Returns [`CatalogError::Setup`] if the TLS backend cannot be initialized
    pub fn new(api: &ApiConfig) -> Result<Self, CatalogError> {
        if !api.verify_certificates {
            tracing::warn!("TLS certificate verification disabled for {}", api.base_url());
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(api.user_agent.clone())
            .danger_accept_invalid_certs(!api.verify_certificates)
            .build()
            .map_err(|e| CatalogError::Setup(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| TransportError::Request(e.to_string()))?;
            headers.insert(name, value);
        }

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        if let Some((body, content_type)) = request.body {
            let value = HeaderValue::from_str(&content_type)
                .map_err(|e| TransportError::Request(e.to_string()))?;
            headers.insert(CONTENT_TYPE, value);
            builder = builder.body(body);
        }

        let response = builder.headers(headers).send().await.map_err(map_reqwest)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest)?;
        tracing::debug!(status, bytes = body.len(), "response received");
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}
