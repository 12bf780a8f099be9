//! Blocking HTTP transport for the PxStat API.
//!
//! [`Transport`] is the seam between the crate and the network. The production
//! implementation, [`HttpTransport`], wraps a `reqwest::blocking::Client`; tests
//! plug in fixture-backed implementations instead.

use crate::config::RequestConfig;
use crate::error::{Error, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CACHE_CONTROL;
use reqwest::redirect::Policy;
use std::fmt;

/// Raw answer to a GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    /// Value of the `Cache-Control` response header, if any.
    pub cache_control: Option<String>,
}

impl Response {
    /// A `200 OK` response with no cache headers.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            cache_control: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can perform a GET request.
///
/// Implementations return `Err(Error::Transport)` only when no response was
/// obtained; error statuses come back as a [`Response`] so the caller decides.
pub trait Transport: Send + Sync + fmt::Debug {
    fn get(&self, url: &str) -> Result<Response>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    /// Build a client from the request options.
    pub fn new(config: &RequestConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::transport("<client builder>", e))?;
        if !config.verify_tls {
            log::warn!("TLS certificate verification is disabled");
        }
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Response> {
        log::debug!("GET {url}");
        let r = self
            .http
            .get(url)
            .send()
            .map_err(|e| Error::transport(url, e))?;
        let status = r.status().as_u16();
        let cache_control = r
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = r.text().map_err(|e| Error::transport(url, e))?;
        log::debug!("GET {url} -> HTTP {status}, {} bytes", body.len());
        Ok(Response {
            status,
            body,
            cache_control,
        })
    }
}
