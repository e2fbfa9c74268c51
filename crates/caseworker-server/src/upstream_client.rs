use axum::http::{HeaderMap, Method};
use reqwest::{Body, Response, Url};

use crate::error::{RelayError, Result};

/// HTTP client bound to the single upstream the relay forwards to.
///
/// The inner `reqwest::Client` is a shared connection pool; every forwarded
/// request still gets its own upstream exchange.
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str, disable_system_proxy: bool) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|err| RelayError::InvalidUpstream(format!("{}: {}", base_url, err)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RelayError::InvalidUpstream(format!(
                "{}: unsupported scheme {}",
                base_url,
                parsed.scheme()
            )));
        }

        // No timeout: a hung upstream is bounded only by transport defaults.
        let http_client = if disable_system_proxy {
            reqwest::Client::builder().no_proxy().build()?
        } else {
            reqwest::Client::new()
        };

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Target URL for an inbound path + query, which is reused verbatim.
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    /// Send one request upstream and return as soon as the response head arrives.
    /// The body is left unread so the caller can stream it.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Body,
    ) -> Result<Response> {
        let response = self
            .http_client
            .request(method, self.url_for(path_and_query))
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }
}
