//! HTTP client backing the resolver
//!
//! Features:
//! - HTTP/2 when the server offers it, HTTP/1.1 otherwise
//! - rustls TLS
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - Cookie store shared by every request of a process
//! - One timeout bounding each request

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::stream::fetcher::{FetchRequest, FetchResponse, Method, PayloadFetcher};

/// reqwest-based [`PayloadFetcher`].
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client with the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] if the TLS backend or user agent is unusable.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            // connections
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            // compression
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            // timeouts
            .connect_timeout(Duration::from_secs(10).min(Duration::from_secs(config.timeout_secs)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()
            .map_err(|e| ResolveError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn header_map(request: &FetchRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ResolveError::InvalidRequest(format!("header {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ResolveError::InvalidRequest(format!("header {name}: {e}")))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

/// `(name, value)` of each `Set-Cookie` header.
fn set_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[async_trait]
impl PayloadFetcher for HttpFetcher {
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        let mut builder = builder.headers(Self::header_map(request)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ResolveError::transport(&request.url, e))?;

        let status = response.status().as_u16();
        let cookies = set_cookies(response.headers());
        debug!(
            status,
            version = ?response.version(),
            content_encoding = ?response.headers().get("content-encoding"),
            "Response received"
        );

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::transport(&request.url, e))?;

        Ok(FetchResponse {
            status,
            body,
            cookies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_config() {
        assert!(HttpFetcher::new(&ResolverConfig::default()).is_ok());
    }

    #[test]
    fn invalid_header_is_rejected() {
        let request = FetchRequest::get("https://example.com").header("bad header", "x");
        assert!(matches!(
            HttpFetcher::header_map(&request),
            Err(ResolveError::InvalidRequest(_))
        ));
    }

    #[test]
    fn parses_set_cookie_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("st=abc123; Path=/; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("locale=sv"));
        headers.append(SET_COOKIE, HeaderValue::from_static("garbage"));
        assert_eq!(
            set_cookies(&headers),
            vec![
                ("st".to_string(), "abc123".to_string()),
                ("locale".to_string(), "sv".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_transport() {
        let config = ResolverConfig {
            timeout_secs: 2,
            ..ResolverConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher
            .fetch(&FetchRequest::get("http://127.0.0.1:9/playback"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Transport { .. }));
    }
}
