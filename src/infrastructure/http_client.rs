//! HTTP client for fetching the statistics page
//!
//! One GET per call, bounded by a timeout, no retries. Timeouts, connection
//! failures and non-success statuses all surface as `FetchError`.

use async_trait::async_trait;
use reqwest::{Client, header::{HeaderMap, HeaderValue, USER_AGENT}};
use std::time::Duration;

use crate::domain::fetcher::{FetchError, PageFetcher};

/// HTTP client configuration for fetching
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("statwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            follow_redirects: true,
        }
    }
}

/// Page fetcher backed by reqwest
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::info!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        tracing::debug!("Successfully fetched: {} ({} chars)", url, text.len());
        Ok(text)
    }
}

fn classify(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        // The client timeout covers each request phase; this bounds the whole exchange
        match tokio::time::timeout(self.config.timeout, self.get_text(url)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Fetch of {} exceeded {:?}", url, self.config.timeout);
                Err(FetchError::Timeout { url: url.to_string() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body>ok</body></html>")
            .create_async()
            .await;

        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let body = client.fetch(&format!("{}/", server.url())).await.unwrap();

        assert!(body.contains("ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(503).create_async().await;

        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let err = client.fetch(&format!("{}/", server.url())).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_fails_on_unreachable_host() {
        let config = HttpClientConfig {
            timeout: Duration::from_secs(2),
            ..HttpClientConfig::default()
        };
        let client = HttpClient::new(config).unwrap();
        // Port 9 (discard) on localhost is not expected to be listening
        let err = client.fetch("http://127.0.0.1:9/").await.unwrap_err();

        assert!(matches!(err, FetchError::Network { .. } | FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_slow_body_fails_as_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(b"<html><body>")?;
                std::thread::sleep(Duration::from_secs(3));
                w.write_all(b"late</body></html>")
            })
            .create_async()
            .await;

        let config = HttpClientConfig {
            timeout: Duration::from_secs(1),
            ..HttpClientConfig::default()
        };
        let client = HttpClient::new(config).unwrap();
        let started = std::time::Instant::now();
        let err = client.fetch(&format!("{}/", server.url())).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
