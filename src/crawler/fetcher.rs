//! HTTP fetching with bounded retries
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building an HTTP client with a proper user agent string
//! - GET requests with a per-request timeout
//! - Retry with linearly growing, jittered backoff for transient failures
//! - Terminal failures returned as values, never as panics

use crate::config::FetchConfig;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// A fetch that exhausted its retry budget
///
/// Carried as a value across the retry boundary so callers can decide what a
/// dead URL means for them.
#[derive(Debug, Error)]
#[error("{url}: {last_error}")]
pub struct FetchFailure {
    /// The URL that could not be fetched
    pub url: String,

    /// Description of the final attempt's error
    pub last_error: String,
}

/// Builds the shared HTTP client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Wraps the HTTP client with bounded, jittered retries
///
/// Holds no mutable state, so one instance can serve concurrent fetches of
/// independent URLs.
pub struct RetryingFetcher {
    client: Client,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryingFetcher {
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// The URL must be absolute http(s). A 2xx response returns the body;
    /// any other status or transport error is retried with a delay of
    /// `base_delay × attempt + jitter` until `max_attempts` is reached, at
    /// which point the last error is returned as a [`FetchFailure`].
    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let parsed = match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            Ok(parsed) => {
                return Err(FetchFailure {
                    url: url.to_string(),
                    last_error: format!("unsupported scheme '{}'", parsed.scheme()),
                })
            }
            Err(error) => {
                return Err(FetchFailure {
                    url: url.to_string(),
                    last_error: format!("not an absolute URL: {error}"),
                })
            }
        };

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.client.get(parsed.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.text().await {
                        Ok(body) => return Ok(body),
                        Err(error) => last_error = format!("body read failed: {error}"),
                    }
                }
                Ok(response) => last_error = format!("HTTP {}", response.status()),
                Err(error) if error.is_timeout() => last_error = "request timeout".to_string(),
                Err(error) => last_error = error.to_string(),
            }

            if attempt < self.max_attempts {
                let delay = self.backoff_delay(attempt);
                tracing::debug!(url = %parsed, attempt, ?delay, "retrying after {last_error}");
                tokio::time::sleep(delay).await;
            }
        }

        Err(FetchFailure {
            url: url.to_string(),
            last_error,
        })
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0..=1000);
        self.base_delay * attempt + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> FetchConfig {
        FetchConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            timeout_ms: 5000,
            user_agent: "tidemark-test/1.0".to_string(),
        }
    }

    fn fetcher() -> RetryingFetcher {
        let config = test_config();
        let client = build_http_client(&config).unwrap();
        RetryingFetcher::new(client, &config)
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&test_config());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let body = fetcher().fetch(&format!("{}/page", server.uri())).await;
        assert_eq!(body.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_fetch_retries_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let body = fetcher().fetch(&format!("{}/flaky", server.uri())).await;
        assert_eq!(body.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_fetch_exhausts_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = fetcher().fetch(&format!("{}/down", server.uri())).await;
        let failure = result.unwrap_err();
        assert!(failure.last_error.contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_relative_url() {
        let result = fetcher().fetch("/board/lists/?page=1").await;
        let failure = result.unwrap_err();
        assert!(failure.last_error.contains("absolute"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme() {
        let result = fetcher().fetch("ftp://example.com/file").await;
        let failure = result.unwrap_err();
        assert!(failure.last_error.contains("scheme"));
    }
}
