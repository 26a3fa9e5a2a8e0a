//! HTTP client for the reporting API (account directory and report queries)

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Server-side and transport failures are worth another attempt; 4xx are not
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::RequestFailed(_) | ClientError::Timeout => true,
            ClientError::Status { code, .. } => *code >= 500 || *code == 429,
            ClientError::InvalidUrl(_) | ClientError::InvalidResponse(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    pub token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            user_agent: "fleetreport/0.1.0".to_string(),
            token: None,
        }
    }
}

/// JSON-over-HTTP client with retry
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: HttpConfig,
}

impl ApiClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET a JSON document. `None` for 204 No Content.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        let body = self.send_with_retry(&url, || self.client.get(&url)).await?;
        decode(body)
    }

    /// POST a JSON body and decode the JSON reply. `None` for 204 No Content.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let payload =
            serde_json::to_vec(body).map_err(|e| ClientError::RequestFailed(e.to_string()))?;
        let reply = self
            .send_with_retry(&url, || {
                self.client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(payload.clone())
            })
            .await?;
        decode(reply)
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Option<Bytes>>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_once(build()).await {
                Ok(body) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Request succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) if !e.is_retryable() || attempts >= self.config.max_retries.max(1) => {
                    warn!(url, attempts, error = %e, "Request failed");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url, attempts, error = %e, "Request failed, retrying");

                    // Exponential backoff: 1x, 2x, 4x the base delay
                    let backoff = self.config.retry_backoff * 2u32.pow(attempts - 1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn send_once(&self, mut request: RequestBuilder) -> Result<Option<Bytes>> {
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.is_empty() {
                status.canonical_reason().unwrap_or("Unknown").to_string()
            } else {
                message
            };
            return Err(ClientError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::RequestFailed(format!("Failed to read body: {}", e)))?;

        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }
}

fn decode<T: DeserializeOwned>(body: Option<Bytes>) -> Result<Option<T>> {
    body.map(|bytes| serde_json::from_slice(&bytes))
        .transpose()
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.user_agent, "fleetreport/0.1.0");
    }

    #[test]
    fn test_rejects_non_http_base() {
        let config = HttpConfig {
            base_url: "ftp://reports".to_string(),
            ..Default::default()
        };
        assert!(matches!(ApiClient::new(config), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_url_join() {
        let client = ApiClient::new(HttpConfig {
            base_url: "http://localhost:8080/api/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/accounts"), "http://localhost:8080/api/accounts");
        assert_eq!(client.url("accounts/1/report"), "http://localhost:8080/api/accounts/1/report");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(
            ClientError::Status {
                code: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ClientError::Status {
                code: 404,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ClientError::InvalidResponse(String::new()).is_retryable());
    }
}
