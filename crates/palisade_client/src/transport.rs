//! The seam between the pipeline and the network.

use crate::{ApiRequest, ApiResponse, Method};
use async_trait::async_trait;
use palisade_error::{TransportError, TransportErrorKind};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Sends one request; the pipeline adds quotas, caching and retries around it.
///
/// Implementations report a non-success status either as
/// `Err(TransportErrorKind::Status)` or as an `Ok` response with that status;
/// the pipeline classifies both.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single attempt.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Request timeout applied by [`HttpTransport`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON-over-HTTP transport built on reqwest.
///
/// Prefixes endpoints with an optional base URL and sends an optional bearer
/// API key. Non-2xx responses become [`TransportErrorKind::Status`] carrying
/// the response body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Transport with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: Option<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Transport with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_timeout(base_url: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TransportError::new(TransportErrorKind::Other(format!(
                    "Failed to build HTTP client: {}",
                    e
                )))
            })?;
        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <api_key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn url(&self, endpoint: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), endpoint),
            None => endpoint.to_string(),
        }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn send_error(e: reqwest::Error) -> TransportError {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        TransportErrorKind::Connection(e.to_string())
    } else {
        TransportErrorKind::Other(e.to_string())
    };
    TransportError::new(kind)
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method(), endpoint = %request.endpoint()))]
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest_method(*request.method()), self.url(request.endpoint()));
        if !request.params().is_empty() {
            builder = builder.query(request.params());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = ?e, "HTTP request failed");
            send_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, body = %message, "API returned error status");
            return Err(TransportError::new(TransportErrorKind::Status {
                status_code: status.as_u16(),
                message,
            }));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));

        let body = if is_json {
            response.json::<Value>().await.map_err(|e| {
                TransportError::new(TransportErrorKind::Decode(format!(
                    "Failed to parse JSON response: {}",
                    e
                )))
            })?
        } else {
            Value::String(response.text().await.map_err(|e| {
                TransportError::new(TransportErrorKind::Decode(format!(
                    "Failed to read response body: {}",
                    e
                )))
            })?)
        };

        debug!(status = status.as_u16(), "Received response");
        Ok(ApiResponse::new(status.as_u16(), body))
    }
}
