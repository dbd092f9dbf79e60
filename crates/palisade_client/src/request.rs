//! Transport-neutral request and response types.

use derive_getters::Getters;
use palisade_usage::Tokens;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// HTTP-equivalent verb of a call.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Method {
    /// Read; the only cacheable verb
    #[default]
    Get,
    /// Create
    Post,
    /// Replace
    Put,
    /// Partial update
    Patch,
    /// Remove
    Delete,
}

impl Method {
    /// Whether responses may be served from and stored in the cache.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Method::Get)
    }
}

/// One outbound call.
///
/// # Example
///
/// ```
/// use palisade_client::{ApiRequest, Method};
///
/// let request = ApiRequest::get("/v1/search")
///     .with_param("q", "rust")
///     .with_param("page", "2");
/// assert_eq!(*request.method(), Method::Get);
/// assert_eq!(request.params().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct ApiRequest {
    /// Verb
    method: Method,
    /// Path appended to the transport's base URL
    #[setters(skip)]
    endpoint: String,
    /// Query parameters
    params: BTreeMap<String, String>,
    /// JSON body
    #[setters(strip_option)]
    body: Option<Value>,
    /// Extra headers
    headers: BTreeMap<String, String>,
    /// Per-call cache override; `None` uses the client's setting
    #[setters(strip_option)]
    use_cache: Option<bool>,
    /// Whether quota preflight runs for this call
    check_limits: bool,
}

impl ApiRequest {
    /// Request with `method` to `endpoint`.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
            use_cache: None,
            check_limits: true,
        }
    }

    /// GET request.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    /// POST request with a JSON body.
    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint).with_body(body)
    }

    /// Add one query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add one header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Query parameters as `k=v&k=v`, sorted by key, each side percent-encoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use palisade_client::ApiRequest;
    ///
    /// let request = ApiRequest::get("/s").with_param("q", "a&b=c").with_param("n", "1");
    /// assert_eq!(request.encoded_params(), "n=1&q=a%26b%3Dc");
    /// ```
    pub fn encoded_params(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A completed call: status code and decoded body.
///
/// Text bodies are stored as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ApiResponse {
    /// HTTP-equivalent status code
    status: u16,
    /// Decoded body
    body: Value,
}

impl ApiResponse {
    /// Response with `status` and `body`.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// 200 response.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error text from an `error` field, or the whole body when it is a string.
    pub fn error_message(&self) -> Option<String> {
        match &self.body {
            Value::String(text) => Some(text.clone()),
            Value::Object(fields) => fields.get("error").map(|error| match error {
                Value::String(text) => text.clone(),
                Value::Object(inner) => inner
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), str::to_string),
                other => other.to_string(),
            }),
            _ => None,
        }
    }

    /// Token counts from a `usage` object with `*_tokens` fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use palisade_client::ApiResponse;
    /// use serde_json::json;
    ///
    /// let response = ApiResponse::ok(json!({
    ///     "usage": {"prompt_tokens": 12, "completion_tokens": 30}
    /// }));
    /// let tokens = response.tokens().unwrap();
    /// assert_eq!(tokens.effective_total(), Some(42));
    /// ```
    pub fn tokens(&self) -> Option<Tokens> {
        let usage = self.body.get("usage")?;
        let field = |name: &str| usage.get(name).and_then(Value::as_u64);

        let mut tokens = Tokens::default();
        if let Some(prompt) = field("prompt_tokens") {
            tokens = tokens.with_prompt(prompt);
        }
        if let Some(completion) = field("completion_tokens") {
            tokens = tokens.with_completion(completion);
        }
        if let Some(total) = field("total_tokens") {
            tokens = tokens.with_total(total);
        }
        (!tokens.is_empty()).then_some(tokens)
    }
}
