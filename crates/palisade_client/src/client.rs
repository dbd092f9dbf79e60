//! The resilient call pipeline.

use crate::retryable::Attempt;
use crate::{ApiRequest, ApiResponse, ClientContext, Transport, should_retry_response};
use derive_getters::Getters;
use palisade_cache::{CacheStats, TieredCacheManager};
use palisade_error::{PalisadeResult, TransportError, UsageLimitError};
use palisade_retry::{RetryConfig, RetryExecutor, RetryPolicy};
use palisade_usage::{CallRecord, LimitKind, UsageGovernor, UsageReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Switches for the optional pipeline stages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct ClientOptions {
    /// Serve and store GET responses through the cache
    #[serde(default = "default_true")]
    use_cache: bool,

    /// Check quotas before and record usage after each call
    #[serde(default = "default_true")]
    use_governor: bool,

    /// Record a usage event (flagged `cache_hit`) when a call is served from cache
    #[serde(default)]
    record_cache_hits: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            use_governor: true,
            record_cache_hits: false,
        }
    }
}

/// Cache key for `request` issued by client `client`.
///
/// `client:METHOD:endpoint[:k=v&k=v]`, parameters sorted by key, so identical
/// calls always share a key.
///
/// # Examples
///
/// ```
/// use palisade_client::{ApiRequest, cache_key};
///
/// let a = ApiRequest::get("/search").with_param("q", "x").with_param("lang", "en");
/// let b = ApiRequest::get("/search").with_param("lang", "en").with_param("q", "x");
/// assert_eq!(cache_key("Search", &a), "Search:GET:/search:lang=en&q=x");
/// assert_eq!(cache_key("Search", &a), cache_key("Search", &b));
/// assert_eq!(cache_key("Search", &ApiRequest::get("/ping")), "Search:GET:/ping");
/// ```
pub fn cache_key(client: &str, request: &ApiRequest) -> String {
    let mut key = format!("{}:{}:{}", client, request.method(), request.endpoint());
    if !request.params().is_empty() {
        key.push(':');
        key.push_str(&request.encoded_params());
    }
    key
}

/// An API client wrapped in quota preflight, caching, retries and usage recording.
///
/// Each call runs `PREFLIGHT -> CACHE_LOOKUP -> EXECUTE (with retry) -> RECORD
/// -> CACHE_STORE`:
///
/// 1. A reached quota fails the call with [`UsageLimitError`] before any
///    network attempt.
/// 2. Cacheable (GET) calls return a cached response when present.
/// 3. The transport is called under the client's retry policy.
/// 4. Success or failure, duration and tokens are recorded.
/// 5. Successful cacheable responses are cached; failures never are.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use palisade_client::{ApiRequest, ApiResponse, ResilientClient, Transport};
/// use palisade_error::TransportError;
/// use serde_json::json;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Transport for Echo {
///     async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
///         Ok(ApiResponse::ok(json!({ "endpoint": request.endpoint() })))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> palisade_error::PalisadeResult<()> {
/// let client = ResilientClient::new("Echo", Echo);
/// let response = client.request(ApiRequest::get("/hello")).await?;
/// assert_eq!(response.body()["endpoint"], "/hello");
/// # Ok(())
/// # }
/// ```
pub struct ResilientClient<T> {
    name: String,
    service: String,
    transport: T,
    cache: Option<Arc<TieredCacheManager<ApiResponse>>>,
    governor: Option<Arc<UsageGovernor>>,
    retry: RetryExecutor<ApiResponse>,
    options: ClientOptions,
}

impl<T> std::fmt::Debug for ResilientClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("cache", &self.cache.is_some())
            .field("governor", &self.governor.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn retry_executor(config: RetryConfig) -> RetryExecutor<ApiResponse> {
    RetryExecutor::new(RetryPolicy::new(config).with_retry_on_result(should_retry_response))
}

impl<T: Transport> ResilientClient<T> {
    /// Client without cache or governor, using transient-failure retries.
    ///
    /// `name` prefixes cache keys; its lowercase form is the governed service name.
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        let name = name.into();
        Self {
            service: name.to_lowercase(),
            name,
            transport,
            cache: None,
            governor: None,
            retry: retry_executor(RetryConfig::transient()),
            options: ClientOptions::default(),
        }
    }

    /// Client sharing the cache, governor and retry settings of `context`.
    pub fn with_context(name: impl Into<String>, transport: T, context: &ClientContext) -> Self {
        let mut client = Self::new(name, transport);
        client.cache = context.cache().cloned();
        client.governor = context.governor().cloned();
        client.retry = retry_executor(context.retry().clone());
        client
    }

    /// Use `cache` for cacheable calls.
    pub fn with_cache(mut self, cache: Arc<TieredCacheManager<ApiResponse>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check quotas and record usage through `governor`.
    pub fn with_governor(mut self, governor: Arc<UsageGovernor>) -> Self {
        self.governor = Some(governor);
        self
    }

    /// Replace the retry settings.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = retry_executor(config);
        self
    }

    /// Replace the stage switches.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Governed service name (defaults to the lowercase client name).
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Client name used as the cache-key prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Governed service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Stage switches.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn cache(&self) -> Option<&TieredCacheManager<ApiResponse>> {
        self.cache
            .as_deref()
            .filter(|_| self.options.use_cache)
    }

    fn governor(&self) -> Option<&UsageGovernor> {
        self.governor
            .as_deref()
            .filter(|_| self.options.use_governor)
    }

    /// Run `request` through the pipeline.
    ///
    /// A response whose status is still unsuccessful after retries is returned
    /// as `Ok`; check [`ApiResponse::is_success`].
    ///
    /// # Errors
    ///
    /// - [`UsageLimitError`] if a quota is reached (no attempt is made)
    /// - the final transport error when the call fails permanently or retries
    ///   are exhausted
    #[instrument(
        skip(self, request),
        fields(service = %self.service, method = %request.method(), endpoint = %request.endpoint())
    )]
    pub async fn request(&self, request: ApiRequest) -> PalisadeResult<ApiResponse> {
        if *request.check_limits()
            && let Some(governor) = self.governor()
            && let Some(limit) = governor.check_limits(&self.service).await
        {
            warn!(%limit, "Call blocked by usage limit");
            Err(UsageLimitError::new(self.service.clone(), limit))?
        }

        let started = Instant::now();
        let use_cache = request.use_cache().unwrap_or(self.options.use_cache);
        let cache = self
            .cache
            .as_deref()
            .filter(|_| use_cache && request.method().is_cacheable());
        let key = cache.map(|_| cache_key(&self.name, &request));

        if let (Some(cache), Some(key)) = (cache, key.as_deref())
            && let Some(hit) = cache.get(key).await
        {
            debug!(key, "Cache hit");
            if self.options.record_cache_hits {
                let outcome = Ok(hit.clone());
                self.record(&request, &outcome, started.elapsed(), true).await;
            }
            return Ok(hit);
        }

        let outcome = self.execute(&request).await;
        self.record(&request, &outcome, started.elapsed(), false).await;
        let response = outcome?;

        if response.is_success()
            && let (Some(cache), Some(key)) = (cache, key.as_deref())
        {
            cache.set(key, response.clone()).await;
            debug!(key, "Cached response");
        }
        Ok(response)
    }

    /// GET `endpoint` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get<I, K, V>(&self, endpoint: &str, params: I) -> PalisadeResult<ApiResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = params
            .into_iter()
            .fold(ApiRequest::get(endpoint), |request, (key, value)| {
                request.with_param(key, value)
            });
        self.request(request).await
    }

    /// POST a JSON body to `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post(&self, endpoint: &str, body: serde_json::Value) -> PalisadeResult<ApiResponse> {
        self.request(ApiRequest::post(endpoint, body)).await
    }

    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.retry
            .retry(|| {
                let pending = self.transport.send(request);
                async move { pending.await.map_err(Attempt) }
            })
            .await
            .map_err(|Attempt(e)| e)
    }

    async fn record(
        &self,
        request: &ApiRequest,
        outcome: &Result<ApiResponse, TransportError>,
        elapsed: Duration,
        cache_hit: bool,
    ) {
        let Some(governor) = self.governor() else {
            return;
        };

        let success = outcome.as_ref().is_ok_and(ApiResponse::is_success);
        let mut call = CallRecord::new(request.endpoint().clone(), success)
            .with_duration(elapsed)
            .with_metadata_entry("method", request.method().to_string());
        if !request.params().is_empty() {
            call = call.with_metadata_entry("params", request.encoded_params());
        }
        if let Some(body) = request.body() {
            call = call.with_metadata_entry("data_size", body.to_string().len());
        }
        match outcome {
            Ok(response) => {
                if success && let Some(tokens) = response.tokens() {
                    call = call.with_tokens(tokens);
                }
                if !success {
                    call = call.with_metadata_entry("status", *response.status());
                }
            }
            Err(e) => call = call.with_metadata_entry("error", e.to_string()),
        }
        if cache_hit {
            call = call.with_metadata_entry("cache_hit", true);
        }

        governor.record_call(&self.service, call).await;
    }

    /// Change selected retry settings; `None` keeps the current value.
    ///
    /// Calls already in flight keep the settings they started with.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting settings are invalid; nothing changes.
    pub async fn set_retry_config(
        &self,
        retry_count: Option<u32>,
        base_delay: Option<f64>,
        max_delay: Option<f64>,
        backoff_factor: Option<f64>,
    ) -> PalisadeResult<()> {
        let mut config = self.retry.config().await;
        config.update(retry_count, base_delay, max_delay, backoff_factor);
        self.retry.set_config(config).await
    }

    /// Current retry settings.
    pub async fn retry_config(&self) -> RetryConfig {
        self.retry.config().await
    }

    /// Empty every cache tier.
    pub async fn clear_cache(&self) {
        if let Some(cache) = self.cache() {
            cache.clear().await;
            info!(client = %self.name, "Cache cleared");
        }
    }

    /// Cache statistics, or `None` when caching is off.
    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match self.cache() {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    /// Usage for this client's service; empty when governance is off.
    pub async fn usage_stats(&self) -> UsageReport {
        match self.governor() {
            Some(governor) => governor.usage_stats(Some(&self.service)).await,
            None => UsageReport::default(),
        }
    }

    /// Set (or with `None`, remove) a call-count limit for this client's service.
    pub async fn set_usage_limit(&self, kind: LimitKind, value: Option<u64>) {
        if let Some(governor) = self.governor() {
            governor.set_limit(&self.service, kind, value).await;
        }
    }

    /// Set per-call cost and/or monthly budget for this client's service.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is negative.
    pub async fn set_cost_info(
        &self,
        cost_per_call: Option<f64>,
        monthly_budget: Option<f64>,
    ) -> PalisadeResult<()> {
        match self.governor() {
            Some(governor) => {
                governor
                    .set_cost_info(&self.service, cost_per_call, monthly_budget)
                    .await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Zero this client's usage counters, keeping limits and cost settings.
    pub async fn clear_usage_data(&self) {
        if let Some(governor) = self.governor() {
            governor.clear_usage_data(Some(&self.service)).await;
        }
    }
}
