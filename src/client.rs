use std::{fmt, sync::Arc, time::Duration};

#[cfg(any(feature = "tracing", test))]
use std::collections::BTreeMap;

use reqwest::{
    header::{
        HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, AUTHORIZATION,
        PROXY_AUTHORIZATION,
    },
    Url,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    retry::{RetryDecision, RetryPolicy, RetryState, SharedRetryCounter},
    runtime::{sleep, Stopwatch},
    ApiResponse, ClientOptions, CustodyHttpError, RequestConfig, Result, RetryBudget,
};

#[derive(Clone)]
/// HTTP client for the custody platform REST API.
///
/// Injects bearer credentials into every request and retries gateway errors
/// (502/503), timeouts and connection failures with exponential backoff.
pub struct RetryingHttpClient {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
    shared_retries: Arc<SharedRetryCounter>,
}

impl fmt::Debug for RetryingHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingHttpClient")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .field("shared_retries", &self.shared_retries.current())
            .finish()
    }
}

impl RetryingHttpClient {
    /// Creates a client without credentials and with default options.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            options: ClientOptions::default(),
            shared_retries: Arc::new(SharedRetryCounter::default()),
        }
    }

    /// Creates a client that sends `token` as the primary bearer credential.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn new_bearer(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let options = ClientOptions::default().with_access_token(token);
        Self::new(base_url).with_options(options)
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `CUSTODY_API_BASE_URL`: backend base URL (required)
    /// - `CUSTODY_ACCESS_TOKEN`: primary bearer token (optional)
    /// - `CUSTODY_PROXY_ACCESS_TOKEN`: proxy bearer token (optional)
    /// - `CUSTODY_HTTP_DEBUG`: `1` or `true` enables development logging
    ///
    /// **Not available on `wasm32` targets**: environment variables do not
    /// exist in browser runtimes. Pass [`ClientOptions`] explicitly instead.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use custody_http::RetryingHttpClient;
    ///
    /// let api = RetryingHttpClient::from_env().expect("missing CUSTODY_* env vars");
    /// ```
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CUSTODY_API_BASE_URL").map_err(|_| {
            CustodyHttpError::Config("missing CUSTODY_API_BASE_URL environment variable".to_owned())
        })?;
        if base_url.trim().is_empty() {
            return Err(CustodyHttpError::Config(
                "CUSTODY_API_BASE_URL is set but empty".to_owned(),
            ));
        }
        Ok(Self::new(base_url.trim()).with_options(ClientOptions::from_env()))
    }

    /// Applies client options such as credentials, timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Current value of the client-wide retry counter.
    ///
    /// Only moves when the client uses [`RetryBudget::Shared`].
    pub fn shared_retry_count(&self) -> u32 {
        self.shared_retries.current()
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send(RequestConfig::get(url)).await
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(RequestConfig::delete(url)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<ApiResponse> {
        self.send(RequestConfig::post(url).json(body)?).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<ApiResponse> {
        self.send(RequestConfig::put(url).json(body)?).await
    }

    /// Issues a GET request and decodes the raw JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url).await?.json()
    }

    /// Issues a GET request and unwraps the `{ success, data }` envelope.
    pub async fn get_data<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url).await?.data()
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Returns the first 2xx response. Non-transient failures are returned
    /// as-is after a single attempt; transient failures that outlast the
    /// retry budget are wrapped in [`CustodyHttpError::Exhausted`].
    pub async fn send(&self, config: RequestConfig) -> Result<ApiResponse> {
        let url = resolve_url(&self.base_url, &config.url)?;
        let headers = self.outbound_headers(&config)?;

        let policy = RetryPolicy::from_options(&self.options);
        let mut state = match self.options.retry_budget {
            RetryBudget::PerRequest => RetryState::per_request(policy),
            RetryBudget::Shared => RetryState::shared(policy, &self.shared_retries),
        };

        let timeout = Duration::from_millis(config.timeout_ms.unwrap_or(self.options.timeout_ms));
        let deadline = self.options.deadline_ms.map(Duration::from_millis);
        let stopwatch = Stopwatch::start();

        loop {
            let attempt_timeout = match deadline {
                Some(deadline) => timeout.min(deadline.saturating_sub(stopwatch.elapsed())),
                None => timeout,
            };

            #[cfg(feature = "tracing")]
            if self.options.dev_logging {
                log_request(&config, &url, &headers);
            }

            let err = match self.attempt(&config, &url, &headers, attempt_timeout).await {
                Ok(mut response) => {
                    state.on_success();
                    response.retries = state.performed();

                    #[cfg(feature = "tracing")]
                    if self.options.dev_logging {
                        tracing::debug!(
                            status = response.status,
                            url = %url,
                            body = %String::from_utf8_lossy(&response.body),
                            "received response"
                        );
                    }

                    return Ok(response);
                }
                Err(err) => err,
            };

            let kind = err.failure_kind();
            let remaining = deadline.map(|deadline| deadline.saturating_sub(stopwatch.elapsed()));
            match state.on_failure(kind, remaining) {
                RetryDecision::Surface => return Err(err),
                RetryDecision::Exhausted => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        retries = state.performed(),
                        kind = kind.as_str(),
                        url = %url,
                        "retries exhausted, giving up on request"
                    );

                    return Err(CustodyHttpError::Exhausted {
                        retries: state.performed(),
                        last: Box::new(err),
                    });
                }
                RetryDecision::DeadlineReached => {
                    let elapsed_ms = stopwatch.elapsed().as_millis() as u64;

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        elapsed_ms,
                        kind = kind.as_str(),
                        url = %url,
                        "deadline reached, giving up on request"
                    );

                    return Err(CustodyHttpError::DeadlineExceeded {
                        elapsed_ms,
                        last: Box::new(err),
                    });
                }
                RetryDecision::Retry { retry, delay } => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        kind = kind.as_str(),
                        url = %url,
                        "transient failure, retrying request"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = retry;

                    sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        config: &RequestConfig,
        url: &Url,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<ApiResponse> {
        // On WASM, reqwest uses AbortController for timeout; the `.timeout()`
        // method is available on both targets.
        let mut request = self
            .http
            .request(config.method.clone(), url.clone())
            .headers(headers.clone())
            .timeout(timeout);
        if !config.query.is_empty() {
            request = request.query(&config.query);
        }
        if let Some(body) = &config.body {
            request = request.json(body);
        }
        #[cfg(target_arch = "wasm32")]
        {
            request = request.fetch_credentials_include();
        }

        let response = request.send().await.map_err(CustodyHttpError::Transport)?;
        let status = response.status();

        if !status.is_success() {
            // The status classifies the failure; a truncated body must not.
            let body = response
                .bytes()
                .await
                .map(|body| String::from_utf8_lossy(&body).into_owned())
                .unwrap_or_default();
            return Err(CustodyHttpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(CustodyHttpError::Transport)?;

        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            body: body.to_vec(),
            retries: 0,
        })
    }

    /// Caller headers plus credentials. Credential headers always win.
    fn outbound_headers(&self, config: &RequestConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(config.headers.len() + 3);
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                CustodyHttpError::InvalidRequest(format!("invalid header name '{name}'"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                CustodyHttpError::InvalidRequest(format!("invalid value for header '{name}'"))
            })?;
            headers.insert(header_name, header_value);
        }

        if let Some(token) = &self.options.access_token {
            headers.insert(AUTHORIZATION, bearer_header_value(token)?);
        }
        if let Some(token) = &self.options.proxy_access_token {
            headers.insert(PROXY_AUTHORIZATION, bearer_header_value(token)?);
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        Ok(headers)
    }
}

/// Absolute URLs are used as-is; anything else is a path under `base_url`.
fn resolve_url(base_url: &str, url: &str) -> Result<Url> {
    let url = url.trim();
    let joined = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_owned()
    } else {
        format!(
            "{}/{}",
            base_url.trim().trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    };
    Url::parse(&joined)
        .map_err(|err| CustodyHttpError::InvalidRequest(format!("invalid url '{joined}': {err}")))
}

fn bearer_header_value(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&normalize_bearer_authorization(token)).map_err(|_| {
        CustodyHttpError::InvalidRequest("bearer token contains invalid characters".to_owned())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(any(feature = "tracing", test))]
fn redacted_headers(headers: &HeaderMap) -> BTreeMap<&str, &str> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if value.is_sensitive() {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            (name.as_str(), shown)
        })
        .collect()
}

#[cfg(feature = "tracing")]
fn log_request(config: &RequestConfig, url: &Url, headers: &HeaderMap) {
    tracing::debug!(
        method = %config.method,
        url = %url,
        query = ?config.query,
        headers = ?redacted_headers(headers),
        body = ?config.body,
        "sending request"
    );
}

#[cfg(test)]
mod tests {
    use reqwest::header::{ACCESS_CONTROL_ALLOW_CREDENTIALS, AUTHORIZATION, PROXY_AUTHORIZATION};

    use super::{normalize_bearer_authorization, redacted_headers, resolve_url, RetryingHttpClient};
    use crate::{ClientOptions, CustodyHttpError, RequestConfig};

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(
            normalize_bearer_authorization("abc123"),
            "Bearer abc123".to_owned()
        );
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123".to_owned()
        );
    }

    #[test]
    fn debug_redacts_tokens() {
        let client = RetryingHttpClient::new_bearer("https://api.example", "secret-token");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn resolve_url_joins_paths_with_single_slash() {
        let url = resolve_url("https://api.example/admin/", "/transaction/dashboard/queues")
            .expect("url must resolve");
        assert_eq!(
            url.as_str(),
            "https://api.example/admin/transaction/dashboard/queues"
        );
    }

    #[test]
    fn resolve_url_keeps_absolute_urls() {
        let url = resolve_url("https://api.example", "http://other.example/wallet/list")
            .expect("url must resolve");
        assert_eq!(url.as_str(), "http://other.example/wallet/list");
    }

    #[test]
    fn resolve_url_rejects_garbage_base() {
        let err = resolve_url("not a url", "/wallets").expect_err("base must be invalid");
        assert!(matches!(err, CustodyHttpError::InvalidRequest(_)));
    }

    #[test]
    fn outbound_headers_carry_configured_credentials() {
        let client = RetryingHttpClient::new("https://api.example").with_options(
            ClientOptions::default()
                .with_access_token("primary")
                .with_proxy_access_token("Bearer proxy"),
        );

        let headers = client
            .outbound_headers(&RequestConfig::get("/wallets"))
            .expect("headers must build");

        assert_eq!(headers[AUTHORIZATION], "Bearer primary");
        assert_eq!(headers[PROXY_AUTHORIZATION], "Bearer proxy");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(redacted_headers(&headers)["authorization"], "<redacted>");
    }

    #[test]
    fn outbound_headers_omit_absent_credentials() {
        let client = RetryingHttpClient::new("https://api.example");

        let headers = client
            .outbound_headers(&RequestConfig::get("/wallets").header("X-Request-Id", "42"))
            .expect("headers must build");

        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(PROXY_AUTHORIZATION));
        assert_eq!(headers["x-request-id"], "42");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[test]
    fn credential_headers_override_caller_values() {
        let client = RetryingHttpClient::new_bearer("https://api.example", "configured");

        let headers = client
            .outbound_headers(&RequestConfig::get("/wallets").header("Authorization", "Basic xyz"))
            .expect("headers must build");

        assert_eq!(headers[AUTHORIZATION], "Bearer configured");
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let client = RetryingHttpClient::new("https://api.example");

        let err = client
            .outbound_headers(&RequestConfig::get("/wallets").header("bad header", "x"))
            .expect_err("header name must be rejected");

        assert!(matches!(err, CustodyHttpError::InvalidRequest(_)));
    }
}
