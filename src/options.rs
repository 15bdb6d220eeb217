use std::fmt;

/// Scope of the consecutive-retry counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RetryBudget {
    /// Every call to `send` gets its own counter.
    #[default]
    PerRequest,
    /// One counter for the client instance (and its clones). Any successful
    /// response resets it, even while other requests are still retrying.
    Shared,
}

/// Configures credentials, timeouts and retry behavior.
#[derive(Clone, Eq, PartialEq)]
pub struct ClientOptions {
    /// Primary bearer token sent as `Authorization`.
    pub access_token: Option<String>,
    /// Secondary bearer token sent as `Proxy-Authorization`.
    pub proxy_access_token: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor applied to the delay for each further retry.
    pub backoff_multiplier: u32,
    /// Scope of the retry counter.
    pub retry_budget: RetryBudget,
    /// Optional deadline in milliseconds across all attempts of one request.
    pub deadline_ms: Option<u64>,
    /// Logs request and response details at `debug` level.
    pub dev_logging: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            access_token: None,
            proxy_access_token: None,
            timeout_ms: 30_000,
            max_retries: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2,
            retry_budget: RetryBudget::PerRequest,
            deadline_ms: None,
            dev_logging: false,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "<redacted>");
        f.debug_struct("ClientOptions")
            .field("access_token", &redact(&self.access_token))
            .field("proxy_access_token", &redact(&self.proxy_access_token))
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("retry_budget", &self.retry_budget)
            .field("deadline_ms", &self.deadline_ms)
            .field("dev_logging", &self.dev_logging)
            .finish()
    }
}

impl ClientOptions {
    /// Sets the primary bearer token. Empty tokens are treated as absent.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = non_empty(token.into());
        self
    }

    /// Sets the proxy bearer token. Empty tokens are treated as absent.
    pub fn with_proxy_access_token(mut self, token: impl Into<String>) -> Self {
        self.proxy_access_token = non_empty(token.into());
        self
    }

    /// Reads credentials and the development logging flag from the environment.
    ///
    /// - `CUSTODY_ACCESS_TOKEN`
    /// - `CUSTODY_PROXY_ACCESS_TOKEN`
    /// - `CUSTODY_HTTP_DEBUG` (`1`, `true` or `yes`)
    ///
    /// Unset variables leave the defaults in place.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(token) = std::env::var("CUSTODY_ACCESS_TOKEN") {
            options = options.with_access_token(token);
        }
        if let Ok(token) = std::env::var("CUSTODY_PROXY_ACCESS_TOKEN") {
            options = options.with_proxy_access_token(token);
        }
        options.dev_logging = std::env::var("CUSTODY_HTTP_DEBUG")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        options
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
