use std::collections::BTreeMap;

use reqwest::Method;
use serde::Serialize;

use crate::{CustodyHttpError, Result};

/// Outbound request descriptor.
///
/// The same config is re-issued unchanged on every retry attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestConfig {
    pub method: Method,
    /// Absolute URL, or a path resolved against the client's base URL.
    pub url: String,
    /// Header names are stored lowercase; setting a name twice replaces it.
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Overrides the client's per-attempt timeout.
    pub timeout_ms: Option<u64>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            timeout_ms: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Appends `page` and `size` query parameters used by the list endpoints.
    pub fn page(self, page: u32, size: u32) -> Self {
        self.query("page", page).query("size", size)
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|err| {
            CustodyHttpError::InvalidRequest(format!("request body is not serializable: {err}"))
        })?;
        Ok(self.body(value))
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::RequestConfig;

    #[test]
    fn header_names_are_unique_case_insensitively() {
        let config = RequestConfig::get("/wallets")
            .header("X-Trace-Id", "a")
            .header("x-trace-id", "b");

        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers.get("x-trace-id").map(String::as_str), Some("b"));
    }

    #[test]
    fn page_appends_query_pairs_in_order() {
        let config = RequestConfig::get("/transaction/list")
            .query("status", "PENDING")
            .page(2, 50);

        assert_eq!(
            config.query,
            vec![
                ("status".to_owned(), "PENDING".to_owned()),
                ("page".to_owned(), "2".to_owned()),
                ("size".to_owned(), "50".to_owned()),
            ]
        );
    }

    #[test]
    fn json_body_is_stored_as_value() {
        let config = RequestConfig::post("/wallet/search")
            .json(&json!({ "chain": "ETH" }))
            .expect("json value must serialize");

        assert_eq!(config.method, Method::POST);
        assert_eq!(config.body, Some(json!({ "chain": "ETH" })));
    }
}
