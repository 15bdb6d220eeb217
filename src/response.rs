use reqwest::header::HeaderMap;
use serde::{de::DeserializeOwned, Deserialize};

use crate::{CustodyHttpError, Result};

/// Successful response, forwarded as received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Response headers, including repeated and non-UTF-8 values.
    pub headers: HeaderMap,
    /// Raw response body bytes.
    pub body: Vec<u8>,
    /// Retries the request chain performed before this response.
    pub retries: u32,
}

impl ApiResponse {
    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|err| CustodyHttpError::Decode(format!("response body is not UTF-8: {err}")))
    }

    /// Decodes the raw body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            CustodyHttpError::Decode(format!(
                "invalid response JSON: {err}; body: {}",
                String::from_utf8_lossy(&self.body)
            ))
        })
    }

    /// Decodes the `{ success, data, message }` envelope and returns `data`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        self.json::<ApiEnvelope<T>>()?.into_data()
    }
}

/// Envelope wrapping every dashboard endpoint payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_data(self) -> Result<T> {
        if !self.success {
            return Err(CustodyHttpError::Api {
                message: self
                    .message
                    .unwrap_or_else(|| "request was not successful".to_owned()),
            });
        }
        self.data
            .ok_or_else(|| CustodyHttpError::Decode("missing data in response envelope".to_owned()))
    }
}
