//! `custody-http` is the retrying HTTP client behind the custody platform
//! admin dashboard.
//!
//! Every request carries the configured bearer credentials. Gateway errors
//! (502/503), timeouts and connection failures are retried with exponential
//! backoff (1s, 2s, 4s by default); everything else is surfaced immediately.
//! Entry points:
//! - [`RetryingHttpClient::send`]
//! - [`RetryingHttpClient::get_data`]
//! - [`RetryingHttpClient::post_json`]

mod client;
mod error;
mod options;
mod request;
mod response;
pub mod retry;
mod runtime;

pub use client::RetryingHttpClient;
pub use error::CustodyHttpError;
pub use options::{ClientOptions, RetryBudget};
pub use request::RequestConfig;
pub use response::{ApiEnvelope, ApiResponse};
pub use retry::{FailureKind, RetryDecision, RetryPolicy};

pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, CustodyHttpError>;
