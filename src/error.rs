use crate::retry::FailureKind;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum CustodyHttpError {
    /// Network, timeout or body error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Transient failure that occurred after the retry budget was spent.
    #[error("retries exhausted after {retries} retries: {last}")]
    Exhausted {
        /// Retries performed by the failing request chain.
        retries: u32,
        /// The failure of the final attempt.
        last: Box<CustodyHttpError>,
    },
    /// The overall deadline of a request chain was reached.
    #[error("deadline exceeded after {elapsed_ms} ms: {last}")]
    DeadlineExceeded {
        elapsed_ms: u64,
        last: Box<CustodyHttpError>,
    },
    /// The backend answered with `success: false` in its response envelope.
    #[error("api error: {message}")]
    Api { message: String },
    /// Response decoding or shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request could not be built (method, header, body encoding).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Missing or invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CustodyHttpError {
    /// Classifies this error for the retry policy.
    ///
    /// `Exhausted` and `DeadlineExceeded` are terminal and report the kind of
    /// the failure they wrap.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Transport(err) => FailureKind::from_transport(err),
            Self::Http { status, .. } => FailureKind::from_status(*status),
            Self::Exhausted { last, .. } | Self::DeadlineExceeded { last, .. } => {
                last.failure_kind()
            }
            Self::Api { .. } | Self::Decode(_) | Self::InvalidRequest(_) | Self::Config(_) => {
                FailureKind::NonTransient
            }
        }
    }

    /// Returns `true` if the underlying failure is a transient one.
    pub fn is_transient(&self) -> bool {
        self.failure_kind().is_transient()
    }

    /// HTTP status of the failing response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            Self::Exhausted { last, .. } | Self::DeadlineExceeded { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Response body of the failing response, if one was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } => Some(body),
            Self::Exhausted { last, .. } | Self::DeadlineExceeded { last, .. } => last.body(),
            _ => None,
        }
    }
}
