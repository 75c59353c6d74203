use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the processor: {0}")]
    Connection(String),
    #[error("The processor did not respond in time")]
    Timeout,
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Webhook signature header is malformed: {0}")]
    MalformedSignature(String),
    #[error("Webhook signature does not match the payload")]
    SignatureMismatch,
    #[error("Webhook timestamp is outside the tolerance window ({age}s old)")]
    StaleSignature { age: i64 },
}

impl ProcessorApiError {
    /// Server errors, rate limits and network failures are worth retrying. Anything else is a definite rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::QueryError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProcessorApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}
