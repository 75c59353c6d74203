use activation_engine::{
    AdminError,
    CheckoutError,
    CompletionError,
    FundingError,
    LedgerError,
    StoreError,
    ValidationError,
    WebhookError,
};
use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request was understood but cannot be carried out. {0}")]
    Rejected(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("The payment processor is unavailable. {0}")]
    Unavailable(String),
    #[error("Missing or invalid admin token")]
    Unauthorized,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TransactionNotFound(_) | StoreError::SubjectNotFound(_) => Self::NoRecordFound(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match &e {
            CheckoutError::Validation(ValidationError::SubjectNotFound(_))
            | CheckoutError::Validation(ValidationError::TransactionNotFound(_)) => Self::NoRecordFound(e.to_string()),
            CheckoutError::Validation(ValidationError::NotRetryable { .. }) => Self::Conflict(e.to_string()),
            CheckoutError::Validation(_) => Self::Rejected(e.to_string()),
            CheckoutError::Funding(FundingError::InsufficientBudget { .. }) => Self::Rejected(e.to_string()),
            CheckoutError::Funding(FundingError::SessionUnavailable { .. }) => Self::Unavailable(e.to_string()),
            CheckoutError::Internal(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CompletionError> for ServerError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::TransactionNotFound(_) => Self::NoRecordFound(e.to_string()),
            CompletionError::Store(e) => e.into(),
            e => Self::Conflict(e.to_string()),
        }
    }
}

impl From<AdminError> for ServerError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::TransactionNotFound(_) => Self::NoRecordFound(e.to_string()),
            AdminError::NotFlagged { .. } => Self::Conflict(e.to_string()),
            AdminError::Completion(e) => e.into(),
            AdminError::Store(e) => e.into(),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::BusinessNotFound(_) => Self::NoRecordFound(e.to_string()),
            LedgerError::InvalidAmount(_) | LedgerError::InvalidPeriod => Self::InvalidRequestBody(e.to_string()),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::InvalidSignature(_) | WebhookError::MalformedPayload(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            WebhookError::Transient(_) => Self::BackendError(e.to_string()),
        }
    }
}
