use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use serde_json::json;
use settlement_engine::SettlementError;
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
    #[error("{0}")]
    Settlement(#[from] SettlementError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Settlement(e) => settlement_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::Settlement(SettlementError::DuplicateOrder(order_no)) => {
                json!({ "error": self.to_string(), "order_no": order_no })
            },
            // Don't leak database details to callers
            Self::Settlement(SettlementError::DatabaseError(_)) | Self::BackendError(_) => {
                json!({ "error": "An error occurred on the backend of the server." })
            },
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

fn settlement_status(e: &SettlementError) -> StatusCode {
    match e {
        SettlementError::InvalidSignature => StatusCode::UNAUTHORIZED,
        SettlementError::CallbackSignatureInvalid => StatusCode::UNAUTHORIZED,
        SettlementError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        SettlementError::UnknownMerchant(_) => StatusCode::NOT_FOUND,
        SettlementError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::MerchantInactive(_) => StatusCode::FORBIDDEN,
        SettlementError::BelowMinimumAmount { .. } => StatusCode::BAD_REQUEST,
        SettlementError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SettlementError::NotAPayout(_) => StatusCode::BAD_REQUEST,
        SettlementError::DuplicateOrder(_) => StatusCode::CONFLICT,
        SettlementError::AlreadyProcessing(_) => StatusCode::CONFLICT,
        SettlementError::OrderAlreadyFinalized(..) => StatusCode::CONFLICT,
        SettlementError::DuplicateCredit(_) => StatusCode::CONFLICT,
        SettlementError::UpstreamSubmissionFailed { .. } => StatusCode::BAD_GATEWAY,
        SettlementError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SettlementError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SettlementError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
