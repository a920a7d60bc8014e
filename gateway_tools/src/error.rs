use thiserror::Error;

/// Errors returned by the upstream provider clients.
///
/// The variants are split by what they imply about the money: [`GatewayApiError::Rejected`] and
/// [`GatewayApiError::Network`] mean the provider definitely did not accept the request, while
/// [`GatewayApiError::OutcomeUnknown`] means it may have.
#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the provider: {0}")]
    Network(String),
    #[error("The provider did not answer in time, or the answer was lost: {0}")]
    OutcomeUnknown(String),
    #[error("The provider rejected the request. Code {code}. {message}")]
    Rejected { code: String, message: String },
    #[error("Invalid callback payload: {0}")]
    InvalidCallback(String),
    #[error("Callback signature is invalid")]
    CallbackSignatureInvalid,
    #[error("{0}")]
    UnsupportedAccount(String),
}

impl GatewayApiError {
    /// True if the request definitely did not result in money moving at the provider.
    pub fn is_definite_failure(&self) -> bool {
        !matches!(self, Self::OutcomeUnknown(_))
    }
}

impl From<reqwest::Error> for GatewayApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_builder() {
            Self::Network(e.to_string())
        } else {
            Self::OutcomeUnknown(e.to_string())
        }
    }
}
