use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use chrono::{DateTime, Utc};
use duka_payment_engine::{traits::GatewayError, PaymentFlowError};
use log::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Too many payment requests. Try again after {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },
    #[error("Callback rejected. {0}")]
    CallbackRejected(String),
    #[error("{}", gateway_client_message(.0))]
    PaymentGateway(GatewayError),
}

/// What the client gets to see of a gateway failure. The raw detail is only logged.
fn gateway_client_message(e: &GatewayError) -> String {
    match e {
        GatewayError::Declined { reason, .. } => reason.clone(),
        GatewayError::InvalidPhone(_) => "The phone number cannot receive mobile money payment requests.".into(),
        GatewayError::InvalidAmount(_) => "The amount cannot be paid with this payment method.".into(),
        GatewayError::Network { timeout: true, .. } => {
            "The payment provider did not respond in time. Please check your phone before trying again.".into()
        },
        GatewayError::Unconfigured(_) => "This payment method is not available.".into(),
        _ => "The payment provider could not process the request. Please try again later.".into(),
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::CallbackRejected(_) => StatusCode::BAD_REQUEST,
            Self::PaymentGateway(e) => match e {
                GatewayError::Declined { .. } => StatusCode::BAD_REQUEST,
                GatewayError::InvalidPhone(_) => StatusCode::BAD_REQUEST,
                GatewayError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                GatewayError::IncompleteResponse(_) => StatusCode::BAD_GATEWAY,
                GatewayError::Network { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
                GatewayError::Network { timeout: false, .. } => StatusCode::INTERNAL_SERVER_ERROR,
                GatewayError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
                GatewayError::Unconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::RateLimited { reset_at } => {
                serde_json::json!({ "error": self.to_string(), "resetAt": reset_at })
            },
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::OrderNotFound(_) | PaymentFlowError::UnknownCheckoutRequest(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PaymentFlowError::Gateway(e) => {
                match &e {
                    GatewayError::Auth(_) | GatewayError::Unconfigured(_) => {
                        error!("💻️ Payment gateway misconfiguration. {e}")
                    },
                    _ => warn!("💻️ Payment gateway error. {e}"),
                }
                Self::PaymentGateway(e)
            },
            PaymentFlowError::Store(e) => {
                error!("💻️ Payment store error. {e}");
                Self::BackendError(e.to_string())
            },
            PaymentFlowError::InvalidPhone(_) |
            PaymentFlowError::InvalidAmount(_) |
            PaymentFlowError::Validation(_) |
            PaymentFlowError::AlreadyPaid(_) |
            PaymentFlowError::NotResendable { .. } |
            PaymentFlowError::NotCancellable { .. } |
            PaymentFlowError::MissingPhone(_) |
            PaymentFlowError::NoActiveRequest(_) |
            PaymentFlowError::IllegalTransition { .. } |
            PaymentFlowError::AmountMismatch { .. } |
            PaymentFlowError::CardNotSucceeded(_) => Self::InvalidRequest(e.to_string()),
        }
    }
}
