use duka_common::PhoneError;
use thiserror::Error;

use crate::{
    db_types::{Kes, MobileMoneyStatus, OrderId},
    traits::{GatewayError, PaymentStoreError},
};

/// Everything that can go wrong in a payment flow.
#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("{0}")]
    Store(PaymentStoreError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No order is linked to checkout request {0}")]
    UnknownCheckoutRequest(String),
    #[error("Invalid phone number. {0}")]
    InvalidPhone(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("{0}")]
    Validation(String),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),
    #[error("A payment request for order {order_id} cannot be resent while its status is {status}")]
    NotResendable { order_id: OrderId, status: String },
    #[error("The payment request for order {order_id} cannot be cancelled while its status is {status}")]
    NotCancellable { order_id: OrderId, status: String },
    #[error("Order {0} has no phone number on record to resend the payment request to")]
    MissingPhone(OrderId),
    #[error("Order {0} has no outstanding payment request")]
    NoActiveRequest(OrderId),
    #[error("Illegal payment status change for order {order_id}: {from} -> {to}")]
    IllegalTransition { order_id: OrderId, from: String, to: MobileMoneyStatus },
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("The amount paid ({received}) does not match the order total ({expected})")]
    AmountMismatch { expected: Kes, received: Kes },
    #[error("The card payment was not completed. Status: {0}")]
    CardNotSucceeded(String),
}

impl From<PaymentStoreError> for PaymentFlowError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::OrderNotFound(oid) => Self::OrderNotFound(oid),
            PaymentStoreError::AlreadyPaid(oid) => Self::AlreadyPaid(oid),
            PaymentStoreError::IllegalTransition { order_id, from, to } => {
                Self::IllegalTransition { order_id, from, to }
            },
            PaymentStoreError::InvalidOrder(_, msg) => Self::Validation(msg),
            e => Self::Store(e),
        }
    }
}

impl From<PhoneError> for PaymentFlowError {
    fn from(e: PhoneError) -> Self {
        match e {
            PhoneError::InvalidPhone(raw) => Self::InvalidPhone(format!("'{raw}' is not a valid mobile number")),
        }
    }
}
