use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use duka_common::Kes;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The fulfilment status of an order. Payment progress is tracked separately, in [`MobileMoneyStatus`] and `paid_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been placed, but not paid for.
    #[default]
    Pending,
    /// The order has been paid and is being prepared.
    Processing,
    Shipped,
    Delivered,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Processing => write!(f, "processing"),
            OrderStatusType::Shipped => write!(f, "shipped"),
            OrderStatusType::Delivered => write!(f, "delivered"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            s => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    MobileMoney,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::MobileMoney => write!(f, "mobile_money"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "mobile_money" => Ok(Self::MobileMoney),
            s => Err(ConversionError::new("payment method", s)),
        }
    }
}

//--------------------------------------  MobileMoneyStatus    ---------------------------------------------------------
/// Progress of a push payment for an order.
///
/// | From \ To   | Initiated | Pending | Paid | Failed |
/// |-------------|-----------|---------|------|--------|
/// | (none)      | yes       |         |      |        |
/// | Initiated   | resend    | yes     | yes  | yes    |
/// | Pending     |           |         | yes  | yes    |
/// | Paid        |           |         |      |        |
/// | Failed      | resend    |         | late | cancel |
///
/// `Paid` is terminal. A `Failed -> Paid` transition is a late success (the customer paid after the order was
/// cancelled or timed out) and is applied, since the money has already moved. `Failed -> Failed` only updates the
/// failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MobileMoneyStatus {
    Initiated,
    Pending,
    Paid,
    Failed,
}

impl MobileMoneyStatus {
    /// Whether an order whose push status is `from` may move to `to`. `None` means no push was ever sent.
    pub fn can_transition(from: Option<MobileMoneyStatus>, to: MobileMoneyStatus) -> bool {
        use MobileMoneyStatus::*;
        matches!(
            (from, to),
            (None, Initiated) |
                (Some(Initiated), Initiated | Pending | Paid | Failed) |
                (Some(Pending), Paid | Failed) |
                (Some(Failed), Initiated | Paid | Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MobileMoneyStatus::Paid)
    }

    /// Resend and cancel are only offered while a request is outstanding, or after it failed.
    pub fn is_resendable(&self) -> bool {
        matches!(self, MobileMoneyStatus::Initiated | MobileMoneyStatus::Failed)
    }
}

impl Display for MobileMoneyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MobileMoneyStatus::Initiated => write!(f, "initiated"),
            MobileMoneyStatus::Pending => write!(f, "pending"),
            MobileMoneyStatus::Paid => write!(f, "paid"),
            MobileMoneyStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for MobileMoneyStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError::new("mobile money status", s)),
        }
    }
}

//--------------------------------------    AttemptStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Initiated,
    Pending,
    Paid,
    Failed,
    /// A newer push request replaced this one.
    Superseded,
}

impl AttemptStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, AttemptStatus::Initiated | AttemptStatus::Pending)
    }
}

impl Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Initiated => write!(f, "initiated"),
            AttemptStatus::Pending => write!(f, "pending"),
            AttemptStatus::Paid => write!(f, "paid"),
            AttemptStatus::Failed => write!(f, "failed"),
            AttemptStatus::Superseded => write!(f, "superseded"),
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "superseded" => Ok(Self::Superseded),
            s => Err(ConversionError::new("attempt status", s)),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_price: Kes,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub card_transaction_ref: Option<String>,
    pub mpesa_merchant_request_id: Option<String>,
    pub mpesa_checkout_request_id: Option<String>,
    pub mpesa_receipt_number: Option<String>,
    pub mpesa_phone: Option<String>,
    pub mpesa_status: Option<MobileMoneyStatus>,
    pub payment_retry_count: i64,
    pub payment_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// True once either rail has confirmed payment.
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some() || self.mpesa_status == Some(MobileMoneyStatus::Paid)
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// The order number as assigned by the storefront
    pub order_id: OrderId,
    pub customer_id: String,
    /// The total price of the order, in whole shillings
    pub total_price: Kes,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, total_price: Kes) -> Self {
        Self {
            order_id,
            customer_id,
            total_price,
            currency: duka_common::KES_CURRENCY_CODE.to_string(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Kes,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_id: S, quantity: i64, unit_price: Kes) -> Self {
        Self { product_id: product_id.into(), quantity, unit_price }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Kes,
}

//--------------------------------------    PaymentAttempt     ---------------------------------------------------------
/// One push request sent to the network for an order. Every initiate and resend creates one.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: i64,
    pub order_id: OrderId,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub phone: String,
    pub amount: Kes,
    pub status: AttemptStatus,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentAttempt {
    pub order_id: OrderId,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub phone: String,
    pub amount: Kes,
}
