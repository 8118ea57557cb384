use chrono::{DateTime, Utc};
use duka_payment_engine::{
    db_types::{
        AttemptStatus,
        Kes,
        MobileMoneyStatus,
        NewOrder,
        NewPaymentAttempt,
        Order,
        OrderId,
        OrderItem,
        PaymentAttempt,
    },
    traits::{
        CardIntent,
        CardPaymentGateway,
        GatewayError,
        MobileMoneyUpdate,
        PaymentStore,
        PaymentStoreError,
        PushAccepted,
        PushPaymentGateway,
        PushQueryResult,
    },
};
use mockall::mock;

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl PaymentStore for Store {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentStoreError>;
        async fn fetch_order_by_checkout_request_id(&self, checkout_request_id: &str) -> Result<Option<Order>, PaymentStoreError>;
        async fn fetch_attempt(&self, checkout_request_id: &str) -> Result<Option<PaymentAttempt>, PaymentStoreError>;
        async fn fetch_attempts_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PaymentStoreError>;
        async fn record_push_initiated(&self, expected: Option<MobileMoneyStatus>, attempt: NewPaymentAttempt) -> Result<Order, PaymentStoreError>;
        async fn update_mobile_money_status(&self, order_id: &OrderId, expected: Option<MobileMoneyStatus>, new: MobileMoneyStatus, update: MobileMoneyUpdate) -> Result<Order, PaymentStoreError>;
        async fn replace_receipt_number(&self, order_id: &OrderId, provisional: &str, receipt_number: &str) -> Result<Option<Order>, PaymentStoreError>;
        async fn update_attempt_status(&self, checkout_request_id: &str, status: AttemptStatus, result_code: Option<i64>, result_desc: Option<String>) -> Result<Option<PaymentAttempt>, PaymentStoreError>;
        async fn record_card_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<Order, PaymentStoreError>;
        async fn mark_card_paid(&self, order_id: &OrderId, intent_id: &str, paid_at: DateTime<Utc>) -> Result<Order, PaymentStoreError>;
    }
}

mock! {
    pub PushGateway {}
    impl Clone for PushGateway {
        fn clone(&self) -> Self;
    }
    impl PushPaymentGateway for PushGateway {
        async fn request_payment(&self, phone: &str, amount: Kes, account_reference: &str, description: &str) -> Result<PushAccepted, GatewayError>;
        async fn query_payment(&self, checkout_request_id: &str) -> Result<PushQueryResult, GatewayError>;
    }
}

mock! {
    pub CardGateway {}
    impl Clone for CardGateway {
        fn clone(&self) -> Self;
    }
    impl CardPaymentGateway for CardGateway {
        fn is_configured(&self) -> bool;
        async fn create_intent(&self, amount: Kes, currency: &str, order_id: &OrderId) -> Result<CardIntent, GatewayError>;
        async fn fetch_intent(&self, intent_id: &str) -> Result<CardIntent, GatewayError>;
    }
}
