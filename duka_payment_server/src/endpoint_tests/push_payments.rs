use std::time::Duration;

use actix_web::{http::StatusCode, web::ServiceConfig};
use duka_payment_engine::{
    db_types::{AttemptStatus, Kes, MobileMoneyStatus},
    rate_limit::RateLimitConfig,
    traits::{GatewayError, PushAccepted},
    CANCELLED_BY_USER,
};
use log::*;
use serde_json::Value;

use super::{
    helpers::{attempt, new_order, post_request, push_order, register_push_routes},
    mocks::{MockPushGateway, MockStore},
};
use crate::config::CallbackAuthConfig;

const INITIATE_BODY: &str = r#"{"orderId":"1001","phone":"0712 345 678"}"#;

fn accepted() -> PushAccepted {
    PushAccepted {
        merchant_request_id: "29115-34620561-1".into(),
        checkout_request_id: "ws_CO_191220191020363925".into(),
        customer_message: "Success. Request accepted for processing".into(),
    }
}

fn default_limits() -> RateLimitConfig {
    RateLimitConfig::default()
}

#[actix_web::test]
async fn initiate_push_accepted() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/initiate", INITIATE_BODY, configure_initiate).await.expect("Request failed");
    info!("Response: {body}");
    assert_eq!(status, StatusCode::ACCEPTED);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["checkoutRequestId"], "ws_CO_191220191020363925");
    assert_eq!(json["merchantRequestId"], "29115-34620561-1");
}

fn configure_initiate(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(new_order(id.as_str()))));
    store.expect_record_push_initiated().times(1).returning(|expected, attempt| {
        assert_eq!(expected, None);
        assert_eq!(attempt.phone, "254712345678");
        assert_eq!(attempt.amount, Kes::from(4700));
        Ok(push_order(attempt.order_id.as_str(), MobileMoneyStatus::Initiated, &attempt.checkout_request_id))
    });
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().times(1).returning(|phone, amount, reference, _| {
        assert_eq!(phone, "254712345678");
        assert_eq!(amount, Kes::from(4700));
        assert_eq!(reference, "1001");
        Ok(accepted())
    });
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn initiate_push_invalid_phone() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"orderId":"1001","phone":"12345"}"#;
    let (status, body) = post_request("/payments/push/initiate", body, configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"), "{body}");
}

/// Neither the store nor the gateway may be called.
fn configure_untouched(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().never();
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().never();
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn initiate_push_unknown_order() {
    let _ = env_logger::try_init().ok();
    let (status, _) =
        post_request("/payments/push/initiate", INITIATE_BODY, configure_unknown_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn configure_unknown_order(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().never();
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn initiate_push_rate_limited() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/initiate", INITIATE_BODY, configure_rate_limited).await.expect("Request failed");
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert!(json["resetAt"].is_string(), "{body}");
}

fn configure_rate_limited(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().never();
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().never();
    let limits = RateLimitConfig { max_attempts: 0, window: Duration::from_secs(600) };
    register_push_routes(cfg, store, gateway, limits, CallbackAuthConfig::default());
}

#[actix_web::test]
async fn initiate_push_gateway_timeout() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/initiate", INITIATE_BODY, configure_timeout).await.expect("Request failed");
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(!body.contains("operation timed out"), "{body}");
}

fn configure_timeout(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(new_order(id.as_str()))));
    store.expect_record_push_initiated().never();
    let mut gateway = MockPushGateway::new();
    gateway
        .expect_request_payment()
        .returning(|_, _, _, _| Err(GatewayError::Network { timeout: true, message: "operation timed out".into() }));
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn initiate_push_declined() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/initiate", INITIATE_BODY, configure_declined).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "This number is not registered for M-Pesa.");
}

fn configure_declined(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(new_order(id.as_str()))));
    store.expect_record_push_initiated().never();
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().returning(|_, _, _, _| {
        Err(GatewayError::Declined {
            reason: "This number is not registered for M-Pesa.".into(),
            detail: "The initiator information is invalid".into(),
        })
    });
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn initiate_push_while_request_in_flight() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/initiate", INITIATE_BODY, configure_in_flight).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Resend it"), "{body}");
}

fn configure_in_flight(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|id| Ok(Some(push_order(id.as_str(), MobileMoneyStatus::Initiated, "ws_CO_1"))));
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().never();
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn resend_push_uses_stored_phone() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/resend", r#"{"orderId":"1001"}"#, configure_resend).await.expect("Request failed");
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["checkoutRequestId"], "ws_CO_191220191020363925");
}

fn configure_resend(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| {
        let mut order = push_order(id.as_str(), MobileMoneyStatus::Failed, "ws_CO_1");
        order.payment_failure_reason = Some("Request cancelled by user".into());
        Ok(Some(order))
    });
    store.expect_record_push_initiated().times(1).returning(|expected, attempt| {
        assert_eq!(expected, Some(MobileMoneyStatus::Failed));
        let mut order = push_order(attempt.order_id.as_str(), MobileMoneyStatus::Initiated, &attempt.checkout_request_id);
        order.payment_retry_count = 1;
        Ok(order)
    });
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().times(1).returning(|phone, _, _, _| {
        assert_eq!(phone, "254712345678");
        Ok(accepted())
    });
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn resend_push_not_resendable() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/payments/push/resend", r#"{"orderId":"1001"}"#, configure_not_resendable)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("status is none"), "{body}");
}

fn configure_not_resendable(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    // Nothing has been sent yet
    store.expect_fetch_order().returning(|id| Ok(Some(new_order(id.as_str()))));
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().never();
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn cancel_push_request() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/cancel", r#"{"orderId":"1001"}"#, configure_cancel).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
}

fn configure_cancel(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|id| Ok(Some(push_order(id.as_str(), MobileMoneyStatus::Initiated, "ws_CO_1"))));
    store.expect_update_mobile_money_status().times(1).returning(|id, expected, new, update| {
        assert_eq!(expected, Some(MobileMoneyStatus::Initiated));
        assert_eq!(new, MobileMoneyStatus::Failed);
        assert_eq!(update.failure_reason.as_deref(), Some(CANCELLED_BY_USER));
        let mut order = push_order(id.as_str(), MobileMoneyStatus::Failed, "ws_CO_1");
        order.payment_failure_reason = update.failure_reason;
        Ok(order)
    });
    store
        .expect_fetch_attempt()
        .returning(|id| Ok(Some(attempt("1001", id, AttemptStatus::Initiated))));
    store.expect_update_attempt_status().times(1).returning(|id, status, _, _| {
        assert_eq!(status, AttemptStatus::Failed);
        Ok(Some(attempt("1001", id, status)))
    });
    let mut gateway = MockPushGateway::new();
    gateway.expect_request_payment().never();
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn cancel_without_a_request() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("/payments/push/cancel", r#"{"orderId":"1001"}"#, configure_nothing_to_cancel)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_nothing_to_cancel(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(new_order(id.as_str()))));
    store.expect_update_mobile_money_status().never();
    let gateway = MockPushGateway::new();
    register_push_routes(cfg, store, gateway, default_limits(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn malformed_request_body() {
    let _ = env_logger::try_init().ok();
    let (status, _) =
        post_request("/payments/push/initiate", r#"{"order":"1001"}"#, configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
