use actix_web::{http::StatusCode, web::ServiceConfig};
use chrono::Utc;
use duka_payment_engine::{
    db_types::{AttemptStatus, MobileMoneyStatus, OrderStatusType},
    rate_limit::RateLimitConfig,
    traits::PushCallback,
};
use serde_json::Value;

use super::{
    helpers::{attempt, paid_order, post_request, post_request_with_headers, push_order, register_push_routes},
    mocks::{MockPushGateway, MockStore},
};
use crate::{config::CallbackAuthConfig, helpers::calculate_callback_token, routes::CALLBACK_TOKEN_HEADER};

const CHECKOUT_ID: &str = "ws_CO_191220191020363925";
const SECRET: &str = "callback-secret";

const PAID_CALLBACK: &str = r#"{
  "Body": {
    "stkCallback": {
      "MerchantRequestID": "29115-34620561-1",
      "CheckoutRequestID": "ws_CO_191220191020363925",
      "ResultCode": 0,
      "ResultDesc": "The service request is processed successfully.",
      "CallbackMetadata": {
        "Item": [
          { "Name": "Amount", "Value": 4700.00 },
          { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
          { "Name": "TransactionDate", "Value": 20191219102115 },
          { "Name": "PhoneNumber", "Value": 254712345678 }
        ]
      }
    }
  }
}"#;

const CANCELLED_CALLBACK: &str = r#"{
  "Body": {
    "stkCallback": {
      "MerchantRequestID": "29115-34620561-1",
      "CheckoutRequestID": "ws_CO_191220191020363925",
      "ResultCode": 1032,
      "ResultDesc": "Request cancelled by user"
    }
  }
}"#;

fn ack(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[actix_web::test]
async fn malformed_callback_is_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/callback", "{not json", configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid callback payload"), "{body}");
}

#[actix_web::test]
async fn callback_without_checkout_request_id_is_rejected() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"Body":{"stkCallback":{"MerchantRequestID":"29115-34620561-1","ResultCode":1032}}}"#;
    let (status, body) =
        post_request("/payments/push/callback", payload, configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("CheckoutRequestID"), "{body}");
}

#[actix_web::test]
async fn success_without_metadata_is_rejected() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"Body":{"stkCallback":{"MerchantRequestID":"1","CheckoutRequestID":"ws_CO_1","ResultCode":0}}}"#;
    let (status, _) = post_request("/payments/push/callback", payload, configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order_by_checkout_request_id().never();
    store.expect_update_attempt_status().never();
    store.expect_update_mobile_money_status().never();
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn successful_callback_marks_order_paid() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/callback", PAID_CALLBACK, configure_paid).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&body)["status"], "OK");
}

fn configure_paid(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order_by_checkout_request_id()
        .returning(|id| Ok(Some(push_order("1001", MobileMoneyStatus::Pending, id))));
    store.expect_update_attempt_status().times(1).returning(|id, status, code, _| {
        assert_eq!(status, AttemptStatus::Paid);
        assert_eq!(code, Some(0));
        Ok(Some(attempt("1001", id, status)))
    });
    store.expect_update_mobile_money_status().times(1).returning(|id, expected, new, update| {
        assert_eq!(expected, Some(MobileMoneyStatus::Pending));
        assert_eq!(new, MobileMoneyStatus::Paid);
        assert_eq!(update.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        let mut order = paid_order(id.as_str(), CHECKOUT_ID, "NLJ7RT61SV");
        order.paid_at = update.paid_at.or_else(|| Some(Utc::now()));
        assert_eq!(order.status, OrderStatusType::Processing);
        Ok(order)
    });
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn duplicate_callback_leaves_paid_order_alone() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/callback", PAID_CALLBACK, configure_duplicate).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&body)["status"], "OK");
}

fn configure_duplicate(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order_by_checkout_request_id()
        .returning(|id| Ok(Some(paid_order("1001", id, "NLJ7RT61SV"))));
    // A paid attempt is never changed, so the store reports nothing updated
    store.expect_update_attempt_status().returning(|_, _, _, _| Ok(None));
    store.expect_update_mobile_money_status().never();
    store.expect_replace_receipt_number().never();
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn unknown_checkout_request_is_acknowledged_with_error() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/callback", CANCELLED_CALLBACK, configure_unknown).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack = ack(&body);
    assert_eq!(ack["status"], "ERROR");
    assert!(ack["message"].as_str().unwrap().contains(CHECKOUT_ID));
}

fn configure_unknown(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order_by_checkout_request_id().returning(|_| Ok(None));
    store.expect_update_attempt_status().never();
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn cancelled_callback_fails_the_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/callback", CANCELLED_CALLBACK, configure_cancelled).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&body)["status"], "OK");
}

fn configure_cancelled(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order_by_checkout_request_id()
        .returning(|id| Ok(Some(push_order("1001", MobileMoneyStatus::Initiated, id))));
    store.expect_update_attempt_status().times(1).returning(|id, status, code, _| {
        assert_eq!(status, AttemptStatus::Failed);
        assert_eq!(code, Some(1032));
        Ok(Some(attempt("1001", id, status)))
    });
    store.expect_update_mobile_money_status().times(1).returning(|id, _, new, update| {
        assert_eq!(new, MobileMoneyStatus::Failed);
        assert_eq!(update.failure_reason.as_deref(), Some("Request cancelled by user"));
        Ok(push_order(id.as_str(), MobileMoneyStatus::Failed, CHECKOUT_ID))
    });
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn superseded_failure_only_updates_the_attempt() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/callback", CANCELLED_CALLBACK, configure_superseded).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&body)["status"], "OK");
}

fn configure_superseded(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    // The order has moved on to a newer request
    store
        .expect_fetch_order_by_checkout_request_id()
        .returning(|_| Ok(Some(push_order("1001", MobileMoneyStatus::Initiated, "ws_CO_191220191020369999"))));
    store.expect_update_attempt_status().times(1).returning(|id, status, _, _| Ok(Some(attempt("1001", id, status))));
    store.expect_update_mobile_money_status().never();
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn callback_with_bad_token_is_rejected() {
    let _ = env_logger::try_init().ok();
    let headers = [(CALLBACK_TOKEN_HEADER, "c2lnbmVkIGJ5IHNvbWVvbmUgZWxzZQ")];
    let (status, _) = post_request_with_headers("/payments/push/callback", PAID_CALLBACK, &headers, configure_strict)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn callback_without_required_token_is_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, _) =
        post_request("/payments/push/callback", PAID_CALLBACK, configure_strict).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_strict(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order_by_checkout_request_id().never();
    store.expect_update_attempt_status().never();
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), strict_auth());
}

fn strict_auth() -> CallbackAuthConfig {
    CallbackAuthConfig::new(SECRET, true)
}

#[actix_web::test]
async fn callback_token_in_query_string() {
    let _ = env_logger::try_init().ok();
    let token = calculate_callback_token(SECRET, CHECKOUT_ID).unwrap();
    let path = format!("/payments/push/callback?token={token}");
    let (status, body) = post_request(&path, CANCELLED_CALLBACK, configure_strict_cancelled).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ack(&body)["status"], "OK");
}

#[actix_web::test]
async fn callback_token_in_header() {
    let _ = env_logger::try_init().ok();
    let token = calculate_callback_token(SECRET, CHECKOUT_ID).unwrap();
    let headers = [(CALLBACK_TOKEN_HEADER, token.as_str())];
    let (status, body) =
        post_request_with_headers("/payments/push/callback", CANCELLED_CALLBACK, &headers, configure_strict_cancelled)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
}

fn configure_strict_cancelled(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order_by_checkout_request_id()
        .returning(|id| Ok(Some(push_order("1001", MobileMoneyStatus::Failed, id))));
    store.expect_update_attempt_status().times(1).returning(|id, status, code, _| {
        assert_eq!(status, AttemptStatus::Failed);
        assert_eq!(code, Some(1032));
        Ok(Some(attempt("1001", id, status)))
    });
    // The order has already failed, so its failure reason is left alone
    store.expect_update_mobile_money_status().never();
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), strict_auth());
}

#[test]
fn validated_callback_converts_to_engine_callback() {
    let envelope: mpesa_tools::StkCallbackEnvelope = serde_json::from_str(PAID_CALLBACK).unwrap();
    let callback: PushCallback = crate::integrations::mpesa::to_push_callback(envelope.validate().unwrap());
    assert!(callback.is_success());
    assert_eq!(callback.details.unwrap().receipt_number, "NLJ7RT61SV");
}
