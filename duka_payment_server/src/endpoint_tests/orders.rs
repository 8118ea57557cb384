use actix_web::{http::StatusCode, web::ServiceConfig};
use duka_payment_engine::{
    db_types::{AttemptStatus, Kes, MobileMoneyStatus, Order, OrderStatusType},
    rate_limit::RateLimitConfig,
    traits::{GatewayError, PushQueryResult},
};
use log::*;
use serde_json::Value;

use super::{
    helpers::{
        attempt,
        get_request,
        new_order,
        paid_order,
        post_request,
        push_order,
        register_order_routes,
        register_push_routes,
    },
    mocks::{MockPushGateway, MockStore},
};
use crate::config::CallbackAuthConfig;

const NEW_ORDER: &str = r#"{
  "orderId": "1001",
  "customerId": "alice",
  "total": 4700,
  "items": [
    { "productId": "sku-kikoy-01", "quantity": 2, "unitPrice": 1500 },
    { "productId": "sku-kiondo-02", "quantity": 1, "unitPrice": 1700 }
  ]
}"#;

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[actix_web::test]
async fn place_new_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/orders", NEW_ORDER, configure_new_order).await.expect("Request failed");
    info!("Response: {body}");
    assert_eq!(status, StatusCode::CREATED);
    let placed = json(&body);
    assert_eq!(placed["orderId"], "1001");
    assert_eq!(placed["created"], true);
    assert_eq!(placed["total"], 4700);
    assert_eq!(placed["currency"], "KES");
}

fn configure_new_order(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_insert_order().times(1).returning(|order| {
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total_price, Kes::from(4700));
        Ok((new_order(order.order_id.as_str()), true))
    });
    register_order_routes(cfg, store);
}

#[actix_web::test]
async fn place_existing_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/orders", NEW_ORDER, configure_existing_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["created"], false);
}

fn configure_existing_order(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_insert_order().returning(|order| Ok((new_order(order.order_id.as_str()), false)));
    register_order_routes(cfg, store);
}

#[actix_web::test]
async fn place_order_without_customer() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"orderId":"1001","customerId":"  ","total":4700}"#;
    let (status, _) = post_request("/orders", body, configure_no_insert).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_no_insert(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_insert_order().never();
    register_order_routes(cfg, store);
}

#[actix_web::test]
async fn payment_status_of_paid_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/orders/1001/payment-status", configure_paid_status).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let record = json(&body);
    assert_eq!(record["orderId"], "1001");
    assert_eq!(record["status"], "processing");
    assert_eq!(record["paymentMethod"], "mobile_money");
    assert_eq!(record["mobileMoneyStatus"], "paid");
    assert_eq!(record["receiptNumber"], "NLJ7RT61SV");
    assert!(record["paidAt"].is_string());
}

fn configure_paid_status(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(paid_order(id.as_str(), "ws_CO_1", "NLJ7RT61SV"))));
    register_order_routes(cfg, store);
}

#[actix_web::test]
async fn payment_status_of_failed_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/orders/1001/payment-status", configure_failed_status).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let record = json(&body);
    assert_eq!(record["mobileMoneyStatus"], "failed");
    assert_eq!(record["failureReason"], "DS timeout user cannot be reached");
    assert_eq!(record["retryCount"], 2);
    assert!(record["paidAt"].is_null());
}

fn configure_failed_status(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| {
        Ok(Some(Order {
            payment_failure_reason: Some("DS timeout user cannot be reached".into()),
            payment_retry_count: 2,
            ..push_order(id.as_str(), MobileMoneyStatus::Failed, "ws_CO_3")
        }))
    });
    register_order_routes(cfg, store);
}

#[actix_web::test]
async fn payment_status_of_unknown_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/orders/9999/payment-status", configure_no_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("9999"), "{body}");
}

fn configure_no_orders(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    register_order_routes(cfg, store);
}

#[actix_web::test]
async fn payment_attempt_history() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/orders/1001/payment-attempts", configure_attempts).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let attempts = json(&body);
    let attempts = attempts.as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["status"], "superseded");
    assert_eq!(attempts[1]["status"], "initiated");
}

fn configure_attempts(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|id| Ok(Some(push_order(id.as_str(), MobileMoneyStatus::Initiated, "ws_CO_2"))));
    store.expect_fetch_attempts_for_order().returning(|id| {
        Ok(vec![
            attempt(id.as_str(), "ws_CO_1", AttemptStatus::Superseded),
            attempt(id.as_str(), "ws_CO_2", AttemptStatus::Initiated),
        ])
    });
    register_push_routes(cfg, store, MockPushGateway::new(), RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn query_push_still_processing() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/query", r#"{"orderId":"1001"}"#, configure_processing).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let record = json(&body);
    // Only the attempt is marked pending, so the request can still be resent or cancelled
    assert_eq!(record["mobileMoneyStatus"], "initiated");
    assert_eq!(record["status"], "pending");
}

fn configure_processing(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|id| Ok(Some(push_order(id.as_str(), MobileMoneyStatus::Initiated, "ws_CO_1"))));
    store.expect_update_attempt_status().times(1).returning(|id, status, _, _| {
        assert_eq!(status, AttemptStatus::Pending);
        Ok(Some(attempt("1001", id, status)))
    });
    store.expect_update_mobile_money_status().never();
    let mut gateway = MockPushGateway::new();
    gateway.expect_query_payment().times(1).returning(|_| Ok(PushQueryResult::Processing));
    register_push_routes(cfg, store, gateway, RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn query_push_completed() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/payments/push/query", r#"{"orderId":"1001"}"#, configure_query_paid).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let record = json(&body);
    assert_eq!(record["mobileMoneyStatus"], "paid");
    assert_eq!(record["receiptNumber"], "query:ws_CO_1");
}

fn configure_query_paid(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|id| Ok(Some(push_order(id.as_str(), MobileMoneyStatus::Initiated, "ws_CO_1"))));
    store.expect_update_attempt_status().returning(|id, status, _, _| Ok(Some(attempt("1001", id, status))));
    store.expect_update_mobile_money_status().times(1).returning(|id, _, new, update| {
        assert_eq!(new, MobileMoneyStatus::Paid);
        let receipt = update.receipt_number.unwrap_or_default();
        Ok(Order { status: OrderStatusType::Processing, ..paid_order(id.as_str(), "ws_CO_1", &receipt) })
    });
    let mut gateway = MockPushGateway::new();
    gateway.expect_query_payment().returning(|_| {
        Ok(PushQueryResult::Completed {
            result_code: 0,
            result_desc: "The service request is processed successfully.".into(),
        })
    });
    register_push_routes(cfg, store, gateway, RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn query_push_incomplete_response() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("/payments/push/query", r#"{"orderId":"1001"}"#, configure_incomplete)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

fn configure_incomplete(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|id| Ok(Some(push_order(id.as_str(), MobileMoneyStatus::Initiated, "ws_CO_1"))));
    store.expect_update_attempt_status().never();
    store.expect_update_mobile_money_status().never();
    let mut gateway = MockPushGateway::new();
    gateway
        .expect_query_payment()
        .returning(|_| Err(GatewayError::IncompleteResponse("Query response has no ResultCode".into())));
    register_push_routes(cfg, store, gateway, RateLimitConfig::default(), CallbackAuthConfig::default());
}

#[actix_web::test]
async fn query_push_without_request() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("/payments/push/query", r#"{"orderId":"1001"}"#, configure_no_request)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_no_request(cfg: &mut ServiceConfig) {
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(new_order(id.as_str()))));
    let mut gateway = MockPushGateway::new();
    gateway.expect_query_payment().never();
    register_push_routes(cfg, store, gateway, RateLimitConfig::default(), CallbackAuthConfig::default());
}
