use cucumber::{given, then, when};
use duka_payment_engine::{
    db_types::{AttemptStatus, Kes, MobileMoneyStatus, NewOrder, NewOrderItem, OrderId, OrderStatusType},
    traits::{GatewayError, PushCallback, PushPaymentDetails, PushQueryResult},
    PaymentStore,
};

use crate::cucumber::PaymentsWorld;

#[given(expr = "an order {word} from customer {word} for KES {int}")]
async fn existing_order(world: &mut PaymentsWorld, order_id: String, customer_id: String, total: i64) {
    place_order(world, order_id, customer_id, total).await;
}

#[when(expr = "an order {word} from customer {word} for KES {int} is placed")]
async fn place_order(world: &mut PaymentsWorld, order_id: String, customer_id: String, total: i64) {
    let order = NewOrder::new(OrderId::from(order_id), customer_id, Kes::from(total))
        .with_item(NewOrderItem::new("sku-1", 1, Kes::from(total)));
    let result = world.system().orders.place_order(order).await;
    world.record(result);
}

#[when(expr = "the customer requests a push payment for order {word} from phone {string}")]
async fn initiate(world: &mut PaymentsWorld, order_id: String, phone: String) {
    let result = world.system().push.initiate(&OrderId::from(order_id), &phone).await;
    world.last_request = world.record(result);
}

#[when(expr = "the customer resends the payment request for order {word}")]
async fn resend(world: &mut PaymentsWorld, order_id: String) {
    let result = world.system().push.resend(&OrderId::from(order_id)).await;
    world.last_request = world.record(result);
}

#[when(expr = "the customer cancels the payment request for order {word}")]
async fn cancel(world: &mut PaymentsWorld, order_id: String) {
    let result = world.system().push.cancel(&OrderId::from(order_id)).await;
    world.record(result);
}

#[given(expr = "the push network will decline the next request with {string}")]
async fn decline_next(world: &mut PaymentsWorld, reason: String) {
    let err = GatewayError::Declined { reason: reason.clone(), detail: reason };
    world.system().push_gateway.fail_next_request(err);
}

#[given("the push network is unreachable")]
async fn network_down(world: &mut PaymentsWorld) {
    let err = GatewayError::Network { timeout: true, message: "operation timed out".into() };
    world.system().push_gateway.fail_next_request(err);
}

#[when(expr = "the network confirms request {word} with receipt {word} for KES {int}")]
async fn callback_success(world: &mut PaymentsWorld, checkout_request_id: String, receipt: String, amount: i64) {
    let callback = PushCallback {
        merchant_request_id: "mr".into(),
        checkout_request_id,
        result_code: 0,
        result_desc: "The service request is processed successfully.".into(),
        details: Some(PushPaymentDetails {
            amount: Kes::from(amount),
            receipt_number: receipt,
            transaction_date: Some("20240601120000".into()),
            phone: Some("254712345678".into()),
        }),
    };
    let result = world.system().push.process_callback(callback).await;
    world.last_outcome = world.record(result);
}

#[when(expr = "the network reports request {word} failed with code {int} and description {string}")]
async fn callback_failure(world: &mut PaymentsWorld, checkout_request_id: String, code: i64, desc: String) {
    let callback = PushCallback {
        merchant_request_id: "mr".into(),
        checkout_request_id,
        result_code: code,
        result_desc: desc,
        details: None,
    };
    let result = world.system().push.process_callback(callback).await;
    world.last_outcome = world.record(result);
}

#[given(expr = "the network says request {word} is still being processed")]
async fn query_processing(world: &mut PaymentsWorld, checkout_request_id: String) {
    world.system().push_gateway.set_query_result(&checkout_request_id, Ok(PushQueryResult::Processing));
}

#[given(expr = "the network says request {word} completed with code {int}")]
async fn query_completed(world: &mut PaymentsWorld, checkout_request_id: String, code: i64) {
    let result = PushQueryResult::Completed { result_code: code, result_desc: format!("Result {code}") };
    world.system().push_gateway.set_query_result(&checkout_request_id, Ok(result));
}

#[given(expr = "the network returns an incomplete answer for request {word}")]
async fn query_incomplete(world: &mut PaymentsWorld, checkout_request_id: String) {
    let err = GatewayError::IncompleteResponse("ResultCode is missing".into());
    world.system().push_gateway.set_query_result(&checkout_request_id, Err(err));
}

#[when(expr = "the payment status of order {word} is reconciled")]
async fn reconcile(world: &mut PaymentsWorld, order_id: String) {
    let result = world.system().push.reconcile_status(&OrderId::from(order_id)).await;
    world.record(result);
}

#[then("the last call succeeded")]
async fn last_call_succeeded(world: &mut PaymentsWorld) {
    assert!(world.last_error.is_none(), "Expected success, got {:?}", world.last_error);
}

#[then(expr = "the last call failed with {word}")]
async fn last_call_failed(world: &mut PaymentsWorld, kind: String) {
    let err = world.last_error.as_ref().expect("Expected the last call to fail");
    let name = format!("{err:?}");
    assert!(name.starts_with(&kind), "Expected a {kind} error, got {name}");
}

#[then(expr = "the callback outcome is {word}")]
async fn callback_outcome(world: &mut PaymentsWorld, kind: String) {
    let outcome = world.last_outcome.as_ref().expect("No callback outcome recorded");
    let name = format!("{outcome:?}");
    assert!(name.starts_with(&kind), "Expected {kind}, got {name}");
}

#[then(expr = "the push request {word} was sent to {word} for KES {int}")]
async fn request_sent(world: &mut PaymentsWorld, checkout_request_id: String, phone: String, amount: i64) {
    let sent = world.system().push_gateway.sent_requests();
    let request = sent
        .iter()
        .find(|r| r.checkout_request_id == checkout_request_id)
        .unwrap_or_else(|| panic!("Request {checkout_request_id} was never sent"));
    assert_eq!(request.phone, phone);
    assert_eq!(request.amount, Kes::from(amount));
}

#[then(expr = "{int} push request(s) was/were sent")]
async fn request_count(world: &mut PaymentsWorld, count: usize) {
    assert_eq!(world.system().push_gateway.sent_requests().len(), count);
}

#[then(expr = "order {word} has mobile money status {word}")]
async fn check_mm_status(world: &mut PaymentsWorld, order_id: String, status: String) {
    let order = world.order(&order_id).await;
    let expected = match status.as_str() {
        "none" => None,
        s => Some(s.parse::<MobileMoneyStatus>().expect("Invalid status")),
    };
    assert_eq!(order.mpesa_status, expected);
}

#[then(expr = "order {word} has status {word}")]
async fn check_order_status(world: &mut PaymentsWorld, order_id: String, status: String) {
    let order = world.order(&order_id).await;
    assert_eq!(order.status, status.parse::<OrderStatusType>().expect("Invalid status"));
}

#[then(expr = "order {word} is paid with receipt {word}")]
async fn check_paid(world: &mut PaymentsWorld, order_id: String, receipt: String) {
    let order = world.order(&order_id).await;
    assert!(order.is_paid(), "Order {order_id} is not paid");
    assert!(order.paid_at.is_some());
    assert_eq!(order.mpesa_receipt_number.as_deref(), Some(receipt.as_str()));
}

#[then(expr = "order {word} is not paid")]
async fn check_not_paid(world: &mut PaymentsWorld, order_id: String) {
    let order = world.order(&order_id).await;
    assert!(!order.is_paid(), "Order {order_id} should not be paid");
    assert!(order.paid_at.is_none());
}

#[then(expr = "order {word} has retry count {int}")]
async fn check_retry_count(world: &mut PaymentsWorld, order_id: String, count: i64) {
    let order = world.order(&order_id).await;
    assert_eq!(order.payment_retry_count, count);
}

#[then(expr = "order {word} has failure reason {string}")]
async fn check_failure_reason(world: &mut PaymentsWorld, order_id: String, reason: String) {
    let order = world.order(&order_id).await;
    let actual = order.payment_failure_reason.unwrap_or_default();
    assert!(actual.contains(&reason), "Expected failure reason to contain '{reason}', got '{actual}'");
}

#[then(expr = "the active request for order {word} is {word}")]
async fn check_active_request(world: &mut PaymentsWorld, order_id: String, checkout_request_id: String) {
    let order = world.order(&order_id).await;
    assert_eq!(order.mpesa_checkout_request_id.as_deref(), Some(checkout_request_id.as_str()));
}

#[then(expr = "the stored phone for order {word} is {word}")]
async fn check_phone(world: &mut PaymentsWorld, order_id: String, phone: String) {
    let order = world.order(&order_id).await;
    assert_eq!(order.mpesa_phone.as_deref(), Some(phone.as_str()));
}

#[then(expr = "attempt {word} has status {word}")]
async fn check_attempt(world: &mut PaymentsWorld, checkout_request_id: String, status: String) {
    let attempt = world
        .system()
        .db
        .fetch_attempt(&checkout_request_id)
        .await
        .expect("Error fetching attempt")
        .expect("Attempt does not exist");
    assert_eq!(attempt.status, status.parse::<AttemptStatus>().expect("Invalid status"));
}

#[then(expr = "order {word} has {int} payment attempt(s)")]
async fn check_attempt_count(world: &mut PaymentsWorld, order_id: String, count: usize) {
    let attempts = world.system().push.payment_attempts(&OrderId::from(order_id)).await.expect("Error fetching attempts");
    assert_eq!(attempts.len(), count);
}

#[then(expr = "order {word} has {int} item(s)")]
async fn check_items(world: &mut PaymentsWorld, order_id: String, count: usize) {
    let items = world.system().orders.order_items(&OrderId::from(order_id)).await.expect("Error fetching items");
    assert_eq!(items.len(), count);
}

#[then(expr = "the payment status record for order {word} shows {word}")]
async fn check_status_record(world: &mut PaymentsWorld, order_id: String, status: String) {
    let record =
        world.system().orders.payment_status(&OrderId::from(order_id)).await.expect("Error fetching payment status");
    match status.as_str() {
        "paid" => {
            assert!(record.is_paid());
            assert!(record.paid_at.is_some());
            assert!(record.receipt_number.is_some());
        },
        "failed" => assert!(record.is_failed()),
        s => assert_eq!(record.mobile_money_status, Some(s.parse().expect("Invalid status"))),
    }
}
