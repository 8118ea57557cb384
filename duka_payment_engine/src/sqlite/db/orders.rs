use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{MobileMoneyStatus, NewOrder, NewOrderItem, Order, OrderId, OrderItem},
    traits::{MobileMoneyUpdate, PaymentStoreError},
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentStoreError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order and its items using the given connection. This is not atomic. Embed this call inside a
/// transaction and pass `&mut *tx` as the connection argument if the header and items must land together.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentStoreError> {
    if !order.total_price.is_positive() {
        return Err(PaymentStoreError::InvalidOrder(order.order_id, "The order total must be positive".into()));
    }
    if let Some(item) = order.items.iter().find(|i| i.quantity <= 0 || i.unit_price.value() < 0) {
        return Err(PaymentStoreError::InvalidOrder(
            order.order_id.clone(),
            format!("Item {} has an invalid quantity or price", item.product_id),
        ));
    }
    let record: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                total_price,
                currency,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.customer_id)
    .bind(order.total_price.value())
    .bind(&order.currency)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        insert_order_item(&record.order_id, item, conn).await?;
    }
    trace!("🗃️ {} items stored for order [{}]", order.items.len(), record.order_id);
    Ok(record)
}

async fn insert_order_item(
    order_id: &OrderId,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentStoreError> {
    sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES ($1, $2, $3, $4)")
        .bind(order_id.as_str())
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price.value())
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Finds the order for a checkout request id, looking at the order's active request first and then at the attempt
/// history, so that results for superseded requests can still be matched to their order.
pub async fn fetch_order_by_checkout_request_id(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE mpesa_checkout_request_id = $1
           OR order_id = (SELECT order_id FROM payment_attempts WHERE checkout_request_id = $1)
        LIMIT 1
        "#,
    )
    .bind(checkout_request_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Compare-and-set update that makes `checkout_request_id` the order's active push request.
///
/// Returns `None` if the order's push status is no longer `expected`, or if the order has been paid in the meantime.
pub(crate) async fn set_push_initiated(
    order_id: &OrderId,
    expected: Option<MobileMoneyStatus>,
    merchant_request_id: &str,
    checkout_request_id: &str,
    phone: &str,
    is_retry: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentStoreError> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            mpesa_status = 'initiated',
            payment_method = 'mobile_money',
            mpesa_merchant_request_id = $1,
            mpesa_checkout_request_id = $2,
            mpesa_phone = $3,
            payment_retry_count = payment_retry_count + $4,
            payment_failure_reason = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $5 AND mpesa_status IS $6 AND paid_at IS NULL
        RETURNING *
        "#,
    )
    .bind(merchant_request_id)
    .bind(checkout_request_id)
    .bind(phone)
    .bind(i64::from(is_retry))
    .bind(order_id.as_str())
    .bind(expected.map(|s| s.to_string()))
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Compare-and-set update of the push status. The caller is responsible for checking that the transition is legal.
///
/// Returns `None` if the stored status is no longer `expected`. An order paid by either rail is never matched.
pub(crate) async fn update_push_status(
    order_id: &OrderId,
    expected: Option<MobileMoneyStatus>,
    new: MobileMoneyStatus,
    update: MobileMoneyUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentStoreError> {
    let failure_reason = match new {
        MobileMoneyStatus::Failed => update.failure_reason,
        _ => None,
    };
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            mpesa_status = $1,
            mpesa_receipt_number = COALESCE($2, mpesa_receipt_number),
            paid_at = COALESCE($3, paid_at),
            payment_failure_reason = $4,
            status = CASE WHEN $1 = 'paid' AND status = 'pending' THEN 'processing' ELSE status END,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $5 AND mpesa_status IS $6 AND mpesa_status IS NOT 'paid' AND paid_at IS NULL
        RETURNING *
        "#,
    )
    .bind(new.to_string())
    .bind(update.receipt_number)
    .bind(update.paid_at)
    .bind(failure_reason)
    .bind(order_id.as_str())
    .bind(expected.map(|s| s.to_string()))
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub(crate) async fn replace_receipt_number(
    order_id: &OrderId,
    provisional: &str,
    receipt_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentStoreError> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET mpesa_receipt_number = $1, updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $2 AND mpesa_status = 'paid' AND mpesa_receipt_number = $3
        RETURNING *
        "#,
    )
    .bind(receipt_number)
    .bind(order_id.as_str())
    .bind(provisional)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Links a card intent to the order. Returns `None` if the order does not exist or has already been paid.
pub(crate) async fn set_card_intent(
    order_id: &OrderId,
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentStoreError> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET payment_method = 'card', card_transaction_ref = $1, updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $2 AND paid_at IS NULL
        RETURNING *
        "#,
    )
    .bind(intent_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Compare-and-set on `paid_at IS NULL`. Returns `None` if the order is already paid (by either rail).
pub(crate) async fn set_card_paid(
    order_id: &OrderId,
    intent_id: &str,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentStoreError> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            payment_method = 'card',
            card_transaction_ref = $1,
            paid_at = $2,
            status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $3 AND paid_at IS NULL AND mpesa_status IS NOT 'paid'
        RETURNING *
        "#,
    )
    .bind(intent_id)
    .bind(paid_at)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
