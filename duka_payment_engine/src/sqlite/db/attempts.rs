use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AttemptStatus, NewPaymentAttempt, OrderId, PaymentAttempt},
    traits::PaymentStoreError,
};

pub async fn insert_attempt(
    attempt: NewPaymentAttempt,
    conn: &mut SqliteConnection,
) -> Result<PaymentAttempt, PaymentStoreError> {
    let attempt = sqlx::query_as(
        r#"
            INSERT INTO payment_attempts (
                order_id,
                checkout_request_id,
                merchant_request_id,
                phone,
                amount
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(attempt.order_id.as_str())
    .bind(attempt.checkout_request_id)
    .bind(attempt.merchant_request_id)
    .bind(attempt.phone)
    .bind(attempt.amount.value())
    .fetch_one(conn)
    .await?;
    Ok(attempt)
}

/// Marks every open attempt for the order as superseded. Returns the number of attempts affected.
pub async fn supersede_open_attempts(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE payment_attempts SET status = 'superseded', updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status IN ('initiated', 'pending')
        "#,
    )
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    trace!("🗃️ {} attempts superseded for order [{order_id}]", result.rows_affected());
    Ok(result.rows_affected())
}

pub async fn fetch_attempt(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    let attempt = sqlx::query_as("SELECT * FROM payment_attempts WHERE checkout_request_id = $1")
        .bind(checkout_request_id)
        .fetch_optional(conn)
        .await?;
    Ok(attempt)
}

pub async fn fetch_attempts_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let attempts = sqlx::query_as("SELECT * FROM payment_attempts WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(attempts)
}

/// Records the result for an attempt. An attempt that has been paid is never changed again.
pub async fn update_attempt_status(
    checkout_request_id: &str,
    status: AttemptStatus,
    result_code: Option<i64>,
    result_desc: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    let attempt = sqlx::query_as(
        r#"
        UPDATE payment_attempts SET
            status = $1,
            result_code = COALESCE($2, result_code),
            result_desc = COALESCE($3, result_desc),
            updated_at = CURRENT_TIMESTAMP
        WHERE checkout_request_id = $4 AND status IS NOT 'paid'
        RETURNING *
        "#,
    )
    .bind(status.to_string())
    .bind(result_code)
    .bind(result_desc)
    .bind(checkout_request_id)
    .fetch_optional(conn)
    .await?;
    Ok(attempt)
}
