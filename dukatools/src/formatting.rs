use std::fmt::Write;

use anyhow::Result;
use duka_payment_engine::{db_types::PaymentAttempt, payment_objects::PaymentStatusRecord};
use duka_payment_server::data_objects::PushInitiated;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_style(table: &mut Table) {
    table.set_format(markdown_format());
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn format_payment_status(record: &PaymentStatusRecord) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "===============================================================================")?;
    writeln!(f, "Order {:<20} [{:^12}]", record.order_id.to_string(), record.status.to_string())?;
    writeln!(f, "===============================================================================")?;
    writeln!(f, "Total:           {} ({})", record.total, record.currency)?;
    writeln!(f, "Payment method:  {}", or_dash(record.payment_method))?;
    writeln!(f, "Push status:     {}", or_dash(record.mobile_money_status))?;
    writeln!(f, "Paid at:         {}", or_dash(record.paid_at))?;
    writeln!(f, "Receipt:         {}", or_dash(record.receipt_number.as_deref()))?;
    writeln!(f, "Retries:         {}", record.retry_count)?;
    if let Some(reason) = &record.failure_reason {
        writeln!(f, "Failure reason:  {reason}")?;
    }
    writeln!(f, "-------------------------------------------------------------------------------")?;
    Ok(f)
}

pub fn format_push_initiated(res: &PushInitiated) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "{}", res.customer_message)?;
    writeln!(f, "Checkout request: {}", res.checkout_request_id)?;
    writeln!(f, "Merchant request: {}", res.merchant_request_id)?;
    Ok(f)
}

pub fn format_attempts(attempts: &[PaymentAttempt]) -> String {
    if attempts.is_empty() {
        return "No payment requests have been sent for this order".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["#", "Checkout request", "Phone", "Amount", "Status", "Result", "Created At", "Updated At"]);
    attempts.iter().enumerate().for_each(|(i, attempt)| {
        let result = match (attempt.result_code, attempt.result_desc.as_deref()) {
            (Some(code), Some(desc)) => format!("{code}: {desc}"),
            (Some(code), None) => code.to_string(),
            (None, desc) => desc.unwrap_or_default().to_string(),
        };
        table.add_row(row![
            i + 1,
            attempt.checkout_request_id,
            attempt.phone,
            format!("{:>11}", attempt.amount),
            attempt.status.to_string(),
            result,
            attempt.created_at.to_string(),
            attempt.updated_at.to_string()
        ]);
    });
    markdown_style(&mut table);
    format!("{table}\n")
}
