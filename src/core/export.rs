use csv::Writer;

use crate::domain::services::license_dates::LicenseState;
use crate::domain::services::reporting::{LicenseView, OrderView};
use crate::utils::error::{AppError, Result};

fn cents(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, amount.abs() / 100, amount.abs() % 100)
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::IoError(std::io::Error::new(e.error().kind(), e.error().to_string())))?;
    String::from_utf8(bytes).map_err(|e| AppError::ConfigError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

pub fn orders_csv(views: &[OrderView]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "created_at",
        "status",
        "email",
        "product",
        "account_number",
        "amount",
        "payment_method",
        "processed_at",
    ])?;

    for v in views {
        writer.write_record([
            v.order.id.to_string(),
            v.order.created_at.to_rfc3339(),
            v.order.status.to_string(),
            v.user_email.clone().unwrap_or_default(),
            v.product_name.clone().unwrap_or_default(),
            v.order.account_number.clone(),
            cents(v.order.amount_cents),
            v.order.payment_method.to_string(),
            v.order
                .processed_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        ])?;
    }

    finish(writer)
}

pub fn licenses_csv(views: &[LicenseView]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "email",
        "product",
        "account_number",
        "source",
        "state",
        "expires_at",
        "days_remaining",
    ])?;

    for v in views {
        let (state, days) = match v.state {
            LicenseState::Active { days_remaining, .. } => {
                ("active", days_remaining.map(|d| d.to_string()).unwrap_or_default())
            }
            LicenseState::Expired { .. } => ("expired", "0".to_string()),
            LicenseState::Revoked => ("revoked", String::new()),
        };
        writer.write_record([
            v.license.id.to_string(),
            v.user_email.clone().unwrap_or_default(),
            v.product_name.clone().unwrap_or_default(),
            v.license.account_number.clone(),
            v.license.source.to_string(),
            state.to_string(),
            v.license
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "lifetime".to_string()),
            days,
        ])?;
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Order, OrderStatus, PaymentMethod};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_cents_formatting() {
        assert_eq!(cents(9_900), "99.00");
        assert_eq!(cents(5), "0.05");
        assert_eq!(cents(-1_250), "-12.50");
    }

    #[test]
    fn test_orders_csv_quotes_commas() {
        let view = OrderView {
            order: Order {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                account_number: "50123456".to_string(),
                amount_cents: 14_900,
                payment_method: PaymentMethod::Crypto,
                payment_proof_url: None,
                status: OrderStatus::Completed,
                admin_note: None,
                created_at: Utc::now(),
                processed_at: None,
            },
            user_email: Some("alice@example.com".to_string()),
            user_name: None,
            product_name: Some("Gold Scalper, Pro".to_string()),
        };

        let csv = orders_csv(&[view]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,created_at,status,email"));
        assert!(lines[1].contains("\"Gold Scalper, Pro\""));
        assert!(lines[1].contains(",149.00,crypto,"));
    }
}
