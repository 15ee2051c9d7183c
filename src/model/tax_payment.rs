use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Family id stamped on assessments of members that have none.
pub const UNKNOWN_FAMILY: &str = "UNKNOWN";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Bank,
    Online,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 17,
    "memberId": 4,
    "year": 2024,
    "dueAmount": 500.0,
    "isPaid": true,
    "paidAmount": 500.0,
    "paidDate": "2024-12-01T10:15:00Z",
    "paymentMethod": "cash",
    "familyId": "MS5678"
}))]
pub struct TaxPayment {
    pub id: u64,
    pub member_id: u64,
    pub year: i32,
    pub due_amount: f64,
    pub is_paid: bool,
    pub paid_amount: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_date: Option<DateTime<Utc>>,
    #[schema(example = "cash")]
    pub payment_method: String,
    pub family_id: String,
}

impl TaxPayment {
    /// Stored method, falling back to cash for values written by hand.
    pub fn method(&self) -> PaymentMethod {
        PaymentMethod::from_str(&self.payment_method).unwrap_or_default()
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_paid { "Paid" } else { "Unpaid" }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTaxPayment {
    pub member_id: u64,
    pub year: i32,
    pub due_amount: f64,
    pub family_id: String,
}

/// Paid-state columns written by a payment status change.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatus {
    pub is_paid: bool,
    pub paid_amount: f64,
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_method: PaymentMethod,
}

/// Which ledger rows a query selects. `family_id: None` means every family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub year: Option<i32>,
    pub family_id: Option<String>,
}

impl LedgerFilter {
    /// Builds a filter from request input; blank, `all` and `All Members` select every family.
    pub fn new(year: Option<i32>, family_id: Option<&str>) -> Self {
        let family_id = family_id
            .map(str::trim)
            .filter(|f| !f.is_empty() && !is_all_families(f))
            .map(str::to_string);

        Self { year, family_id }
    }

    pub fn matches(&self, payment: &TaxPayment) -> bool {
        self.year.is_none_or(|y| payment.year == y)
            && self
                .family_id
                .as_deref()
                .is_none_or(|f| payment.family_id == f)
    }

    pub fn family_label(&self) -> String {
        self.family_id
            .clone()
            .unwrap_or_else(|| "All Members".to_string())
    }
}

fn is_all_families(value: &str) -> bool {
    value.eq_ignore_ascii_case("all") || value.eq_ignore_ascii_case("all members")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(year: i32, family_id: &str) -> TaxPayment {
        TaxPayment {
            id: 1,
            member_id: 1,
            year,
            due_amount: 500.0,
            is_paid: false,
            paid_amount: 0.0,
            paid_date: None,
            payment_method: "cash".into(),
            family_id: family_id.into(),
        }
    }

    #[test]
    fn all_sentinels_disable_family_filter() {
        for sentinel in ["all", "ALL", "All Members", "  ", ""] {
            let filter = LedgerFilter::new(Some(2024), Some(sentinel));
            assert_eq!(filter.family_id, None, "sentinel {sentinel:?}");
        }

        let filter = LedgerFilter::new(None, Some(" MS5678 "));
        assert_eq!(filter.family_id.as_deref(), Some("MS5678"));
    }

    #[test]
    fn filter_matches_year_and_family() {
        let filter = LedgerFilter::new(Some(2024), Some("MS5678"));

        assert!(filter.matches(&payment(2024, "MS5678")));
        assert!(!filter.matches(&payment(2023, "MS5678")));
        assert!(!filter.matches(&payment(2024, "JD1234")));
        assert!(LedgerFilter::default().matches(&payment(1999, "JD1234")));
    }

    #[test]
    fn unknown_method_falls_back_to_cash() {
        let mut p = payment(2024, "MS5678");
        assert_eq!(p.method(), PaymentMethod::Cash);

        p.payment_method = "online".into();
        assert_eq!(p.method(), PaymentMethod::Online);

        p.payment_method = "cheque".into();
        assert_eq!(p.method(), PaymentMethod::Cash);
    }
}
