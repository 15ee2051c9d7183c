use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::tax_payment::TaxPayment;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "year": 2024,
    "totalMembers": 120,
    "paidMembers": 90,
    "unpaidMembers": 30,
    "collectionRate": 75,
    "totalTaxAmount": 102500.0,
    "paidTaxAmount": 80000.0,
    "unpaidTaxAmount": 22500.0
}))]
pub struct TaxSummary {
    pub year: i32,
    pub total_members: u64,
    pub paid_members: u64,
    pub unpaid_members: u64,
    /// Percentage of assessments marked paid, rounded to a whole number
    pub collection_rate: u32,
    pub total_tax_amount: f64,
    pub paid_tax_amount: f64,
    pub unpaid_tax_amount: f64,
}

impl TaxSummary {
    fn empty(year: i32) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }

    fn add(&mut self, payment: &TaxPayment) {
        self.total_members += 1;
        self.total_tax_amount += payment.due_amount;
        if payment.is_paid {
            self.paid_members += 1;
            self.paid_tax_amount += payment.paid_amount;
        }
    }

    fn finish(mut self) -> Self {
        self.unpaid_members = self.total_members - self.paid_members;
        self.unpaid_tax_amount = self.total_tax_amount - self.paid_tax_amount;
        self.collection_rate = collection_rate(self.paid_members, self.total_members);
        self
    }
}

pub fn collection_rate(paid: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((paid as f64 / total as f64) * 100.0).round() as u32
}

/// Folds already-filtered ledger rows into one summary for `year`.
pub fn summarize(year: i32, payments: &[TaxPayment]) -> TaxSummary {
    payments
        .iter()
        .fold(TaxSummary::empty(year), |mut summary, payment| {
            summary.add(payment);
            summary
        })
        .finish()
}

/// One summary per year present in `payments`, newest year first.
pub fn summarize_by_year(payments: &[TaxPayment]) -> Vec<TaxSummary> {
    let mut by_year: BTreeMap<i32, TaxSummary> = BTreeMap::new();
    for payment in payments {
        by_year
            .entry(payment.year)
            .or_insert_with(|| TaxSummary::empty(payment.year))
            .add(payment);
    }

    by_year.into_values().rev().map(TaxSummary::finish).collect()
}
