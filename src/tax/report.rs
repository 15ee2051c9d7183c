use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::age::age_on;
use crate::{
    error::ServiceError,
    model::{
        member::Member,
        tax_payment::{LedgerFilter, TaxPayment},
    },
    store::Store,
};

/// An assessment joined with the identity of the member it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberTaxDetail {
    /// Assessment id, used with `PUT /tax/payment/{paymentId}`
    #[schema(example = 17)]
    pub id: u64,
    pub member_id: u64,
    #[schema(example = "Ana Silva")]
    pub name: String,
    #[schema(example = 13)]
    pub age: i32,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,
    pub tax_amount: f64,
    pub is_paid: bool,
    pub paid_amount: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_method: String,
    pub family_id: String,
    pub is_head_of_family: bool,
    #[schema(example = "Unpaid")]
    pub status: String,
    pub year: i32,
}

/// Flattened spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExportRow {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Member Name")]
    pub member_name: String,
    #[serde(rename = "Family ID")]
    pub family_id: String,
    #[serde(rename = "Age")]
    pub age: i32,
    #[serde(rename = "Tax Amount")]
    pub tax_amount: f64,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Paid Amount")]
    pub paid_amount: f64,
    #[serde(rename = "Paid Date")]
    pub paid_date: String,
    #[serde(rename = "Payment Method")]
    pub payment_method: String,
    #[serde(rename = "Mobile Number")]
    pub mobile_number: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Is Family Head")]
    pub is_family_head: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[schema(example = "All Members")]
    pub family_filter: String,
    pub total_records: usize,
    pub data: Vec<ExportRow>,
}

/// Pairs each assessment with its member, dropping rows whose member is
/// gone, ordered newest year first and then by member name.
fn join<'a>(
    payments: &'a [TaxPayment],
    members: &'a [Member],
) -> Vec<(&'a TaxPayment, &'a Member)> {
    let by_id: HashMap<u64, &Member> = members.iter().map(|m| (m.id, m)).collect();

    let mut rows: Vec<_> = payments
        .iter()
        .filter_map(|p| by_id.get(&p.member_id).map(|m| (p, *m)))
        .collect();
    rows.sort_by(|(pa, ma), (pb, mb)| {
        pb.year
            .cmp(&pa.year)
            .then_with(|| ma.name.to_lowercase().cmp(&mb.name.to_lowercase()))
            .then(pa.id.cmp(&pb.id))
    });
    rows
}

pub fn member_details(
    payments: &[TaxPayment],
    members: &[Member],
    today: NaiveDate,
) -> Vec<MemberTaxDetail> {
    join(payments, members)
        .into_iter()
        .map(|(payment, member)| MemberTaxDetail {
            id: payment.id,
            member_id: member.id,
            name: member.name.clone(),
            age: age_on(member.date_of_birth, today),
            date_of_birth: member.date_of_birth,
            tax_amount: payment.due_amount,
            is_paid: payment.is_paid,
            paid_amount: payment.paid_amount,
            paid_date: payment.paid_date,
            payment_method: payment.method().to_string(),
            family_id: payment.family_id.clone(),
            is_head_of_family: member.is_head_of_family,
            status: payment.status_label().to_string(),
            year: payment.year,
        })
        .collect()
}

pub fn export_rows(
    payments: &[TaxPayment],
    members: &[Member],
    today: NaiveDate,
) -> Vec<ExportRow> {
    join(payments, members)
        .into_iter()
        .map(|(payment, member)| ExportRow {
            year: payment.year,
            member_name: member.name.clone(),
            family_id: payment.family_id.clone(),
            age: age_on(member.date_of_birth, today),
            tax_amount: payment.due_amount,
            status: payment.status_label().to_string(),
            paid_amount: payment.paid_amount,
            paid_date: payment
                .paid_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            payment_method: payment.method().to_string(),
            mobile_number: member.mobile_number.clone(),
            address: member.permanent_address.clone(),
            is_family_head: if member.is_head_of_family { "Yes" } else { "No" }.to_string(),
        })
        .collect()
}

pub async fn load_details(
    store: &dyn Store,
    filter: &LedgerFilter,
    today: NaiveDate,
) -> Result<Vec<MemberTaxDetail>, ServiceError> {
    let payments = store.list_payments(filter).await?;
    let members = store.list_members().await?;
    Ok(member_details(&payments, &members, today))
}

pub async fn load_export(
    store: &dyn Store,
    filter: &LedgerFilter,
    today: NaiveDate,
) -> Result<ExportReport, ServiceError> {
    let payments = store.list_payments(filter).await?;
    let members = store.list_members().await?;
    let data = export_rows(&payments, &members, today);

    let message = match filter.year {
        Some(_) => "Report generated successfully",
        None => "All years report generated successfully",
    };

    Ok(ExportReport {
        message: message.to_string(),
        year: filter.year,
        family_filter: filter.family_label(),
        total_records: data.len(),
        data,
    })
}
