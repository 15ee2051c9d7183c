use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::{age::age_on, rates::get_rates};
use crate::{
    error::ServiceError,
    model::{
        member::Member,
        tax_payment::{LedgerFilter, NewTaxPayment, UNKNOWN_FAMILY},
    },
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    #[schema(example = 12)]
    pub new_payments: u64,
    #[schema(example = 40)]
    pub existing_payments: u64,
}

/// What a rate change does to assessments that are already marked paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegenerationPolicy {
    /// Paid rows are re-priced too and their paid amount follows the new due amount.
    #[default]
    OverwritePaid,
    /// Paid rows keep the amounts they were settled at.
    PreservePaid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenerationOutcome {
    pub updated: u64,
    pub unchanged: u64,
    pub preserved: u64,
    /// Rows whose member has since been deleted.
    pub orphaned: u64,
}

/// Creates one unpaid assessment for every member not yet assessed in `year`.
///
/// Each member is priced by age on `today` against the year's rate row
/// (created with defaults when missing). Rows are written in chunks of
/// `batch_size`; a row rejected by the (member, year) key because another
/// request got there first counts as already existing.
pub async fn generate(
    store: &dyn Store,
    year: i32,
    today: NaiveDate,
    batch_size: usize,
) -> Result<GenerationOutcome, ServiceError> {
    let rate = get_rates(store, year).await?;
    let members = store.list_members().await?;

    let assessed: HashSet<u64> = store
        .list_payments(&LedgerFilter::new(Some(year), None))
        .await?
        .into_iter()
        .map(|p| p.member_id)
        .collect();

    let pending: Vec<NewTaxPayment> = members
        .iter()
        .filter(|m| !assessed.contains(&m.id))
        .map(|m| NewTaxPayment {
            member_id: m.id,
            year,
            due_amount: rate.due_for_age(age_on(m.date_of_birth, today)),
            family_id: m
                .family_id
                .clone()
                .unwrap_or_else(|| UNKNOWN_FAMILY.to_string()),
        })
        .collect();

    let mut inserted = 0;
    for chunk in pending.chunks(batch_size.max(1)) {
        let written = store.insert_payments(chunk).await?;
        if written < chunk.len() as u64 {
            debug!(
                year,
                skipped = chunk.len() as u64 - written,
                "Assessments created concurrently, skipped"
            );
        }
        inserted += written;
    }

    let outcome = GenerationOutcome {
        new_payments: inserted,
        existing_payments: assessed.len() as u64 + (pending.len() as u64 - inserted),
    };
    info!(year, ?outcome, "Generated tax assessments");
    Ok(outcome)
}

/// Re-prices every assessment of `year` against the current rate row and
/// each member's age on `today`. A year without a rate row is left alone.
pub async fn regenerate(
    store: &dyn Store,
    year: i32,
    today: NaiveDate,
    policy: RegenerationPolicy,
) -> Result<RegenerationOutcome, ServiceError> {
    let mut outcome = RegenerationOutcome::default();

    let Some(rate) = store.get_rate(year).await? else {
        warn!(year, "No tax rates for year, nothing to re-price");
        return Ok(outcome);
    };

    let members: HashMap<u64, Member> = store
        .list_members()
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let payments = store
        .list_payments(&LedgerFilter::new(Some(year), None))
        .await?;

    for payment in payments {
        let Some(member) = members.get(&payment.member_id) else {
            outcome.orphaned += 1;
            continue;
        };

        let due = rate.due_for_age(age_on(member.date_of_birth, today));
        if due == payment.due_amount {
            outcome.unchanged += 1;
            continue;
        }

        let paid_amount = match (payment.is_paid, policy) {
            (true, RegenerationPolicy::PreservePaid) => {
                outcome.preserved += 1;
                continue;
            }
            (true, RegenerationPolicy::OverwritePaid) => due,
            (false, _) => payment.paid_amount,
        };

        store
            .update_due_amount(payment.id, due, paid_amount)
            .await?;
        debug!(
            payment_id = payment.id,
            member = %member.name,
            old = payment.due_amount,
            new = due,
            "Assessment re-priced"
        );
        outcome.updated += 1;
    }

    Ok(outcome)
}
