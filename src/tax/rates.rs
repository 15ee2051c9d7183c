use chrono::NaiveDate;
use tracing::{error, info};

use super::generator::{self, RegenerationPolicy};
use crate::{error::ServiceError, model::tax_rate::TaxRate, store::Store};

/// A validated rate change for one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateUpdate {
    pub adult_amount: f64,
    pub child_amount: f64,
    pub adult_age_threshold: i32,
}

impl RateUpdate {
    pub fn new(
        adult_amount: Option<f64>,
        child_amount: Option<f64>,
        adult_age_threshold: Option<i32>,
    ) -> Result<Self, ServiceError> {
        let adult_amount = adult_amount
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or_else(|| ServiceError::validation("adultTax must be greater than 0"))?;

        let child_amount = child_amount
            .filter(|c| c.is_finite() && *c >= 0.0)
            .ok_or_else(|| ServiceError::validation("childTax must be 0 or greater"))?;

        let adult_age_threshold = adult_age_threshold
            .filter(|t| (1..=100).contains(t))
            .ok_or_else(|| {
                ServiceError::validation("adultAgeThreshold must be between 1 and 100")
            })?;

        Ok(Self {
            adult_amount,
            child_amount,
            adult_age_threshold,
        })
    }

    fn into_rate(self, year: i32) -> TaxRate {
        TaxRate {
            year,
            adult_amount: self.adult_amount,
            child_amount: self.child_amount,
            adult_age_threshold: self.adult_age_threshold,
            active: true,
        }
    }
}

/// Returns the rate row for `year`, persisting the default row first if the
/// year has none.
pub async fn get_rates(store: &dyn Store, year: i32) -> Result<TaxRate, ServiceError> {
    if let Some(rate) = store.get_rate(year).await? {
        return Ok(rate);
    }

    let rate = store.insert_rate_if_absent(&TaxRate::default_for(year)).await?;
    info!(year, "Created default tax rates");
    Ok(rate)
}

/// Upserts the year's rates and re-prices its existing assessments.
pub async fn set_rates(
    store: &dyn Store,
    year: i32,
    update: RateUpdate,
    policy: RegenerationPolicy,
    today: NaiveDate,
) -> Result<TaxRate, ServiceError> {
    let rate = store.upsert_rate(&update.into_rate(year)).await?;
    info!(
        year,
        adult_amount = rate.adult_amount,
        child_amount = rate.child_amount,
        adult_age_threshold = rate.adult_age_threshold,
        "Tax rates updated"
    );

    // the rate row is already committed; a failed re-pricing is only logged
    match generator::regenerate(store, year, today, policy).await {
        Ok(outcome) => info!(year, ?outcome, "Assessments re-priced"),
        Err(e) => error!(year, error = %e, "Failed to re-price assessments"),
    }

    Ok(rate)
}
