//! Yearly dues: rate table, assessment generation, payment ledger and reports.

pub mod age;
pub mod generator;
pub mod ledger;
pub mod rates;
pub mod report;
pub mod summary;

use crate::error::ServiceError;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

pub fn validate_year(year: i32) -> Result<i32, ServiceError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(ServiceError::validation(format!(
            "year must be between {} and {}",
            MIN_YEAR, MAX_YEAR
        )))
    }
}

/// Year-scoped endpoints take the year from the query string.
pub fn require_year(year: Option<i32>) -> Result<i32, ServiceError> {
    year.ok_or_else(|| ServiceError::validation("year query parameter is required"))
        .and_then(validate_year)
}
