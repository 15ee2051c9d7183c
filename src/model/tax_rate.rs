use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_ADULT_AMOUNT: f64 = 1000.0;
pub const DEFAULT_CHILD_AMOUNT: f64 = 500.0;
pub const DEFAULT_ADULT_AGE_THRESHOLD: i32 = 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "year": 2024,
    "adultAmount": 1000.0,
    "childAmount": 500.0,
    "adultAgeThreshold": 18,
    "active": true
}))]
pub struct TaxRate {
    pub year: i32,
    pub adult_amount: f64,
    pub child_amount: f64,
    pub adult_age_threshold: i32,
    pub active: bool,
}

impl TaxRate {
    pub fn default_for(year: i32) -> Self {
        Self {
            year,
            adult_amount: DEFAULT_ADULT_AMOUNT,
            child_amount: DEFAULT_CHILD_AMOUNT,
            adult_age_threshold: DEFAULT_ADULT_AGE_THRESHOLD,
            active: true,
        }
    }

    /// Amount owed by a member of the given age under this rate row.
    pub fn due_for_age(&self, age: i32) -> f64 {
        if age >= self.adult_age_threshold {
            self.adult_amount
        } else {
            self.child_amount
        }
    }
}
