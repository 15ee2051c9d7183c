use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Joseph D'Costa")]
    pub donor_name: String,
    #[schema(example = 2500.0)]
    pub amount: f64,
    #[schema(example = "Christmas offering")]
    pub donation_type: String,
    #[schema(example = "2024-12-24", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = 2024)]
    pub year: i32,
}
