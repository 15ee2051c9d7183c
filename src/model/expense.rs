use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Altar flowers")]
    pub reason: String,
    #[schema(example = 1200.0)]
    pub amount: f64,
    #[schema(example = "Parish secretary")]
    pub responsible_person: String,
    #[schema(example = "Green Florist")]
    pub bill_by: String,
    #[schema(example = "2024-12-20", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = 2024)]
    pub year: i32,
    /// File name of the scanned bill, if one was attached
    #[schema(example = "bill-2024-12-20.jpg", nullable = true)]
    pub bill_image: Option<String>,
}
