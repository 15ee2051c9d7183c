use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    #[schema(example = "MS5678")]
    pub family_id: String,
    #[schema(example = "Maria Silva")]
    pub head_name: String,
}
