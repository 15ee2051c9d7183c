use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": 1,
        "memberNumber": 1000,
        "name": "Maria Silva",
        "dateOfBirth": "1980-04-12",
        "dateOfBaptism": null,
        "dateOfConfirmation": null,
        "dateOfMarriage": "2004-09-18",
        "permanentAddress": "12 Church Road",
        "presentAddress": "12 Church Road",
        "mobileNumber": "+8801712345678",
        "familyId": "MS5678",
        "isHeadOfFamily": true
    })
)]
pub struct Member {
    #[schema(example = 1)]
    pub id: u64,

    /// Parish register number, allocated from a storage-owned counter
    #[schema(example = 1000)]
    pub member_number: u64,

    #[schema(example = "Maria Silva")]
    pub name: String,

    #[schema(example = "1980-04-12", value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_baptism: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_confirmation: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_marriage: Option<NaiveDate>,

    #[schema(example = "12 Church Road")]
    pub permanent_address: String,

    #[schema(example = "12 Church Road")]
    pub present_address: String,

    #[schema(example = "+8801712345678")]
    pub mobile_number: String,

    #[schema(example = "MS5678", nullable = true)]
    pub family_id: Option<String>,

    #[schema(example = true)]
    pub is_head_of_family: bool,
}

/// A member ready to be written; identity columns are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_baptism: Option<NaiveDate>,
    pub date_of_confirmation: Option<NaiveDate>,
    pub date_of_marriage: Option<NaiveDate>,
    pub permanent_address: String,
    pub present_address: String,
    pub mobile_number: String,
    pub family_id: String,
    pub is_head_of_family: bool,
}
