use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{error::ServiceError, model::income::Income};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncome {
    #[schema(example = "Joseph D'Costa")]
    pub donor_name: String,
    #[schema(example = 2500.0)]
    pub amount: f64,
    #[schema(example = "Christmas offering")]
    pub donation_type: String,
    #[schema(example = "2024-12-24", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Defaults to the year of `date`
    pub year: Option<i32>,
}

impl CreateIncome {
    fn validate(&self) -> Result<i32, ServiceError> {
        if self.donor_name.trim().is_empty() {
            return Err(ServiceError::validation("donorName is required"));
        }
        if self.donation_type.trim().is_empty() {
            return Err(ServiceError::validation("donationType is required"));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ServiceError::validation("amount must be greater than 0"));
        }
        Ok(self.year.unwrap_or_else(|| self.date.year()))
    }
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/incomes",
    params(("year", Query, description = "Filter by year")),
    responses((status = 200, description = "Incomes, newest first", body = [Income])),
    tag = "Income",
    security(("bearer_auth" = []))
)]
pub async fn list_incomes(
    pool: web::Data<MySqlPool>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, ServiceError> {
    let mut sql =
        String::from("SELECT id, donor_name, amount, donation_type, date, year FROM incomes");
    if query.year.is_some() {
        sql.push_str(" WHERE year = ?");
    }
    sql.push_str(" ORDER BY date DESC, id DESC");
    debug!(sql = %sql, year = ?query.year, "Fetching incomes");

    let mut data_query = sqlx::query_as::<_, Income>(&sql);
    if let Some(year) = query.year {
        data_query = data_query.bind(year);
    }

    let incomes = data_query.fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(incomes))
}

#[utoipa::path(
    post,
    path = "/api/incomes",
    request_body = CreateIncome,
    responses(
        (status = 201, description = "Income recorded", body = Income),
        (status = 400, description = "Invalid income")
    ),
    tag = "Income",
    security(("bearer_auth" = []))
)]
pub async fn create_income(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateIncome>,
) -> Result<HttpResponse, ServiceError> {
    let year = payload.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO incomes (donor_name, amount, donation_type, date, year)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.donor_name.trim())
    .bind(payload.amount)
    .bind(payload.donation_type.trim())
    .bind(payload.date)
    .bind(year)
    .execute(pool.get_ref())
    .await?;

    let income = Income {
        id: result.last_insert_id(),
        donor_name: payload.donor_name.trim().to_string(),
        amount: payload.amount,
        donation_type: payload.donation_type.trim().to_string(),
        date: payload.date,
        year,
    };
    info!(income_id = income.id, amount = income.amount, "Income recorded");
    Ok(HttpResponse::Created().json(income))
}
