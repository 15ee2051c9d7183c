use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub year: Option<i32>,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 2024)]
    pub year: Option<i32>,
    #[schema(example = 250000.0)]
    pub total_income: f64,
    #[schema(example = 180000.0)]
    pub total_expense: f64,
    #[schema(example = 70000.0)]
    pub balance: f64,
}

impl Balance {
    pub fn new(year: Option<i32>, total_income: f64, total_expense: f64) -> Self {
        Self {
            year,
            total_income,
            total_expense,
            balance: total_income - total_expense,
        }
    }
}

async fn total(pool: &MySqlPool, table: &str, year: Option<i32>) -> Result<f64, sqlx::Error> {
    let sql = match year {
        Some(_) => format!("SELECT SUM(amount) FROM {table} WHERE year = ?"),
        None => format!("SELECT SUM(amount) FROM {table}"),
    };

    let mut query = sqlx::query_scalar::<_, Option<f64>>(&sql);
    if let Some(year) = year {
        query = query.bind(year);
    }
    Ok(query.fetch_one(pool).await?.unwrap_or(0.0))
}

/// Income minus expense, optionally for one year
#[utoipa::path(
    get,
    path = "/api/ledger/balance",
    params(("year", Query, description = "Restrict to one year")),
    responses((status = 200, description = "Balance", body = Balance)),
    tag = "Ledger",
    security(("bearer_auth" = []))
)]
pub async fn balance(
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, ServiceError> {
    let total_income = total(pool.get_ref(), "incomes", query.year).await?;
    let total_expense = total(pool.get_ref(), "expenses", query.year).await?;

    Ok(HttpResponse::Ok().json(Balance::new(query.year, total_income, total_expense)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn balance_omits_missing_year() {
        let all = Balance::new(None, 500.0, 800.0);
        assert_eq!(
            serde_json::to_value(&all).unwrap(),
            json!({"totalIncome": 500.0, "totalExpense": 800.0, "balance": -300.0})
        );
        assert_eq!(Balance::new(Some(2024), 10.0, 4.0).balance, 6.0);
    }
}
