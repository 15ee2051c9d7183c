use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    error::ServiceError,
    model::expense::Expense,
    utils::db_utils::{build_update_sql, execute_update},
};

const EXPENSE_COLUMNS: &str =
    "id, reason, amount, responsible_person, bill_by, date, year, bill_image";

/// JSON keys accepted by the partial update, with their columns.
const UPDATABLE: &[(&str, &str)] = &[
    ("reason", "reason"),
    ("amount", "amount"),
    ("responsiblePerson", "responsible_person"),
    ("billBy", "bill_by"),
    ("date", "date"),
    ("year", "year"),
    ("billImage", "bill_image"),
];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpense {
    #[schema(example = "Altar flowers")]
    pub reason: String,
    #[schema(example = 1200.0)]
    pub amount: f64,
    #[schema(example = "Parish secretary")]
    pub responsible_person: String,
    #[schema(example = "Green Florist")]
    pub bill_by: String,
    #[schema(example = "2024-12-20", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Defaults to the year of `date`
    pub year: Option<i32>,
    pub bill_image: Option<String>,
}

impl CreateExpense {
    fn validate(&self) -> Result<i32, ServiceError> {
        for (field, value) in [
            ("reason", &self.reason),
            ("responsiblePerson", &self.responsible_person),
            ("billBy", &self.bill_by),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::validation(format!("{field} is required")));
            }
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ServiceError::validation("amount must be greater than 0"));
        }
        Ok(self.year.unwrap_or_else(|| self.date.year()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseQuery {
    pub year: Option<i32>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseListResponse {
    pub data: Vec<Expense>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// Checks an update payload before it reaches SQL: a changed `amount` must
/// stay positive and a changed `date` drags `year` along unless one is given.
fn prepare_update(mut payload: Value) -> Result<Value, ServiceError> {
    let Some(obj) = payload.as_object_mut() else {
        return Err(ServiceError::validation("Payload must be a JSON object"));
    };

    if let Some(amount) = obj.get("amount") {
        if !amount.as_f64().is_some_and(|a| a > 0.0) {
            return Err(ServiceError::validation("amount must be greater than 0"));
        }
    }

    let date_year = match obj.get("date") {
        Some(Value::String(s)) => Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ServiceError::validation("date must be YYYY-MM-DD"))?
                .year(),
        ),
        Some(_) => return Err(ServiceError::validation("date must be YYYY-MM-DD")),
        None => None,
    };
    if let Some(year) = date_year {
        obj.entry("year").or_insert_with(|| json!(year));
    }

    Ok(payload)
}

/// Page, page size and row offset, clamped to sane bounds.
fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, u64::from(page - 1) * u64::from(per_page))
}

fn push_filters(builder: &mut QueryBuilder<'_, MySql>, query: &ExpenseQuery) {
    builder.push(" WHERE 1=1");

    if let Some(year) = query.year {
        builder.push(" AND year = ").push_bind(year);
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{}%", search);
        builder
            .push(" AND (reason LIKE ")
            .push_bind(like.clone())
            .push(" OR responsible_person LIKE ")
            .push_bind(like.clone())
            .push(" OR bill_by LIKE ")
            .push_bind(like)
            .push(")");
    }
}

#[utoipa::path(
    get,
    path = "/api/expenses",
    params(
        ("year", Query, description = "Filter by year"),
        ("search", Query, description = "Search reason, responsible person or bill-by"),
        ("page", Query, description = "Page number"),
        ("perPage", Query, description = "Items per page")
    ),
    responses((status = 200, description = "Paginated expenses", body = ExpenseListResponse)),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn list_expenses(
    pool: web::Data<MySqlPool>,
    query: web::Query<ExpenseQuery>,
) -> Result<HttpResponse, ServiceError> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    let mut count_query: QueryBuilder<MySql> = QueryBuilder::new("SELECT COUNT(*) FROM expenses");
    push_filters(&mut count_query, &query);
    let total: i64 = count_query
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data_query: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {} FROM expenses", EXPENSE_COLUMNS));
    push_filters(&mut data_query, &query);
    data_query
        .push(" ORDER BY date DESC, id DESC LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset);
    debug!(sql = %data_query.sql(), page, per_page, offset, "Fetching expenses");

    let expenses = data_query
        .build_query_as::<Expense>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ExpenseListResponse {
        data: expenses,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = CreateExpense,
    responses(
        (status = 201, description = "Expense recorded", body = Expense),
        (status = 400, description = "Invalid expense")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn create_expense(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateExpense>,
) -> Result<HttpResponse, ServiceError> {
    let year = payload.validate()?;
    let payload = payload.into_inner();

    let result = sqlx::query(
        r#"
        INSERT INTO expenses (reason, amount, responsible_person, bill_by, date, year, bill_image)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.reason.trim())
    .bind(payload.amount)
    .bind(payload.responsible_person.trim())
    .bind(payload.bill_by.trim())
    .bind(payload.date)
    .bind(year)
    .bind(&payload.bill_image)
    .execute(pool.get_ref())
    .await?;

    let expense = Expense {
        id: result.last_insert_id(),
        reason: payload.reason.trim().to_string(),
        amount: payload.amount,
        responsible_person: payload.responsible_person.trim().to_string(),
        bill_by: payload.bill_by.trim().to_string(),
        date: payload.date,
        year,
        bill_image: payload.bill_image,
    };
    info!(expense_id = expense.id, amount = expense.amount, "Expense recorded");
    Ok(HttpResponse::Created().json(expense))
}

async fn fetch_expense(pool: &MySqlPool, id: u64) -> Result<Expense, ServiceError> {
    sqlx::query_as::<_, Expense>(&format!(
        "SELECT {} FROM expenses WHERE id = ?",
        EXPENSE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(ServiceError::NotFound("Expense"))
}

#[utoipa::path(
    get,
    path = "/api/expenses/{expense_id}",
    params(("expense_id", Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense found", body = Expense),
        (status = 404, description = "Expense not found")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn get_expense(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let expense = fetch_expense(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{expense_id}",
    params(("expense_id", Path, description = "Expense ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated expense", body = Expense),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Expense not found")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn update_expense(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ServiceError> {
    let expense_id = path.into_inner();
    // 404 before 400 for a missing row
    fetch_expense(pool.get_ref(), expense_id).await?;

    let payload = prepare_update(body.into_inner())?;
    let update = build_update_sql("expenses", &payload, UPDATABLE, "id", expense_id)?;
    execute_update(pool.get_ref(), update).await?;

    let expense = fetch_expense(pool.get_ref(), expense_id).await?;
    info!(expense_id, "Expense updated");
    Ok(HttpResponse::Ok().json(expense))
}

#[utoipa::path(
    delete,
    path = "/api/expenses/{expense_id}",
    params(("expense_id", Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Expense deleted successfully"
        })),
        (status = 404, description = "Expense not found")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn delete_expense(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let expense_id = path.into_inner();

    let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
        .bind(expense_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("Expense"));
    }

    info!(expense_id, "Expense deleted");
    Ok(HttpResponse::Ok().json(json!({"message": "Expense deleted successfully"})))
}
