use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::ServiceError;

/// SQL bindable value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE <table> SET ... WHERE <id_column> = ?` from a JSON object.
///
/// `columns` maps accepted JSON keys to column names; any other key is
/// rejected so clients can never name a column themselves.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    columns: &[(&str, &str)],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ServiceError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ServiceError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ServiceError::validation("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = columns
            .iter()
            .find(|(json_key, _)| json_key == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| ServiceError::validation(format!("Field {key} cannot be updated")))?;

        assignments.push(format!("{column} = ?"));
        values.push(match value {
            Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => SqlValue::Date(d),
                Err(_) => SqlValue::String(s.clone()),
            },
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => SqlValue::I64(i),
                (None, Some(f)) => SqlValue::F64(f),
                _ => return Err(ServiceError::validation(format!("{key} is out of range"))),
            },
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            _ => {
                return Err(ServiceError::validation(format!(
                    "Unsupported value for {key}"
                )));
            }
        });
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    );
    values.push(SqlValue::I64(id_value as i64));

    Ok(SqlUpdate { sql, values })
}

/// Executes the update, returning the affected row count.
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
