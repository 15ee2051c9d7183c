use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::debug;

use super::{Store, StoreError};
use crate::model::{
    family::Family,
    member::{Member, NewMember},
    tax_payment::{LedgerFilter, NewTaxPayment, PaymentStatus, TaxPayment},
    tax_rate::TaxRate,
};

const MEMBER_COLUMNS: &str = r#"
    id, member_number, name, date_of_birth, date_of_baptism, date_of_confirmation,
    date_of_marriage, permanent_address, present_address, mobile_number,
    family_id, is_head_of_family
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, member_id, year, due_amount, is_paid, paid_amount, paid_date,
    payment_method, family_id
"#;

const MEMBER_NUMBER_COUNTER: &str = "member_number";

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Advances a named counter and returns the new value in a single round
    /// trip: `LAST_INSERT_ID(expr)` makes the value come back in the OK packet.
    async fn next_counter_value(&self, name: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE counters SET value = LAST_INSERT_ID(value + 1) WHERE name = ?",
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable(format!(
                "counter '{}' is not initialised",
                name
            )));
        }

        Ok(result.last_insert_id())
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError> {
        let member_number = self.next_counter_value(MEMBER_NUMBER_COUNTER).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO members
                (member_number, name, date_of_birth, date_of_baptism, date_of_confirmation,
                 date_of_marriage, permanent_address, present_address, mobile_number,
                 family_id, is_head_of_family)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(member_number)
        .bind(&member.name)
        .bind(member.date_of_birth)
        .bind(member.date_of_baptism)
        .bind(member.date_of_confirmation)
        .bind(member.date_of_marriage)
        .bind(&member.permanent_address)
        .bind(&member.present_address)
        .bind(&member.mobile_number)
        .bind(&member.family_id)
        .bind(member.is_head_of_family)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        debug!(member_id = id, member_number, "Member inserted");

        self.get_member(id)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("member {} vanished after insert", id)))
    }

    async fn get_member(&self, id: u64) -> Result<Option<Member>, StoreError> {
        let sql = format!("SELECT {} FROM members WHERE id = ?", MEMBER_COLUMNS);
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    async fn list_members(&self) -> Result<Vec<Member>, StoreError> {
        let sql = format!("SELECT {} FROM members ORDER BY name, id", MEMBER_COLUMNS);
        let members = sqlx::query_as::<_, Member>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    async fn list_family_heads(&self) -> Result<Vec<Member>, StoreError> {
        let sql = format!(
            "SELECT {} FROM members WHERE is_head_of_family = TRUE ORDER BY name, id",
            MEMBER_COLUMNS
        );
        let heads = sqlx::query_as::<_, Member>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(heads)
    }

    async fn list_family_members(&self, family_id: &str) -> Result<Vec<Member>, StoreError> {
        let sql = format!(
            "SELECT {} FROM members WHERE family_id = ? ORDER BY is_head_of_family DESC, name, id",
            MEMBER_COLUMNS
        );
        let members = sqlx::query_as::<_, Member>(&sql)
            .bind(family_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    async fn find_head_by_family_id(
        &self,
        family_id: &str,
    ) -> Result<Option<Member>, StoreError> {
        let sql = format!(
            "SELECT {} FROM members WHERE family_id = ? AND is_head_of_family = TRUE ORDER BY id LIMIT 1",
            MEMBER_COLUMNS
        );
        let head = sqlx::query_as::<_, Member>(&sql)
            .bind(family_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(head)
    }

    async fn find_head_by_name(&self, name: &str) -> Result<Option<Member>, StoreError> {
        // default collation compares case-insensitively
        let sql = format!(
            "SELECT {} FROM members WHERE name = ? AND is_head_of_family = TRUE ORDER BY id LIMIT 1",
            MEMBER_COLUMNS
        );
        let head = sqlx::query_as::<_, Member>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(head)
    }

    async fn update_member(&self, member: &Member) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE members
            SET name = ?, date_of_birth = ?, date_of_baptism = ?, date_of_confirmation = ?,
                date_of_marriage = ?, permanent_address = ?, present_address = ?,
                mobile_number = ?, family_id = ?, is_head_of_family = ?
            WHERE id = ?
            "#,
        )
        .bind(&member.name)
        .bind(member.date_of_birth)
        .bind(member.date_of_baptism)
        .bind(member.date_of_confirmation)
        .bind(member.date_of_marriage)
        .bind(&member.permanent_address)
        .bind(&member.present_address)
        .bind(&member.mobile_number)
        .bind(&member.family_id)
        .bind(member.is_head_of_family)
        .bind(member.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reassign_family(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE members SET family_id = ? WHERE family_id = ?")
            .bind(to)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn reassign_payment_family(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE tax_payments SET family_id = ? WHERE family_id = ?")
            .bind(to)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_family_members_except(
        &self,
        family_id: &str,
        member_id: u64,
    ) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM members WHERE family_id = ? AND id <> ?",
        )
        .bind(family_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn delete_member(&self, id: u64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_family(&self, family_id: &str) -> Result<Option<Family>, StoreError> {
        let family = sqlx::query_as::<_, Family>(
            "SELECT family_id, head_name FROM families WHERE family_id = ?",
        )
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(family)
    }

    async fn find_family_by_head_name(
        &self,
        head_name: &str,
    ) -> Result<Option<Family>, StoreError> {
        let family = sqlx::query_as::<_, Family>(
            "SELECT family_id, head_name FROM families WHERE head_name = ?",
        )
        .bind(head_name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(family)
    }

    async fn insert_family(&self, family: &Family) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO families (family_id, head_name) VALUES (?, ?)")
            .bind(&family.family_id)
            .bind(&family.head_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_family(&self, family_id: &str, updated: &Family) -> Result<(), StoreError> {
        sqlx::query("UPDATE families SET family_id = ?, head_name = ? WHERE family_id = ?")
            .bind(&updated.family_id)
            .bind(&updated.head_name)
            .bind(family_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_rate(&self, year: i32) -> Result<Option<TaxRate>, StoreError> {
        let rate = sqlx::query_as::<_, TaxRate>(
            r#"
            SELECT year, adult_amount, child_amount, adult_age_threshold, active
            FROM tax_rates
            WHERE year = ?
            "#,
        )
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rate)
    }

    async fn insert_rate_if_absent(&self, rate: &TaxRate) -> Result<TaxRate, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tax_rates (year, adult_amount, child_amount, adult_age_threshold, active)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE year = year
            "#,
        )
        .bind(rate.year)
        .bind(rate.adult_amount)
        .bind(rate.child_amount)
        .bind(rate.adult_age_threshold)
        .bind(rate.active)
        .execute(&self.pool)
        .await?;

        self.get_rate(rate.year)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("rate row {} missing", rate.year)))
    }

    async fn upsert_rate(&self, rate: &TaxRate) -> Result<TaxRate, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tax_rates (year, adult_amount, child_amount, adult_age_threshold, active)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                adult_amount = VALUES(adult_amount),
                child_amount = VALUES(child_amount),
                adult_age_threshold = VALUES(adult_age_threshold),
                active = VALUES(active)
            "#,
        )
        .bind(rate.year)
        .bind(rate.adult_amount)
        .bind(rate.child_amount)
        .bind(rate.adult_age_threshold)
        .bind(rate.active)
        .execute(&self.pool)
        .await?;

        self.get_rate(rate.year)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("rate row {} missing", rate.year)))
    }

    async fn insert_payments(&self, payments: &[NewTaxPayment]) -> Result<u64, StoreError> {
        if payments.is_empty() {
            return Ok(0);
        }

        // IGNORE drops rows rejected by uq_tax_payments_member_year; affected
        // rows then counts only the inserts
        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
            "INSERT IGNORE INTO tax_payments (member_id, year, due_amount, is_paid, paid_amount, payment_method, family_id) ",
        );
        builder.push_values(payments, |mut row, payment| {
            row.push_bind(payment.member_id)
                .push_bind(payment.year)
                .push_bind(payment.due_amount)
                .push_bind(false)
                .push_bind(0.0_f64)
                .push_bind("cash")
                .push_bind(&payment.family_id);
        });

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn get_payment(&self, id: u64) -> Result<Option<TaxPayment>, StoreError> {
        let sql = format!("SELECT {} FROM tax_payments WHERE id = ?", PAYMENT_COLUMNS);
        let payment = sqlx::query_as::<_, TaxPayment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn find_payment(
        &self,
        member_id: u64,
        year: i32,
    ) -> Result<Option<TaxPayment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tax_payments WHERE member_id = ? AND year = ?",
            PAYMENT_COLUMNS
        );
        let payment = sqlx::query_as::<_, TaxPayment>(&sql)
            .bind(member_id)
            .bind(year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn list_payments(&self, filter: &LedgerFilter) -> Result<Vec<TaxPayment>, StoreError> {
        let mut builder: QueryBuilder<MySql> =
            QueryBuilder::new(format!("SELECT {} FROM tax_payments WHERE 1=1", PAYMENT_COLUMNS));

        if let Some(year) = filter.year {
            builder.push(" AND year = ").push_bind(year);
        }

        if let Some(family_id) = filter.family_id.as_deref() {
            builder.push(" AND family_id = ").push_bind(family_id);
        }

        builder.push(" ORDER BY year DESC, id");

        let payments = builder
            .build_query_as::<TaxPayment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    async fn update_due_amount(
        &self,
        id: u64,
        due_amount: f64,
        paid_amount: f64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE tax_payments SET due_amount = ?, paid_amount = ? WHERE id = ?")
            .bind(due_amount)
            .bind(paid_amount)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: u64,
        status: &PaymentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tax_payments
            SET is_paid = ?, paid_amount = ?, paid_date = ?, payment_method = ?
            WHERE id = ?
            "#,
        )
        .bind(status.is_paid)
        .bind(status.paid_amount)
        .bind(status.paid_date)
        .bind(status.payment_method.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn payment_years(&self) -> Result<Vec<i32>, StoreError> {
        let years =
            sqlx::query_scalar::<_, i32>("SELECT DISTINCT year FROM tax_payments ORDER BY year DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(years)
    }
}
