//! Persistence boundary for members, families, rates and assessments.
//!
//! Core workflows only ever see `dyn Store`; the MySQL implementation is
//! what the server runs on, the in-memory one backs the tests.

use async_trait::async_trait;
use derive_more::Display;

use crate::model::{
    family::Family,
    member::{Member, NewMember},
    tax_payment::{LedgerFilter, NewTaxPayment, PaymentStatus, TaxPayment},
    tax_rate::TaxRate,
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlStore;

#[derive(Debug, Display)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[display(fmt = "duplicate key: {}", _0)]
    Duplicate(String),

    #[display(fmt = "store unavailable: {}", _0)]
    Unavailable(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }

        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Members
    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError>;
    async fn get_member(&self, id: u64) -> Result<Option<Member>, StoreError>;
    async fn list_members(&self) -> Result<Vec<Member>, StoreError>;
    async fn list_family_heads(&self) -> Result<Vec<Member>, StoreError>;
    async fn list_family_members(&self, family_id: &str) -> Result<Vec<Member>, StoreError>;
    async fn find_head_by_family_id(&self, family_id: &str)
    -> Result<Option<Member>, StoreError>;
    async fn find_head_by_name(&self, name: &str) -> Result<Option<Member>, StoreError>;
    async fn update_member(&self, member: &Member) -> Result<bool, StoreError>;
    /// Moves every member of `from` into `to`, returning how many rows moved.
    async fn reassign_family(&self, from: &str, to: &str) -> Result<u64, StoreError>;
    /// Restamps assessments of `from` with `to`, returning how many rows moved.
    async fn reassign_payment_family(&self, from: &str, to: &str) -> Result<u64, StoreError>;
    async fn count_family_members_except(
        &self,
        family_id: &str,
        member_id: u64,
    ) -> Result<i64, StoreError>;
    async fn delete_member(&self, id: u64) -> Result<bool, StoreError>;

    // Families
    async fn find_family(&self, family_id: &str) -> Result<Option<Family>, StoreError>;
    async fn find_family_by_head_name(&self, head_name: &str)
    -> Result<Option<Family>, StoreError>;
    /// Fails with `StoreError::Duplicate` when the id or head name is taken.
    async fn insert_family(&self, family: &Family) -> Result<(), StoreError>;
    async fn update_family(&self, family_id: &str, updated: &Family) -> Result<(), StoreError>;

    // Rates
    async fn get_rate(&self, year: i32) -> Result<Option<TaxRate>, StoreError>;
    /// Writes `rate` unless a row for its year exists, then returns the stored row.
    async fn insert_rate_if_absent(&self, rate: &TaxRate) -> Result<TaxRate, StoreError>;
    async fn upsert_rate(&self, rate: &TaxRate) -> Result<TaxRate, StoreError>;

    // Assessments
    /// Inserts the batch, silently dropping rows whose (member, year) already
    /// exists. Returns the number of rows actually written.
    async fn insert_payments(&self, payments: &[NewTaxPayment]) -> Result<u64, StoreError>;
    async fn get_payment(&self, id: u64) -> Result<Option<TaxPayment>, StoreError>;
    async fn find_payment(&self, member_id: u64, year: i32)
    -> Result<Option<TaxPayment>, StoreError>;
    async fn list_payments(&self, filter: &LedgerFilter) -> Result<Vec<TaxPayment>, StoreError>;
    async fn update_due_amount(
        &self,
        id: u64,
        due_amount: f64,
        paid_amount: f64,
    ) -> Result<(), StoreError>;
    async fn update_payment_status(
        &self,
        id: u64,
        status: &PaymentStatus,
    ) -> Result<bool, StoreError>;
    async fn payment_years(&self) -> Result<Vec<i32>, StoreError>;
}
