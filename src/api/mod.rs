pub mod expense;
pub mod income;
pub mod ledger;
pub mod member;
pub mod tax;
