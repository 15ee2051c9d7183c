pub mod admin;
pub mod expense;
pub mod family;
pub mod income;
pub mod member;
pub mod tax_payment;
pub mod tax_rate;
