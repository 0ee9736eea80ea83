pub mod diag;
pub mod health;
pub mod worker;
