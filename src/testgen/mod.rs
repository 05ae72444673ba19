pub mod deps;
pub mod file;
pub mod ledger;
pub mod sanitize;
