pub mod catalog;
pub mod coordinator;
pub mod ledger;
pub mod pricing;
pub mod query;
pub mod seat_map;
