pub mod api;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod history;
pub mod ledger;
pub mod observability;
pub mod scheduler;
pub mod types;
