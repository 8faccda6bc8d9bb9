pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod memory;
pub mod refine;
pub mod review;
pub mod tools;
pub mod workers;
