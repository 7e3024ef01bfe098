//! SQLite persistence and the transactional billing engine for the fit-out
//! pricing domain. The pure rules live in `fitout-core`; this crate supplies
//! the schema, repositories, and the engine that drives them.

pub mod connection;
pub mod engine;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use engine::{BillingEngine, InvoiceOutcome};
