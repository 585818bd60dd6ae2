//! RFMForge: a customer segmentation service built on RFM analysis
//!
//! This library ingests customer transaction datasets (CSV or Excel),
//! computes Recency-Frequency-Monetary scores per customer, assigns
//! marketing segments, and serves analysis views over an HTTP API.

pub mod cli;
pub mod data;
pub mod error;
pub mod rfm;
pub mod schema;
pub mod segment;
pub mod server;
pub mod state;
pub mod views;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{clean_transactions, read_table, RawTable, Transaction, USD_TO_INR_RATE};
pub use error::{Result, RfmError};
pub use rfm::{aggregate, build_snapshot, score_customers, ScoredCustomer, Snapshot};
pub use schema::{resolve_columns, ColumnIndex};
pub use segment::{classify, Segment};
pub use server::build_router;
pub use state::AppState;
