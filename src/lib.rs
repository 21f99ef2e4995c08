//! GAVEL — timed multi-round auction settlement engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod accounts;
pub mod admission;
pub mod auctions;
pub mod clock;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod store;
pub mod sync;
pub mod types;
