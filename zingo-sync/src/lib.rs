#![warn(missing_docs)]
//! Zingo sync progress
//!
//! Per account progress reporting, the polling loop that drives an account's sync engine,
//! and the aggregation of every account's progress into the single progress shown to the user.
//!
//! Entrypoint: [`crate::sync::run_sync_loop`]

pub mod aggregator;
pub mod error;
pub mod resilience;
pub mod source;
pub mod sync;
pub mod traits;
