#![forbid(unsafe_code)]
//! Zingo ledger
//!
//! A chronologically ordered view of an account's transactions with a running balance,
//! kept up to date incrementally as the account changes, and valued in a second currency
//! by an asynchronous exchange rate backfill.
//!
//! Entrypoint: [`crate::ledger::Ledger`]

pub mod amount;
pub mod amount_entry;
pub mod backfill;
pub mod error;
pub mod ledger;
pub mod line_item;
pub mod order;
pub mod record;
pub mod view;

mod utils;
