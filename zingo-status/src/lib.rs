#![warn(missing_docs)]
//! Zingo-Status
//! Status types shared by the ledger view and the sync progress aggregator.

pub mod confirmation_status;
pub mod sync_progress;
pub mod sync_status;
