//! Top level error module for the crate

use rust_decimal::Decimal;
use zcash_primitives::transaction::TxId;

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Two amounts of different securities were combined.
    #[error("Security mismatch. Expected {expected}, found {found}")]
    SecurityMismatch { expected: String, found: String },
    /// Decimal arithmetic overflowed.
    #[error("Arithmetic overflow")]
    Overflow,
    /// An exchange rate cannot be implied from a zero amount.
    #[error("Cannot derive an exchange rate from a zero amount")]
    ZeroAmount,
    /// Exchange rate prices must be positive.
    #[error("Invalid exchange rate price {0}")]
    InvalidPrice(Decimal),
    #[error("Transaction {0} is already in the ledger")]
    DuplicateTransaction(TxId),
    #[error("Transaction {0} is not in the ledger")]
    UnknownTransaction(TxId),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors reported by a historical exchange rate provider. These never reach the ledger,
/// they only leave an entry without an alternate amount until the next refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Exchange rate request failed. {0}")]
    Request(String),
    #[error("Exchange rate request cancelled")]
    Cancelled,
}
