//! An account's view of one transaction, as the ledger consumes it.

use chrono::{DateTime, Utc};
use zcash_primitives::transaction::TxId;
use zcash_protocol::consensus::BlockHeight;
use zingo_status::confirmation_status::ConfirmationStatus;

use crate::{
    amount::{Amount, Security},
    error::LedgerResult,
    line_item::{merge_split_items, LineItem},
};

/// Everything the ledger needs to know about a transaction.
///
/// The txid is the identity of the record and never changes. Every other field may be
/// edited after the record entered the ledger, followed by a change notification naming
/// the field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub txid: TxId,
    pub status: ConfirmationStatus,
    /// When the transaction was mined, or first seen if it has not been.
    pub timestamp: Option<DateTime<Utc>>,
    /// Paid by this account. `None` when the account did not fund the transaction.
    pub fee: Option<Amount>,
    /// Outgoing payments, with negative amounts.
    pub sends: Vec<LineItem>,
    /// Incoming payments, with positive amounts.
    pub receives: Vec<LineItem>,
    /// A note the user attached to the transaction.
    pub memo: String,
}

impl TransactionRecord {
    pub fn new(txid: TxId, status: ConfirmationStatus, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            txid,
            status,
            timestamp,
            fee: None,
            sends: Vec::new(),
            receives: Vec::new(),
            memo: String::new(),
        }
    }

    /// The height the transaction was mined at, if it has been.
    pub fn block_height(&self) -> Option<BlockHeight> {
        self.status.get_confirmed_height()
    }

    /// The change this transaction makes to the account balance: every send and receive,
    /// less the fee.
    pub fn net_change(&self, security: &Security) -> LedgerResult<Amount> {
        let gross = self
            .sends
            .iter()
            .chain(self.receives.iter())
            .try_fold(Amount::zero(security.clone()), |sum, item| {
                sum.checked_add(item.amount())
            })?;
        match &self.fee {
            Some(fee) => gross.checked_sub(fee),
            None => Ok(gross),
        }
    }

    /// Sends, with a payment split across two pools shown once.
    pub fn merged_sends(&self) -> Vec<LineItem> {
        merge_split_items(&self.sends)
    }

    /// Receives, with a payment split across two pools shown once.
    pub fn merged_receives(&self) -> Vec<LineItem> {
        merge_split_items(&self.receives)
    }
}
