//! The chronological order of ledger entries.
//!
//! Entries sort by block height ascending, then timestamp ascending, then txid bytes.
//! A missing height or timestamp sorts after every present one, so transactions that are
//! not mined yet come last.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use getset::CopyGetters;
use zcash_protocol::consensus::BlockHeight;

use crate::record::TransactionRecord;

/// A field of a [`TransactionRecord`] that can change while it is in the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionField {
    BlockHeight,
    Timestamp,
    Fee,
    Memo,
    LineItems,
}

impl TransactionField {
    /// Whether a change to this field can move the entry to a new position.
    pub fn is_order_significant(&self) -> bool {
        matches!(self, TransactionField::BlockHeight | TransactionField::Timestamp)
    }

    /// Whether a change to this field changes the entry's net change, and with it every
    /// running balance from the entry on.
    pub fn affects_net_change(&self) -> bool {
        matches!(self, TransactionField::Fee | TransactionField::LineItems)
    }
}

/// The position of a record in the ledger, captured when it was last placed.
///
/// Distinct txids give distinct keys, so the order is total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct SortKey {
    block_height: Option<BlockHeight>,
    timestamp: Option<DateTime<Utc>>,
    txid: [u8; 32],
}

impl SortKey {
    pub fn of(record: &TransactionRecord) -> Self {
        Self {
            block_height: record.block_height(),
            timestamp: record.timestamp,
            txid: *record.txid.as_ref(),
        }
    }
}

/// Orders present values ascending, ahead of absent ones.
fn absent_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        absent_last(&self.block_height, &other.block_height)
            .then_with(|| absent_last(&self.timestamp, &other.timestamp))
            .then_with(|| self.txid.cmp(&other.txid))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two records by their current fields.
pub fn compare(a: &TransactionRecord, b: &TransactionRecord) -> Ordering {
    SortKey::of(a).cmp(&SortKey::of(b))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;
    use crate::record::mocks::{day, txid, TransactionRecordBuilder};

    fn record(byte: u8, height: Option<u32>, timestamp: Option<u32>) -> TransactionRecord {
        let mut builder = TransactionRecordBuilder::default();
        builder.txid(txid(byte));
        if let Some(height) = height {
            builder.height(height);
        }
        if let Some(d) = timestamp {
            builder.timestamp(day(d));
        }
        builder.build()
    }

    #[test_case((1, Some(10), Some(5)), (2, Some(11), Some(1)) => Ordering::Less; "lower height first")]
    #[test_case((1, Some(10), Some(5)), (2, None, Some(1)) => Ordering::Less; "unmined last")]
    #[test_case((1, None, Some(2)), (2, None, Some(1)) => Ordering::Greater; "timestamp breaks height ties")]
    #[test_case((1, Some(10), None), (2, Some(10), Some(1)) => Ordering::Greater; "missing timestamp last")]
    #[test_case((2, None, None), (1, None, None) => Ordering::Greater; "txid breaks full ties")]
    #[test_case((3, Some(7), Some(3)), (3, Some(7), Some(3)) => Ordering::Equal; "same record")]
    fn order(
        a: (u8, Option<u32>, Option<u32>),
        b: (u8, Option<u32>, Option<u32>),
    ) -> Ordering {
        compare(&record(a.0, a.1, a.2), &record(b.0, b.1, b.2))
    }

    #[test_case(TransactionField::BlockHeight => (true, false))]
    #[test_case(TransactionField::Timestamp => (true, false))]
    #[test_case(TransactionField::Fee => (false, true))]
    #[test_case(TransactionField::LineItems => (false, true))]
    #[test_case(TransactionField::Memo => (false, false))]
    fn field_effects(field: TransactionField) -> (bool, bool) {
        (field.is_order_significant(), field.affects_net_change())
    }

    proptest! {
        #[test]
        fn distinct_txids_never_tie(
            a in any::<[u8; 32]>(),
            b in any::<[u8; 32]>(),
            height in proptest::option::of(1u32..1_000),
        ) {
            prop_assume!(a != b);
            let key = |bytes: [u8; 32]| SortKey {
                block_height: height.map(Into::into),
                timestamp: None,
                txid: bytes,
            };
            prop_assert_ne!(key(a).cmp(&key(b)), Ordering::Equal);
            prop_assert_eq!(key(a).cmp(&key(b)), key(b).cmp(&key(a)).reverse());
        }
    }
}
