//! The ordered ledger of one account, with a running balance after every transaction.
//!
//! Entries are kept sorted by [`SortKey`] in a `Vec`, and every change recomputes the
//! running balance only from the first position it touched.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use zcash_primitives::transaction::TxId;

use crate::{
    amount::{Amount, Security},
    error::{LedgerError, LedgerResult},
    line_item::LineItem,
    order::{SortKey, TransactionField},
    record::TransactionRecord,
};

/// A transaction as shown in the ledger.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct LedgerEntry {
    #[getset(get = "pub")]
    record: Arc<TransactionRecord>,
    #[getset(get_copy = "pub")]
    key: SortKey,
    /// Every send and receive of the transaction, less the fee.
    #[getset(get = "pub")]
    net_change: Amount,
    /// The account balance right after this transaction.
    #[getset(get = "pub")]
    running_balance: Amount,
    /// The net change valued in the alternate currency, once known.
    #[getset(get = "pub")]
    alternate_amount: Option<Amount>,
}

impl LedgerEntry {
    fn new(record: Arc<TransactionRecord>, security: &Security) -> LedgerResult<Self> {
        let net_change = record.net_change(security)?;
        Ok(Self {
            key: SortKey::of(&record),
            running_balance: net_change.clone(),
            net_change,
            record,
            alternate_amount: None,
        })
    }

    pub fn txid(&self) -> TxId {
        self.record.txid
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.record.timestamp
    }

    pub fn merged_sends(&self) -> Vec<LineItem> {
        self.record.merged_sends()
    }

    pub fn merged_receives(&self) -> Vec<LineItem> {
        self.record.merged_receives()
    }
}

/// The work a field change caused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerChange {
    /// The entry moved and balances were recomputed from the lower of the two indices.
    Moved { from: usize, to: usize },
    /// The entry kept its place and balances were recomputed from it onwards.
    Rebalanced { from: usize },
    Unchanged,
}

/// The chronologically ordered entries of one account.
#[derive(Debug)]
pub struct LedgerView {
    security: Security,
    entries: Vec<LedgerEntry>,
    keys: HashMap<TxId, SortKey>,
}

impl LedgerView {
    /// An empty ledger whose amounts are denominated in `security`.
    pub fn new(security: Security) -> Self {
        Self {
            security,
            entries: Vec::new(),
            keys: HashMap::new(),
        }
    }

    pub fn security(&self) -> &Security {
        &self.security
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, txid: &TxId) -> Option<usize> {
        let key = self.keys.get(txid)?;
        self.entries.binary_search_by(|e| e.key.cmp(key)).ok()
    }

    pub fn get(&self, txid: &TxId) -> Option<&LedgerEntry> {
        self.index_of(txid).map(|index| &self.entries[index])
    }

    /// The balance after the last transaction.
    pub fn balance(&self) -> Amount {
        self.entries
            .last()
            .map(|entry| entry.running_balance.clone())
            .unwrap_or_else(|| Amount::zero(self.security.clone()))
    }

    fn position(&self, txid: &TxId) -> LedgerResult<usize> {
        self.index_of(txid)
            .ok_or(LedgerError::UnknownTransaction(*txid))
    }

    /// Recomputes running balances from `index` to the end, seeded by the predecessor.
    /// Nothing is written unless every balance could be computed.
    fn recompute_from(&mut self, index: usize) -> LedgerResult<()> {
        let mut balance = match index.checked_sub(1) {
            Some(previous) => self.entries[previous].running_balance.clone(),
            None => Amount::zero(self.security.clone()),
        };
        let balances = self.entries[index..]
            .iter()
            .map(|entry| -> LedgerResult<Amount> {
                balance = balance.checked_add(&entry.net_change)?;
                Ok(balance.clone())
            })
            .collect::<LedgerResult<Vec<Amount>>>()?;
        for (entry, balance) in self.entries[index..].iter_mut().zip(balances) {
            entry.running_balance = balance;
        }
        Ok(())
    }

    /// Places `entry` at its sorted position and returns the index.
    fn place(&mut self, entry: LedgerEntry) -> usize {
        let index = self
            .entries
            .binary_search_by(|e| e.key.cmp(&entry.key))
            .unwrap_or_else(|index| index);
        self.keys.insert(entry.txid(), entry.key);
        self.entries.insert(index, entry);
        index
    }

    fn unplace(&mut self, index: usize) -> LedgerEntry {
        let entry = self.entries.remove(index);
        self.keys.remove(&entry.txid());
        entry
    }

    /// Adds a transaction to the ledger.
    ///
    /// On error the ledger is left as it was.
    pub fn insert(&mut self, record: Arc<TransactionRecord>) -> LedgerResult<&LedgerEntry> {
        if self.keys.contains_key(&record.txid) {
            return Err(LedgerError::DuplicateTransaction(record.txid));
        }
        let entry = LedgerEntry::new(record, &self.security)?;
        let index = self.place(entry);
        if let Err(e) = self.recompute_from(index) {
            self.unplace(index);
            return Err(e);
        }
        Ok(&self.entries[index])
    }

    /// Removes a transaction from the ledger and returns its entry.
    ///
    /// On error the ledger is left as it was.
    pub fn remove(&mut self, txid: &TxId) -> LedgerResult<LedgerEntry> {
        let index = self.position(txid)?;
        let entry = self.unplace(index);
        if let Err(e) = self.recompute_from(index) {
            self.place(entry);
            return Err(e);
        }
        Ok(entry)
    }

    /// Brings the ledger up to date after `field` of a record changed.
    ///
    /// `record` replaces the shared record of the entry with the same txid. On error the
    /// ledger is left as it was.
    pub fn on_field_changed(
        &mut self,
        record: Arc<TransactionRecord>,
        field: TransactionField,
    ) -> LedgerResult<LedgerChange> {
        let txid = record.txid;
        let index = self.position(&txid)?;

        if field.is_order_significant() {
            let key = SortKey::of(&record);
            if key == self.entries[index].key {
                self.entries[index].record = record;
                return Ok(LedgerChange::Unchanged);
            }
            let mut entry = LedgerEntry::new(record, &self.security)?;
            let previous = self.unplace(index);
            entry.alternate_amount = previous.alternate_amount.clone();
            let to = self.place(entry);
            if let Err(e) = self.recompute_from(index.min(to)) {
                self.unplace(to);
                self.place(previous);
                return Err(e);
            }
            log::debug!("Ledger entry {txid} moved from {index} to {to}");
            return Ok(LedgerChange::Moved { from: index, to });
        }

        if field.affects_net_change() {
            let net_change = record.net_change(&self.security)?;
            let edited = LedgerEntry {
                record,
                net_change,
                ..self.entries[index].clone()
            };
            let previous = std::mem::replace(&mut self.entries[index], edited);
            if let Err(e) = self.recompute_from(index) {
                self.entries[index] = previous;
                return Err(e);
            }
            return Ok(LedgerChange::Rebalanced { from: index });
        }

        self.entries[index].record = record;
        Ok(LedgerChange::Unchanged)
    }

    /// Rebuilds the whole ledger from `records`, sorting once and computing balances in
    /// one pass. Alternate amounts of transactions that survive the reload are kept.
    ///
    /// On error the ledger is left as it was.
    pub fn reload(
        &mut self,
        records: impl IntoIterator<Item = Arc<TransactionRecord>>,
    ) -> LedgerResult<()> {
        let mut keys = HashMap::new();
        let mut entries = Vec::new();
        for record in records {
            let mut entry = LedgerEntry::new(record, &self.security)?;
            if keys.insert(entry.txid(), entry.key).is_some() {
                return Err(LedgerError::DuplicateTransaction(entry.txid()));
            }
            entry.alternate_amount = self
                .get(&entry.txid())
                .and_then(|previous| previous.alternate_amount.clone());
            entries.push(entry);
        }
        entries.sort_by_key(|entry| entry.key);

        let mut rebuilt = LedgerView {
            security: self.security.clone(),
            entries,
            keys,
        };
        rebuilt.recompute_from(0)?;
        *self = rebuilt;
        log::debug!("Ledger reloaded with {} entries", self.entries.len());
        Ok(())
    }

    /// Sets or clears the alternate amount of an entry unconditionally.
    pub fn set_alternate_amount(
        &mut self,
        txid: &TxId,
        amount: Option<Amount>,
    ) -> LedgerResult<()> {
        let index = self.position(txid)?;
        self.entries[index].alternate_amount = amount;
        Ok(())
    }

    /// Sets the alternate amount of an entry only if it is still unset.
    /// Returns whether it was written.
    pub fn fill_alternate_amount(&mut self, txid: &TxId, amount: Amount) -> bool {
        match self.index_of(txid) {
            Some(index) if self.entries[index].alternate_amount.is_none() => {
                self.entries[index].alternate_amount = Some(amount);
                true
            }
            _ => false,
        }
    }
}
