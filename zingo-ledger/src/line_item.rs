//! The individual payments that make up a transaction.

use getset::Getters;

use crate::amount::Amount;

/// The shielded or transparent pool a payment was made in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pool {
    Transparent,
    Sapling,
    Orchard,
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pool::Transparent => "transparent",
            Pool::Sapling => "sapling",
            Pool::Orchard => "orchard",
        };
        write!(f, "{name}")
    }
}

/// Who is on the other side of a payment, when it can be told.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Counterparty {
    /// An entry in the user's address book.
    Contact { name: String },
    /// Another account in the same wallet.
    Account { name: String },
}

/// One payment within a transaction. Sends carry negative amounts, receives positive ones.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct LineItem {
    amount: Amount,
    memo: String,
    to_address: String,
    /// `None` once the item stands for several pools.
    pool: Option<Pool>,
    counterparty: Option<Counterparty>,
}

impl LineItem {
    pub fn new(amount: Amount, to_address: impl Into<String>) -> Self {
        Self {
            amount,
            memo: String::new(),
            to_address: to_address.into(),
            pool: None,
            counterparty: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = Some(counterparty);
        self
    }
}

/// Collapses a payment that the wallet split across two pools back into the single
/// payment the user made.
///
/// Exactly two items with the same memo, each tagged with a pool and the pools different,
/// merge into one item carrying their summed amount and no pool. Anything else is returned
/// item by item.
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use zingo_ledger::amount::{Amount, Security};
/// use zingo_ledger::line_item::{merge_split_items, LineItem, Pool};
///
/// let half = Amount::new(Decimal::new(5, 1), Security::zec());
/// let items = [
///     LineItem::new(half.clone(), "u1abc").with_memo("rent").with_pool(Pool::Sapling),
///     LineItem::new(half, "u1abc").with_memo("rent").with_pool(Pool::Orchard),
/// ];
/// let merged = merge_split_items(&items);
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].amount().value(), Decimal::ONE);
/// assert_eq!(merged[0].pool(), &None);
/// ```
pub fn merge_split_items(items: &[LineItem]) -> Vec<LineItem> {
    match items {
        [first, second] if first.memo == second.memo && in_different_pools(first, second) => {
            match first.amount.checked_add(&second.amount) {
                Ok(amount) => vec![LineItem {
                    amount,
                    pool: None,
                    ..first.clone()
                }],
                Err(e) => {
                    log::debug!("Not merging line items: {e}");
                    items.to_vec()
                }
            }
        }
        _ => items.to_vec(),
    }
}

fn in_different_pools(first: &LineItem, second: &LineItem) -> bool {
    matches!((first.pool, second.pool), (Some(a), Some(b)) if a != b)
}
