//! Entry of an amount in two currencies at once, such as ZEC and its fiat value.

use std::ops::{Deref, DerefMut};

use crate::{
    amount::{Amount, ExchangeRate, Security},
    error::{LedgerError, LedgerResult},
};

/// Marks an update of a [`DualAmountEntry`] as in progress until dropped.
struct UpdateGuard<'a>(&'a mut DualAmountEntry);

impl<'a> UpdateGuard<'a> {
    fn enter(entry: &'a mut DualAmountEntry) -> Self {
        entry.updating = true;
        Self(entry)
    }
}

impl Deref for UpdateGuard<'_> {
    type Target = DualAmountEntry;

    fn deref(&self) -> &DualAmountEntry {
        self.0
    }
}

impl DerefMut for UpdateGuard<'_> {
    fn deref_mut(&mut self) -> &mut DualAmountEntry {
        self.0
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.updating = false;
    }
}

/// A primary amount and its alternate counterpart, kept in step by an exchange rate.
///
/// Setting either side stores it and sets the other side, converted, through its own
/// setter. The update in progress keeps that second setter from converting back. A setter
/// that fails changes neither side.
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use zingo_ledger::amount::{Amount, ExchangeRate, Security, TradingPair};
/// use zingo_ledger::amount_entry::DualAmountEntry;
///
/// let usd = Security::fiat("USD");
/// let mut entry = DualAmountEntry::new(Security::zec(), usd.clone());
/// entry
///     .set_rate(Some(ExchangeRate::new(TradingPair::new(Security::zec(), usd.clone()), Decimal::new(30, 0)).unwrap()))
///     .unwrap();
/// entry.set_primary(Some(Amount::new(Decimal::ONE, Security::zec()))).unwrap();
/// assert_eq!(entry.alternate(), Some(&Amount::new(Decimal::new(30, 0), usd)));
/// ```
#[derive(Debug)]
pub struct DualAmountEntry {
    primary_security: Security,
    alternate_security: Security,
    rate: Option<ExchangeRate>,
    primary: Option<Amount>,
    alternate: Option<Amount>,
    updating: bool,
}

impl DualAmountEntry {
    pub fn new(primary_security: Security, alternate_security: Security) -> Self {
        Self {
            primary_security,
            alternate_security,
            rate: None,
            primary: None,
            alternate: None,
            updating: false,
        }
    }

    pub fn primary(&self) -> Option<&Amount> {
        self.primary.as_ref()
    }

    pub fn alternate(&self) -> Option<&Amount> {
        self.alternate.as_ref()
    }

    pub fn rate(&self) -> Option<&ExchangeRate> {
        self.rate.as_ref()
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    fn check(amount: Option<&Amount>, security: &Security) -> LedgerResult<()> {
        match amount {
            Some(amount) if amount.security() != security => Err(LedgerError::SecurityMismatch {
                expected: security.ticker().clone(),
                found: amount.security().ticker().clone(),
            }),
            _ => Ok(()),
        }
    }

    /// The other side of `amount`, rounded to its precision. Unknown without a rate.
    fn counterpart(&self, amount: Option<&Amount>) -> LedgerResult<Option<Amount>> {
        match (amount, &self.rate) {
            (Some(amount), Some(rate)) => Ok(Some(rate.convert(amount)?.round())),
            _ => Ok(None),
        }
    }

    pub fn set_primary(&mut self, amount: Option<Amount>) -> LedgerResult<()> {
        Self::check(amount.as_ref(), &self.primary_security)?;
        if self.updating {
            self.primary = amount;
            return Ok(());
        }
        let alternate = self.counterpart(amount.as_ref())?;
        Self::check(alternate.as_ref(), &self.alternate_security)?;
        self.primary = amount;
        let mut guard = UpdateGuard::enter(self);
        guard.set_alternate(alternate)
    }

    pub fn set_alternate(&mut self, amount: Option<Amount>) -> LedgerResult<()> {
        Self::check(amount.as_ref(), &self.alternate_security)?;
        if self.updating {
            self.alternate = amount;
            return Ok(());
        }
        let primary = self.counterpart(amount.as_ref())?;
        Self::check(primary.as_ref(), &self.primary_security)?;
        self.alternate = amount;
        let mut guard = UpdateGuard::enter(self);
        guard.set_primary(primary)
    }

    /// Changes the rate and recomputes the alternate side from the primary one. On error
    /// the previous rate stays.
    pub fn set_rate(&mut self, rate: Option<ExchangeRate>) -> LedgerResult<()> {
        let previous = std::mem::replace(&mut self.rate, rate);
        let primary = self.primary.clone();
        if let Err(e) = self.set_primary(primary) {
            self.rate = previous;
            return Err(e);
        }
        Ok(())
    }
}
