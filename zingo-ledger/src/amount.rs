//! Decimal amounts tagged with the security they are denominated in, and the exchange rates
//! that convert between two securities.

use getset::{CopyGetters, Getters};
use rust_decimal::Decimal;
use zingoconfig::ChainType;

use crate::error::{LedgerError, LedgerResult};

/// Zatoshis per ZEC, as a decimal scale.
const ZEC_PRECISION: u32 = 8;
const FIAT_PRECISION: u32 = 2;

/// A currency or coin that amounts are denominated in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Getters, CopyGetters)]
pub struct Security {
    #[getset(get = "pub")]
    ticker: String,
    /// Number of decimal places shown for, and rounded to, this security.
    #[getset(get_copy = "pub")]
    precision: u32,
    #[getset(get_copy = "pub")]
    is_fiat: bool,
}

impl Security {
    pub fn new(ticker: impl Into<String>, precision: u32, is_fiat: bool) -> Self {
        Self {
            ticker: ticker.into(),
            precision,
            is_fiat,
        }
    }

    /// The native coin of the given chain.
    pub fn for_chain(chain: ChainType) -> Self {
        Self::new(chain.ticker(), ZEC_PRECISION, false)
    }

    pub fn zec() -> Self {
        Self::for_chain(ChainType::Mainnet)
    }

    pub fn fiat(ticker: impl Into<String>) -> Self {
        Self::new(ticker, FIAT_PRECISION, true)
    }
}

impl std::fmt::Display for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ticker)
    }
}

/// An exact decimal quantity of a [`Security`].
///
/// Arithmetic is checked: combining amounts of different securities, or overflowing the
/// decimal range, is an error rather than a panic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Getters, CopyGetters)]
pub struct Amount {
    #[getset(get_copy = "pub")]
    value: Decimal,
    #[getset(get = "pub")]
    security: Security,
}

impl Amount {
    pub fn new(value: Decimal, security: Security) -> Self {
        Self { value, security }
    }

    pub fn zero(security: Security) -> Self {
        Self::new(Decimal::ZERO, security)
    }

    /// An amount of the chain's coin given in its smallest unit.
    /// # Examples
    ///
    /// ```
    /// use rust_decimal::Decimal;
    /// use zingo_ledger::amount::{Amount, Security};
    ///
    /// let amount = Amount::from_zatoshis(150_000_000, Security::zec());
    /// assert_eq!(amount.value(), Decimal::new(15, 1));
    /// ```
    pub fn from_zatoshis(zatoshis: i64, security: Security) -> Self {
        Self::new(Decimal::new(zatoshis, ZEC_PRECISION), security)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    fn ensure_same_security(&self, other: &Security) -> LedgerResult<()> {
        if &self.security == other {
            Ok(())
        } else {
            Err(LedgerError::SecurityMismatch {
                expected: self.security.ticker.clone(),
                found: other.ticker.clone(),
            })
        }
    }

    pub fn checked_add(&self, other: &Amount) -> LedgerResult<Amount> {
        self.ensure_same_security(&other.security)?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or(LedgerError::Overflow)?;
        Ok(Self::new(value, self.security.clone()))
    }

    pub fn checked_sub(&self, other: &Amount) -> LedgerResult<Amount> {
        self.ensure_same_security(&other.security)?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or(LedgerError::Overflow)?;
        Ok(Self::new(value, self.security.clone()))
    }

    /// Rounds to the number of decimal places of the security.
    pub fn round(&self) -> Amount {
        Self::new(
            self.value.round_dp(self.security.precision),
            self.security.clone(),
        )
    }
}

impl std::ops::Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount::new(-self.value, self.security)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.value.round_dp(self.security.precision).normalize(),
            self.security
        )
    }
}

/// An ordered pair of securities: prices are given in `quote` per unit of `basis`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Getters)]
#[getset(get = "pub")]
pub struct TradingPair {
    basis: Security,
    quote: Security,
}

impl TradingPair {
    pub fn new(basis: Security, quote: Security) -> Self {
        Self { basis, quote }
    }

    pub fn inverse(&self) -> TradingPair {
        Self::new(self.quote.clone(), self.basis.clone())
    }
}

impl std::fmt::Display for TradingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.basis, self.quote)
    }
}

/// A positive price of a [`TradingPair`].
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct ExchangeRate {
    #[getset(get = "pub")]
    pair: TradingPair,
    #[getset(get_copy = "pub")]
    price: Decimal,
}

impl ExchangeRate {
    pub fn new(pair: TradingPair, price: Decimal) -> LedgerResult<Self> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(price));
        }
        Ok(Self { pair, price })
    }

    /// The rate implied by two amounts that are worth the same, such as a transaction's
    /// net change and the fiat value a user entered for it.
    /// # Examples
    ///
    /// ```
    /// use rust_decimal::Decimal;
    /// use zingo_ledger::amount::{Amount, ExchangeRate, Security};
    ///
    /// let zec = Amount::new(Decimal::new(-2, 0), Security::zec());
    /// let usd = Amount::new(Decimal::new(-60, 0), Security::fiat("USD"));
    /// let rate = ExchangeRate::implied(&zec, &usd).unwrap();
    /// assert_eq!(rate.price(), Decimal::new(30, 0));
    /// ```
    pub fn implied(basis: &Amount, quote: &Amount) -> LedgerResult<Self> {
        if basis.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let price = quote
            .value
            .checked_div(basis.value)
            .ok_or(LedgerError::Overflow)?;
        Self::new(
            TradingPair::new(basis.security.clone(), quote.security.clone()),
            price,
        )
    }

    pub fn inverse(&self) -> LedgerResult<Self> {
        let price = Decimal::ONE
            .checked_div(self.price)
            .ok_or(LedgerError::Overflow)?;
        Self::new(self.pair.inverse(), price)
    }

    /// Converts an amount of either security of the pair into the other one.
    pub fn convert(&self, amount: &Amount) -> LedgerResult<Amount> {
        if amount.security == self.pair.basis {
            let value = amount
                .value
                .checked_mul(self.price)
                .ok_or(LedgerError::Overflow)?;
            Ok(Amount::new(value, self.pair.quote.clone()))
        } else if amount.security == self.pair.quote {
            let value = amount
                .value
                .checked_div(self.price)
                .ok_or(LedgerError::Overflow)?;
            Ok(Amount::new(value, self.pair.basis.clone()))
        } else {
            Err(LedgerError::SecurityMismatch {
                expected: self.pair.to_string(),
                found: amount.security.ticker.clone(),
            })
        }
    }
}

impl std::fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.price.normalize(), self.pair)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn zec(value: Decimal) -> Amount {
        Amount::new(value, Security::zec())
    }

    fn usd(value: Decimal) -> Amount {
        Amount::new(value, Security::fiat("USD"))
    }

    fn zec_usd(price: Decimal) -> ExchangeRate {
        ExchangeRate::new(
            TradingPair::new(Security::zec(), Security::fiat("USD")),
            price,
        )
        .unwrap()
    }

    #[test]
    fn adding_different_securities_fails() {
        assert_eq!(
            zec(dec!(1)).checked_add(&usd(dec!(1))),
            Err(LedgerError::SecurityMismatch {
                expected: "ZEC".to_string(),
                found: "USD".to_string()
            })
        );
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(
            zec(Decimal::MAX).checked_add(&zec(dec!(1))),
            Err(LedgerError::Overflow)
        );
    }

    #[test]
    fn convert_both_directions() {
        let rate = zec_usd(dec!(30));
        assert_eq!(rate.convert(&zec(dec!(2))).unwrap(), usd(dec!(60)));
        assert_eq!(rate.convert(&usd(dec!(15))).unwrap(), zec(dec!(0.5)));
        assert!(rate
            .convert(&Amount::new(dec!(1), Security::fiat("EUR")))
            .is_err());
    }

    #[test]
    fn prices_must_be_positive() {
        let pair = TradingPair::new(Security::zec(), Security::fiat("USD"));
        assert_eq!(
            ExchangeRate::new(pair.clone(), dec!(0)),
            Err(LedgerError::InvalidPrice(dec!(0)))
        );
        // a receive valued at a negative fiat amount implies a negative price
        assert!(ExchangeRate::implied(&zec(dec!(1)), &usd(dec!(-5))).is_err());
        assert_eq!(
            ExchangeRate::implied(&zec(dec!(0)), &usd(dec!(5))),
            Err(LedgerError::ZeroAmount)
        );
    }

    #[test]
    fn inverse_rate() {
        let inverse = zec_usd(dec!(25)).inverse().unwrap();
        assert_eq!(inverse.pair().basis(), &Security::fiat("USD"));
        assert_eq!(inverse.price(), dec!(0.04));
    }

    #[test]
    fn display_rounds_to_precision() {
        assert_eq!(usd(dec!(12.3456)).to_string(), "12.35 USD");
        assert_eq!(zec(dec!(1.50000000)).to_string(), "1.5 ZEC");
        assert_eq!(Amount::from_zatoshis(1, Security::zec()).round(), zec(dec!(0.00000001)));
    }
}
