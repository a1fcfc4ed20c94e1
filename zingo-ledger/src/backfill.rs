//! Best effort valuation of ledger entries in an alternate currency.
//!
//! Missing alternate amounts are filled from a cache of historical rates, or fetched from a
//! [`HistoricalExchangeRateProvider`] on a background task. Fetch results come back through
//! a completion queue and are applied by the owner of the [`LedgerView`], so a fetch never
//! blocks or fails a ledger mutation.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use zcash_primitives::transaction::TxId;

use crate::{
    amount::{Amount, ExchangeRate, Security, TradingPair},
    error::{LedgerError, LedgerResult, ProviderError},
    view::LedgerView,
};

/// A source of historical exchange rates.
#[async_trait]
pub trait HistoricalExchangeRateProvider: Send + Sync {
    /// Display name of the provider, used in logs.
    fn name(&self) -> &str;

    /// The rate of `pair` at `timestamp`, or `None` if the provider has no rate for it.
    async fn get_exchange_rate(
        &self,
        timestamp: DateTime<Utc>,
        pair: &TradingPair,
        cancellation_token: CancellationToken,
    ) -> Result<Option<ExchangeRate>, ProviderError>;
}

/// Exchange rates already known, keyed by the moment they apply to.
pub trait ExchangeRateCache {
    fn try_get(&self, timestamp: DateTime<Utc>, pair: &TradingPair) -> Option<ExchangeRate>;

    fn set(&mut self, timestamp: DateTime<Utc>, rate: ExchangeRate);
}

/// An [`ExchangeRateCache`] that lives as long as the wallet session.
#[derive(Debug, Default)]
pub struct InMemoryRateCache {
    rates: HashMap<(TradingPair, DateTime<Utc>), ExchangeRate>,
}

impl ExchangeRateCache for InMemoryRateCache {
    /// Finds a rate for `pair`, or inverts a stored rate of the opposite pair.
    fn try_get(&self, timestamp: DateTime<Utc>, pair: &TradingPair) -> Option<ExchangeRate> {
        if let Some(rate) = self.rates.get(&(pair.clone(), timestamp)) {
            return Some(rate.clone());
        }
        self.rates
            .get(&(pair.inverse(), timestamp))
            .and_then(|rate| rate.inverse().ok())
    }

    fn set(&mut self, timestamp: DateTime<Utc>, rate: ExchangeRate) {
        self.rates.insert((rate.pair().clone(), timestamp), rate);
    }
}

/// The outcome of a fetch started by [`ExchangeRateBackfiller::schedule`].
#[derive(Debug)]
pub struct BackfillCompletion {
    pub txid: TxId,
    /// The timestamp of the entry when the fetch started.
    pub timestamp: DateTime<Utc>,
    pub pair: TradingPair,
    pub outcome: Result<Option<ExchangeRate>, ProviderError>,
}

/// What [`ExchangeRateBackfiller::schedule`] did for an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackfillAction {
    /// The entry is gone, already valued, or has no timestamp.
    NotNeeded,
    /// A cached rate was applied.
    Applied,
    /// A fetch was started.
    Requested,
    /// A fetch for the entry is already running.
    AlreadyRequested,
}

/// Fills in missing alternate amounts of a [`LedgerView`].
pub struct ExchangeRateBackfiller<C: ExchangeRateCache = InMemoryRateCache> {
    provider: Arc<dyn HistoricalExchangeRateProvider>,
    cache: C,
    alternate: Security,
    in_flight: HashSet<TxId>,
    completion_sender: UnboundedSender<BackfillCompletion>,
    completions: UnboundedReceiver<BackfillCompletion>,
    cancellation_token: CancellationToken,
}

impl<C: ExchangeRateCache> ExchangeRateBackfiller<C> {
    /// Creates a backfiller valuing entries in `alternate`. Cancelling the token, directly
    /// or through [`Self::shutdown`], stops every fetch in flight.
    pub fn new(
        provider: Arc<dyn HistoricalExchangeRateProvider>,
        cache: C,
        alternate: Security,
        cancellation_token: CancellationToken,
    ) -> Self {
        let (completion_sender, completions) = unbounded_channel();
        Self {
            provider,
            cache,
            alternate,
            in_flight: HashSet::new(),
            completion_sender,
            completions,
            cancellation_token,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn alternate(&self) -> &Security {
        &self.alternate
    }

    /// Number of fetches started and not yet applied.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    fn pair_for(&self, view: &LedgerView) -> TradingPair {
        TradingPair::new(view.security().clone(), self.alternate.clone())
    }

    /// Values the entry with a cached rate, or starts fetching one.
    ///
    /// Fetches need a Tokio runtime. Outside of one the entry is left for a later refresh.
    pub fn schedule(&mut self, view: &mut LedgerView, txid: &TxId) -> BackfillAction {
        let Some(entry) = view.get(txid) else {
            return BackfillAction::NotNeeded;
        };
        let Some(timestamp) = entry.timestamp() else {
            return BackfillAction::NotNeeded;
        };
        if entry.alternate_amount().is_some() {
            return BackfillAction::NotNeeded;
        }
        let pair = self.pair_for(view);

        if let Some(rate) = self.cache.try_get(timestamp, &pair) {
            return match rate.convert(entry.net_change()) {
                Ok(amount) => {
                    view.fill_alternate_amount(txid, amount.round());
                    BackfillAction::Applied
                }
                Err(e) => {
                    log::warn!("Cached rate {rate} does not apply to {txid}: {e}");
                    BackfillAction::NotNeeded
                }
            };
        }

        if self.in_flight.contains(txid) {
            return BackfillAction::AlreadyRequested;
        }
        if self.cancellation_token.is_cancelled() {
            return BackfillAction::NotNeeded;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No runtime to fetch the exchange rate for {txid}");
            return BackfillAction::NotNeeded;
        };

        self.in_flight.insert(*txid);
        let txid = *txid;
        let provider = self.provider.clone();
        let sender = self.completion_sender.clone();
        let cancellation_token = self.cancellation_token.clone();
        log::debug!(
            "Fetching {pair} at {timestamp} from {} for {txid}",
            provider.name()
        );
        runtime.spawn(async move {
            let outcome = tokio::select! {
                outcome = provider.get_exchange_rate(timestamp, &pair, cancellation_token.clone()) => outcome,
                _ = cancellation_token.cancelled() => Err(ProviderError::Cancelled),
            };
            let completion = BackfillCompletion {
                txid,
                timestamp,
                pair,
                outcome,
            };
            if sender.send(completion).is_err() {
                log::debug!("Backfiller dropped before the rate for {txid} arrived");
            }
        });
        BackfillAction::Requested
    }

    /// Schedules every entry that still lacks an alternate amount.
    /// Returns the number of entries valued or requested.
    pub fn refresh(&mut self, view: &mut LedgerView) -> usize {
        let missing: Vec<TxId> = view
            .entries()
            .iter()
            .filter(|entry| entry.alternate_amount().is_none() && entry.timestamp().is_some())
            .map(|entry| entry.txid())
            .collect();
        missing
            .iter()
            .map(|txid| self.schedule(view, txid))
            .filter(|action| matches!(action, BackfillAction::Applied | BackfillAction::Requested))
            .count()
    }

    /// Applies a finished fetch. Returns whether an alternate amount was written.
    ///
    /// A fetched rate is cached unless a rate for that moment is already known, such as one
    /// implied by a user entered value. The entry is only written if it still exists, its
    /// timestamp did not change since the fetch started, and its alternate amount is still
    /// unset. An entry whose timestamp moved is scheduled again at its new timestamp.
    pub fn apply_completion(
        &mut self,
        view: &mut LedgerView,
        completion: BackfillCompletion,
    ) -> bool {
        let BackfillCompletion {
            txid,
            timestamp,
            pair,
            outcome,
        } = completion;
        self.in_flight.remove(&txid);

        let rate = match outcome {
            Ok(Some(rate)) => Some(rate),
            Ok(None) => {
                log::debug!("No {pair} rate at {timestamp} for {txid}");
                None
            }
            Err(ProviderError::Cancelled) => {
                log::debug!("Rate fetch for {txid} cancelled");
                return false;
            }
            Err(e) => {
                log::warn!("Rate fetch for {txid} failed: {e}");
                None
            }
        };
        if let Some(rate) = &rate {
            if self.cache.try_get(timestamp, &pair).is_none() {
                self.cache.set(timestamp, rate.clone());
            }
        }

        let Some(entry) = view.get(&txid) else {
            return false;
        };
        if entry.alternate_amount().is_some() {
            return false;
        }
        if entry.timestamp() != Some(timestamp) {
            log::debug!("Timestamp of {txid} moved while its rate was fetched");
            return self.schedule(view, &txid) == BackfillAction::Applied;
        }
        let Some(rate) = rate else {
            return false;
        };
        match rate.convert(entry.net_change()) {
            Ok(amount) => view.fill_alternate_amount(&txid, amount.round()),
            Err(e) => {
                log::warn!("Fetched rate {rate} does not apply to {txid}: {e}");
                false
            }
        }
    }

    /// Applies every completion that has already arrived. Returns how many were written.
    pub fn apply_ready(&mut self, view: &mut LedgerView) -> usize {
        let mut written = 0;
        while let Ok(completion) = self.completions.try_recv() {
            if self.apply_completion(view, completion) {
                written += 1;
            }
        }
        written
    }

    /// Waits for the next fetch to finish.
    pub async fn next_completion(&mut self) -> Option<BackfillCompletion> {
        self.completions.recv().await
    }

    /// Records a user-entered alternate amount, and the rate it implies for the moment of
    /// the transaction so later valuations of that moment agree with it.
    pub fn set_alternate_amount(
        &mut self,
        view: &mut LedgerView,
        txid: &TxId,
        amount: Amount,
    ) -> LedgerResult<()> {
        if amount.security() != &self.alternate {
            return Err(LedgerError::SecurityMismatch {
                expected: self.alternate.ticker().clone(),
                found: amount.security().ticker().clone(),
            });
        }
        let entry = view
            .get(txid)
            .ok_or(LedgerError::UnknownTransaction(*txid))?;
        let implied = entry
            .timestamp()
            .map(|timestamp| (timestamp, ExchangeRate::implied(entry.net_change(), &amount)));
        view.set_alternate_amount(txid, Some(amount))?;

        match implied {
            Some((timestamp, Ok(rate))) => self.cache.set(timestamp, rate),
            Some((_, Err(e))) => log::debug!("No rate implied by the amount set on {txid}: {e}"),
            None => {}
        }
        Ok(())
    }

    /// Cancels every fetch in flight. Later schedules do not fetch.
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }
}
