//! The owner of an account's ledger.
//!
//! All changes to the [`LedgerView`] happen here, one at a time: account events from the
//! sync layer, alternate amounts entered by the user and completed exchange rate fetches
//! are read from their queues and applied in the order they arrive.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use zcash_primitives::transaction::TxId;
use zingoconfig::ZingoConfig;

use crate::{
    amount::{Amount, Security},
    backfill::{
        BackfillCompletion, ExchangeRateBackfiller, ExchangeRateCache,
        HistoricalExchangeRateProvider, InMemoryRateCache,
    },
    error::LedgerResult,
    order::TransactionField,
    record::TransactionRecord,
    view::{LedgerChange, LedgerView},
};

/// A change to an account's ledger.
#[derive(Clone, Debug)]
pub enum AccountEvent {
    Added(Arc<TransactionRecord>),
    Removed(TxId),
    /// The record after `field` changed.
    Changed(Arc<TransactionRecord>, TransactionField),
    /// The whole collection was replaced.
    Reloaded(Vec<Arc<TransactionRecord>>),
    /// The user entered the alternate amount of a transaction.
    AlternateAmountEntered(TxId, Amount),
    /// Entries still lacking an alternate amount should be looked up again.
    RefreshRequested,
}

/// An account's ledger and the backfill of its alternate currency values.
pub struct Ledger<C: ExchangeRateCache = InMemoryRateCache> {
    view: LedgerView,
    backfiller: Option<ExchangeRateBackfiller<C>>,
    refresh_interval: Duration,
}

impl<C: ExchangeRateCache> Ledger<C> {
    /// An empty ledger in the coin of the configured chain. Alternate amounts are fetched
    /// from `provider` in the configured currency, unless backfill is switched off.
    pub fn new(
        config: &ZingoConfig,
        provider: Arc<dyn HistoricalExchangeRateProvider>,
        cache: C,
        cancellation_token: CancellationToken,
    ) -> Self {
        let backfiller = config.backfill_exchange_rates.then(|| {
            ExchangeRateBackfiller::new(
                provider,
                cache,
                Security::fiat(config.alternate_currency.clone()),
                cancellation_token,
            )
        });
        Self {
            view: LedgerView::new(Security::for_chain(config.chain)),
            backfiller,
            refresh_interval: config.backfill_refresh_interval,
        }
    }

    pub fn view(&self) -> &LedgerView {
        &self.view
    }

    pub fn backfiller(&self) -> Option<&ExchangeRateBackfiller<C>> {
        self.backfiller.as_ref()
    }

    fn schedule(&mut self, txid: &TxId) {
        if let Some(backfiller) = self.backfiller.as_mut() {
            backfiller.schedule(&mut self.view, txid);
        }
    }

    /// Applies one event and schedules backfill for the entries it touched.
    /// Added and removed transactions rebalance from their index, a reload from the start.
    /// Alternate amounts and refreshes leave the balances alone.
    pub fn apply(&mut self, event: AccountEvent) -> LedgerResult<LedgerChange> {
        match event {
            AccountEvent::Added(record) => {
                let txid = record.txid;
                self.view.insert(record)?;
                let index = self.view.index_of(&txid).unwrap_or(0);
                self.schedule(&txid);
                Ok(LedgerChange::Rebalanced { from: index })
            }
            AccountEvent::Removed(txid) => {
                let index = self.view.index_of(&txid).unwrap_or(0);
                self.view.remove(&txid)?;
                Ok(LedgerChange::Rebalanced { from: index })
            }
            AccountEvent::Changed(record, field) => {
                let txid = record.txid;
                let change = self.view.on_field_changed(record, field)?;
                // a confirmation is what gives a pending transaction its timestamp
                self.schedule(&txid);
                Ok(change)
            }
            AccountEvent::Reloaded(records) => {
                self.view.reload(records)?;
                self.refresh_alternate_amounts();
                Ok(LedgerChange::Rebalanced { from: 0 })
            }
            AccountEvent::AlternateAmountEntered(txid, amount) => {
                self.set_alternate_amount(&txid, amount)?;
                Ok(LedgerChange::Unchanged)
            }
            AccountEvent::RefreshRequested => {
                self.refresh_alternate_amounts();
                Ok(LedgerChange::Unchanged)
            }
        }
    }

    /// Schedules backfill for every entry still lacking an alternate amount.
    pub fn refresh_alternate_amounts(&mut self) -> usize {
        match self.backfiller.as_mut() {
            Some(backfiller) => backfiller.refresh(&mut self.view),
            None => 0,
        }
    }

    /// Applies a finished rate fetch.
    pub fn apply_completion(&mut self, completion: BackfillCompletion) -> bool {
        match self.backfiller.as_mut() {
            Some(backfiller) => backfiller.apply_completion(&mut self.view, completion),
            None => false,
        }
    }

    /// Sets the alternate amount of an entry as entered by the user.
    pub fn set_alternate_amount(&mut self, txid: &TxId, amount: Amount) -> LedgerResult<()> {
        match self.backfiller.as_mut() {
            Some(backfiller) => backfiller.set_alternate_amount(&mut self.view, txid, amount),
            None => self.view.set_alternate_amount(txid, Some(amount)),
        }
    }

    fn refresh_timer(&self) -> Option<Interval> {
        if self.backfiller.is_none() || self.refresh_interval.is_zero() {
            return None;
        }
        let mut timer =
            tokio::time::interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(timer)
    }

    /// Applies events and rate fetches as they arrive, until the event queue closes or
    /// `cancellation_token` is cancelled. Missing alternate amounts are looked up again
    /// every `backfill_refresh_interval`.
    ///
    /// Events that cannot be applied are logged and skipped.
    pub async fn run(
        &mut self,
        mut events: UnboundedReceiver<AccountEvent>,
        cancellation_token: CancellationToken,
    ) {
        let mut refresh_timer = self.refresh_timer();
        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    log::debug!("Ledger stopped");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.apply(event) {
                            log::warn!("Could not apply account event: {e}");
                        }
                    }
                    None => {
                        log::debug!("Account event queue closed");
                        break;
                    }
                },
                Some(completion) = next_completion(&mut self.backfiller) => {
                    self.apply_completion(completion);
                }
                _ = next_tick(&mut refresh_timer) => {
                    let scheduled = self.refresh_alternate_amounts();
                    if scheduled > 0 {
                        log::debug!("Looking up {scheduled} missing alternate amounts");
                    }
                }
            }
        }
        if let Some(backfiller) = &self.backfiller {
            backfiller.shutdown();
        }
    }
}

async fn next_completion<C: ExchangeRateCache>(
    backfiller: &mut Option<ExchangeRateBackfiller<C>>,
) -> Option<BackfillCompletion> {
    match backfiller {
        Some(backfiller) => backfiller.next_completion().await,
        None => futures::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use tokio::sync::{mpsc::unbounded_channel, Notify};
    use zingoconfig::ChainType;

    use super::*;
    use crate::{
        amount::TradingPair,
        backfill::mocks::{FixedRateProvider, FlakyRateProvider},
        record::mocks::{day, txid, TransactionRecordBuilder},
    };

    fn config() -> ZingoConfig {
        ZingoConfig::create_unconnected(ChainType::Mainnet, None)
    }

    fn record(byte: u8, height: u32, value: rust_decimal::Decimal) -> Arc<TransactionRecord> {
        Arc::new(
            TransactionRecordBuilder::default()
                .txid(txid(byte))
                .height(height)
                .timestamp(day(height))
                .receive(value)
                .build(),
        )
    }

    #[test]
    fn events_keep_the_view_in_step() {
        let mut ledger: Ledger = Ledger::new(
            &config().with_backfill_exchange_rates(false),
            Arc::new(FixedRateProvider::new(dec!(30))),
            InMemoryRateCache::default(),
            CancellationToken::new(),
        );
        ledger.apply(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
        let change = ledger.apply(AccountEvent::Added(record(2, 5, dec!(1)))).unwrap();
        assert_eq!(change, LedgerChange::Rebalanced { from: 0 });
        assert_eq!(ledger.view().balance().value(), dec!(3));

        ledger.apply(AccountEvent::Removed(txid(2))).unwrap();
        assert_eq!(ledger.view().len(), 1);
        assert!(ledger.apply(AccountEvent::Removed(txid(2))).is_err());

        ledger
            .apply(AccountEvent::Reloaded(vec![record(3, 1, dec!(4))]))
            .unwrap();
        assert_eq!(ledger.view().balance().value(), dec!(4));
        assert!(ledger.backfiller().is_none());
    }

    #[test]
    fn user_value_without_backfill() {
        let mut ledger: Ledger = Ledger::new(
            &config().with_backfill_exchange_rates(false),
            Arc::new(FixedRateProvider::new(dec!(30))),
            InMemoryRateCache::default(),
            CancellationToken::new(),
        );
        ledger.apply(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
        let usd = Amount::new(dec!(50), Security::fiat("USD"));
        ledger.set_alternate_amount(&txid(1), usd.clone()).unwrap();
        assert_eq!(
            ledger.view().get(&txid(1)).unwrap().alternate_amount(),
            &Some(usd)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_applies_events_and_backfill() {
        let cancellation_token = CancellationToken::new();
        let mut ledger: Ledger = Ledger::new(
            &config().with_alternate_currency("EUR"),
            Arc::new(FixedRateProvider::new(dec!(20))),
            InMemoryRateCache::default(),
            cancellation_token.clone(),
        );
        let (sender, events) = unbounded_channel();
        let driver = async {
            sender.send(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
            sender.send(AccountEvent::Added(record(2, 11, dec!(-0.5)))).unwrap();
            // paused time only advances once the owner and the fetches are idle
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancellation_token.cancel();
        };
        tokio::join!(ledger.run(events, cancellation_token.clone()), driver);

        assert_eq!(ledger.view().balance().value(), dec!(1.5));
        let eur = |value| Some(Amount::new(value, Security::fiat("EUR")));
        assert_eq!(
            ledger.view().get(&txid(1)).unwrap().alternate_amount(),
            &eur(dec!(40))
        );
        assert_eq!(
            ledger.view().get(&txid(2)).unwrap().alternate_amount(),
            &eur(dec!(-10))
        );
        assert_eq!(ledger.backfiller().unwrap().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancellation() {
        let gate = Arc::new(Notify::new());
        let cancellation_token = CancellationToken::new();
        let mut ledger: Ledger = Ledger::new(
            &config(),
            Arc::new(FixedRateProvider::gated(dec!(20), gate)),
            InMemoryRateCache::default(),
            cancellation_token.clone(),
        );
        let (sender, events) = unbounded_channel();
        let driver = async {
            sender.send(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancellation_token.cancel();
        };
        tokio::join!(ledger.run(events, cancellation_token.clone()), driver);

        assert_eq!(ledger.view().len(), 1);
        assert_eq!(ledger.view().get(&txid(1)).unwrap().alternate_amount(), &None);
        assert_eq!(ledger.backfiller().unwrap().pending(), 1);
    }

    fn eur(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value, Security::fiat("EUR"))
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_schedules_backfill_of_a_pending_transaction() {
        let cancellation_token = CancellationToken::new();
        let mut ledger: Ledger = Ledger::new(
            &config().with_alternate_currency("EUR"),
            Arc::new(FixedRateProvider::new(dec!(20))),
            InMemoryRateCache::default(),
            cancellation_token.clone(),
        );
        let pending = TransactionRecordBuilder::default()
            .txid(txid(1))
            .receive(dec!(2))
            .build();
        let (sender, events) = unbounded_channel();
        let driver = async {
            sender.send(AccountEvent::Added(Arc::new(pending))).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            sender
                .send(AccountEvent::Changed(
                    record(1, 10, dec!(2)),
                    TransactionField::BlockHeight,
                ))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancellation_token.cancel();
        };
        tokio::join!(ledger.run(events, cancellation_token.clone()), driver);

        assert_eq!(
            ledger.view().get(&txid(1)).unwrap().alternate_amount(),
            &Some(eur(dec!(40)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_timer_revalues_failed_fetches() {
        let cancellation_token = CancellationToken::new();
        let provider = Arc::new(FlakyRateProvider::new(1, dec!(20)));
        let mut ledger: Ledger = Ledger::new(
            &config()
                .with_alternate_currency("EUR")
                .with_backfill_refresh_interval(Duration::from_secs(60)),
            provider.clone(),
            InMemoryRateCache::default(),
            cancellation_token.clone(),
        );
        let (sender, events) = unbounded_channel();
        let driver = async {
            sender.send(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(provider.request_count(), 1);
            tokio::time::sleep(Duration::from_secs(60)).await;
            cancellation_token.cancel();
        };
        tokio::join!(ledger.run(events, cancellation_token.clone()), driver);

        assert_eq!(provider.request_count(), 2);
        assert_eq!(
            ledger.view().get(&txid(1)).unwrap().alternate_amount(),
            &Some(eur(dec!(40)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_request_revalues_failed_fetches() {
        let cancellation_token = CancellationToken::new();
        let provider = Arc::new(FlakyRateProvider::new(1, dec!(20)));
        let mut ledger: Ledger = Ledger::new(
            &config()
                .with_alternate_currency("EUR")
                .with_backfill_refresh_interval(Duration::ZERO),
            provider.clone(),
            InMemoryRateCache::default(),
            cancellation_token.clone(),
        );
        let (sender, events) = unbounded_channel();
        let driver = async {
            sender.send(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            sender.send(AccountEvent::RefreshRequested).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancellation_token.cancel();
        };
        tokio::join!(ledger.run(events, cancellation_token.clone()), driver);

        assert_eq!(provider.request_count(), 2);
        assert_eq!(
            ledger.view().get(&txid(1)).unwrap().alternate_amount(),
            &Some(eur(dec!(40)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn user_value_wins_over_a_fetch_in_flight() {
        let gate = Arc::new(Notify::new());
        let cancellation_token = CancellationToken::new();
        let mut ledger: Ledger = Ledger::new(
            &config().with_alternate_currency("EUR"),
            Arc::new(FixedRateProvider::gated(dec!(20), gate.clone())),
            InMemoryRateCache::default(),
            cancellation_token.clone(),
        );
        let (sender, events) = unbounded_channel();
        let driver = async {
            sender.send(AccountEvent::Added(record(1, 10, dec!(2)))).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            sender
                .send(AccountEvent::AlternateAmountEntered(txid(1), eur(dec!(100))))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            gate.notify_one();
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancellation_token.cancel();
        };
        tokio::join!(ledger.run(events, cancellation_token.clone()), driver);

        assert_eq!(
            ledger.view().get(&txid(1)).unwrap().alternate_amount(),
            &Some(eur(dec!(100)))
        );
        let backfiller = ledger.backfiller().unwrap();
        assert_eq!(backfiller.pending(), 0);
        let pair = TradingPair::new(Security::zec(), Security::fiat("EUR"));
        let rate = backfiller.cache().try_get(day(10), &pair).unwrap();
        assert_eq!(rate.price(), dec!(50));
    }
}
