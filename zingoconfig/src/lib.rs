#![forbid(unsafe_code)]
//! Configuration shared by the ledger and the sync progress crates.
use std::{
    io::{self, Error, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};

use log::LevelFilter;
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};

pub const DEFAULT_LOGFILE_NAME: &str = "zingo-ledger.debug.log";
pub const DEFAULT_ALTERNATE_CURRENCY: &str = "USD";
/// Accounts are synced again once per day unless a retry is requested.
pub const DEFAULT_SYNC_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_RETRY_ATTEMPT_LIMIT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Entries still lacking an alternate amount are looked up again this often.
pub const DEFAULT_BACKFILL_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);
const LOG_WINDOW_SIZE: u32 = 3;
const LOG_SIZE_LIMIT: u64 = 5 * 1024 * 1024;

/// Configuration data for a ledger and its sync progress reporting.
#[derive(Clone, Debug)]
pub struct ZingoConfig {
    pub chain: ChainType,
    /// The directory where the logfiles will be created. By default, this will be in ~/.zcash on Linux and %APPDATA%\Zcash on Windows.
    pub wallet_dir: Option<PathBuf>,
    /// The filename of the logfile. This will be created in the `wallet_dir`.
    pub logfile_name: PathBuf,
    /// Ticker of the fiat currency that ledger entries are valued in.
    pub alternate_currency: String,
    /// Whether missing alternate currency values are fetched from a rate provider.
    pub backfill_exchange_rates: bool,
    /// How often failed or skipped backfills are retried. Zero turns the retry off.
    pub backfill_refresh_interval: Duration,
    pub sync_poll_interval: Duration,
    pub retry_attempt_limit: u32,
    pub retry_delay: Duration,
}

impl ZingoConfig {
    // Create an unconnected (to any server) config with every default in place.
    pub fn create_unconnected(chain: ChainType, dir: Option<PathBuf>) -> ZingoConfig {
        ZingoConfig {
            chain,
            wallet_dir: dir,
            logfile_name: DEFAULT_LOGFILE_NAME.into(),
            alternate_currency: DEFAULT_ALTERNATE_CURRENCY.to_string(),
            backfill_exchange_rates: true,
            backfill_refresh_interval: DEFAULT_BACKFILL_REFRESH_INTERVAL,
            sync_poll_interval: DEFAULT_SYNC_POLL_INTERVAL,
            retry_attempt_limit: DEFAULT_RETRY_ATTEMPT_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_alternate_currency(mut self, ticker: impl Into<String>) -> Self {
        self.alternate_currency = ticker.into();
        self
    }

    pub fn with_sync_poll_interval(mut self, interval: Duration) -> Self {
        self.sync_poll_interval = interval;
        self
    }

    pub fn with_retry_policy(mut self, attempt_limit: u32, delay: Duration) -> Self {
        self.retry_attempt_limit = attempt_limit;
        self.retry_delay = delay;
        self
    }

    pub fn with_backfill_exchange_rates(mut self, enabled: bool) -> Self {
        self.backfill_exchange_rates = enabled;
        self
    }

    pub fn with_backfill_refresh_interval(mut self, interval: Duration) -> Self {
        self.backfill_refresh_interval = interval;
        self
    }

    /// A rolling log file in the wallet dir. Rolled files are kept next to it as
    /// `<logfile>.0` to `<logfile>.2`.
    pub fn get_log_config(&self) -> io::Result<Config> {
        let log_path = self.get_log_path()?;
        let roll_pattern = format!("{}.{{}}", log_path.display());
        let roller = FixedWindowRoller::builder()
            .build(&roll_pattern, LOG_WINDOW_SIZE)
            .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
        let policy = CompoundPolicy::new(
            Box::new(SizeTrigger::new(LOG_SIZE_LIMIT)),
            Box::new(roller),
        );
        let logfile = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l}::{m}{n}")))
            .build(&log_path, Box::new(policy))?;

        let appender = Appender::builder()
            .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
            .build("logfile", Box::new(logfile));
        Config::builder()
            .appender(appender)
            .build(Root::builder().appender("logfile").build(LevelFilter::Debug))
            .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))
    }

    pub fn get_zingo_wallet_dir(&self) -> io::Result<Box<Path>> {
        let mut zcash_data_location;
        // If there's some --data-dir path provided, use it
        if let Some(wallet_dir) = &self.wallet_dir {
            zcash_data_location = wallet_dir.clone();
        } else {
            #[cfg(any(target_os = "macos", target_os = "windows"))]
            {
                zcash_data_location = dirs::data_dir().ok_or_else(|| {
                    Error::new(ErrorKind::NotFound, "Couldn't determine app data directory")
                })?;
                zcash_data_location.push("Zcash");
            }

            #[cfg(not(any(target_os = "macos", target_os = "windows")))]
            {
                zcash_data_location = dirs::home_dir().ok_or_else(|| {
                    log::info!("Couldn't determine home dir!");
                    Error::new(ErrorKind::NotFound, "Couldn't determine home directory")
                })?;
                zcash_data_location.push(".zcash");
            }

            match &self.chain {
                ChainType::Testnet => zcash_data_location.push("testnet3"),
                ChainType::Regtest => zcash_data_location.push("regtest"),
                ChainType::Mainnet => {}
            };
        }

        std::fs::create_dir_all(&zcash_data_location)?;

        Ok(zcash_data_location.into_boxed_path())
    }

    pub fn get_log_path(&self) -> io::Result<Box<Path>> {
        let mut log_path = self.get_zingo_wallet_dir()?.into_path_buf();
        log_path.push(&self.logfile_name);

        Ok(log_path.into_boxed_path())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainType {
    Testnet,
    Regtest,
    Mainnet,
}

impl ChainType {
    /// The ticker of the native coin on this chain.
    pub fn ticker(&self) -> &'static str {
        match self {
            ChainType::Mainnet => "ZEC",
            ChainType::Testnet | ChainType::Regtest => "TAZ",
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ChainType::*;
        let name = match self {
            Testnet => "test",
            Regtest => "regtest",
            Mainnet => "main",
        };
        write!(f, "{name}")
    }
}
