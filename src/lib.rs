//! Wagerbot - virtual economy core for a chat bot
//!
//! Balances, wagering against a casino counterparty with adaptive odds,
//! theft, and paid or rewarded silences. Chat parsing and rendering stay with
//! the caller; every operation takes typed arguments and returns typed
//! results or an [`EconomyError`].

pub mod accounts;
pub mod cache;
pub mod clock;
pub mod config;
pub mod economy;
pub mod errors;
pub mod games;
pub mod income;
pub mod ledger;
pub mod metrics;
pub mod odds;
pub mod payments;
pub mod random;
pub mod settlement;
pub mod silence;
pub mod storage;
pub mod theft;

pub use config::{ConfigLoader, EconomyConfig};
pub use economy::{Bet, Economy, RoundSummary};
pub use errors::{ConfigError, EconomyError, EconomyResult, StoreError};
pub use ledger::{AccountId, Ledger, LedgerStore, MemoryLedger, Profile, RocksLedger};
