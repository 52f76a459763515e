//! Error types for the wagerbot economy core
//!
//! Every core operation returns an [`EconomyError`] to its immediate caller.
//! Nothing here retries; retry policy belongs to whoever invoked the core.

use chrono::{DateTime, Utc};

use crate::ledger::AccountId;

/// Root error type for all economy operations
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    /// Payer or bettor lacks the balance; carries the current balance for display
    #[error("insufficient funds: need {needed}, have {balance}")]
    InsufficientFunds { needed: i64, balance: i64 },

    #[error("victim {victim} holds {balance}, less than the requested {amount}")]
    InsufficientVictimFunds {
        victim: AccountId,
        balance: i64,
        amount: i64,
    },

    /// Self-payment, self-theft or the house acting against itself
    #[error("an account cannot target itself")]
    SelfTarget,

    #[error("account {target} is already silenced until {until}")]
    AlreadySilenced {
        target: AccountId,
        until: DateTime<Utc>,
    },

    #[error("account {target} is not silenced")]
    NotSilenced { target: AccountId },

    #[error("account {victim} was robbed recently, retry after {until}")]
    CooldownActive {
        victim: AccountId,
        until: DateTime<Utc>,
    },

    #[error("malformed duration '{0}', expected <number><s|m|h>")]
    MalformedDuration(String),

    #[error("invalid {field} = {value}: {reason}")]
    InvalidRange {
        field: &'static str,
        value: i64,
        reason: String,
    },

    #[error("account {0} is not permitted to do that")]
    NotPermitted(AccountId),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The casino cannot cover the net payout of a round
    #[error("house cannot cover payout: need {needed}, holds {available}")]
    HouseInsufficientFunds { needed: i64, available: i64 },

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// A result could not be encoded for the caller
    #[error("encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EconomyError {
    /// Shorthand for a range violation on a named input
    pub fn invalid_range(field: &'static str, value: i64, reason: impl Into<String>) -> Self {
        EconomyError::InvalidRange {
            field,
            value,
            reason: reason.into(),
        }
    }

    /// Whether the failure came from the storage collaborator rather than the caller's input
    pub fn is_store_failure(&self) -> bool {
        matches!(self, EconomyError::Store(_))
    }
}

/// Storage system errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    DatabaseOpenFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::WriteFailed(err.into_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::CorruptedData(err.to_string())
    }
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration value {field} = {value}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("configuration logical inconsistency: {0}")]
    LogicalInconsistency(String),
}

/// Result type alias for economy operations
pub type EconomyResult<T> = Result<T, EconomyError>;
