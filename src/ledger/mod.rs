//! Ledger store interface and per-account serialization
//!
//! Engines never talk to a database directly. They receive a [`Ledger`],
//! which pairs a [`LedgerStore`] implementation with the per-account async
//! locks every read-compute-write sequence must hold.

mod memory;
mod rocks;

pub use memory::MemoryLedger;
pub use rocks::RocksLedger;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::{EconomyError, EconomyResult};

/// Stable user identifier supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    /// The house account that funds every win and absorbs every loss
    pub const CASINO: AccountId = AccountId(1);

    /// Personal savings sub-account of `owner`, stored as its own row
    pub fn bank_of(owner: AccountId) -> AccountId {
        AccountId(-owner.0.abs())
    }

    pub fn is_bank(self) -> bool {
        self.0 < 0
    }

    pub fn is_casino(self) -> bool {
        self == Self::CASINO
    }

    /// Plain user accounts, excluding the house and bank rows
    pub fn is_player(self) -> bool {
        self.0 > 0 && !self.is_casino()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed profile record of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: AccountId,
    pub username: String,
    pub level: i64,
    /// Amount credited by every passive income tick
    pub income: i64,
}

impl Profile {
    /// Profile of the savings row owned by `owner`
    pub fn bank_for(owner: &Profile) -> Self {
        Self {
            id: AccountId::bank_of(owner.id),
            username: format!("bank_{}_{}", owner.id, owner.username),
            level: 0,
            income: 0,
        }
    }
}

/// One balance assignment inside an atomic commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceWrite {
    pub account: AccountId,
    pub balance: i64,
}

impl BalanceWrite {
    pub fn new(account: AccountId, balance: i64) -> Self {
        Self { account, balance }
    }
}

/// Durable balances and profiles plus ephemeral timed records
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance; `UnknownUser` for unregistered ids
    async fn get_balance(&self, id: AccountId) -> EconomyResult<i64>;

    /// Overwrite one balance, returning the stored value
    async fn set_balance(&self, id: AccountId, balance: i64) -> EconomyResult<i64>;

    /// Apply every write or none of them
    async fn commit(&self, writes: &[BalanceWrite]) -> EconomyResult<()>;

    /// Create the account row; returns `false` and changes nothing if it exists
    async fn create_account(&self, profile: &Profile, opening_balance: i64) -> EconomyResult<bool>;

    async fn get_profile(&self, id: AccountId) -> EconomyResult<Option<Profile>>;

    /// Replace the profile of an existing account
    async fn put_profile(&self, profile: &Profile) -> EconomyResult<()>;

    async fn find_user(&self, username: &str) -> EconomyResult<Option<AccountId>>;

    /// Every account id with a balance row, bank rows included
    async fn account_ids(&self) -> EconomyResult<Vec<AccountId>>;

    async fn get_timed_record(&self, key: &str) -> EconomyResult<Option<String>>;

    async fn set_timed_record(&self, key: &str, value: String, ttl: Duration) -> EconomyResult<()>;

    async fn delete_timed_record(&self, key: &str) -> EconomyResult<()>;
}

/// Held for the duration of a read-compute-write sequence
pub struct AccountGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Per-account async mutexes, always acquired in ascending id order
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, ids: &[AccountId]) -> AccountGuard {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in ordered {
            let lock = self
                .locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        AccountGuard { _guards: guards }
    }
}

/// Store handle shared by all engines
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    locks: Arc<AccountLocks>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: Arc::new(AccountLocks::new()),
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub async fn lock(&self, ids: &[AccountId]) -> AccountGuard {
        self.locks.lock(ids).await
    }

    pub async fn balance(&self, id: AccountId) -> EconomyResult<i64> {
        self.store.get_balance(id).await
    }

    /// Profile that must exist
    pub async fn require_profile(&self, id: AccountId) -> EconomyResult<Profile> {
        self.store
            .get_profile(id)
            .await?
            .ok_or_else(|| EconomyError::UnknownUser(id.to_string()))
    }
}

/// Strip the chat-mention marker so `@alice` and `alice` resolve alike
pub fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn bank_ids_are_disjoint_from_players() {
        let owner = AccountId(42);
        let bank = AccountId::bank_of(owner);
        assert!(bank.is_bank());
        assert!(!bank.is_player());
        assert!(owner.is_player());
        assert!(!AccountId::CASINO.is_player());
    }

    #[test]
    fn bank_profile_is_named_after_owner() {
        let owner = Profile {
            id: AccountId(7),
            username: "alice".to_string(),
            level: 3,
            income: 250,
        };
        let bank = Profile::bank_for(&owner);
        assert_eq!(bank.username, "bank_7_alice");
        assert_eq!(bank.id, AccountId(-7));
    }

    #[test]
    fn usernames_lose_mention_marker() {
        assert_eq!(normalize_username(" @bob "), "bob");
    }

    #[tokio::test]
    async fn overlapping_locks_serialize() {
        let locks = Arc::new(AccountLocks::new());
        let first = locks.lock(&[AccountId(2), AccountId(1)]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&[AccountId(1), AccountId(3)]).await;
            })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(StdDuration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_ids_do_not_self_deadlock() {
        let locks = AccountLocks::new();
        let _guard = tokio::time::timeout(
            StdDuration::from_secs(1),
            locks.lock(&[AccountId(5), AccountId(5)]),
        )
        .await
        .unwrap();
    }
}
