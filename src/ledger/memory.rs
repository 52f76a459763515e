//! In-memory ledger store for tests and embedding

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{normalize_username, AccountId, BalanceWrite, LedgerStore, Profile};
use crate::cache::TimedCache;
use crate::clock::Clock;
use crate::errors::{EconomyError, EconomyResult, StoreError};

#[derive(Default)]
struct Tables {
    balances: HashMap<AccountId, i64>,
    profiles: HashMap<AccountId, Profile>,
    usernames: HashMap<String, AccountId>,
}

/// Ledger held entirely in process memory.
///
/// `fail_next_commit` makes the next [`LedgerStore::commit`] fail before any
/// write lands, which lets tests observe that engines surface store failures
/// without leaving partial state.
pub struct MemoryLedger {
    tables: RwLock<Tables>,
    timed: TimedCache,
    fail_next_commit: AtomicBool,
}

impl MemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            timed: TimedCache::new(clock),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get_balance(&self, id: AccountId) -> EconomyResult<i64> {
        self.read()
            .balances
            .get(&id)
            .copied()
            .ok_or_else(|| EconomyError::UnknownUser(id.to_string()))
    }

    async fn set_balance(&self, id: AccountId, balance: i64) -> EconomyResult<i64> {
        let mut tables = self.write();
        match tables.balances.get_mut(&id) {
            Some(slot) => {
                *slot = balance;
                Ok(balance)
            }
            None => Err(EconomyError::UnknownUser(id.to_string())),
        }
    }

    async fn commit(&self, writes: &[BalanceWrite]) -> EconomyResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected commit failure".to_string()).into());
        }

        let mut tables = self.write();
        if let Some(missing) = writes
            .iter()
            .find(|w| !tables.balances.contains_key(&w.account))
        {
            return Err(EconomyError::UnknownUser(missing.account.to_string()));
        }
        for write in writes {
            tables.balances.insert(write.account, write.balance);
        }
        Ok(())
    }

    async fn create_account(&self, profile: &Profile, opening_balance: i64) -> EconomyResult<bool> {
        let mut tables = self.write();
        if tables.balances.contains_key(&profile.id) {
            return Ok(false);
        }
        tables.balances.insert(profile.id, opening_balance);
        tables
            .usernames
            .insert(normalize_username(&profile.username), profile.id);
        tables.profiles.insert(profile.id, profile.clone());
        Ok(true)
    }

    async fn get_profile(&self, id: AccountId) -> EconomyResult<Option<Profile>> {
        Ok(self.read().profiles.get(&id).cloned())
    }

    async fn put_profile(&self, profile: &Profile) -> EconomyResult<()> {
        let mut tables = self.write();
        let previous = tables
            .profiles
            .get(&profile.id)
            .map(|p| normalize_username(&p.username))
            .ok_or_else(|| EconomyError::UnknownUser(profile.id.to_string()))?;
        tables.usernames.remove(&previous);
        tables
            .usernames
            .insert(normalize_username(&profile.username), profile.id);
        tables.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn find_user(&self, username: &str) -> EconomyResult<Option<AccountId>> {
        Ok(self
            .read()
            .usernames
            .get(&normalize_username(username))
            .copied())
    }

    async fn account_ids(&self) -> EconomyResult<Vec<AccountId>> {
        let mut ids: Vec<AccountId> = self.read().balances.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_timed_record(&self, key: &str) -> EconomyResult<Option<String>> {
        Ok(self.timed.get(key))
    }

    async fn set_timed_record(&self, key: &str, value: String, ttl: Duration) -> EconomyResult<()> {
        self.timed.set(key, value, ttl);
        Ok(())
    }

    async fn delete_timed_record(&self, key: &str) -> EconomyResult<()> {
        self.timed.remove(key);
        Ok(())
    }
}
