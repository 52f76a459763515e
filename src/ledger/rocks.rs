//! RocksDB-backed ledger store
//!
//! Key layout:
//! - `balance:<id>`   → little-endian i64
//! - `profile:<id>`   → JSON [`Profile`]
//! - `username:<name>` → decimal account id
//! - `timed:<key>`    → JSON [`TimedValue`]
//!
//! Balances are fronted by an LRU cache and timed records by a TTL cache.
//! Timed records are also persisted with their expiry so they outlive a
//! restart; an expired row is dropped the first time it is read.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{normalize_username, AccountId, BalanceWrite, LedgerStore, Profile};
use crate::cache::{BalanceCache, TimedCache};
use crate::clock::Clock;
use crate::config::StorageConfig;
use crate::errors::{EconomyError, EconomyResult, StoreError};
use crate::storage::DurableStorage;

const BALANCE_PREFIX: &str = "balance:";
const PROFILE_PREFIX: &str = "profile:";
const USERNAME_PREFIX: &str = "username:";
const TIMED_PREFIX: &str = "timed:";

fn balance_key(id: AccountId) -> Vec<u8> {
    format!("{}{}", BALANCE_PREFIX, id).into_bytes()
}

fn profile_key(id: AccountId) -> Vec<u8> {
    format!("{}{}", PROFILE_PREFIX, id).into_bytes()
}

fn username_key(username: &str) -> Vec<u8> {
    format!("{}{}", USERNAME_PREFIX, normalize_username(username)).into_bytes()
}

fn timed_key(key: &str) -> Vec<u8> {
    format!("{}{}", TIMED_PREFIX, key).into_bytes()
}

#[derive(Debug, Serialize, Deserialize)]
struct TimedValue {
    value: String,
    expires_at: DateTime<Utc>,
}

fn decode_balance(id: AccountId, raw: &[u8]) -> Result<i64, StoreError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        StoreError::CorruptedData(format!("balance of {} has {} bytes", id, raw.len()))
    })?;
    Ok(i64::from_le_bytes(bytes))
}

pub struct RocksLedger {
    storage: DurableStorage,
    balances: BalanceCache,
    timed: TimedCache,
    clock: Arc<dyn Clock>,
}

impl RocksLedger {
    pub fn open(config: &StorageConfig, clock: Arc<dyn Clock>) -> EconomyResult<Self> {
        let storage = DurableStorage::new_with_config(config)?;
        Ok(Self::with_storage(storage, config.balance_cache_capacity, clock))
    }

    pub fn with_storage(storage: DurableStorage, cache_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            balances: BalanceCache::new(cache_capacity),
            timed: TimedCache::new(clock.clone()),
            clock,
        }
    }

    fn read_balance(&self, id: AccountId) -> EconomyResult<Option<i64>> {
        if let Some(balance) = self.balances.get(id) {
            return Ok(Some(balance));
        }
        match self.storage.get(&balance_key(id))? {
            Some(raw) => {
                let balance = decode_balance(id, &raw)?;
                self.balances.put(id, balance);
                Ok(Some(balance))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerStore for RocksLedger {
    async fn get_balance(&self, id: AccountId) -> EconomyResult<i64> {
        self.read_balance(id)?
            .ok_or_else(|| EconomyError::UnknownUser(id.to_string()))
    }

    async fn set_balance(&self, id: AccountId, balance: i64) -> EconomyResult<i64> {
        self.commit(&[BalanceWrite::new(id, balance)]).await?;
        Ok(balance)
    }

    async fn commit(&self, writes: &[BalanceWrite]) -> EconomyResult<()> {
        for write in writes {
            if self.read_balance(write.account)?.is_none() {
                return Err(EconomyError::UnknownUser(write.account.to_string()));
            }
        }

        let puts: Vec<(Vec<u8>, [u8; 8])> = writes
            .iter()
            .map(|w| (balance_key(w.account), w.balance.to_le_bytes()))
            .collect();
        let no_deletes: [Vec<u8>; 0] = [];

        if let Err(err) = self.storage.batch_write(&puts, &no_deletes) {
            for write in writes {
                self.balances.invalidate(write.account);
            }
            tracing::warn!(error = %err, accounts = writes.len(), "balance commit rejected");
            return Err(err.into());
        }

        for write in writes {
            self.balances.put(write.account, write.balance);
        }
        Ok(())
    }

    async fn create_account(&self, profile: &Profile, opening_balance: i64) -> EconomyResult<bool> {
        if self.read_balance(profile.id)?.is_some() {
            return Ok(false);
        }

        let encoded = serde_json::to_vec(profile).map_err(StoreError::from)?;
        let puts = vec![
            (balance_key(profile.id), opening_balance.to_le_bytes().to_vec()),
            (profile_key(profile.id), encoded),
            (
                username_key(&profile.username),
                profile.id.to_string().into_bytes(),
            ),
        ];
        let no_deletes: [Vec<u8>; 0] = [];
        self.storage.batch_write(&puts, &no_deletes)?;
        self.balances.put(profile.id, opening_balance);

        tracing::debug!(account = %profile.id, username = %profile.username, "account created");
        Ok(true)
    }

    async fn get_profile(&self, id: AccountId) -> EconomyResult<Option<Profile>> {
        match self.storage.get(&profile_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn put_profile(&self, profile: &Profile) -> EconomyResult<()> {
        let previous = self
            .get_profile(profile.id)
            .await?
            .ok_or_else(|| EconomyError::UnknownUser(profile.id.to_string()))?;

        let encoded = serde_json::to_vec(profile).map_err(StoreError::from)?;
        let puts = vec![
            (profile_key(profile.id), encoded),
            (
                username_key(&profile.username),
                profile.id.to_string().into_bytes(),
            ),
        ];
        let mut deletes = Vec::new();
        if normalize_username(&previous.username) != normalize_username(&profile.username) {
            deletes.push(username_key(&previous.username));
        }
        self.storage.batch_write(&puts, &deletes)?;
        Ok(())
    }

    async fn find_user(&self, username: &str) -> EconomyResult<Option<AccountId>> {
        match self.storage.get(&username_key(username))? {
            Some(raw) => {
                let id = std::str::from_utf8(&raw)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| {
                        StoreError::CorruptedData(format!("username index for {}", username))
                    })?;
                Ok(Some(AccountId(id)))
            }
            None => Ok(None),
        }
    }

    async fn account_ids(&self) -> EconomyResult<Vec<AccountId>> {
        let mut ids = Vec::new();
        for (key, _) in self.storage.scan_prefix(BALANCE_PREFIX.as_bytes())? {
            let id = std::str::from_utf8(&key[BALANCE_PREFIX.len()..])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| StoreError::CorruptedData("balance key".to_string()))?;
            ids.push(AccountId(id));
        }
        ids.sort();
        Ok(ids)
    }

    async fn get_timed_record(&self, key: &str) -> EconomyResult<Option<String>> {
        if let Some(value) = self.timed.get(key) {
            return Ok(Some(value));
        }
        let Some(raw) = self.storage.get(&timed_key(key))? else {
            return Ok(None);
        };
        let stored: TimedValue = serde_json::from_slice(&raw).map_err(StoreError::from)?;
        let remaining = stored.expires_at - self.clock.now();
        if remaining <= Duration::zero() {
            self.storage.delete(&timed_key(key))?;
            return Ok(None);
        }
        self.timed.set(key, stored.value.clone(), remaining);
        Ok(Some(stored.value))
    }

    async fn set_timed_record(&self, key: &str, value: String, ttl: Duration) -> EconomyResult<()> {
        let stored = TimedValue {
            value: value.clone(),
            expires_at: self.clock.now() + ttl,
        };
        let encoded = serde_json::to_vec(&stored).map_err(StoreError::from)?;
        self.storage.put(&timed_key(key), &encoded)?;
        self.timed.set(key, value, ttl);
        Ok(())
    }

    async fn delete_timed_record(&self, key: &str) -> EconomyResult<()> {
        self.storage.delete(&timed_key(key))?;
        self.timed.remove(key);
        Ok(())
    }
}
