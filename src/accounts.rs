//! Account registration, lookup and leaderboards

use serde::Serialize;
use tracing::info;

use crate::config::AccountDefaults;
use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::{normalize_username, AccountId, Ledger, Profile};

/// Column a leaderboard is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Balance,
    Level,
    Income,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub profile: Profile,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub summary: AccountSummary,
    /// `false` when the account already existed and was left untouched
    pub created: bool,
}

#[derive(Clone)]
pub struct AccountService {
    ledger: Ledger,
    defaults: AccountDefaults,
}

impl AccountService {
    pub fn new(ledger: Ledger, defaults: AccountDefaults) -> Self {
        Self { ledger, defaults }
    }

    /// Create a player account with the configured starting values
    pub async fn register(&self, id: AccountId, username: &str) -> EconomyResult<Registration> {
        if !id.is_player() {
            return Err(EconomyError::invalid_range(
                "account id",
                id.0,
                "reserved for the house or bank accounts",
            ));
        }
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(EconomyError::invalid_range("username", 0, "must not be empty"));
        }

        let profile = Profile {
            id,
            username,
            level: self.defaults.starting_level,
            income: self.defaults.starting_income,
        };
        let created = self
            .ledger
            .store()
            .create_account(&profile, self.defaults.starting_balance)
            .await?;
        if created {
            info!(account = %id, username = %profile.username, "account registered");
        }
        let summary = self.summary(id).await?;
        Ok(Registration { summary, created })
    }

    /// Create the house account if it does not exist yet; returns its balance
    pub async fn ensure_casino(&self, seed_balance: i64) -> EconomyResult<i64> {
        let profile = Profile {
            id: AccountId::CASINO,
            username: "casino".to_string(),
            level: 0,
            income: 0,
        };
        if self
            .ledger
            .store()
            .create_account(&profile, seed_balance)
            .await?
        {
            info!(seed_balance, "casino account created");
        }
        self.ledger.balance(AccountId::CASINO).await
    }

    pub async fn summary(&self, id: AccountId) -> EconomyResult<AccountSummary> {
        let profile = self.ledger.require_profile(id).await?;
        let balance = self.ledger.balance(id).await?;
        Ok(AccountSummary { profile, balance })
    }

    pub async fn find_by_username(&self, username: &str) -> EconomyResult<AccountId> {
        self.ledger
            .store()
            .find_user(username)
            .await?
            .ok_or_else(|| EconomyError::UnknownUser(normalize_username(username)))
    }

    /// Replace level and income of an existing player
    pub async fn update_progress(&self, id: AccountId, level: i64, income: i64) -> EconomyResult<Profile> {
        if income < 0 {
            return Err(EconomyError::invalid_range("income", income, "must not be negative"));
        }
        let mut profile = self.ledger.require_profile(id).await?;
        profile.level = level;
        profile.income = income;
        self.ledger.store().put_profile(&profile).await?;
        Ok(profile)
    }

    /// Top `limit` players by `ranking`; the house and bank rows never appear
    pub async fn top(&self, ranking: Ranking, limit: usize) -> EconomyResult<Vec<AccountSummary>> {
        let mut rows = Vec::new();
        for id in self.ledger.store().account_ids().await? {
            if !id.is_player() {
                continue;
            }
            rows.push(self.summary(id).await?);
        }

        rows.sort_by(|a, b| {
            let key = |row: &AccountSummary| match ranking {
                Ranking::Balance => row.balance,
                Ranking::Level => row.profile.level,
                Ranking::Income => row.profile.income,
            };
            key(b).cmp(&key(a)).then(a.profile.id.cmp(&b.profile.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ledger::{LedgerStore, MemoryLedger};
    use std::sync::Arc;

    fn service() -> (Arc<MemoryLedger>, AccountService) {
        let store = Arc::new(MemoryLedger::new(Arc::new(SystemClock)));
        let service = AccountService::new(Ledger::new(store.clone()), AccountDefaults::default());
        (store, service)
    }

    #[tokio::test]
    async fn registration_uses_defaults_once() {
        let (store, accounts) = service();
        let first = accounts.register(AccountId(42), "@alice").await.unwrap();
        assert!(first.created);
        assert_eq!(first.summary.balance, 1500);
        assert_eq!(first.summary.profile.level, 1);
        assert_eq!(first.summary.profile.income, 250);
        assert_eq!(first.summary.profile.username, "alice");

        store.set_balance(AccountId(42), 10).await.unwrap();
        let again = accounts.register(AccountId(42), "alice").await.unwrap();
        assert!(!again.created);
        assert_eq!(again.summary.balance, 10);
    }

    #[tokio::test]
    async fn reserved_ids_cannot_register() {
        let (_, accounts) = service();
        assert!(accounts.register(AccountId::CASINO, "house").await.is_err());
        assert!(accounts.register(AccountId(-3), "bank").await.is_err());
    }

    #[tokio::test]
    async fn casino_is_seeded_once() {
        let (store, accounts) = service();
        assert_eq!(accounts.ensure_casino(100_000).await.unwrap(), 100_000);
        store.set_balance(AccountId::CASINO, 60_000).await.unwrap();
        assert_eq!(accounts.ensure_casino(100_000).await.unwrap(), 60_000);
    }

    #[tokio::test]
    async fn lookup_by_username() {
        let (_, accounts) = service();
        accounts.register(AccountId(8), "bob").await.unwrap();
        assert_eq!(accounts.find_by_username("@bob").await.unwrap(), AccountId(8));
        assert!(matches!(
            accounts.find_by_username("nobody").await,
            Err(EconomyError::UnknownUser(name)) if name == "nobody"
        ));
    }

    #[tokio::test]
    async fn leaderboards_skip_house_and_banks() {
        let (store, accounts) = service();
        accounts.ensure_casino(1_000_000).await.unwrap();
        for (id, name, balance) in [(2, "a", 300), (3, "b", 900), (4, "c", 600)] {
            accounts.register(AccountId(id), name).await.unwrap();
            store.set_balance(AccountId(id), balance).await.unwrap();
        }
        let owner = accounts.summary(AccountId(2)).await.unwrap().profile;
        store
            .create_account(&Profile::bank_for(&owner), 5_000_000)
            .await
            .unwrap();
        accounts.update_progress(AccountId(4), 9, 1_000).await.unwrap();

        let by_balance = accounts.top(Ranking::Balance, 2).await.unwrap();
        let names: Vec<_> = by_balance.iter().map(|r| r.profile.username.as_str()).collect();
        assert_eq!(names, ["b", "c"]);

        let by_level = accounts.top(Ranking::Level, 10).await.unwrap();
        assert_eq!(by_level.len(), 3);
        assert_eq!(by_level[0].profile.id, AccountId(4));

        let by_income = accounts.top(Ranking::Income, 1).await.unwrap();
        assert_eq!(by_income[0].profile.income, 1_000);
    }
}
