//! Peer payments and personal savings accounts
//!
//! Every user may keep savings in a bank row named `bank_<id>_<username>`.
//! The row is an ordinary account owned by the user, created on first deposit.
//!
//! The configured operator may also grant currency to a user. A grant is
//! the only payment that is not balanced by a debit.

use serde::Serialize;
use tracing::info;

use crate::config::PaymentsConfig;
use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::{AccountId, Ledger, Profile};
use crate::settlement::SettlementEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentOutcome {
    pub payer_balance: i64,
    pub payee_balance: i64,
}

/// Wallet and savings balance of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BankBalances {
    pub wallet: i64,
    pub bank: i64,
}

/// Money held by the house and in all savings rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BankSummary {
    pub casino: i64,
    pub deposits: i64,
    pub accounts: usize,
}

#[derive(Clone)]
pub struct PaymentService {
    ledger: Ledger,
    settlement: SettlementEngine,
    operator: Option<AccountId>,
}

fn positive(amount: i64) -> EconomyResult<()> {
    if amount <= 0 {
        return Err(EconomyError::invalid_range("amount", amount, "must be positive"));
    }
    Ok(())
}

impl PaymentService {
    pub fn new(ledger: Ledger, config: PaymentsConfig) -> Self {
        Self {
            settlement: SettlementEngine::new(ledger.clone()),
            ledger,
            operator: config.operator.map(AccountId),
        }
    }

    /// Move `amount` from `from` to the registered user `to`
    pub async fn pay(&self, from: AccountId, to: AccountId, amount: i64) -> EconomyResult<PaymentOutcome> {
        if from == to {
            return Err(EconomyError::SelfTarget);
        }
        positive(amount)?;
        if to.is_bank() {
            return Err(EconomyError::UnknownUser(to.to_string()));
        }
        self.ledger.require_profile(to).await?;

        let _guard = self.ledger.lock(&[from, to]).await;
        let payer = self.ledger.balance(from).await?;
        if payer < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                balance: payer,
            });
        }
        let payee = self.ledger.balance(to).await?;
        let (payer_balance, payee_balance) = self
            .settlement
            .transfer(from, to, amount, payer, payee)
            .await?;

        info!(%from, %to, amount, "payment");
        Ok(PaymentOutcome {
            payer_balance,
            payee_balance,
        })
    }

    /// Credit `amount` to `to` out of thin air; only the configured operator may
    pub async fn grant(&self, operator: AccountId, to: AccountId, amount: i64) -> EconomyResult<i64> {
        if self.operator != Some(operator) {
            return Err(EconomyError::NotPermitted(operator));
        }
        positive(amount)?;
        if !to.is_player() {
            return Err(EconomyError::UnknownUser(to.to_string()));
        }
        self.ledger.require_profile(to).await?;

        let _guard = self.ledger.lock(&[to]).await;
        let balance = self.ledger.balance(to).await?;
        let balance = self.settlement.credit(to, amount, balance).await?;

        info!(%operator, %to, amount, "operator grant");
        Ok(balance)
    }

    async fn open_bank(&self, user: AccountId) -> EconomyResult<AccountId> {
        let owner = self.ledger.require_profile(user).await?;
        let bank = Profile::bank_for(&owner);
        if self.ledger.store().create_account(&bank, 0).await? {
            info!(owner = %user, bank = %bank.username, "bank account opened");
        }
        Ok(bank.id)
    }

    pub async fn bank_deposit(&self, user: AccountId, amount: i64) -> EconomyResult<BankBalances> {
        positive(amount)?;
        if !user.is_player() {
            return Err(EconomyError::invalid_range("account id", user.0, "only players hold savings"));
        }
        let bank = self.open_bank(user).await?;

        let _guard = self.ledger.lock(&[user, bank]).await;
        let wallet = self.ledger.balance(user).await?;
        if wallet < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                balance: wallet,
            });
        }
        let saved = self.ledger.balance(bank).await?;
        let (wallet, bank) = self
            .settlement
            .transfer(user, bank, amount, wallet, saved)
            .await?;
        Ok(BankBalances { wallet, bank })
    }

    pub async fn bank_withdraw(&self, user: AccountId, amount: i64) -> EconomyResult<BankBalances> {
        positive(amount)?;
        let bank = AccountId::bank_of(user);

        let _guard = self.ledger.lock(&[user, bank]).await;
        let wallet = self.ledger.balance(user).await?;
        let saved = match self.ledger.balance(bank).await {
            Ok(saved) => saved,
            Err(EconomyError::UnknownUser(_)) => 0,
            Err(err) => return Err(err),
        };
        if saved < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                balance: saved,
            });
        }
        let (bank, wallet) = self
            .settlement
            .transfer(bank, user, amount, saved, wallet)
            .await?;
        Ok(BankBalances { wallet, bank })
    }

    pub async fn bank_balances(&self, user: AccountId) -> EconomyResult<BankBalances> {
        let wallet = self.ledger.balance(user).await?;
        let bank = match self.ledger.balance(AccountId::bank_of(user)).await {
            Ok(saved) => saved,
            Err(EconomyError::UnknownUser(_)) => 0,
            Err(err) => return Err(err),
        };
        Ok(BankBalances { wallet, bank })
    }

    pub async fn bank_summary(&self) -> EconomyResult<BankSummary> {
        let casino = self.ledger.balance(AccountId::CASINO).await?;
        let mut deposits = 0_i64;
        let mut accounts = 0;
        for id in self.ledger.store().account_ids().await? {
            if id.is_bank() {
                deposits = deposits.saturating_add(self.ledger.balance(id).await?);
                accounts += 1;
            }
        }
        Ok(BankSummary {
            casino,
            deposits,
            accounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ledger::{LedgerStore, MemoryLedger};
    use std::sync::Arc;

    const ALICE: AccountId = AccountId(11);
    const BOB: AccountId = AccountId(12);
    const OPERATOR: AccountId = AccountId(77);

    async fn service() -> (Arc<MemoryLedger>, PaymentService) {
        let store = Arc::new(MemoryLedger::new(Arc::new(SystemClock)));
        for (id, name, balance) in [
            (AccountId::CASINO, "casino", 80_000),
            (ALICE, "alice", 1_000),
            (BOB, "bob", 500),
        ] {
            let profile = Profile {
                id,
                username: name.to_string(),
                level: 1,
                income: 250,
            };
            store.create_account(&profile, balance).await.unwrap();
        }
        let config = PaymentsConfig {
            operator: Some(OPERATOR.0),
        };
        (store.clone(), PaymentService::new(Ledger::new(store), config))
    }

    #[tokio::test]
    async fn pay_moves_funds() {
        let (store, payments) = service().await;
        let outcome = payments.pay(ALICE, BOB, 300).await.unwrap();
        assert_eq!(outcome, PaymentOutcome { payer_balance: 700, payee_balance: 800 });
        assert_eq!(store.get_balance(BOB).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn pay_rejections() {
        let (store, payments) = service().await;
        assert!(matches!(payments.pay(ALICE, ALICE, 1).await, Err(EconomyError::SelfTarget)));
        assert!(matches!(
            payments.pay(ALICE, BOB, 0).await,
            Err(EconomyError::InvalidRange { .. })
        ));
        assert!(matches!(
            payments.pay(ALICE, AccountId(999), 5).await,
            Err(EconomyError::UnknownUser(_))
        ));
        assert!(matches!(
            payments.pay(BOB, ALICE, 501).await,
            Err(EconomyError::InsufficientFunds { needed: 501, balance: 500 })
        ));
        assert_eq!(store.get_balance(ALICE).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn savings_round_trip() {
        let (store, payments) = service().await;
        let deposited = payments.bank_deposit(ALICE, 400).await.unwrap();
        assert_eq!(deposited, BankBalances { wallet: 600, bank: 400 });
        assert_eq!(
            store.get_profile(AccountId::bank_of(ALICE)).await.unwrap().unwrap().username,
            "bank_11_alice"
        );

        let withdrawn = payments.bank_withdraw(ALICE, 150).await.unwrap();
        assert_eq!(withdrawn, BankBalances { wallet: 750, bank: 250 });

        assert!(matches!(
            payments.bank_withdraw(ALICE, 251).await,
            Err(EconomyError::InsufficientFunds { balance: 250, .. })
        ));
    }

    #[tokio::test]
    async fn withdraw_without_bank_has_nothing() {
        let (_, payments) = service().await;
        assert!(matches!(
            payments.bank_withdraw(BOB, 1).await,
            Err(EconomyError::InsufficientFunds { balance: 0, .. })
        ));
        assert_eq!(
            payments.bank_balances(BOB).await.unwrap(),
            BankBalances { wallet: 500, bank: 0 }
        );
    }

    #[tokio::test]
    async fn summary_adds_all_savings() {
        let (_, payments) = service().await;
        payments.bank_deposit(ALICE, 100).await.unwrap();
        payments.bank_deposit(BOB, 50).await.unwrap();
        let summary = payments.bank_summary().await.unwrap();
        assert_eq!(summary, BankSummary { casino: 80_000, deposits: 150, accounts: 2 });
    }

    #[tokio::test]
    async fn operator_grant_credits_without_debit() {
        let (store, payments) = service().await;
        assert_eq!(payments.grant(OPERATOR, BOB, 250).await.unwrap(), 750);
        assert_eq!(store.get_balance(BOB).await.unwrap(), 750);
        assert_eq!(store.get_balance(AccountId::CASINO).await.unwrap(), 80_000);
        assert_eq!(store.get_balance(ALICE).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn grant_is_refused_to_everyone_else() {
        let (store, payments) = service().await;
        assert!(matches!(
            payments.grant(ALICE, BOB, 250).await,
            Err(EconomyError::NotPermitted(id)) if id == ALICE
        ));
        assert!(matches!(
            payments.grant(OPERATOR, BOB, 0).await,
            Err(EconomyError::InvalidRange { .. })
        ));
        assert!(matches!(
            payments.grant(OPERATOR, AccountId::bank_of(BOB), 10).await,
            Err(EconomyError::UnknownUser(_))
        ));
        assert!(matches!(
            payments.grant(OPERATOR, AccountId(999), 10).await,
            Err(EconomyError::UnknownUser(_))
        ));
        assert_eq!(store.get_balance(BOB).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn grants_are_off_without_an_operator() {
        let store = Arc::new(MemoryLedger::new(Arc::new(SystemClock)));
        let payments = PaymentService::new(Ledger::new(store), PaymentsConfig::default());
        assert!(matches!(
            payments.grant(OPERATOR, BOB, 1).await,
            Err(EconomyError::NotPermitted(_))
        ));
    }
}
