//! Settlement engine
//!
//! Applies balance changes as single atomic commits. Callers read the
//! balances and hold the account locks (see [`crate::ledger::Ledger::lock`])
//! across the read, the settlement call and the commit.

use tracing::debug;

use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::{AccountId, BalanceWrite, Ledger};

fn checked(field: &'static str, value: Option<i64>) -> EconomyResult<i64> {
    value.ok_or_else(|| EconomyError::invalid_range(field, i64::MAX, "arithmetic overflow"))
}

fn non_negative(field: &'static str, amount: i64) -> EconomyResult<()> {
    if amount < 0 {
        return Err(EconomyError::invalid_range(field, amount, "must not be negative"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SettlementEngine {
    ledger: Ledger,
}

impl SettlementEngine {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Debit `wager` from the player and credit it to the casino
    pub async fn settle_loss(
        &self,
        player: AccountId,
        wager: i64,
        player_balance: i64,
        casino_balance: i64,
    ) -> EconomyResult<i64> {
        non_negative("wager", wager)?;
        if player_balance < wager {
            return Err(EconomyError::InsufficientFunds {
                needed: wager,
                balance: player_balance,
            });
        }

        let player_after = player_balance - wager;
        let casino_after = checked("casino balance", casino_balance.checked_add(wager))?;
        self.ledger
            .store()
            .commit(&[
                BalanceWrite::new(player, player_after),
                BalanceWrite::new(AccountId::CASINO, casino_after),
            ])
            .await?;

        debug!(%player, wager, player_after, casino_after, "settled loss");
        Ok(player_after)
    }

    /// Credit the net gain `payout - wager` to the player and debit it from the casino
    pub async fn settle_win(
        &self,
        player: AccountId,
        wager: i64,
        payout: i64,
        player_balance: i64,
        casino_balance: i64,
    ) -> EconomyResult<i64> {
        non_negative("wager", wager)?;
        let net = checked("payout", payout.checked_sub(wager))?;
        if net < 0 {
            return Err(EconomyError::invalid_range(
                "payout",
                payout,
                "gross payout below the wager",
            ));
        }
        if casino_balance < net {
            return Err(EconomyError::HouseInsufficientFunds {
                needed: net,
                available: casino_balance,
            });
        }

        let player_after = checked("player balance", player_balance.checked_add(net))?;
        let casino_after = casino_balance - net;
        self.ledger
            .store()
            .commit(&[
                BalanceWrite::new(player, player_after),
                BalanceWrite::new(AccountId::CASINO, casino_after),
            ])
            .await?;

        debug!(%player, wager, payout, player_after, casino_after, "settled win");
        Ok(player_after)
    }

    /// Move `amount` between two accounts; returns `(from_after, to_after)`
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        from_balance: i64,
        to_balance: i64,
    ) -> EconomyResult<(i64, i64)> {
        if from == to {
            return Err(EconomyError::SelfTarget);
        }
        non_negative("amount", amount)?;
        if from_balance < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                balance: from_balance,
            });
        }

        let from_after = from_balance - amount;
        let to_after = checked("balance", to_balance.checked_add(amount))?;
        self.ledger
            .store()
            .commit(&[
                BalanceWrite::new(from, from_after),
                BalanceWrite::new(to, to_after),
            ])
            .await?;

        debug!(%from, %to, amount, "transferred");
        Ok((from_after, to_after))
    }

    /// Remove `amount` from one account without a counterparty
    pub async fn debit(&self, account: AccountId, amount: i64, balance: i64) -> EconomyResult<i64> {
        non_negative("amount", amount)?;
        if balance < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                balance,
            });
        }
        let after = balance - amount;
        self.ledger
            .store()
            .commit(&[BalanceWrite::new(account, after)])
            .await?;
        Ok(after)
    }

    /// Add `amount` to one account without a counterparty
    pub async fn credit(&self, account: AccountId, amount: i64, balance: i64) -> EconomyResult<i64> {
        non_negative("amount", amount)?;
        let after = checked("balance", balance.checked_add(amount))?;
        self.ledger
            .store()
            .commit(&[BalanceWrite::new(account, after)])
            .await?;
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ledger::{LedgerStore, MemoryLedger, Profile};
    use std::sync::Arc;

    const PLAYER: AccountId = AccountId(10);

    async fn setup(player: i64, casino: i64) -> (Arc<MemoryLedger>, SettlementEngine) {
        let store = Arc::new(MemoryLedger::new(Arc::new(SystemClock)));
        for (id, name, balance) in [(PLAYER, "player", player), (AccountId::CASINO, "casino", casino)] {
            let profile = Profile {
                id,
                username: name.to_string(),
                level: 1,
                income: 0,
            };
            store.create_account(&profile, balance).await.unwrap();
        }
        let engine = SettlementEngine::new(Ledger::new(store.clone()));
        (store, engine)
    }

    async fn balances(store: &MemoryLedger) -> (i64, i64) {
        (
            store.get_balance(PLAYER).await.unwrap(),
            store.get_balance(AccountId::CASINO).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn loss_moves_wager_to_house() {
        let (store, engine) = setup(1500, 50_000).await;
        let after = engine.settle_loss(PLAYER, 100, 1500, 50_000).await.unwrap();
        assert_eq!(after, 1400);
        assert_eq!(balances(&store).await, (1400, 50_100));
    }

    #[tokio::test]
    async fn win_moves_net_gain_from_house() {
        let (store, engine) = setup(1500, 50_000).await;
        let after = engine.settle_win(PLAYER, 100, 300, 1500, 50_000).await.unwrap();
        assert_eq!(after, 1700);
        assert_eq!(balances(&store).await, (1700, 49_800));
    }

    #[tokio::test]
    async fn loss_beyond_balance_is_rejected_without_mutation() {
        let (store, engine) = setup(50, 50_000).await;
        let err = engine.settle_loss(PLAYER, 100, 50, 50_000).await.unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientFunds { balance: 50, .. }));
        assert_eq!(balances(&store).await, (50, 50_000));
    }

    #[tokio::test]
    async fn house_that_cannot_cover_is_rejected() {
        let (store, engine) = setup(1500, 1_000).await;
        let err = engine.settle_win(PLAYER, 100, 3_600, 1500, 1_000).await.unwrap_err();
        assert!(matches!(err, EconomyError::HouseInsufficientFunds { needed: 3_500, .. }));
        assert_eq!(balances(&store).await, (1500, 1_000));
    }

    #[tokio::test]
    async fn failed_commit_leaves_both_accounts_untouched() {
        let (store, engine) = setup(1500, 50_000).await;
        store.fail_next_commit();
        let err = engine.settle_win(PLAYER, 100, 300, 1500, 50_000).await.unwrap_err();
        assert!(err.is_store_failure());
        assert_eq!(balances(&store).await, (1500, 50_000));
    }

    #[tokio::test]
    async fn every_settlement_is_zero_sum() {
        let (store, engine) = setup(1500, 50_000).await;
        let (p0, c0) = balances(&store).await;
        let p1 = engine.settle_win(PLAYER, 20, 40, p0, c0).await.unwrap();
        let (_, c1) = balances(&store).await;
        assert_eq!((p1 - p0) + (c1 - c0), 0);

        let p2 = engine.settle_loss(PLAYER, 35, p1, c1).await.unwrap();
        let (_, c2) = balances(&store).await;
        assert_eq!((p2 - p1) + (c2 - c1), 0);
    }

    #[tokio::test]
    async fn transfer_rejects_self() {
        let (_, engine) = setup(100, 100).await;
        assert!(matches!(
            engine.transfer(PLAYER, PLAYER, 10, 100, 100).await,
            Err(EconomyError::SelfTarget)
        ));
    }
}
