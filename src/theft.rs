//! Theft engine
//!
//! A thief names a victim and an amount. Preconditions are checked in a fixed
//! order (self-target, victim cooldown, victim funds, thief funds), then the
//! victim's cooldown is written before any balance moves, so a failed attempt
//! still blocks retries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::config::TheftConfig;
use crate::errors::{EconomyError, EconomyResult, StoreError};
use crate::ledger::{AccountId, Ledger};
use crate::metrics::EconomyMetrics;
use crate::random::RandomSource;
use crate::settlement::SettlementEngine;

fn cooldown_key(victim: AccountId) -> String {
    format!("steal:{}", victim)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TheftOutcome {
    pub succeeded: bool,
    /// Probability the attempt was judged against, in `[0, 1]`
    pub chance: f64,
    /// Burned from the thief on failure; 0 on success
    pub penalty: i64,
    pub thief_balance: i64,
    pub victim_balance: i64,
    pub cooldown_until: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TheftEngine {
    ledger: Ledger,
    settlement: SettlementEngine,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    config: TheftConfig,
    metrics: Arc<EconomyMetrics>,
}

impl TheftEngine {
    pub fn new(
        ledger: Ledger,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        config: TheftConfig,
        metrics: Arc<EconomyMetrics>,
    ) -> Self {
        Self {
            settlement: SettlementEngine::new(ledger.clone()),
            ledger,
            rng,
            clock,
            config,
            metrics,
        }
    }

    /// Success probability for taking `amount` from a victim holding `victim_balance`.
    ///
    /// The base 1/`success_divisor` is scaled by how much of the victim's
    /// balance would remain, so it falls toward 0 as `amount` approaches the
    /// whole balance.
    pub fn success_chance(&self, thief: AccountId, victim_balance: i64, amount: i64) -> f64 {
        if self.config.privileged_thief == Some(thief.0) {
            return 1.0;
        }
        if victim_balance <= 0 {
            return 0.0;
        }
        let health = ((victim_balance - amount) as f64 / victim_balance as f64).clamp(0.0, 1.0);
        health / f64::from(self.config.success_divisor)
    }

    /// Active cooldown on `victim`, if any
    pub async fn cooldown(&self, victim: AccountId) -> EconomyResult<Option<DateTime<Utc>>> {
        let record = self
            .ledger
            .store()
            .get_timed_record(&cooldown_key(victim))
            .await?;
        match record {
            Some(raw) => {
                let until = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::CorruptedData(format!("cooldown of {}: {}", victim, e)))?
                    .with_timezone(&Utc);
                Ok(Some(until))
            }
            None => Ok(None),
        }
    }

    pub async fn steal(
        &self,
        victim: AccountId,
        thief: AccountId,
        amount: i64,
    ) -> EconomyResult<TheftOutcome> {
        let result = self.attempt(victim, thief, amount).await;
        if let Err(ref err) = result {
            self.metrics.observe_error(err);
        }
        result
    }

    async fn attempt(
        &self,
        victim: AccountId,
        thief: AccountId,
        amount: i64,
    ) -> EconomyResult<TheftOutcome> {
        if victim == thief {
            return Err(EconomyError::SelfTarget);
        }
        if amount <= 0 {
            return Err(EconomyError::invalid_range("amount", amount, "must be positive"));
        }

        let _guard = self.ledger.lock(&[victim, thief]).await;

        if let Some(until) = self.cooldown(victim).await? {
            return Err(EconomyError::CooldownActive { victim, until });
        }
        let victim_balance = self.ledger.balance(victim).await?;
        if victim_balance < amount {
            return Err(EconomyError::InsufficientVictimFunds {
                victim,
                balance: victim_balance,
                amount,
            });
        }
        let thief_balance = self.ledger.balance(thief).await?;
        if thief_balance < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                balance: thief_balance,
            });
        }

        let chance = self.success_chance(thief, victim_balance, amount);
        let cooldown = self.config.cooldown();
        let cooldown_until = self.clock.now() + cooldown;
        self.ledger
            .store()
            .set_timed_record(&cooldown_key(victim), cooldown_until.to_rfc3339(), cooldown)
            .await?;

        let succeeded = self.rng.unit() < chance;
        let outcome = if succeeded {
            let (victim_after, thief_after) = self
                .settlement
                .transfer(victim, thief, amount, victim_balance, thief_balance)
                .await?;
            TheftOutcome {
                succeeded,
                chance,
                penalty: 0,
                thief_balance: thief_after,
                victim_balance: victim_after,
                cooldown_until,
            }
        } else {
            let penalty = amount / self.config.failure_penalty_divisor;
            let thief_after = self.settlement.debit(thief, penalty, thief_balance).await?;
            TheftOutcome {
                succeeded,
                chance,
                penalty,
                thief_balance: thief_after,
                victim_balance,
                cooldown_until,
            }
        };

        self.metrics.record_theft(succeeded);
        info!(%thief, %victim, amount, succeeded, penalty = outcome.penalty, "theft attempted");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::clock::ManualClock;
    use crate::ledger::{LedgerStore, MemoryLedger, Profile};
    use crate::random::ScriptedRandom;

    const THIEF: AccountId = AccountId(20);
    const VICTIM: AccountId = AccountId(30);

    struct Fixture {
        store: Arc<MemoryLedger>,
        clock: Arc<ManualClock>,
        rng: Arc<ScriptedRandom>,
        engine: TheftEngine,
    }

    async fn fixture(thief_balance: i64, victim_balance: i64, config: TheftConfig) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryLedger::new(clock.clone()));
        for (id, balance) in [(THIEF, thief_balance), (VICTIM, victim_balance)] {
            let profile = Profile {
                id,
                username: format!("u{}", id),
                level: 1,
                income: 0,
            };
            store.create_account(&profile, balance).await.unwrap();
        }
        let rng = Arc::new(ScriptedRandom::new());
        let engine = TheftEngine::new(
            Ledger::new(store.clone()),
            rng.clone(),
            clock.clone(),
            config,
            Arc::new(EconomyMetrics::new().unwrap()),
        );
        Fixture {
            store,
            clock,
            rng,
            engine,
        }
    }

    #[tokio::test]
    async fn self_theft_is_rejected() {
        let f = fixture(100, 100, TheftConfig::default()).await;
        assert!(matches!(
            f.engine.steal(THIEF, THIEF, 10).await,
            Err(EconomyError::SelfTarget)
        ));
    }

    #[tokio::test]
    async fn poor_victim_fails_before_cooldown_is_written() {
        let f = fixture(1_000, 40, TheftConfig::default()).await;
        let err = f.engine.steal(VICTIM, THIEF, 100).await.unwrap_err();
        assert!(matches!(
            err,
            EconomyError::InsufficientVictimFunds { balance: 40, amount: 100, .. }
        ));
        assert_eq!(f.engine.cooldown(VICTIM).await.unwrap(), None);
        assert_eq!(f.store.get_balance(THIEF).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn poor_thief_is_rejected() {
        let f = fixture(50, 1_000, TheftConfig::default()).await;
        let err = f.engine.steal(VICTIM, THIEF, 100).await.unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientFunds { balance: 50, .. }));
    }

    #[tokio::test]
    async fn success_moves_amount_and_sets_cooldown() {
        let f = fixture(500, 1_000, TheftConfig::default()).await;
        f.rng.push_floats([0.05]);

        let outcome = f.engine.steal(VICTIM, THIEF, 100).await.unwrap();
        assert!(outcome.succeeded);
        assert!((outcome.chance - 0.18).abs() < 1e-9);
        assert_eq!(f.store.get_balance(THIEF).await.unwrap(), 600);
        assert_eq!(f.store.get_balance(VICTIM).await.unwrap(), 900);

        let err = f.engine.steal(VICTIM, THIEF, 100).await.unwrap_err();
        assert!(matches!(err, EconomyError::CooldownActive { .. }));
    }

    #[tokio::test]
    async fn failure_burns_quarter_and_still_blocks_retry() {
        let f = fixture(500, 1_000, TheftConfig::default()).await;
        f.rng.push_floats([0.5]);

        let outcome = f.engine.steal(VICTIM, THIEF, 101).await.unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.penalty, 25);
        assert_eq!(f.store.get_balance(THIEF).await.unwrap(), 475);
        assert_eq!(f.store.get_balance(VICTIM).await.unwrap(), 1_000);
        assert!(f.engine.cooldown(VICTIM).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cooldown_lapses_after_three_hours() {
        let f = fixture(500, 1_000, TheftConfig::default()).await;
        f.rng.push_floats([0.9, 0.9]);
        f.engine.steal(VICTIM, THIEF, 100).await.unwrap();

        f.clock.advance(Duration::hours(3) - Duration::seconds(1));
        assert!(f.engine.steal(VICTIM, THIEF, 100).await.is_err());

        f.clock.advance(Duration::seconds(1));
        assert!(f.engine.steal(VICTIM, THIEF, 100).await.is_ok());
    }

    #[tokio::test]
    async fn privileged_thief_always_succeeds() {
        let config = TheftConfig {
            privileged_thief: Some(THIEF.0),
            ..TheftConfig::default()
        };
        let f = fixture(1_000, 1_000, config).await;
        f.rng.push_floats([0.999]);

        let outcome = f.engine.steal(VICTIM, THIEF, 1_000).await.unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.chance, 1.0);
        assert_eq!(f.store.get_balance(VICTIM).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn chance_falls_as_amount_nears_balance() {
        let f = fixture(0, 0, TheftConfig::default()).await;
        let small = f.engine.success_chance(THIEF, 10_000, 10);
        let large = f.engine.success_chance(THIEF, 10_000, 9_000);
        assert!(small > large);
        assert!(small <= 0.2);
        assert_eq!(f.engine.success_chance(THIEF, 100, 100), 0.0);
    }
}
