//! Service container wiring every engine to one ledger, clock and generator
//!
//! Store, clock and random source are built once and injected into each
//! engine; nothing in the crate reaches for a process-wide handle.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::accounts::AccountService;
use crate::clock::{Clock, SystemClock};
use crate::config::EconomyConfig;
use crate::errors::EconomyResult;
use crate::games::{
    Color, ColorRoulette, Dice, Game, GameEngine, GameKind, Hand, NumberRoulette,
    RockPaperScissors, Slots, WagerOutcome,
};
use crate::income::IncomeJob;
use crate::ledger::{AccountId, Ledger, LedgerStore, RocksLedger};
use crate::metrics::EconomyMetrics;
use crate::payments::PaymentService;
use crate::random::{RandomSource, SeededRandom};
use crate::silence::SilenceEngine;
use crate::theft::TheftEngine;

/// A bet on any game, chosen at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bet {
    Slots,
    Number(i64),
    Color(Color),
    Dice(i64),
    Rps(Hand),
}

impl Bet {
    pub fn kind(&self) -> GameKind {
        match self {
            Bet::Slots => GameKind::Slots,
            Bet::Number(_) => GameKind::NumberRoulette,
            Bet::Color(_) => GameKind::ColorRoulette,
            Bet::Dice(_) => GameKind::Dice,
            Bet::Rps(_) => GameKind::RockPaperScissors,
        }
    }
}

/// Round outcome with the game-specific result serialized to JSON
pub type RoundSummary = WagerOutcome<serde_json::Value>;

fn summarize<O: Serialize>(outcome: WagerOutcome<O>) -> EconomyResult<RoundSummary> {
    let raw_result = serde_json::to_value(&outcome.raw_result)?;
    Ok(WagerOutcome {
        round_id: outcome.round_id,
        game: outcome.game,
        won: outcome.won,
        forced_loss: outcome.forced_loss,
        chance: outcome.chance,
        raw_result,
        payout: outcome.payout,
        new_balance: outcome.new_balance,
    })
}

pub struct Economy {
    config: EconomyConfig,
    ledger: Ledger,
    metrics: Arc<EconomyMetrics>,
    accounts: AccountService,
    games: GameEngine,
    theft: TheftEngine,
    silence: SilenceEngine,
    payments: PaymentService,
    income: IncomeJob,
}

impl Economy {
    /// Open the RocksDB ledger named by `config` and seed the casino account
    pub async fn open(config: EconomyConfig) -> EconomyResult<Self> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(RocksLedger::open(&config.storage, clock.clone())?);
        let rng = Arc::new(SeededRandom::new(config.casino.rng_seed));
        Self::with_parts(config, store, clock, rng).await
    }

    /// Build from explicit collaborators
    pub async fn with_parts(
        config: EconomyConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> EconomyResult<Self> {
        config.validate()?;
        let ledger = Ledger::new(store);
        let metrics = Arc::new(EconomyMetrics::with_enabled(config.monitoring.enable_metrics)?);

        let accounts = AccountService::new(ledger.clone(), config.accounts.clone());
        accounts.ensure_casino(config.casino.seed_balance).await?;

        Ok(Self {
            games: GameEngine::new(
                ledger.clone(),
                rng.clone(),
                config.casino.clone(),
                metrics.clone(),
            ),
            theft: TheftEngine::new(
                ledger.clone(),
                rng,
                clock.clone(),
                config.theft.clone(),
                metrics.clone(),
            ),
            silence: SilenceEngine::new(ledger.clone(), clock, metrics.clone()),
            payments: PaymentService::new(ledger.clone(), config.payments.clone()),
            income: IncomeJob::new(ledger.clone(), metrics.clone()),
            accounts,
            ledger,
            metrics,
            config,
        })
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn metrics(&self) -> &EconomyMetrics {
        &self.metrics
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn games(&self) -> &GameEngine {
        &self.games
    }

    pub fn theft(&self) -> &TheftEngine {
        &self.theft
    }

    pub fn silence(&self) -> &SilenceEngine {
        &self.silence
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    pub async fn balance(&self, id: AccountId) -> EconomyResult<i64> {
        self.ledger.balance(id).await
    }

    /// Play one round of whichever game `bet` names
    pub async fn play(&self, player: AccountId, wager: i64, bet: Bet) -> EconomyResult<RoundSummary> {
        match bet {
            Bet::Slots => self.round(player, wager, &Slots).await,
            Bet::Number(n) => self.round(player, wager, &NumberRoulette::new(n)?).await,
            Bet::Color(c) => self.round(player, wager, &ColorRoulette::new(c)).await,
            Bet::Dice(sum) => self.round(player, wager, &Dice::new(sum)?).await,
            Bet::Rps(hand) => self.round(player, wager, &RockPaperScissors::new(hand)).await,
        }
    }

    async fn round<G: Game>(&self, player: AccountId, wager: i64, game: &G) -> EconomyResult<RoundSummary> {
        summarize(self.games.play(player, wager, game).await?)
    }

    /// Start the passive income loop if enabled
    pub fn start_income(&self) -> Option<JoinHandle<()>> {
        if !self.config.income.enabled {
            return None;
        }
        Some(self.income.clone().spawn(self.config.income_interval()))
    }

    pub fn income(&self) -> &IncomeJob {
        &self.income
    }
}
