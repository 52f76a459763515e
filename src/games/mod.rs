//! Game engines
//!
//! Every game shares one round protocol, implemented once by [`GameEngine`]:
//!
//! 1. lock the player and the casino, read the player balance
//! 2. read the casino balance and compute the win chance
//! 3. draw the game's natural outcome
//! 4. roll `[0, 100)`; a roll above the chance forces a loss and the outcome
//!    is redrawn until it shows a loss
//! 5. settle the win or loss atomically
//!
//! Individual games only describe their outcome space through [`Game`].

pub mod dice;
pub mod roulette;
pub mod rps;
pub mod slots;
pub mod types;

pub use dice::Dice;
pub use roulette::{Color, ColorRoulette, NumberRoulette};
pub use rps::{Hand, RockPaperScissors};
pub use slots::{Slots, Symbol};
pub use types::{GameKind, WagerOutcome};

use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CasinoConfig;
use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::{AccountId, Ledger};
use crate::metrics::EconomyMetrics;
use crate::odds::win_chance;
use crate::random::RandomSource;
use crate::settlement::SettlementEngine;

/// Redraws attempted before falling back to [`Game::concede`]
const MAX_REDRAWS: usize = 1024;

/// Outcome space and payout table of one game
pub trait Game: Send + Sync {
    type Outcome: Clone + Debug + Serialize + Send;

    const KIND: GameKind;

    fn draw(&self, rng: &dyn RandomSource) -> Self::Outcome;

    /// Payout multiplier when `outcome` is a natural win
    fn multiplier(&self, outcome: &Self::Outcome) -> Option<i64>;

    /// A fixed losing outcome
    fn concede(&self) -> Self::Outcome;
}

/// Runs rounds of any [`Game`] against the casino account
#[derive(Clone)]
pub struct GameEngine {
    ledger: Ledger,
    settlement: SettlementEngine,
    rng: Arc<dyn RandomSource>,
    casino: CasinoConfig,
    metrics: Arc<EconomyMetrics>,
}

impl GameEngine {
    pub fn new(
        ledger: Ledger,
        rng: Arc<dyn RandomSource>,
        casino: CasinoConfig,
        metrics: Arc<EconomyMetrics>,
    ) -> Self {
        Self {
            settlement: SettlementEngine::new(ledger.clone()),
            ledger,
            rng,
            casino,
            metrics,
        }
    }

    pub fn min_wager(&self) -> i64 {
        self.casino.min_wager
    }

    pub async fn play<G: Game>(
        &self,
        player: AccountId,
        wager: i64,
        game: &G,
    ) -> EconomyResult<WagerOutcome<G::Outcome>> {
        let result = self.play_round(player, wager, game).await;
        if let Err(ref err) = result {
            self.metrics.observe_error(err);
        }
        result
    }

    async fn play_round<G: Game>(
        &self,
        player: AccountId,
        wager: i64,
        game: &G,
    ) -> EconomyResult<WagerOutcome<G::Outcome>> {
        if wager < self.casino.min_wager {
            return Err(EconomyError::invalid_range(
                "wager",
                wager,
                format!("minimum wager is {}", self.casino.min_wager),
            ));
        }
        if player == AccountId::CASINO {
            return Err(EconomyError::SelfTarget);
        }

        let _guard = self.ledger.lock(&[player, AccountId::CASINO]).await;

        let player_balance = self.ledger.balance(player).await?;
        if player_balance < wager {
            return Err(EconomyError::InsufficientFunds {
                needed: wager,
                balance: player_balance,
            });
        }
        let casino_balance = self.ledger.balance(AccountId::CASINO).await?;
        let chance = win_chance(&self.casino.odds, casino_balance, wager);

        let mut outcome = game.draw(self.rng.as_ref());
        let roll = self.rng.below(100);
        let forced_loss = roll > chance;

        let (won, payout, new_balance) = match game.multiplier(&outcome) {
            Some(multiplier) if !forced_loss => {
                let payout = wager.checked_mul(multiplier).ok_or_else(|| {
                    EconomyError::invalid_range("wager", wager, "payout overflows")
                })?;
                let new_balance = self
                    .settlement
                    .settle_win(player, wager, payout, player_balance, casino_balance)
                    .await?;
                (true, payout, new_balance)
            }
            _ => {
                if forced_loss {
                    outcome = self.redraw_loss(game, outcome);
                }
                let new_balance = self
                    .settlement
                    .settle_loss(player, wager, player_balance, casino_balance)
                    .await?;
                (false, 0, new_balance)
            }
        };

        self.metrics
            .record_round(G::KIND.as_str(), won, forced_loss, wager, payout);
        if won {
            info!(%player, game = %G::KIND, wager, payout, "round won");
        } else {
            debug!(%player, game = %G::KIND, wager, chance, roll, forced_loss, "round lost");
        }

        Ok(WagerOutcome {
            round_id: Uuid::new_v4(),
            game: G::KIND,
            won,
            forced_loss,
            chance,
            raw_result: outcome,
            payout,
            new_balance,
        })
    }

    fn redraw_loss<G: Game>(&self, game: &G, mut outcome: G::Outcome) -> G::Outcome {
        for _ in 0..MAX_REDRAWS {
            if game.multiplier(&outcome).is_none() {
                return outcome;
            }
            outcome = game.draw(self.rng.as_ref());
        }
        game.concede()
    }
}
