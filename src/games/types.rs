use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Slots,
    NumberRoulette,
    ColorRoulette,
    Dice,
    RockPaperScissors,
}

impl GameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Slots => "slots",
            GameKind::NumberRoulette => "number_roulette",
            GameKind::ColorRoulette => "color_roulette",
            GameKind::Dice => "dice",
            GameKind::RockPaperScissors => "rps",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed result of one game round; returned to the caller, never stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WagerOutcome<O> {
    pub round_id: Uuid,
    pub game: GameKind,
    pub won: bool,
    /// The odds model overruled the draw; `raw_result` was redrawn as a loss
    pub forced_loss: bool,
    /// Win chance in percent at the moment of the round
    pub chance: u32,
    pub raw_result: O,
    /// Gross amount returned to the player, including the wager; 0 on a loss
    pub payout: i64,
    pub new_balance: i64,
}
