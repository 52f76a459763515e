//! Rock-paper-scissors against the house

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Game, GameKind};
use crate::errors::EconomyError;
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Rock,
    Scissors,
    Paper,
}

impl Hand {
    /// 1 rock, 2 scissors, 3 paper
    pub fn from_index(index: u32) -> Option<Hand> {
        match index {
            1 => Some(Hand::Rock),
            2 => Some(Hand::Scissors),
            3 => Some(Hand::Paper),
            _ => None,
        }
    }
}

impl FromStr for Hand {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rock" | "1" => Ok(Hand::Rock),
            "scissors" | "2" => Ok(Hand::Scissors),
            "paper" | "3" => Ok(Hand::Paper),
            _ => Err(EconomyError::invalid_range("hand", 0, format!("unknown hand '{}'", s))),
        }
    }
}

/// Wins when the house throws the same hand
#[derive(Debug, Clone, Copy)]
pub struct RockPaperScissors {
    choice: Hand,
}

impl RockPaperScissors {
    pub fn new(choice: Hand) -> Self {
        Self { choice }
    }
}

impl Game for RockPaperScissors {
    type Outcome = Hand;

    const KIND: GameKind = GameKind::RockPaperScissors;

    fn draw(&self, rng: &dyn RandomSource) -> Hand {
        Hand::from_index(rng.below(3) + 1).unwrap_or(Hand::Rock)
    }

    fn multiplier(&self, hand: &Hand) -> Option<i64> {
        (*hand == self.choice).then_some(3)
    }

    fn concede(&self) -> Hand {
        match self.choice {
            Hand::Rock => Hand::Scissors,
            Hand::Scissors => Hand::Paper,
            Hand::Paper => Hand::Rock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    #[test]
    fn draw_order_is_rock_scissors_paper() {
        let game = RockPaperScissors::new(Hand::Paper);
        let rng = ScriptedRandom::with_ints([0, 1, 2]);
        assert_eq!(game.draw(&rng), Hand::Rock);
        assert_eq!(game.draw(&rng), Hand::Scissors);
        assert_eq!(game.draw(&rng), Hand::Paper);
    }

    #[test]
    fn matching_hand_pays_triple() {
        let game = RockPaperScissors::new(Hand::Paper);
        assert_eq!(game.multiplier(&Hand::Paper), Some(3));
        assert_eq!(game.multiplier(&game.concede()), None);
    }

    #[test]
    fn hands_parse_by_name_or_number() {
        assert_eq!("Scissors".parse::<Hand>().unwrap(), Hand::Scissors);
        assert_eq!("3".parse::<Hand>().unwrap(), Hand::Paper);
        assert!("lizard".parse::<Hand>().is_err());
    }
}
