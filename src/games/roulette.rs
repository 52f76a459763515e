//! Number and color roulette

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Game, GameKind};
use crate::errors::{EconomyError, EconomyResult};
use crate::random::RandomSource;

/// Bet on a single number in `1..=36`
#[derive(Debug, Clone, Copy)]
pub struct NumberRoulette {
    choice: u8,
}

impl NumberRoulette {
    pub fn new(choice: i64) -> EconomyResult<Self> {
        if !(1..=36).contains(&choice) {
            return Err(EconomyError::invalid_range("number", choice, "must be 1-36"));
        }
        Ok(Self { choice: choice as u8 })
    }
}

impl Game for NumberRoulette {
    type Outcome = u8;

    const KIND: GameKind = GameKind::NumberRoulette;

    fn draw(&self, rng: &dyn RandomSource) -> u8 {
        rng.below(36) as u8 + 1
    }

    fn multiplier(&self, number: &u8) -> Option<i64> {
        (*number == self.choice).then_some(35)
    }

    fn concede(&self) -> u8 {
        self.choice % 36 + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Black,
    Red,
}

impl Color {
    /// Pocket 0 is green, even pockets black, odd pockets red
    pub fn of_pocket(pocket: u8) -> Color {
        match pocket {
            0 => Color::Green,
            n if n % 2 == 0 => Color::Black,
            _ => Color::Red,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Green => "green",
            Color::Black => "black",
            Color::Red => "red",
        };
        f.write_str(name)
    }
}

impl FromStr for Color {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "green" => Ok(Color::Green),
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            _ => Err(EconomyError::invalid_range("color", 0, format!("unknown color '{}'", s))),
        }
    }
}

/// Drawn pocket and its color
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pocket {
    pub number: u8,
    pub color: Color,
}

/// Bet on a color over pockets `0..=36`
#[derive(Debug, Clone, Copy)]
pub struct ColorRoulette {
    choice: Color,
}

impl ColorRoulette {
    pub fn new(choice: Color) -> Self {
        Self { choice }
    }
}

impl Game for ColorRoulette {
    type Outcome = Pocket;

    const KIND: GameKind = GameKind::ColorRoulette;

    fn draw(&self, rng: &dyn RandomSource) -> Pocket {
        let number = rng.below(37) as u8;
        Pocket {
            number,
            color: Color::of_pocket(number),
        }
    }

    fn multiplier(&self, pocket: &Pocket) -> Option<i64> {
        if pocket.color != self.choice {
            return None;
        }
        Some(match pocket.color {
            Color::Green => 35,
            Color::Black | Color::Red => 2,
        })
    }

    fn concede(&self) -> Pocket {
        let number = match self.choice {
            Color::Red => 2,
            Color::Black | Color::Green => 1,
        };
        Pocket {
            number,
            color: Color::of_pocket(number),
        }
    }
}
