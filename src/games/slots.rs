//! Three-reel slot machine

use serde::{Deserialize, Serialize};

use super::{Game, GameKind};
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Cherry,
    Lemon,
    Watermelon,
    Grape,
    Bell,
    Seven,
}

/// Reel strip: four fruits ×5, bell ×3, seven ×1
const REEL: [Symbol; 24] = {
    use Symbol::*;
    [
        Cherry, Cherry, Cherry, Cherry, Cherry,
        Lemon, Lemon, Lemon, Lemon, Lemon,
        Watermelon, Watermelon, Watermelon, Watermelon, Watermelon,
        Grape, Grape, Grape, Grape, Grape,
        Bell, Bell, Bell,
        Seven,
    ]
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Slots;

impl Game for Slots {
    type Outcome = [Symbol; 3];

    const KIND: GameKind = GameKind::Slots;

    fn draw(&self, rng: &dyn RandomSource) -> Self::Outcome {
        let spin = || REEL[rng.below(REEL.len() as u32) as usize];
        [spin(), spin(), spin()]
    }

    fn multiplier(&self, reels: &Self::Outcome) -> Option<i64> {
        let [a, b, c] = *reels;
        if a == b && b == c {
            return Some(match a {
                Symbol::Seven => 100,
                Symbol::Bell => 20,
                _ => 10,
            });
        }
        if a == b || b == c || a == c {
            return Some(2);
        }
        None
    }

    fn concede(&self) -> Self::Outcome {
        [Symbol::Cherry, Symbol::Lemon, Symbol::Grape]
    }
}
