//! Two dice, bet on the sum

use super::{Game, GameKind};
use crate::errors::{EconomyError, EconomyResult};
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy)]
pub struct Dice {
    target: u8,
}

impl Dice {
    pub fn new(target: i64) -> EconomyResult<Self> {
        if !(2..=12).contains(&target) {
            return Err(EconomyError::invalid_range("sum", target, "must be 2-12"));
        }
        Ok(Self { target: target as u8 })
    }
}

impl Game for Dice {
    type Outcome = (u8, u8);

    const KIND: GameKind = GameKind::Dice;

    fn draw(&self, rng: &dyn RandomSource) -> (u8, u8) {
        (rng.below(6) as u8 + 1, rng.below(6) as u8 + 1)
    }

    fn multiplier(&self, (a, b): &(u8, u8)) -> Option<i64> {
        (a + b == self.target).then_some(12)
    }

    fn concede(&self) -> (u8, u8) {
        if self.target == 2 {
            (1, 2)
        } else {
            (1, 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    #[test]
    fn sum_range_is_enforced() {
        assert!(Dice::new(1).is_err());
        assert!(Dice::new(13).is_err());
        assert!(Dice::new(2).is_ok());
    }

    #[test]
    fn matching_sum_pays_twelve() {
        let game = Dice::new(7).unwrap();
        let rng = ScriptedRandom::with_ints([2, 3]);
        let roll = game.draw(&rng);
        assert_eq!(roll, (3, 4));
        assert_eq!(game.multiplier(&roll), Some(12));
        assert_eq!(game.multiplier(&(6, 6)), None);
    }

    #[test]
    fn concede_never_matches() {
        for target in 2..=12 {
            let game = Dice::new(target).unwrap();
            assert_eq!(game.multiplier(&game.concede()), None);
        }
    }
}
