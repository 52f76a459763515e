//! Adaptive house-edge model
//!
//! Maps the casino balance and a wager to a win chance in percent. The chance
//! rises linearly from 0 at the floor balance to 100 at the ceiling, and is
//! zero whenever the wager is large relative to what the house holds.

use crate::config::OddsConfig;

/// Win chance in whole percent, `0..=100`.
///
/// Interpolation truncates toward zero. Arithmetic is widened to `i128`, so
/// extreme balances cannot overflow.
pub fn win_chance(odds: &OddsConfig, casino_balance: i64, wager: i64) -> u32 {
    let guard = i128::from(wager) * i128::from(odds.wager_guard_multiplier);
    if i128::from(casino_balance) <= guard {
        return 0;
    }
    if casino_balance >= odds.ceiling_balance {
        return 100;
    }
    if casino_balance <= odds.floor_balance {
        return 0;
    }

    let span = i128::from(odds.ceiling_balance) - i128::from(odds.floor_balance);
    let above_floor = i128::from(casino_balance) - i128::from(odds.floor_balance);
    // 0 < above_floor < span here, so the quotient is within 0..100
    (above_floor * 100 / span) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odds() -> OddsConfig {
        OddsConfig::default()
    }

    #[test]
    fn midrange_balance_interpolates() {
        assert_eq!(win_chance(&odds(), 50_000, 100), 33);
        assert_eq!(win_chance(&odds(), 62_500, 100), 50);
    }

    #[test]
    fn bounds_are_clamped() {
        assert_eq!(win_chance(&odds(), 25_000, 10), 0);
        assert_eq!(win_chance(&odds(), 0, 10), 0);
        assert_eq!(win_chance(&odds(), 100_000, 10), 100);
        assert_eq!(win_chance(&odds(), i64::MAX, 10), 100);
    }

    #[test]
    fn oversized_wager_zeroes_chance() {
        assert_eq!(win_chance(&odds(), 1_000_000, 100_000), 0);
        assert_eq!(win_chance(&odds(), 1_000_001, 100_000), 100);
        assert_eq!(win_chance(&odds(), 60_000, i64::MAX), 0);
    }

    #[test]
    fn chance_is_monotonic_in_casino_balance() {
        for wager in [10_i64, 500, 4_000, 12_000] {
            let mut previous = 0;
            for balance in (0..=150_000).step_by(1_250) {
                let chance = win_chance(&odds(), balance, wager);
                assert!(chance <= 100);
                assert!(chance >= previous, "dropped at balance {}", balance);
                if balance <= wager * 10 {
                    assert_eq!(chance, 0);
                }
                previous = chance;
            }
        }
    }
}
