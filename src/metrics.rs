//! Prometheus metrics for the economy
//!
//! # Metrics
//!
//! - `wagerbot_rounds_total{game,result}` - game rounds by outcome
//! - `wagerbot_wagered_total` - currency staked across all rounds
//! - `wagerbot_paid_out_total` - gross payouts returned to winners
//! - `wagerbot_thefts_total{result}` - theft attempts
//! - `wagerbot_silences_total{operation}` - mute, unmute and self-silence operations
//! - `wagerbot_income_credits_total` - accounts credited by passive income
//! - `wagerbot_store_failures_total` - operations aborted by a store error
//!
//! Counters live in a registry owned by one [`EconomyMetrics`], so they
//! cover the current process only.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::errors::EconomyError;

#[derive(Clone)]
pub struct EconomyMetrics {
    rounds: IntCounterVec,
    wagered: IntCounter,
    paid_out: IntCounter,
    thefts: IntCounterVec,
    silences: IntCounterVec,
    income_credits: IntCounter,
    store_failures: IntCounter,
    registry: Registry,
    enabled: bool,
}

impl EconomyMetrics {
    /// Metrics bound to a private registry
    pub fn new() -> prometheus::Result<Self> {
        Self::with_enabled(true)
    }

    /// Metrics that record only when `enabled`; a disabled instance renders nothing
    pub fn with_enabled(enabled: bool) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let rounds = IntCounterVec::new(
            Opts::new("wagerbot_rounds_total", "Game rounds by outcome"),
            &["game", "result"],
        )?;
        registry.register(Box::new(rounds.clone()))?;

        let wagered = IntCounter::new("wagerbot_wagered_total", "Currency staked across all rounds")?;
        registry.register(Box::new(wagered.clone()))?;

        let paid_out = IntCounter::new("wagerbot_paid_out_total", "Gross payouts returned to winners")?;
        registry.register(Box::new(paid_out.clone()))?;

        let thefts = IntCounterVec::new(
            Opts::new("wagerbot_thefts_total", "Theft attempts by result"),
            &["result"],
        )?;
        registry.register(Box::new(thefts.clone()))?;

        let silences = IntCounterVec::new(
            Opts::new("wagerbot_silences_total", "Silence operations"),
            &["operation"],
        )?;
        registry.register(Box::new(silences.clone()))?;

        let income_credits = IntCounter::new(
            "wagerbot_income_credits_total",
            "Accounts credited by passive income",
        )?;
        registry.register(Box::new(income_credits.clone()))?;

        let store_failures = IntCounter::new(
            "wagerbot_store_failures_total",
            "Operations aborted by a store error",
        )?;
        registry.register(Box::new(store_failures.clone()))?;

        Ok(Self {
            rounds,
            wagered,
            paid_out,
            thefts,
            silences,
            income_credits,
            store_failures,
            registry,
            enabled,
        })
    }

    pub fn record_round(&self, game: &str, won: bool, forced_loss: bool, wager: i64, payout: i64) {
        if !self.enabled {
            return;
        }
        let result = match (won, forced_loss) {
            (true, _) => "won",
            (false, true) => "forced_loss",
            (false, false) => "lost",
        };
        self.rounds.with_label_values(&[game, result]).inc();
        self.wagered.inc_by(wager.max(0) as u64);
        self.paid_out.inc_by(payout.max(0) as u64);
    }

    pub fn record_theft(&self, succeeded: bool) {
        if !self.enabled {
            return;
        }
        let result = if succeeded { "success" } else { "failure" };
        self.thefts.with_label_values(&[result]).inc();
    }

    pub fn record_silence(&self, operation: &str) {
        if !self.enabled {
            return;
        }
        self.silences.with_label_values(&[operation]).inc();
    }

    pub fn record_income(&self, accounts: u64) {
        if !self.enabled {
            return;
        }
        self.income_credits.inc_by(accounts);
    }

    /// Count the error if it came from the store
    pub fn observe_error(&self, err: &EconomyError) {
        if self.enabled && err.is_store_failure() {
            self.store_failures.inc();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        if !self.enabled {
            return Ok(String::new());
        }
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_are_labelled() {
        let metrics = EconomyMetrics::new().unwrap();
        metrics.record_round("dice", false, true, 100, 0);
        metrics.record_round("dice", true, false, 100, 1200);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"wagerbot_rounds_total{game="dice",result="forced_loss"} 1"#));
        assert!(text.contains("wagerbot_paid_out_total 1200"));
        assert!(text.contains("wagerbot_wagered_total 200"));
    }

    #[test]
    fn disabled_metrics_record_nothing() {
        let metrics = EconomyMetrics::with_enabled(false).unwrap();
        metrics.record_round("slots", true, false, 50, 100);
        metrics.record_theft(false);
        metrics.observe_error(&crate::errors::StoreError::ReadFailed("disk".to_string()).into());

        assert!(!metrics.is_enabled());
        assert_eq!(metrics.render().unwrap(), "");
        assert_eq!(metrics.rounds.with_label_values(&["slots", "won"]).get(), 0);
        assert_eq!(metrics.store_failures.get(), 0);
    }

    #[test]
    fn independent_instances_do_not_collide() {
        assert!(EconomyMetrics::new().is_ok());
        assert!(EconomyMetrics::new().is_ok());
    }
}
