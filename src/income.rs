//! Passive income job
//!
//! Credits every player their profile's `income` on a fixed interval. Each
//! credit takes the same per-account lock as settlement, so a tick never
//! interleaves with a round or payment on that account.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::EconomyResult;
use crate::ledger::{AccountId, Ledger};
use crate::metrics::EconomyMetrics;
use crate::settlement::SettlementEngine;

#[derive(Clone)]
pub struct IncomeJob {
    ledger: Ledger,
    settlement: SettlementEngine,
    metrics: Arc<EconomyMetrics>,
}

/// Result of one pass over all accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncomeReport {
    pub credited: u64,
    pub total: i64,
}

impl IncomeJob {
    pub fn new(ledger: Ledger, metrics: Arc<EconomyMetrics>) -> Self {
        Self {
            settlement: SettlementEngine::new(ledger.clone()),
            ledger,
            metrics,
        }
    }

    /// Credit every player once
    pub async fn run_once(&self) -> EconomyResult<IncomeReport> {
        let mut report = IncomeReport::default();
        for id in self.ledger.store().account_ids().await? {
            if !id.is_player() {
                continue;
            }
            if let Some(amount) = self.credit(id).await? {
                report.credited += 1;
                report.total = report.total.saturating_add(amount);
            }
        }
        self.metrics.record_income(report.credited);
        Ok(report)
    }

    async fn credit(&self, id: AccountId) -> EconomyResult<Option<i64>> {
        let _guard = self.ledger.lock(&[id]).await;
        let Some(profile) = self.ledger.store().get_profile(id).await? else {
            return Ok(None);
        };
        if profile.income <= 0 {
            return Ok(None);
        }
        let balance = self.ledger.balance(id).await?;
        self.settlement.credit(id, profile.income, balance).await?;
        Ok(Some(profile.income))
    }

    /// Run [`IncomeJob::run_once`] every `interval` until the task is aborted.
    ///
    /// The first tick fires after one full interval. Failed passes are logged
    /// and the loop keeps going.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            info!(interval_secs = interval.as_secs(), "passive income job started");
            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(report) => {
                        debug!(credited = report.credited, total = report.total, "passive income applied")
                    }
                    Err(err) => {
                        self.metrics.observe_error(&err);
                        error!(error = %err, "passive income pass failed");
                    }
                }
            }
        })
    }
}
