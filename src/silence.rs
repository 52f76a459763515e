//! Silence engine
//!
//! Users pay to silence others for a while, pay again to lift a silence early,
//! or earn currency by silencing themselves. A duration is written as one
//! integer and a unit, `90s`, `15m` or `2h`, and priced by tiered per-second
//! ratios that depend on who imposes it.
//!
//! Each account may carry two independent records: one imposed by someone
//! else (`mute:<id>`) and one self-imposed (`selfmute:<id>`). Records are
//! timed entries in the ledger store and expire on their own.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::errors::{EconomyError, EconomyResult, StoreError};
use crate::ledger::{AccountId, Ledger};
use crate::metrics::EconomyMetrics;
use crate::settlement::SettlementEngine;

/// Longest silence accepted, one year
pub const MAX_SILENCE_SECS: i64 = 365 * 24 * 60 * 60;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceKind {
    /// Imposed on another account; priced from the payer
    Mute,
    /// Early lift of an imposed silence; priced from the payer
    Unmute,
    /// Imposed on oneself; priced as a reward
    SelfMute,
}

impl SilenceKind {
    /// Per-second ratios for the second, minute and hour tiers
    fn tariff(self) -> (i64, i64, i64) {
        match self {
            SilenceKind::Mute => (7, 5, 3),
            SilenceKind::Unmute | SilenceKind::SelfMute => (5, 3, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    fn suffix(self) -> char {
        match self {
            TimeUnit::Seconds => 's',
            TimeUnit::Minutes => 'm',
            TimeUnit::Hours => 'h',
        }
    }

    fn seconds(self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => MINUTE,
            TimeUnit::Hours => HOUR,
        }
    }
}

/// A duration as the user wrote it, `<value><unit>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceDuration {
    pub value: i64,
    pub unit: TimeUnit,
}

impl SilenceDuration {
    /// Coarsest unit with at least one whole step, value rounded to nearest.
    /// Less than half a second left rounds to `0s`, which costs nothing.
    pub fn rounded(remaining: Duration) -> Self {
        let secs = remaining.num_milliseconds().max(0) as f64 / 1000.0;
        let (value, unit) = if secs >= HOUR as f64 {
            (secs / HOUR as f64, TimeUnit::Hours)
        } else if secs >= MINUTE as f64 {
            (secs / MINUTE as f64, TimeUnit::Minutes)
        } else {
            (secs, TimeUnit::Seconds)
        };
        Self {
            value: value.round() as i64,
            unit,
        }
    }

    pub fn seconds(&self) -> EconomyResult<i64> {
        self.value
            .checked_mul(self.unit.seconds())
            .filter(|secs| *secs <= MAX_SILENCE_SECS)
            .ok_or_else(|| {
                EconomyError::invalid_range("duration", self.value, "longer than one year")
            })
    }

    pub fn as_duration(&self) -> EconomyResult<Duration> {
        Ok(Duration::seconds(self.seconds()?))
    }

    /// Price of this duration under `kind`'s tariff.
    ///
    /// The tier is picked from the unit as written: seconds above an hour
    /// use the hour ratio and above a minute the minute ratio, minutes above
    /// sixty use the hour ratio, hours always do.
    pub fn cost(&self, kind: SilenceKind) -> EconomyResult<i64> {
        let secs = self.seconds()?;
        let (per_second, per_minute, per_hour) = kind.tariff();
        let ratio = match self.unit {
            TimeUnit::Seconds if secs > HOUR => per_hour,
            TimeUnit::Seconds if secs > MINUTE => per_minute,
            TimeUnit::Seconds => per_second,
            TimeUnit::Minutes if self.value > 60 => per_hour,
            TimeUnit::Minutes => per_minute,
            TimeUnit::Hours => per_hour,
        };
        // secs is bounded by MAX_SILENCE_SECS, so this cannot overflow
        Ok(secs * ratio)
    }
}

impl FromStr for SilenceDuration {
    type Err = EconomyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || EconomyError::MalformedDuration(input.to_string());
        let unit = match input.chars().last() {
            Some('s') => TimeUnit::Seconds,
            Some('m') => TimeUnit::Minutes,
            Some('h') => TimeUnit::Hours,
            _ => return Err(malformed()),
        };
        let digits = &input[..input.len() - 1];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let value = digits.parse().map_err(|_| malformed())?;
        Ok(Self { value, unit })
    }
}

impl fmt::Display for SilenceDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Parse `input` and price it; returns the duration and its cost
pub fn compute_cost(kind: SilenceKind, input: &str) -> EconomyResult<(Duration, i64)> {
    let parsed: SilenceDuration = input.parse()?;
    if parsed.value == 0 {
        return Err(EconomyError::invalid_range("duration", 0, "must be positive"));
    }
    Ok((parsed.as_duration()?, parsed.cost(kind)?))
}

/// Stored form of an active silence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceRecord {
    pub kind: SilenceKind,
    pub started_at: DateTime<Utc>,
    pub duration_secs: i64,
    /// Rewards credited for a self-silence, summed over extensions
    #[serde(default)]
    pub earned: i64,
}

impl SilenceRecord {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(self.duration_secs)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at() - now).max(Duration::zero())
    }
}

/// An active silence as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSilence {
    pub record: SilenceRecord,
    pub remaining: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SilenceStatus {
    pub imposed: Option<ActiveSilence>,
    pub self_imposed: Option<ActiveSilence>,
}

impl SilenceStatus {
    pub fn is_silenced(&self) -> bool {
        self.imposed.is_some() || self.self_imposed.is_some()
    }

    /// Latest expiry among active records
    pub fn silenced_until(&self) -> Option<DateTime<Utc>> {
        [self.imposed, self.self_imposed]
            .iter()
            .flatten()
            .map(|s| s.record.expires_at())
            .max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteOutcome {
    pub payer_balance: i64,
    pub cost: i64,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmuteOutcome {
    pub payer_balance: i64,
    pub cost: i64,
    /// Remaining time the cost was computed from, as rounded for pricing
    pub remaining: SilenceDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfMuteOutcome {
    pub balance: i64,
    pub reward: i64,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfUnmuteOutcome {
    pub balance: i64,
    pub clawback: i64,
}

fn imposed_key(target: AccountId) -> String {
    format!("mute:{}", target)
}

fn self_key(user: AccountId) -> String {
    format!("selfmute:{}", user)
}

#[derive(Clone)]
pub struct SilenceEngine {
    ledger: Ledger,
    settlement: SettlementEngine,
    clock: Arc<dyn Clock>,
    metrics: Arc<EconomyMetrics>,
}

impl SilenceEngine {
    pub fn new(ledger: Ledger, clock: Arc<dyn Clock>, metrics: Arc<EconomyMetrics>) -> Self {
        Self {
            settlement: SettlementEngine::new(ledger.clone()),
            ledger,
            clock,
            metrics,
        }
    }

    async fn load(&self, key: &str) -> EconomyResult<Option<SilenceRecord>> {
        let Some(raw) = self.ledger.store().get_timed_record(key).await? else {
            return Ok(None);
        };
        let record: SilenceRecord = serde_json::from_str(&raw).map_err(StoreError::from)?;
        let now = self.clock.now();
        Ok((record.expires_at() > now).then_some(record))
    }

    async fn save(&self, key: &str, record: &SilenceRecord) -> EconomyResult<()> {
        let encoded = serde_json::to_string(record).map_err(StoreError::from)?;
        let ttl = record.remaining(self.clock.now());
        self.ledger.store().set_timed_record(key, encoded, ttl).await
    }

    fn active(&self, record: Option<SilenceRecord>) -> Option<ActiveSilence> {
        let now = self.clock.now();
        record.map(|record| ActiveSilence {
            record,
            remaining: record.remaining(now),
        })
    }

    pub async fn status(&self, user: AccountId) -> EconomyResult<SilenceStatus> {
        let imposed = self.load(&imposed_key(user)).await?;
        let self_imposed = self.load(&self_key(user)).await?;
        Ok(SilenceStatus {
            imposed: self.active(imposed),
            self_imposed: self.active(self_imposed),
        })
    }

    fn observe<T>(&self, result: EconomyResult<T>, operation: &str) -> EconomyResult<T> {
        match result {
            Ok(value) => {
                self.metrics.record_silence(operation);
                Ok(value)
            }
            Err(err) => {
                self.metrics.observe_error(&err);
                Err(err)
            }
        }
    }

    /// `payer` silences `target` for `duration`
    pub async fn mute(
        &self,
        payer: AccountId,
        target: AccountId,
        duration: &str,
    ) -> EconomyResult<MuteOutcome> {
        let result = self.impose(payer, target, duration).await;
        self.observe(result, "mute")
    }

    async fn impose(
        &self,
        payer: AccountId,
        target: AccountId,
        duration: &str,
    ) -> EconomyResult<MuteOutcome> {
        if payer == target {
            return Err(EconomyError::SelfTarget);
        }
        let (length, cost) = compute_cost(SilenceKind::Mute, duration)?;

        let _guard = self.ledger.lock(&[payer, target]).await;

        let balance = self.ledger.balance(payer).await?;
        if balance < cost {
            return Err(EconomyError::InsufficientFunds {
                needed: cost,
                balance,
            });
        }
        self.ledger.require_profile(target).await?;
        if let Some(until) = self.status(target).await?.silenced_until() {
            return Err(EconomyError::AlreadySilenced { target, until });
        }

        let payer_balance = self.settlement.debit(payer, cost, balance).await?;
        let record = SilenceRecord {
            kind: SilenceKind::Mute,
            started_at: self.clock.now(),
            duration_secs: length.num_seconds(),
            earned: 0,
        };
        self.save(&imposed_key(target), &record).await?;

        info!(%payer, %target, duration, cost, "silence imposed");
        Ok(MuteOutcome {
            payer_balance,
            cost,
            until: record.expires_at(),
        })
    }

    /// `payer` lifts the silence imposed on `target`, paying for the time left
    pub async fn unmute(&self, payer: AccountId, target: AccountId) -> EconomyResult<UnmuteOutcome> {
        let result = self.lift(payer, target).await;
        self.observe(result, "unmute")
    }

    async fn lift(&self, payer: AccountId, target: AccountId) -> EconomyResult<UnmuteOutcome> {
        let _guard = self.ledger.lock(&[payer, target]).await;

        let key = imposed_key(target);
        let record = self
            .load(&key)
            .await?
            .ok_or(EconomyError::NotSilenced { target })?;
        let remaining = SilenceDuration::rounded(record.remaining(self.clock.now()));
        let cost = remaining.cost(SilenceKind::Unmute)?;

        let balance = self.ledger.balance(payer).await?;
        if balance < cost {
            return Err(EconomyError::InsufficientFunds {
                needed: cost,
                balance,
            });
        }
        let payer_balance = self.settlement.debit(payer, cost, balance).await?;
        self.ledger.store().delete_timed_record(&key).await?;

        info!(%payer, %target, remaining = %remaining, cost, "silence lifted");
        Ok(UnmuteOutcome {
            payer_balance,
            cost,
            remaining,
        })
    }

    /// `user` silences themselves and is paid for it; extends an active self-silence
    pub async fn self_mute(&self, user: AccountId, duration: &str) -> EconomyResult<SelfMuteOutcome> {
        let result = self.impose_on_self(user, duration).await;
        self.observe(result, "self_mute")
    }

    async fn impose_on_self(&self, user: AccountId, duration: &str) -> EconomyResult<SelfMuteOutcome> {
        let (length, reward) = compute_cost(SilenceKind::SelfMute, duration)?;

        let _guard = self.ledger.lock(&[user]).await;

        let balance = self.ledger.balance(user).await?;
        let key = self_key(user);
        let now = self.clock.now();
        let previous = self.load(&key).await?;
        let (carried, earned) = match previous {
            Some(existing) => (existing.remaining(now), existing.earned),
            None => (Duration::zero(), 0),
        };
        let earned = earned
            .checked_add(reward)
            .ok_or_else(|| EconomyError::invalid_range("reward", reward, "overflows earned total"))?;
        let record = SilenceRecord {
            kind: SilenceKind::SelfMute,
            started_at: now,
            duration_secs: (carried + length).num_seconds(),
            earned,
        };
        self.save(&key, &record).await?;

        let balance = match self.settlement.credit(user, reward, balance).await {
            Ok(balance) => balance,
            Err(err) => {
                // Reward failed to land; put back whatever was active before
                match previous {
                    Some(previous) => self.save(&key, &previous).await?,
                    None => self.ledger.store().delete_timed_record(&key).await?,
                }
                return Err(err);
            }
        };

        info!(%user, duration, reward, total_secs = record.duration_secs, "self silence applied");
        Ok(SelfMuteOutcome {
            balance,
            reward,
            until: record.expires_at(),
        })
    }

    /// `user` ends their self-silence early and returns the full reward it earned
    pub async fn self_unmute(&self, user: AccountId) -> EconomyResult<SelfUnmuteOutcome> {
        let result = self.lift_self(user).await;
        self.observe(result, "self_unmute")
    }

    async fn lift_self(&self, user: AccountId) -> EconomyResult<SelfUnmuteOutcome> {
        let _guard = self.ledger.lock(&[user]).await;

        let key = self_key(user);
        let record = self
            .load(&key)
            .await?
            .ok_or(EconomyError::NotSilenced { target: user })?;
        let clawback = record.earned;

        let balance = self.ledger.balance(user).await?;
        if balance < clawback {
            return Err(EconomyError::InsufficientFunds {
                needed: clawback,
                balance,
            });
        }
        let balance = self.settlement.debit(user, clawback, balance).await?;
        self.ledger.store().delete_timed_record(&key).await?;

        info!(%user, clawback, "self silence ended early");
        Ok(SelfUnmuteOutcome { balance, clawback })
    }
}
