//! Random source shared by all games and the theft engine
//!
//! One generator is seeded once when the economy is built, either from a
//! configured seed or from OS entropy, and every draw goes through it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_core::{OsRng, RngCore};
use std::collections::VecDeque;
use std::sync::Mutex;

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, upper)`; `upper` must be non-zero
    fn below(&self, upper: u32) -> u32;

    /// Uniform float in `[0, 1)`
    fn unit(&self) -> f64;
}

/// Production generator, seeded once
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::from_seed(OsRng.next_u64())
    }

    /// Fixed seed when given, entropy otherwise
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, upper: u32) -> u32 {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        rng.gen_range(0..upper.max(1))
    }

    fn unit(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        rng.gen::<f64>()
    }
}

/// Replays queued draws in order, then falls back to a seeded generator.
///
/// Scripted integers are reduced modulo `upper` so a script can never
/// produce an out-of-range draw.
#[derive(Debug)]
pub struct ScriptedRandom {
    ints: Mutex<VecDeque<u32>>,
    floats: Mutex<VecDeque<f64>>,
    fallback: SeededRandom,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self {
            ints: Mutex::new(VecDeque::new()),
            floats: Mutex::new(VecDeque::new()),
            fallback: SeededRandom::from_seed(0),
        }
    }

    pub fn with_ints(values: impl IntoIterator<Item = u32>) -> Self {
        let script = Self::new();
        script.push_ints(values);
        script
    }

    pub fn push_ints(&self, values: impl IntoIterator<Item = u32>) {
        self.ints
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(values);
    }

    pub fn push_floats(&self, values: impl IntoIterator<Item = f64>) {
        self.floats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(values);
    }
}

impl Default for ScriptedRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&self, upper: u32) -> u32 {
        let next = self.ints.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        match next {
            Some(value) => value % upper.max(1),
            None => self.fallback.below(upper),
        }
    }

    fn unit(&self) -> f64 {
        let next = self
            .floats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        match next {
            Some(value) => value.clamp(0.0, 1.0 - f64::EPSILON),
            None => self.fallback.unit(),
        }
    }
}
