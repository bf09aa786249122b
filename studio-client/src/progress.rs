//! Estimated progress shown while a generation is in flight.
//!
//! The upstream reports no real progress, so the value is simulated: it
//! creeps up by a random step on a fixed tick, stops at [`ESTIMATE_CAP`], and
//! only reaches 100 when the video actually arrives.

use rand::Rng;
use std::time::Duration;

/// Highest value the estimate may reach before the response arrives.
pub const ESTIMATE_CAP: u8 = 95;

pub const COMPLETE: u8 = 100;

#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub tick: Duration,
    /// Largest increment per tick. Each tick adds `1..=max_step`.
    pub max_step: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(800),
            max_step: 10,
        }
    }
}

impl ProgressConfig {
    pub fn random_step<R: Rng>(&self, rng: &mut R) -> u8 {
        rng.gen_range(1..=self.max_step.max(1))
    }

    /// Next estimate after adding `step` to `current`, never past the cap and
    /// never lower than `current`.
    pub fn advance(&self, current: u8, step: u8) -> u8 {
        if current >= ESTIMATE_CAP {
            return current;
        }
        current.saturating_add(step).min(ESTIMATE_CAP)
    }
}
