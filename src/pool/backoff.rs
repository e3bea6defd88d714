//! Delay between failed dispatch attempts.
//!
//! Production uses [`JitteredBackoff`]: `base + U[0, 1)` seconds, so many
//! users hitting the same few keys do not retry in lock-step.  Tests plug in
//! [`NoBackoff`] or their own recording implementation.

use std::time::Duration;

use rand::Rng;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Computes how long to wait after failed attempt number `attempt`
/// (1-based).
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: usize) -> Duration;
}

// ---------------------------------------------------------------------------
// JitteredBackoff
// ---------------------------------------------------------------------------

/// Fixed base plus up to one second of uniform jitter.
#[derive(Debug, Clone, Copy)]
pub struct JitteredBackoff {
    base: Duration,
}

impl JitteredBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Build from a seconds value as stored in `settings.toml`.  Values that
    /// are not a valid `Duration` (negative, NaN, infinite or too large) fall
    /// back to the default base with a warning.
    pub fn from_secs_f64(base_secs: f64) -> Self {
        match Duration::try_from_secs_f64(base_secs) {
            Ok(base) => Self::new(base),
            Err(e) => {
                let fallback = Self::default();
                log::warn!(
                    "invalid backoff base {base_secs}s ({e}); using {:?}",
                    fallback.base
                );
                fallback
            }
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }
}

impl Default for JitteredBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Backoff for JitteredBackoff {
    fn delay(&self, _attempt: usize) -> Duration {
        let jitter_nanos = rand::thread_rng().gen_range(0..NANOS_PER_SEC);
        self.base.saturating_add(Duration::from_nanos(jitter_nanos))
    }
}

// ---------------------------------------------------------------------------
// NoBackoff
// ---------------------------------------------------------------------------

/// Always zero.  Keeps retry tests instant and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&self, _attempt: usize) -> Duration {
        Duration::ZERO
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
