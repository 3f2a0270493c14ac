//! Chaos injection for mocks.
//!
//! A [`ChaosPolicy`] attached to a mock is consulted once per call: it may
//! delay the call and may raise one of its configured faults. Decisions come
//! from a per-policy seeded generator, so the same seed, rate and number of
//! calls always produce the same accept/reject sequence.
//!
//! # Example
//!
//! ```
//! use doble::{ChaosPolicy, InjectedFault, Mock, MockBehavior};
//!
//! let mock = Mock::new(MockBehavior::Loose);
//! mock.set_chaos(
//!     ChaosPolicy::new()
//!         .with_seed(7)
//!         .with_failure_rate(1.0)
//!         .with_exception(InjectedFault::message("connection reset")),
//! )
//! .unwrap();
//!
//! assert!(mock.call("Fetch", vec![]).is_err());
//! assert_eq!(mock.chaos_statistics().unwrap().chaos_triggered, 1);
//! ```

use crate::result::{InjectedFault, MockError, MockResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Deterministic seed for reproducible chaos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a seed from a u64 value
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Seed from the system clock
    #[must_use]
    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self(nanos)
    }

    /// Get the raw seed value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// xorshift64 generator, one per policy
#[derive(Debug, Clone)]
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    const fn new(seed: Seed) -> Self {
        // Ensure non-zero state
        let state = if seed.0 == 0 { 1 } else { seed.0 };
        Self { state }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in `[0, 1)`
    fn next_f64(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next() % len as u64) as usize
    }
}

/// Fault and latency injection settings
#[derive(Debug, Clone, Default)]
pub struct ChaosPolicy {
    /// Probability of triggering on each call, in `[0, 1]`
    pub failure_rate: f64,
    /// Faults to choose from when triggered
    pub exceptions: Vec<InjectedFault>,
    /// Synchronous delay applied to every call
    pub timeout_ms: u64,
    /// Generator seed; `None` seeds from the clock when attached
    pub seed: Option<u64>,
}

impl ChaosPolicy {
    /// Policy that never triggers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call trigger probability
    #[must_use]
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    /// Add a candidate fault
    #[must_use]
    pub fn with_exception(mut self, fault: InjectedFault) -> Self {
        self.exceptions.push(fault);
        self
    }

    /// Delay every call by `ms`
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Fix the generator seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject rates outside `[0, 1]`
    ///
    /// # Errors
    ///
    /// Returns a misuse error for NaN or out-of-range rates.
    pub fn validate(&self) -> MockResult<()> {
        if (0.0..=1.0).contains(&self.failure_rate) {
            Ok(())
        } else {
            Err(MockError::misuse(format!(
                "chaos failure rate must be within [0, 1], got {}",
                self.failure_rate
            )))
        }
    }
}

/// Running chaos counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChaosStatistics {
    /// Calls that consulted the policy
    pub total_invocations: u64,
    /// Calls where the roll fell under the failure rate
    pub chaos_triggered: u64,
    /// Calls that were delayed
    pub timeout_triggered: u64,
}

impl ChaosStatistics {
    /// Fraction of calls that triggered, 0.0 before any call
    #[must_use]
    pub fn actual_failure_rate(&self) -> f64 {
        if self.total_invocations == 0 {
            0.0
        } else {
            self.chaos_triggered as f64 / self.total_invocations as f64
        }
    }
}

/// Outcome of consulting the policy for one call
#[derive(Debug, Clone, Default)]
pub struct ChaosDecision {
    /// Delay to apply before resolving the call
    pub delay: Option<Duration>,
    /// Whether the roll fell under the failure rate
    pub triggered: bool,
    /// Fault to raise; `None` when not triggered or no faults are configured
    pub fault: Option<InjectedFault>,
}

/// Fault picks draw from their own stream so the trigger sequence depends
/// only on seed and rate.
const PICKER_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Policy, generators and statistics for one mock
///
/// Not synchronized: owned by a single mock on a single thread.
#[derive(Debug, Clone)]
pub struct ChaosEngine {
    policy: ChaosPolicy,
    seed: Seed,
    rng: Xorshift64,
    picker: Xorshift64,
    stats: ChaosStatistics,
}

impl ChaosEngine {
    /// Build an engine, seeding its generator now
    ///
    /// # Errors
    ///
    /// Returns a misuse error if the policy is invalid.
    pub fn new(policy: ChaosPolicy) -> MockResult<Self> {
        policy.validate()?;
        let seed = policy.seed.map_or_else(Seed::from_clock, Seed::from_u64);
        Ok(Self {
            policy,
            seed,
            rng: Xorshift64::new(seed),
            picker: Xorshift64::new(Seed::from_u64(seed.value() ^ PICKER_SALT)),
            stats: ChaosStatistics::default(),
        })
    }

    /// Consult the policy for one call and update statistics
    pub fn decide(&mut self) -> ChaosDecision {
        self.stats.total_invocations += 1;

        let delay = (self.policy.timeout_ms > 0).then(|| {
            self.stats.timeout_triggered += 1;
            Duration::from_millis(self.policy.timeout_ms)
        });

        let triggered = self.rng.next_f64() < self.policy.failure_rate;
        let fault = if triggered {
            self.stats.chaos_triggered += 1;
            let faults = &self.policy.exceptions;
            (!faults.is_empty()).then(|| faults[self.picker.next_index(faults.len())].clone())
        } else {
            None
        };

        ChaosDecision {
            delay,
            triggered,
            fault,
        }
    }

    /// Current counters
    #[must_use]
    pub const fn statistics(&self) -> ChaosStatistics {
        self.stats
    }

    /// Zero the counters, keeping the generator position
    pub fn reset_statistics(&mut self) {
        self.stats = ChaosStatistics::default();
    }

    /// Seed the generator was built from
    #[must_use]
    pub const fn seed(&self) -> Seed {
        self.seed
    }

    /// Attached policy
    #[must_use]
    pub const fn policy(&self) -> &ChaosPolicy {
        &self.policy
    }
}
