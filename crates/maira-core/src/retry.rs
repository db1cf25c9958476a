//! Reconnect policy and backoff calculation.
//!
//! Provides the types and math for the bounded reconnect loop. The actual
//! async loop lives in `maira-link` (which has access to tokio), while this
//! module contains the portable, sync-only building blocks:
//!
//! - [`ReconnectPolicy`]: retry budget, initial/capped delay, jitter, connect timeout
//! - [`calculate_backoff_delay`]: capped exponential backoff without randomness
//! - [`calculate_backoff_delay_with_random`]: the same with symmetric jitter

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum reconnect attempts.
pub const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 10;
/// Default initial delay in milliseconds.
pub const DEFAULT_RECONNECTION_DELAY_MS: u64 = 1000;
/// Default delay cap in milliseconds.
pub const DEFAULT_RECONNECTION_DELAY_MAX_MS: u64 = 5000;
/// Default per-attempt connect timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;

/// Bounded automatic-retry policy for the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts before giving up (default: 10).
    pub reconnection_attempts: u32,
    /// Initial delay between attempts in ms (default: 1000).
    pub reconnection_delay_ms: u64,
    /// Maximum delay between attempts in ms (default: 5000).
    pub reconnection_delay_max_ms: u64,
    /// Timeout for a single connection attempt in ms (default: 10000).
    pub timeout_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.5).
    pub randomization_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            reconnection_delay_ms: DEFAULT_RECONNECTION_DELAY_MS,
            reconnection_delay_max_ms: DEFAULT_RECONNECTION_DELAY_MAX_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
        }
    }
}

impl ReconnectPolicy {
    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before the given zero-based reconnect attempt.
    ///
    /// `random` should be a value in `[0.0, 1.0)` from a PRNG.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, random: f64) -> Duration {
        Duration::from_millis(calculate_backoff_delay_with_random(
            attempt,
            self.reconnection_delay_ms,
            self.reconnection_delay_max_ms,
            self.randomization_factor,
            random,
        ))
    }

    /// Whether another attempt is allowed after `attempts_made` failures.
    #[must_use]
    pub fn allows(&self, attempts_made: u32) -> bool {
        attempts_made < self.reconnection_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate capped exponential backoff delay without jitter.
///
/// Formula: `min(max_delay, base_delay * 2^attempt)`
///
/// `attempt` is the zero-based attempt index (0 for the first retry).
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}

/// Calculate backoff delay with explicit randomness.
///
/// The jitter is symmetric around the capped exponential value: a factor of
/// 0.5 lets the delay vary by ±50%. The result never exceeds `max_delay_ms`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay_with_random(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let capped = calculate_backoff_delay(attempt, base_delay_ms, max_delay_ms);

    // Maps random [0,1) to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor.clamp(0.0, 1.0);
    let with_jitter = (capped as f64) * jitter;

    (with_jitter.round().max(0.0) as u64).min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn policy_defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.reconnection_attempts, 10);
        assert_eq!(policy.reconnection_delay_ms, 1000);
        assert_eq!(policy.reconnection_delay_max_ms, 5000);
        assert_eq!(policy.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn policy_serde_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ReconnectPolicy::default());
    }

    #[test]
    fn policy_serde_camel_case() {
        let json = r#"{"reconnectionAttempts":3,"reconnectionDelayMs":250}"#;
        let policy: ReconnectPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.reconnection_attempts, 3);
        assert_eq!(policy.reconnection_delay_ms, 250);
        assert_eq!(policy.reconnection_delay_max_ms, 5000);
    }

    #[test]
    fn policy_allows_until_budget() {
        let policy = ReconnectPolicy {
            reconnection_attempts: 2,
            ..ReconnectPolicy::default()
        };
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
    }

    #[test]
    fn backoff_exponential_growth() {
        assert_eq!(calculate_backoff_delay(0, 1000, 60_000), 1000);
        assert_eq!(calculate_backoff_delay(1, 1000, 60_000), 2000);
        assert_eq!(calculate_backoff_delay(2, 1000, 60_000), 4000);
        assert_eq!(calculate_backoff_delay(3, 1000, 60_000), 8000);
    }

    #[test]
    fn backoff_caps_at_max() {
        assert_eq!(calculate_backoff_delay(3, 1000, 5000), 5000);
        assert_eq!(calculate_backoff_delay(100, 1000, 5000), 5000);
    }

    #[test]
    fn backoff_with_random_bounds() {
        // random = 0.0 → jitter = 1 - 0.5
        assert_eq!(calculate_backoff_delay_with_random(0, 1000, 5000, 0.5, 0.0), 500);
        // random = 0.5 → no jitter
        assert_eq!(calculate_backoff_delay_with_random(0, 1000, 5000, 0.5, 0.5), 1000);
        // random = 1.0 → jitter = 1 + 0.5
        assert_eq!(calculate_backoff_delay_with_random(0, 1000, 5000, 0.5, 1.0), 1500);
    }

    #[test]
    fn backoff_with_random_never_exceeds_cap() {
        assert_eq!(calculate_backoff_delay_with_random(10, 1000, 5000, 0.5, 0.99), 5000);
    }

    #[test]
    fn policy_delay_for_uses_jitter() {
        let policy = ReconnectPolicy {
            randomization_factor: 0.0,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delay_for(0, 0.9), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, 0.1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(5, 0.1), Duration::from_millis(5000));
    }

    proptest! {
        #[test]
        fn jittered_delay_within_cap(
            attempt in 0u32..64,
            base in 1u64..10_000,
            cap in 1u64..120_000,
            factor in 0.0f64..1.0,
            random in 0.0f64..1.0,
        ) {
            let delay = calculate_backoff_delay_with_random(attempt, base, cap, factor, random);
            prop_assert!(delay <= cap);
        }
    }
}
