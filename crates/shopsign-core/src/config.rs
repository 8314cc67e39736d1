// ── Session configuration ──
//
// Constructed by the embedder and handed to `MonitoringSession` --
// core never reads config files.

use std::time::Duration;

use crate::error::CoreError;

/// Retry policy for the update coordinator's conditional writes.
///
/// Delay for attempt `n` (zero-based) is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total write attempts before the intent is dropped.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Configuration for one monitoring session.
///
/// There is deliberately no `Default`: the accuracy threshold is a
/// deployment parameter with no canonical value, so the embedder must
/// choose one explicitly.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Samples with a reported accuracy worse than this are ignored.
    pub max_accuracy_meters: f64,
    /// Period of the timer-driven reconciliation pass.
    pub reconcile_interval: Duration,
    pub retry: RetryPolicy,
}

impl SessionConfig {
    /// Build a config around the required accuracy threshold.
    /// Remaining fields get workable defaults and stay public.
    pub fn new(max_accuracy_meters: f64) -> Result<Self, CoreError> {
        if max_accuracy_meters <= 0.0 || !max_accuracy_meters.is_finite() {
            return Err(CoreError::InvalidAccuracy {
                meters: max_accuracy_meters,
            });
        }
        Ok(Self {
            max_accuracy_meters,
            reconcile_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_threshold_must_be_positive() {
        assert!(SessionConfig::new(0.0).is_err());
        assert!(SessionConfig::new(-5.0).is_err());
        assert!(SessionConfig::new(f64::NAN).is_err());
        assert!(SessionConfig::new(100.0).is_ok());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
