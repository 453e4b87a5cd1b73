//! Half-life decay for persisted scalar state.
//!
//! Beliefs lose confidence and moods fade as time passes. The stored value is
//! never rewritten; the decayed value is derived whenever it is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `original × 0.5^(elapsed / half_life)`.
///
/// Negative `elapsed` (clock skew) is treated as zero. A non-positive
/// `half_life` means the value is gone as soon as any time has passed.
pub fn decay(original: f64, elapsed_secs: f64, half_life_secs: f64) -> f64 {
    let elapsed = elapsed_secs.max(0.0);
    if elapsed == 0.0 {
        return original;
    }
    if half_life_secs <= 0.0 {
        return 0.0;
    }
    original * 0.5_f64.powf(elapsed / half_life_secs)
}

/// Classes of decaying values, each with its own configured half-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueClass {
    BeliefConfidence,
    MoodIntensity,
}

/// A scalar whose effective value halves every `half_life_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayableValue {
    pub original: f64,
    pub set_at: DateTime<Utc>,
    pub half_life_secs: f64,
}

impl DecayableValue {
    pub fn new(original: f64, set_at: DateTime<Utc>, half_life_secs: f64) -> Self {
        Self {
            original,
            set_at,
            half_life_secs,
        }
    }

    /// The decayed value as observed at `now`.
    pub fn value_at(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.set_at).num_milliseconds() as f64 / 1000.0;
        decay(self.original, elapsed, self.half_life_secs)
    }

    /// The decayed value as observed right now.
    pub fn current(&self) -> f64 {
        self.value_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const HOUR: f64 = 3600.0;

    #[test]
    fn no_elapsed_time_is_identity() {
        assert_eq!(decay(0.8, 0.0, HOUR), 0.8);
        assert_eq!(decay(-3.0, 0.0, HOUR), -3.0);
    }

    #[test]
    fn one_half_life_halves() {
        assert!((decay(0.8, HOUR, HOUR) - 0.4).abs() < 1e-12);
        assert!((decay(10.0, 2.0 * HOUR, HOUR) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn strictly_decreasing_in_elapsed() {
        let mut previous = decay(1.0, 0.0, HOUR);
        for step in 1..50 {
            let next = decay(1.0, step as f64 * 600.0, HOUR);
            assert!(next < previous, "step {step}: {next} !< {previous}");
            previous = next;
        }
    }

    #[test]
    fn approaches_zero() {
        assert!(decay(1.0, 1000.0 * HOUR, HOUR) < 1e-12);
    }

    #[test]
    fn negative_elapsed_is_clamped() {
        assert_eq!(decay(0.5, -100.0, HOUR), 0.5);
    }

    #[test]
    fn zero_half_life_collapses_immediately() {
        assert_eq!(decay(0.9, 1.0, 0.0), 0.0);
        assert_eq!(decay(0.9, 0.0, 0.0), 0.9);
    }

    #[test]
    fn decayable_value_reads_at_time() {
        let set_at = Utc::now() - Duration::hours(6);
        let mood = DecayableValue::new(0.6, set_at, 6.0 * HOUR);
        let observed = mood.value_at(set_at + Duration::hours(6));
        assert!((observed - 0.3).abs() < 1e-9);
        assert_eq!(mood.value_at(set_at), 0.6);
    }

    #[test]
    fn distinct_half_lives_decay_at_distinct_rates() {
        let set_at = Utc::now();
        let later = set_at + Duration::hours(24);
        let belief = DecayableValue::new(1.0, set_at, 168.0 * HOUR);
        let mood = DecayableValue::new(1.0, set_at, 6.0 * HOUR);
        assert!(belief.value_at(later) > mood.value_at(later));
    }
}
