//! Heart-rate threshold monitor with edge-triggered hysteresis.
//!
//! Fires on a threshold *crossing*, not a level: each direction has an
//! armed latch that is set on the first sample beyond the threshold and
//! cleared when the reading returns inside the band. While a latch is
//! set, further samples on the same side are silent — one trigger per
//! contiguous excursion.
//!
//! Gating only suppresses the outbound trigger. Latches keep tracking the
//! signal while gating is disabled so re-enabling cannot replay a backlog
//! of stale crossings.

use log::debug;

use crate::config::SystemConfig;

/// Which side of the band a sample crossed out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Sample rose above the high threshold.
    High,
    /// Sample fell below the low threshold.
    Low,
}

/// Edge-detection latches for both thresholds.
#[derive(Debug, Clone, Default)]
pub struct ThresholdMonitor {
    high_armed: bool,
    low_armed: bool,
}

impl ThresholdMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one heart-rate sample against the current thresholds.
    ///
    /// Returns the crossing to act on, or `None`. Latch state always
    /// advances, even when `heart_rate_gating_enabled` is off.
    pub fn evaluate(&mut self, sample_bpm: u8, config: &SystemConfig) -> Option<Crossing> {
        let bpm = i16::from(sample_bpm);
        let mut crossing = None;

        // High side: strictly above arms the latch and fires once.
        if bpm > config.high_threshold_bpm {
            if !self.high_armed {
                self.high_armed = true;
                debug!(
                    "heart rate above threshold: {} > {}",
                    bpm, config.high_threshold_bpm
                );
                crossing = Some(Crossing::High);
            }
        } else {
            self.high_armed = false;
        }

        // Low side: strictly below, symmetric.
        if bpm < config.low_threshold_bpm {
            if !self.low_armed {
                self.low_armed = true;
                debug!(
                    "heart rate below threshold: {} < {}",
                    bpm, config.low_threshold_bpm
                );
                crossing.get_or_insert(Crossing::Low);
            }
        } else {
            self.low_armed = false;
        }

        if config.heart_rate_gating_enabled {
            crossing
        } else {
            None
        }
    }

    /// Current latch state `(high_armed, low_armed)`.
    pub fn armed(&self) -> (bool, bool) {
        (self.high_armed, self.low_armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gated_config() -> SystemConfig {
        SystemConfig {
            heart_rate_gating_enabled: true,
            high_threshold_bpm: 100,
            low_threshold_bpm: 60,
            ..SystemConfig::default()
        }
    }

    #[test]
    fn fires_once_per_high_excursion() {
        let mut m = ThresholdMonitor::new();
        let cfg = gated_config();
        assert_eq!(m.evaluate(105, &cfg), Some(Crossing::High));
        // Still above: latched, no second trigger.
        assert_eq!(m.evaluate(110, &cfg), None);
        assert_eq!(m.evaluate(101, &cfg), None);
    }

    #[test]
    fn rearms_after_returning_in_band() {
        let mut m = ThresholdMonitor::new();
        let cfg = gated_config();
        assert_eq!(m.evaluate(105, &cfg), Some(Crossing::High));
        assert_eq!(m.evaluate(98, &cfg), None); // back inside, disarms
        assert_eq!(m.evaluate(110, &cfg), Some(Crossing::High));
    }

    #[test]
    fn sample_sequence_from_field_log() {
        // high=100, samples [95, 105, 98, 110] → fires on the 2nd and 4th.
        let mut m = ThresholdMonitor::new();
        let cfg = gated_config();
        let fired: Vec<bool> = [95, 105, 98, 110]
            .iter()
            .map(|&s| m.evaluate(s, &cfg).is_some())
            .collect();
        assert_eq!(fired, vec![false, true, false, true]);
    }

    #[test]
    fn low_side_symmetric() {
        let mut m = ThresholdMonitor::new();
        let cfg = gated_config();
        assert_eq!(m.evaluate(55, &cfg), Some(Crossing::Low));
        assert_eq!(m.evaluate(52, &cfg), None);
        assert_eq!(m.evaluate(65, &cfg), None); // in band, disarms
        assert_eq!(m.evaluate(58, &cfg), Some(Crossing::Low));
    }

    #[test]
    fn exact_threshold_is_in_band() {
        let mut m = ThresholdMonitor::new();
        let cfg = gated_config();
        assert_eq!(m.evaluate(100, &cfg), None);
        assert_eq!(m.evaluate(60, &cfg), None);
        assert_eq!(m.armed(), (false, false));
    }

    #[test]
    fn gating_disabled_suppresses_but_latches() {
        let mut m = ThresholdMonitor::new();
        let mut cfg = gated_config();
        cfg.heart_rate_gating_enabled = false;

        assert_eq!(m.evaluate(105, &cfg), None);
        assert_eq!(m.armed(), (true, false));

        // Re-enabling while still above must not fire the stale crossing.
        cfg.heart_rate_gating_enabled = true;
        assert_eq!(m.evaluate(106, &cfg), None);

        // A fresh excursion after returning in-band fires normally.
        assert_eq!(m.evaluate(90, &cfg), None);
        assert_eq!(m.evaluate(104, &cfg), Some(Crossing::High));
    }

    #[test]
    fn inverted_thresholds_accepted_verbatim() {
        // low > high is never rejected; both comparisons just run as written,
        // so a mid-band sample is beyond *both* thresholds at once.
        let mut m = ThresholdMonitor::new();
        let cfg = SystemConfig {
            heart_rate_gating_enabled: true,
            high_threshold_bpm: 60,
            low_threshold_bpm: 100,
            ..SystemConfig::default()
        };
        assert_eq!(m.evaluate(80, &cfg), Some(Crossing::High));
        assert_eq!(m.armed(), (true, true));
    }
}
