//! System configuration parameters
//!
//! All tunable parameters for the Calming Necklace. The emission and
//! heart-rate settings can be rewritten at runtime over the BLE control
//! channel; the timing section is fixed at build time.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Emission ---
    /// How long a single activation keeps the emitter on (milliseconds)
    pub emission_duration_ms: u32,
    /// Spacing between automatic activations in periodic mode (milliseconds)
    pub periodic_interval_ms: u32,
    /// Whether periodic activations are enabled
    pub periodic_enabled: bool,

    // --- Heart rate ---
    /// Whether heart-rate threshold crossings may trigger an activation
    pub heart_rate_gating_enabled: bool,
    /// Crossing above this BPM fires a trigger
    pub high_threshold_bpm: i16,
    /// Crossing below this BPM fires a trigger
    pub low_threshold_bpm: i16,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Heart-rate sample cadence (milliseconds)
    pub heart_rate_sample_interval_ms: u32,
    /// No control-channel activity for this long marks the remote dead (milliseconds)
    pub disconnect_timeout_ms: u32,
    /// No keep-alive write for this long marks the remote dead (milliseconds)
    pub keepalive_timeout_ms: u32,
}

/// Multiplier applied to durations/intervals written over the channel,
/// which arrive in seconds.
pub const SECS_TO_MS: u32 = 1000;

impl SystemConfig {
    /// Store a duration/interval written in seconds over the channel.
    pub fn secs_to_ms(secs: u32) -> u32 {
        secs.saturating_mul(SECS_TO_MS)
    }

    /// True when the threshold pair is logically inconsistent.
    ///
    /// The channel accepts any value as-is; callers use this only to log
    /// a warning, never to reject the write.
    pub fn thresholds_inverted(&self) -> bool {
        self.low_threshold_bpm > self.high_threshold_bpm
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Emission
            emission_duration_ms: 10_000,  // 10 seconds
            periodic_interval_ms: 300_000, // 5 minutes
            periodic_enabled: false,

            // Heart rate
            heart_rate_gating_enabled: false,
            high_threshold_bpm: 100,
            low_threshold_bpm: 60,

            // Timing
            control_loop_interval_ms: 100,         // 10 Hz
            heart_rate_sample_interval_ms: 10_000, // 10 s
            disconnect_timeout_ms: 180_000,        // 3 min
            keepalive_timeout_ms: 120_000,         // 2 min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.emission_duration_ms > 0);
        assert!(c.periodic_interval_ms > c.emission_duration_ms);
        assert!(c.low_threshold_bpm <= c.high_threshold_bpm);
        assert!(c.control_loop_interval_ms > 0);
        assert!(c.heart_rate_sample_interval_ms > c.control_loop_interval_ms);
    }

    #[test]
    fn timeouts_ordered() {
        let c = SystemConfig::default();
        assert!(
            c.keepalive_timeout_ms < c.disconnect_timeout_ms,
            "keep-alive must expire before the activity timeout so the \
             remote gets a chance to refresh the link"
        );
    }

    #[test]
    fn seconds_conversion() {
        assert_eq!(SystemConfig::secs_to_ms(10), 10_000);
        assert_eq!(SystemConfig::secs_to_ms(0), 0);
        // Channel values are unvalidated; an absurd write must not overflow.
        assert_eq!(SystemConfig::secs_to_ms(u32::MAX), u32::MAX);
    }

    #[test]
    fn inverted_thresholds_detected_not_rejected() {
        let mut c = SystemConfig::default();
        assert!(!c.thresholds_inverted());
        c.low_threshold_bpm = 120;
        assert!(c.thresholds_inverted());
        // The inconsistent pair is kept as written.
        assert_eq!(c.low_threshold_bpm, 120);
        assert_eq!(c.high_threshold_bpm, 100);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.emission_duration_ms, c2.emission_duration_ms);
        assert_eq!(c.periodic_enabled, c2.periodic_enabled);
        assert_eq!(c.high_threshold_bpm, c2.high_threshold_bpm);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.periodic_interval_ms, c2.periodic_interval_ms);
        assert_eq!(c.low_threshold_bpm, c2.low_threshold_bpm);
    }
}
