//! Simulated heart-rate source.
//!
//! Produces a smooth sine oscillation between the physiological rest
//! band bounds, driven entirely by the monotonic clock — no internal
//! state to drift, and fully deterministic for a given timestamp. The
//! sweep crosses any threshold set inside the band twice per period,
//! which exercises both hysteresis latches.

use core::f32::consts::TAU;

use log::debug;

/// Lowest simulated rate (BPM).
pub const MIN_HEART_RATE: u8 = 60;
/// Highest simulated rate (BPM).
pub const MAX_HEART_RATE: u8 = 100;
/// One full oscillation takes this long.
pub const OSCILLATION_PERIOD_MS: u64 = 30_000;

/// Deterministic sine-wave heart-rate generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartRateSource;

impl HeartRateSource {
    pub fn new() -> Self {
        Self
    }

    /// Sample the simulated rate at the given monotonic timestamp.
    pub fn sample(&self, now_ms: u64) -> u8 {
        let amplitude = f32::from(MAX_HEART_RATE - MIN_HEART_RATE) / 2.0;
        let offset = f32::from(MIN_HEART_RATE) + amplitude;
        let phase = (now_ms % OSCILLATION_PERIOD_MS) as f32 / OSCILLATION_PERIOD_MS as f32;
        let bpm = offset + amplitude * (TAU * phase).sin();
        debug!("heart rate: {:.0} BPM", bpm);
        bpm as u8
    }
}
