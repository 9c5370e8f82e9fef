//! Remote-controller liveness timers.
//!
//! Pure timestamp bookkeeping over the monotonic millisecond clock. Inbound
//! control traffic "touches" the relevant timer; the control loop polls the
//! timeout predicates to decide whether the remote has gone silent. The
//! predicates are advisory — the BLE adapter owns the actual disconnect.

use crate::config::SystemConfig;

/// Liveness timestamps plus the timeout budgets captured from config.
#[derive(Debug, Clone)]
pub struct LivenessTimers {
    /// Last control-slot write (any command).
    last_activity_ms: u64,
    /// Last keep-alive write.
    last_keep_alive_ms: u64,
    /// Last heart-rate sample taken.
    last_heart_rate_sample_ms: u64,

    disconnect_timeout_ms: u64,
    keepalive_timeout_ms: u64,
    heart_rate_sample_interval_ms: u64,
}

impl LivenessTimers {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            last_activity_ms: 0,
            last_keep_alive_ms: 0,
            last_heart_rate_sample_ms: 0,
            disconnect_timeout_ms: u64::from(config.disconnect_timeout_ms),
            keepalive_timeout_ms: u64::from(config.keepalive_timeout_ms),
            heart_rate_sample_interval_ms: u64::from(config.heart_rate_sample_interval_ms),
        }
    }

    // ── Touch operations (inbound traffic) ────────────────────

    /// Stamp the activity timer. Called on every control-slot write.
    pub fn touch_activity(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }

    /// Stamp the keep-alive timer. Called on every keep-alive write.
    pub fn touch_keep_alive(&mut self, now_ms: u64) {
        self.last_keep_alive_ms = now_ms;
    }

    /// Stamp the heart-rate sample clock. Called after each sample is taken.
    pub fn touch_heart_rate_sample(&mut self, now_ms: u64) {
        self.last_heart_rate_sample_ms = now_ms;
    }

    /// Stamp every timer at once. Called when a central connects so stale
    /// pre-connection timestamps cannot trip an immediate timeout.
    pub fn touch_all(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
        self.last_keep_alive_ms = now_ms;
        self.last_heart_rate_sample_ms = now_ms;
    }

    // ── Timeout predicates ────────────────────────────────────

    /// True when the remote has been silent past the activity budget.
    pub fn connection_timed_out(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_activity_ms) > self.disconnect_timeout_ms
    }

    /// True when the remote has missed its keep-alive budget.
    pub fn keep_alive_timed_out(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_keep_alive_ms) > self.keepalive_timeout_ms
    }

    /// True when the next heart-rate sample should be taken.
    pub fn heart_rate_sample_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heart_rate_sample_ms) >= self.heart_rate_sample_interval_ms
    }
}
