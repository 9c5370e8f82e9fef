//! Emission controller — the activation state machine.
//!
//! ```text
//!          trigger(Manual | Periodic | HeartRate)
//!   IDLE ────────────────────────────────────────▶ ACTIVE
//!     ▲                                              │
//!     │        elapsed ≥ emission_duration_ms        │
//!     ├──────────────────────────────────────────────┤
//!     │                manual stop                   │
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! First trigger wins: anything arriving while Active is rejected (and the
//! rejection is visible to the caller), never queued. Deactivation is a
//! non-blocking elapsed-time comparison evaluated once per control tick,
//! against the duration as it is configured *now* — a mid-activation
//! settings write shortens or extends the running emission on the next
//! tick.
//!
//! Periodic retriggering is spaced from the most recent activation of any
//! source, so a manual or heart-rate emission also restarts the periodic
//! countdown.

use log::info;

use crate::config::SystemConfig;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Activation lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
}

/// Origin of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Manual,
    Periodic,
    HeartRate,
}

/// Result of a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TriggerOutcome {
    /// The emitter was turned on.
    Started,
    /// An emission is already running; the request was dropped.
    RejectedActive,
}

/// What a control tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The running emission reached its duration and was turned off.
    pub completed: bool,
    /// A periodic trigger fired and started a new emission.
    pub periodic_started: bool,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// The emission state machine. One instance lives for the device uptime,
/// owned by the control loop; only that loop mutates it.
#[derive(Debug, Clone)]
pub struct EmissionController {
    phase: Phase,
    /// When the running emission started. Meaningful only while Active.
    activation_started_ms: u64,
    /// When the most recent emission (of any source) started.
    last_activation_ms: u64,
    last_trigger: Option<TriggerSource>,
}

impl Default for EmissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl EmissionController {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            activation_started_ms: 0,
            last_activation_ms: 0,
            last_trigger: None,
        }
    }

    // ── Trigger / stop ────────────────────────────────────────

    /// Request an activation. Rejected while one is already running.
    pub fn trigger(&mut self, source: TriggerSource, now_ms: u64) -> TriggerOutcome {
        if self.phase == Phase::Active {
            info!("emission already active, ignoring {:?} trigger", source);
            return TriggerOutcome::RejectedActive;
        }

        info!("triggering emission from {:?}", source);
        self.phase = Phase::Active;
        self.activation_started_ms = now_ms;
        self.last_activation_ms = now_ms;
        self.last_trigger = Some(source);
        TriggerOutcome::Started
    }

    /// Explicit stop. Returns `true` if an emission was actually running;
    /// a stop while Idle is a no-op.
    pub fn stop(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        info!("emission manually stopped");
        self.phase = Phase::Idle;
        true
    }

    // ── Per-tick evaluation ───────────────────────────────────

    /// Evaluate elapsed-time deactivation and the periodic retrigger.
    /// Call once per control tick, after any pending settings writes have
    /// been applied, so a new duration/interval governs this evaluation.
    pub fn tick(&mut self, now_ms: u64, config: &SystemConfig) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.phase == Phase::Active
            && now_ms.saturating_sub(self.activation_started_ms)
                >= u64::from(config.emission_duration_ms)
        {
            info!("emission complete, turning off");
            self.phase = Phase::Idle;
            outcome.completed = true;
        }

        if config.periodic_enabled
            && self.phase == Phase::Idle
            && now_ms.saturating_sub(self.last_activation_ms)
                >= u64::from(config.periodic_interval_ms)
        {
            // Cannot be rejected: the phase was just checked.
            let _ = self.trigger(TriggerSource::Periodic, now_ms);
            outcome.periodic_started = true;
        }

        outcome
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Start of the running emission. Meaningful only while Active.
    pub fn activation_started_ms(&self) -> u64 {
        self.activation_started_ms
    }

    /// Start of the most recent emission, running or finished.
    pub fn last_activation_ms(&self) -> u64 {
        self.last_activation_ms
    }

    /// Source of the most recent emission; `None` until the first one.
    pub fn last_trigger(&self) -> Option<TriggerSource> {
        self.last_trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(duration_ms: u32, interval_ms: u32, periodic: bool) -> SystemConfig {
        SystemConfig {
            emission_duration_ms: duration_ms,
            periodic_interval_ms: interval_ms,
            periodic_enabled: periodic,
            ..SystemConfig::default()
        }
    }

    #[test]
    fn starts_idle() {
        let e = EmissionController::new();
        assert_eq!(e.phase(), Phase::Idle);
        assert_eq!(e.last_trigger(), None);
    }

    #[test]
    fn trigger_from_idle_starts() {
        let mut e = EmissionController::new();
        assert_eq!(e.trigger(TriggerSource::Manual, 500), TriggerOutcome::Started);
        assert_eq!(e.phase(), Phase::Active);
        assert_eq!(e.activation_started_ms(), 500);
        assert_eq!(e.last_activation_ms(), 500);
        assert_eq!(e.last_trigger(), Some(TriggerSource::Manual));
    }

    #[test]
    fn trigger_while_active_rejected_without_restart() {
        let mut e = EmissionController::new();
        let _ = e.trigger(TriggerSource::Manual, 1_000);

        for source in [
            TriggerSource::Manual,
            TriggerSource::Periodic,
            TriggerSource::HeartRate,
        ] {
            assert_eq!(e.trigger(source, 5_000), TriggerOutcome::RejectedActive);
        }
        // First trigger wins: the start timestamp never moves.
        assert_eq!(e.activation_started_ms(), 1_000);
        assert_eq!(e.last_trigger(), Some(TriggerSource::Manual));
    }

    #[test]
    fn completes_at_duration() {
        let mut e = EmissionController::new();
        let cfg = config_with(10_000, 300_000, false);
        let _ = e.trigger(TriggerSource::Manual, 0);

        assert_eq!(e.tick(9_999, &cfg), TickOutcome::default());
        assert_eq!(e.phase(), Phase::Active);

        let out = e.tick(10_000, &cfg);
        assert!(out.completed);
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn duration_is_read_live_mid_activation() {
        let mut e = EmissionController::new();
        let mut cfg = config_with(10_000, 300_000, false);
        let _ = e.trigger(TriggerSource::Manual, 0);
        assert!(!e.tick(5_000, &cfg).completed);

        // Shorten the duration while running: takes effect next tick.
        cfg.emission_duration_ms = 4_000;
        assert!(e.tick(5_100, &cfg).completed);
    }

    #[test]
    fn manual_stop_only_while_active() {
        let mut e = EmissionController::new();
        assert!(!e.stop());
        let _ = e.trigger(TriggerSource::HeartRate, 0);
        assert!(e.stop());
        assert_eq!(e.phase(), Phase::Idle);
        assert!(!e.stop());
    }

    #[test]
    fn periodic_fires_at_interval_from_idle() {
        let mut e = EmissionController::new();
        let cfg = config_with(5_000, 30_000, true);

        // last_activation starts at 0, so the first fire lands at the
        // first tick at or past the interval.
        assert!(!e.tick(29_900, &cfg).periodic_started);
        let out = e.tick(30_000, &cfg);
        assert!(out.periodic_started);
        assert_eq!(e.last_trigger(), Some(TriggerSource::Periodic));
    }

    #[test]
    fn periodic_spaced_from_any_activation() {
        let mut e = EmissionController::new();
        let cfg = config_with(5_000, 30_000, true);

        // Manual activation at t=0 resets the periodic countdown.
        let _ = e.trigger(TriggerSource::Manual, 0);
        let out = e.tick(5_000, &cfg);
        assert!(out.completed);
        assert!(!out.periodic_started);

        assert!(!e.tick(29_900, &cfg).periodic_started);
        assert!(e.tick(30_000, &cfg).periodic_started);
    }

    #[test]
    fn periodic_disabled_never_fires() {
        let mut e = EmissionController::new();
        let cfg = config_with(5_000, 30_000, false);
        for t in (0..200_000).step_by(100) {
            assert!(!e.tick(t, &cfg).periodic_started);
        }
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn periodic_waits_while_active() {
        let mut e = EmissionController::new();
        // Duration longer than the interval: the retrigger must wait for
        // completion, then fire in the same tick.
        let cfg = config_with(40_000, 30_000, true);
        let _ = e.trigger(TriggerSource::Manual, 0);

        let out = e.tick(35_000, &cfg);
        assert!(!out.completed && !out.periodic_started);

        let out = e.tick(40_000, &cfg);
        assert!(out.completed);
        assert!(out.periodic_started, "interval already elapsed at completion");
        assert_eq!(e.activation_started_ms(), 40_000);
    }

    #[test]
    fn zero_duration_accepted_and_completes_immediately() {
        // Durations are not validated; zero means the emission ends on the
        // next tick after it starts.
        let mut e = EmissionController::new();
        let cfg = config_with(0, 300_000, false);
        let _ = e.trigger(TriggerSource::Manual, 1_000);
        assert!(e.tick(1_000, &cfg).completed);
    }
}
