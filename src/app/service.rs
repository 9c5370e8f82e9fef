//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the emission controller, threshold monitor,
//! liveness timers, and the live settings. It exposes a clean,
//! hardware-agnostic API. All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────────────┐ ──▶ EventSink
//!                 │           AppService            │
//! ActuatorPort ◀──│ Emission · Threshold · Liveness │
//!                 └────────────────────────────────┘
//! ```
//!
//! Ordering contract per control tick: the main loop delivers every
//! pending channel write through [`handle_command`](AppService::handle_command)
//! *before* calling [`tick`](AppService::tick), so a settings change and a
//! trigger arriving in the same batch are evaluated against the new
//! values.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::emission::{EmissionController, Phase, TriggerOutcome, TriggerSource};
use crate::liveness::LivenessTimers;
use crate::threshold::ThresholdMonitor;

use super::commands::ControlCommand;
use super::events::{AppEvent, EndReason, StatusSnapshot};
use super::ports::{ActuatorPort, EventSink, SensorPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    emission: EmissionController,
    monitor: ThresholdMonitor,
    liveness: LivenessTimers,
    /// Most recent heart-rate sample (0 until the first one is taken).
    heart_rate_bpm: u8,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration.
    pub fn new(config: SystemConfig) -> Self {
        let liveness = LivenessTimers::new(&config);
        Self {
            config,
            emission: EmissionController::new(),
            monitor: ThresholdMonitor::new(),
            liveness,
            heart_rate_bpm: 0,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce startup. The emitter starts off; the controller starts
    /// Idle.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started);
        info!("AppService started in {:?}", self.emission.phase());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: sample the biometric source if due →
    /// threshold evaluation → emission evaluation → actuator commands.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`] — this avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Heart-rate sample at its own cadence, then hysteresis.
        if self.liveness.heart_rate_sample_due(now_ms) {
            let bpm = hw.read_heart_rate(now_ms);
            self.liveness.touch_heart_rate_sample(now_ms);
            self.heart_rate_bpm = bpm;
            sink.emit(&AppEvent::HeartRateSampled { bpm });

            if self.monitor.evaluate(bpm, &self.config).is_some() {
                self.request_trigger(TriggerSource::HeartRate, now_ms, hw, sink);
            }
        }

        // 2. Emission evaluation: elapsed-duration shutoff + periodic
        //    retrigger, against the settings as they stand right now.
        let out = self.emission.tick(now_ms, &self.config);
        if out.completed {
            hw.emitter_off();
            sink.emit(&AppEvent::EmissionEnded {
                reason: EndReason::Completed,
            });
        }
        if out.periodic_started {
            hw.emitter_on();
            sink.emit(&AppEvent::EmissionStarted {
                source: TriggerSource::Periodic,
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one decoded channel command. Every command counts as
    /// remote activity for the liveness timers.
    pub fn handle_command(
        &mut self,
        cmd: ControlCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        self.liveness.touch_activity(now_ms);

        match cmd {
            ControlCommand::Activate => {
                self.request_trigger(TriggerSource::Manual, now_ms, hw, sink);
            }

            ControlCommand::Deactivate => {
                if self.emission.stop() {
                    hw.emitter_off();
                    sink.emit(&AppEvent::EmissionEnded {
                        reason: EndReason::ManualStop,
                    });
                }
            }

            ControlCommand::SetEmissionDuration { secs } => {
                self.config.emission_duration_ms = SystemConfig::secs_to_ms(secs);
                if secs == 0 {
                    warn!("emission duration set to zero; activations will end immediately");
                }
                info!("updated emission_duration_ms: {}", self.config.emission_duration_ms);
                self.emit_settings_updated(&cmd, sink);
            }

            ControlCommand::SetPeriodicInterval { secs } => {
                self.config.periodic_interval_ms = SystemConfig::secs_to_ms(secs);
                info!("updated periodic_interval_ms: {}", self.config.periodic_interval_ms);
                self.emit_settings_updated(&cmd, sink);
            }

            ControlCommand::SetPeriodicEnabled(enabled) => {
                self.config.periodic_enabled = enabled;
                info!("updated periodic_enabled: {}", enabled);
                self.emit_settings_updated(&cmd, sink);
            }

            ControlCommand::SetHeartRateGating(enabled) => {
                self.config.heart_rate_gating_enabled = enabled;
                info!("updated heart_rate_gating_enabled: {}", enabled);
                self.emit_settings_updated(&cmd, sink);
            }

            ControlCommand::SetHighThreshold { bpm } => {
                self.config.high_threshold_bpm = bpm;
                info!("updated high_threshold_bpm: {}", bpm);
                self.warn_if_inverted();
                self.emit_settings_updated(&cmd, sink);
            }

            ControlCommand::SetLowThreshold { bpm } => {
                self.config.low_threshold_bpm = bpm;
                info!("updated low_threshold_bpm: {}", bpm);
                self.warn_if_inverted();
                self.emit_settings_updated(&cmd, sink);
            }
        }
    }

    /// Keep-alive write: reset the timer and return the value to echo.
    /// The value itself is opaque — any byte is a valid heartbeat.
    pub fn keep_alive(&mut self, value: u8, now_ms: u64, sink: &mut impl EventSink) -> u8 {
        self.liveness.touch_keep_alive(now_ms);
        sink.emit(&AppEvent::KeepAliveEchoed { value });
        value
    }

    /// A central connected: stamp every liveness timer so the stale
    /// pre-connection timestamps cannot trip an immediate disconnect.
    pub fn on_central_connected(&mut self, now_ms: u64) {
        self.liveness.touch_all(now_ms);
    }

    /// The central dropped: cut any running emission so the device does
    /// not keep emitting with nobody in control.
    pub fn on_central_disconnected(
        &mut self,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        if self.emission.stop() {
            hw.emitter_off();
            sink.emit(&AppEvent::EmissionEnded {
                reason: EndReason::ManualStop,
            });
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Live configuration, for mirror slots and read-back.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Current emission phase.
    pub fn phase(&self) -> Phase {
        self.emission.phase()
    }

    /// Snapshot for mirrors and logging.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.emission.phase(),
            last_trigger: self.emission.last_trigger(),
            heart_rate_bpm: self.heart_rate_bpm,
        }
    }

    /// Advisory: the remote has been silent past the activity budget.
    pub fn connection_timed_out(&self, now_ms: u64) -> bool {
        self.liveness.connection_timed_out(now_ms)
    }

    /// Advisory: the remote has missed its keep-alive budget.
    pub fn keep_alive_timed_out(&self, now_ms: u64) -> bool {
        self.liveness.keep_alive_timed_out(now_ms)
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn request_trigger(
        &mut self,
        source: TriggerSource,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        match self.emission.trigger(source, now_ms) {
            TriggerOutcome::Started => {
                hw.emitter_on();
                sink.emit(&AppEvent::EmissionStarted { source });
            }
            TriggerOutcome::RejectedActive => {
                sink.emit(&AppEvent::TriggerRejected { source });
            }
        }
    }

    fn emit_settings_updated(&self, cmd: &ControlCommand, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::SettingsUpdated { code: cmd.code() });
    }

    fn warn_if_inverted(&self) {
        if self.config.thresholds_inverted() {
            warn!(
                "threshold pair inverted (low {} > high {}); stored as written",
                self.config.low_threshold_bpm, self.config.high_threshold_bpm
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHw;
    impl SensorPort for NullHw {
        fn read_heart_rate(&mut self, _now_ms: u64) -> u8 {
            72
        }
    }
    impl ActuatorPort for NullHw {
        fn emitter_on(&mut self) {}
        fn emitter_off(&mut self) {}
        fn set_led(&mut self, _r: u8, _g: u8, _b: u8) {}
        fn all_off(&mut self) {}
    }

    struct RecordingSink(Vec<AppEvent>);
    impl EventSink for RecordingSink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn duration_write_converts_seconds() {
        let mut app = AppService::new(SystemConfig::default());
        let mut hw = NullHw;
        let mut sink = RecordingSink(Vec::new());
        app.handle_command(
            ControlCommand::SetEmissionDuration { secs: 15 },
            0,
            &mut hw,
            &mut sink,
        );
        assert_eq!(app.config().emission_duration_ms, 15_000);
        assert!(sink
            .0
            .contains(&AppEvent::SettingsUpdated { code: 3 }));
    }

    #[test]
    fn keep_alive_echoes_and_resets() {
        let mut app = AppService::new(SystemConfig::default());
        let mut sink = RecordingSink(Vec::new());
        app.on_central_connected(0);
        assert!(app.keep_alive_timed_out(120_001));
        assert_eq!(app.keep_alive(0xA7, 120_001, &mut sink), 0xA7);
        assert!(!app.keep_alive_timed_out(240_000));
        assert_eq!(sink.0, vec![AppEvent::KeepAliveEchoed { value: 0xA7 }]);
    }

    #[test]
    fn command_counts_as_activity() {
        let mut app = AppService::new(SystemConfig::default());
        let mut hw = NullHw;
        let mut sink = RecordingSink(Vec::new());
        app.on_central_connected(0);
        assert!(app.connection_timed_out(180_001));
        app.handle_command(ControlCommand::Activate, 180_001, &mut hw, &mut sink);
        assert!(!app.connection_timed_out(360_000));
    }
}
