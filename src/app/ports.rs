//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (the heart-rate source, the emitter hardware, event
//! sinks) implement these traits. The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly and the whole service runs against mocks on the host.

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain the biometric reading.
pub trait SensorPort {
    /// Current heart-rate estimate in BPM.
    ///
    /// Called at the configured sample cadence, never faster. `now_ms`
    /// is the monotonic clock so simulated sources can stay stateless.
    fn read_heart_rate(&mut self, now_ms: u64) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command the emitter.
///
/// Implementations must return promptly — a blocking wait in any of
/// these calls stalls every timer in the control loop.
pub trait ActuatorPort {
    /// Turn the emitter on (LED proxy: red).
    fn emitter_on(&mut self);

    /// Turn the emitter off.
    fn emitter_off(&mut self);

    /// Set the status LED colour directly (patterns, error indication).
    fn set_led(&mut self, r: u8, g: u8, b: u8);

    /// Kill every output — safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / mirrors)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (serial log, BLE mirror slot, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}
