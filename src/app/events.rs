//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them — log to serial, update a BLE mirror slot,
//! etc.

use crate::emission::{Phase, TriggerSource};

/// Why an emission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The configured duration elapsed.
    Completed,
    /// An explicit deactivate command arrived.
    ManualStop,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The application service has started.
    Started,

    /// An emission began.
    EmissionStarted { source: TriggerSource },

    /// An emission ended.
    EmissionEnded { reason: EndReason },

    /// A trigger arrived while an emission was already running and was
    /// dropped. Observable so remotes can show the rejection.
    TriggerRejected { source: TriggerSource },

    /// A runtime setting was rewritten over the channel.
    SettingsUpdated { code: u8 },

    /// A keep-alive value arrived and was echoed back.
    KeepAliveEchoed { value: u8 },

    /// A fresh heart-rate sample was taken.
    HeartRateSampled { bpm: u8 },
}

/// Point-in-time snapshot for mirror slots and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub last_trigger: Option<TriggerSource>,
    pub heart_rate_bpm: u8,
}
