//! Inbound control-channel commands.
//!
//! The wire protocol is a command byte plus, for parameterized commands,
//! an associated value written to the value slot. This module owns the
//! closed command type and the byte-level mapping; the BLE adapter decodes
//! writes with [`ControlCommand::from_wire`] and the service interprets
//! the result. Exactly one numbering is served — there is no compatibility
//! fallback for other schemes.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Wire command codes
// ───────────────────────────────────────────────────────────────

pub mod wire {
    pub const CMD_ACTIVATE: u8 = 1;
    pub const CMD_DEACTIVATE: u8 = 2;
    pub const CMD_SET_EMISSION_DURATION: u8 = 3;
    pub const CMD_SET_PERIODIC_INTERVAL: u8 = 4;
    pub const CMD_SET_PERIODIC_ENABLED: u8 = 5;
    pub const CMD_SET_HEART_RATE_GATING: u8 = 6;
    pub const CMD_SET_HIGH_THRESHOLD: u8 = 7;
    pub const CMD_SET_LOW_THRESHOLD: u8 = 8;
}

// ───────────────────────────────────────────────────────────────
// Command type
// ───────────────────────────────────────────────────────────────

/// Commands the remote controller can send into the core.
///
/// Durations and intervals travel in seconds on the wire and are
/// converted to milliseconds when stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start an emission now.
    Activate,
    /// Stop the running emission, if any.
    Deactivate,
    /// Set how long an activation stays on (seconds).
    SetEmissionDuration { secs: u32 },
    /// Set the periodic-mode spacing (seconds).
    SetPeriodicInterval { secs: u32 },
    /// Enable or disable periodic activations.
    SetPeriodicEnabled(bool),
    /// Enable or disable heart-rate triggered activations.
    SetHeartRateGating(bool),
    /// Set the high heart-rate threshold (BPM).
    SetHighThreshold { bpm: i16 },
    /// Set the low heart-rate threshold (BPM).
    SetLowThreshold { bpm: i16 },
}

/// A write that does not map onto a served command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCommand(pub u8);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command code {}", self.0)
    }
}

impl ControlCommand {
    /// Decode a command byte and its associated value-slot content.
    ///
    /// `value` is ignored for the unparameterized commands. Values are
    /// accepted as-is; range policy belongs to the service, not the codec.
    pub fn from_wire(code: u8, value: u32) -> Result<Self, UnknownCommand> {
        use wire::*;
        match code {
            CMD_ACTIVATE => Ok(Self::Activate),
            CMD_DEACTIVATE => Ok(Self::Deactivate),
            CMD_SET_EMISSION_DURATION => Ok(Self::SetEmissionDuration { secs: value }),
            CMD_SET_PERIODIC_INTERVAL => Ok(Self::SetPeriodicInterval { secs: value }),
            CMD_SET_PERIODIC_ENABLED => Ok(Self::SetPeriodicEnabled(value != 0)),
            CMD_SET_HEART_RATE_GATING => Ok(Self::SetHeartRateGating(value != 0)),
            CMD_SET_HIGH_THRESHOLD => Ok(Self::SetHighThreshold { bpm: value as i16 }),
            CMD_SET_LOW_THRESHOLD => Ok(Self::SetLowThreshold { bpm: value as i16 }),
            other => Err(UnknownCommand(other)),
        }
    }

    /// The wire code this command travels as. Used for the command-slot
    /// echo after execution.
    pub fn code(&self) -> u8 {
        use wire::*;
        match self {
            Self::Activate => CMD_ACTIVATE,
            Self::Deactivate => CMD_DEACTIVATE,
            Self::SetEmissionDuration { .. } => CMD_SET_EMISSION_DURATION,
            Self::SetPeriodicInterval { .. } => CMD_SET_PERIODIC_INTERVAL,
            Self::SetPeriodicEnabled(_) => CMD_SET_PERIODIC_ENABLED,
            Self::SetHeartRateGating(_) => CMD_SET_HEART_RATE_GATING,
            Self::SetHighThreshold { .. } => CMD_SET_HIGH_THRESHOLD,
            Self::SetLowThreshold { .. } => CMD_SET_LOW_THRESHOLD,
        }
    }
}
