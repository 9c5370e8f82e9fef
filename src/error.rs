//! Unified error types for the Calming Necklace firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every fallible
//! subsystem converts into, keeping the top-level control loop's error
//! handling uniform. All variants are `Copy` so they can be cheaply passed
//! around without allocation.

use core::fmt;

use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The BLE control channel failed.
    Comms(CommsError),
    /// Peripheral initialisation failed.
    HwInit(HwInitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::HwInit(e) => write!(f, "hw init: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The BLE controller or Bluedroid stack refused to come up.
    BleInitFailed,
    /// GATT application registration failed.
    GattRegistrationFailed,
    /// Advertising could not be started.
    AdvertiseFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BleInitFailed => write!(f, "BLE init failed"),
            Self::GattRegistrationFailed => write!(f, "GATT registration failed"),
            Self::AdvertiseFailed => write!(f, "advertise failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::HwInit(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_chains_subsystem() {
        let e = Error::from(CommsError::BleInitFailed);
        assert_eq!(e.to_string(), "comms: BLE init failed");
        let e = Error::from(HwInitError::LedcInitFailed);
        assert_eq!(e.to_string(), "hw init: LEDC timer/channel config failed");
    }
}
