//! Sensor subsystem.
//!
//! The necklace's only biometric input is the heart-rate source. Current
//! hardware revisions have no pulse sensor fitted, so the driver is a
//! deterministic simulation; the port boundary keeps the rest of the
//! system ignorant of that.

pub mod heart_rate;

pub use heart_rate::HeartRateSource;
