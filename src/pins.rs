//! GPIO / peripheral pin assignments for the necklace main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers. Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Status RGB LED — the emitter proxy (discrete R/G/B, common cathode)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 11;
pub const LED_G_GPIO: i32 = 12;
pub const LED_B_GPIO: i32 = 13;

/// LEDC PWM frequency for the RGB channels.
pub const LED_PWM_FREQ_HZ: u32 = 1_000;

// ---------------------------------------------------------------------------
// Link LED — lit while a remote controller is connected
// ---------------------------------------------------------------------------

pub const LINK_LED_GPIO: i32 = 2;
