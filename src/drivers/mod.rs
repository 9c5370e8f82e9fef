//! Hardware drivers for the LED proxy actuator.

pub mod hw_init;
pub mod led_patterns;
pub mod status_led;
