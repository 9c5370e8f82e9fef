//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! The BLE mirror slots are fed separately by the main loop; this sink
//! is purely for the serial trace.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => {
                info!("START | core up, emitter idle");
            }
            AppEvent::EmissionStarted { source } => {
                info!("EMIT  | on ({:?})", source);
            }
            AppEvent::EmissionEnded { reason } => {
                info!("EMIT  | off ({:?})", reason);
            }
            AppEvent::TriggerRejected { source } => {
                info!("EMIT  | {:?} trigger rejected — already active", source);
            }
            AppEvent::SettingsUpdated { code } => {
                info!("CONF  | setting updated (cmd {})", code);
            }
            AppEvent::KeepAliveEchoed { value } => {
                info!("LINK  | keep-alive {}", value);
            }
            AppEvent::HeartRateSampled { bpm } => {
                info!("HEART | {} BPM", bpm);
            }
        }
    }
}
