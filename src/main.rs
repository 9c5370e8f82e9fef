//! Calming Necklace Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single tick-driven control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter    LogEventSink    BleAdapter    Esp32Time    │
//! │  (Sensor+Actuator)  (EventSink)     (ControlPort) (clock)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Emission · Threshold · Liveness                       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use necklace::adapters::ble::{BleAdapter, ControlPort, LinkState};
use necklace::adapters::hardware::HardwareAdapter;
use necklace::adapters::log_sink::LogEventSink;
use necklace::adapters::time::Esp32TimeAdapter;
use necklace::app::ports::ActuatorPort;
use necklace::app::service::AppService;
use necklace::config::SystemConfig;
use necklace::drivers::led_patterns::{
    LedPatternEngine, PatternId, COLOUR_ADVERTISING, COLOUR_EMITTING,
};
use necklace::drivers;
use necklace::drivers::status_led::{LinkLed, StatusLed};
use necklace::emission::Phase;
use necklace::error::Error;
use necklace::events::{self, push_event, Event};
use necklace::sensors::HeartRateSource;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Calming Necklace v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = drivers::hw_init::init_peripherals().map_err(Error::HwInit) {
        // Peripheral init failure is critical — log and halt.
        // In production this triggers the watchdog reset after timeout.
        log::error!("{e} — halting");
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 3. Configuration ──────────────────────────────────────
    // No persistence: every boot starts from the built-in defaults and
    // the remote re-writes its preferences over the channel.
    let config = SystemConfig::default();

    // ── 4. Adapters ───────────────────────────────────────────
    let time = Esp32TimeAdapter::new();
    let mut hw = HardwareAdapter::new(HeartRateSource::new(), StatusLed::new(), LinkLed::new());
    let mut sink = LogEventSink::new();
    let mut led_engine = LedPatternEngine::new();

    let mut device_name = heapless::String::<24>::new();
    device_name.push_str("Calming Necklace").ok();
    let mut ble = BleAdapter::new(device_name);

    // Channel-init failure is terminal for the channel only: the device
    // keeps running its local triggers behind the persistent error flash.
    if let Err(e) = ble.start() {
        warn!("{} — continuing without a control channel", e);
        led_engine.set_error_pattern(true);
    }

    // ── 5. App service ────────────────────────────────────────
    let mut app = AppService::new(config.clone());
    app.start(&mut sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let tick_ms = config.control_loop_interval_ms;

    loop {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(tick_ms)));
        push_event(Event::ControlTick);

        let now_ms = time.uptime_ms();

        // Pending channel writes are applied before this tick's trigger
        // evaluation, so a settings change and a trigger arriving in the
        // same batch see consistent values.
        ble.poll();
        for cmd in ble.take_pending_commands() {
            app.handle_command(cmd, now_ms, &mut hw, &mut sink);
            ble.echo_command(cmd.code());
        }
        if let Some(value) = ble.take_keep_alive() {
            let echo = app.keep_alive(value, now_ms, &mut sink);
            ble.echo_keep_alive(echo);
        }

        events::drain_events(|event| match event {
            Event::ControlTick => {
                app.tick(now_ms, &mut hw, &mut sink);
            }
            Event::CentralConnected => {
                app.on_central_connected(now_ms);
                hw.set_link(true);
            }
            Event::CentralDisconnected => {
                app.on_central_disconnected(&mut hw, &mut sink);
                hw.set_link(false);
            }
            // Already drained from the adapter above.
            Event::CommandReceived | Event::KeepAliveReceived => {}
        });

        // Liveness enforcement: the core only advises; the adapter owns
        // the disconnect.
        if ble.is_connected()
            && (app.connection_timed_out(now_ms) || app.keep_alive_timed_out(now_ms))
        {
            warn!("connection or keep-alive timeout");
            ble.disconnect();
        }

        // Read-back mirrors for every setting + live status.
        ble.update_mirrors(app.config(), &app.status());

        // LED pattern layers reflect the current mode.
        led_engine.set_emission_pattern(match app.phase() {
            Phase::Active => Some((COLOUR_EMITTING, PatternId::Solid)),
            Phase::Idle => None,
        });
        led_engine.set_connectivity_pattern(match ble.state() {
            LinkState::Advertising => Some((COLOUR_ADVERTISING, PatternId::SlowPulse)),
            _ => None,
        });
        led_engine.set_error_pattern(ble.state() == LinkState::Failed);
        let (r, g, b) = led_engine.tick(tick_ms);
        hw.set_led(r, g, b);
    }
}
