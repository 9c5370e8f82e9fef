//! End-to-end channel flow on the host simulation: GATT-style writes →
//! adapter decode → service → echo and mirror slots, wired the same way
//! `main()` wires them.

#![cfg(not(target_os = "espidf"))]

use necklace::adapters::ble::{BleAdapter, ControlPort, LinkState};
use necklace::app::commands::wire;
use necklace::app::events::AppEvent;
use necklace::app::ports::{ActuatorPort, EventSink, SensorPort};
use necklace::app::service::AppService;
use necklace::config::SystemConfig;
use necklace::emission::Phase;

struct NullHw;
impl SensorPort for NullHw {
    fn read_heart_rate(&mut self, _now_ms: u64) -> u8 {
        75
    }
}
impl ActuatorPort for NullHw {
    fn emitter_on(&mut self) {}
    fn emitter_off(&mut self) {}
    fn set_led(&mut self, _r: u8, _g: u8, _b: u8) {}
    fn all_off(&mut self) {}
}

struct NullSink;
impl EventSink for NullSink {
    fn emit(&mut self, _e: &AppEvent) {}
}

fn make_channel() -> (BleAdapter, AppService) {
    let mut name = heapless::String::<24>::new();
    name.push_str("Calming Necklace").ok();
    let mut ble = BleAdapter::new(name);
    ble.start().unwrap();
    ble.sim_connect();
    (ble, AppService::new(SystemConfig::default()))
}

/// One iteration of the main loop's channel servicing.
fn service_channel(ble: &mut BleAdapter, app: &mut AppService, now_ms: u64) {
    let mut hw = NullHw;
    let mut sink = NullSink;
    ble.poll();
    for cmd in ble.take_pending_commands() {
        app.handle_command(cmd, now_ms, &mut hw, &mut sink);
        ble.echo_command(cmd.code());
    }
    if let Some(value) = ble.take_keep_alive() {
        let echo = app.keep_alive(value, now_ms, &mut sink);
        ble.echo_keep_alive(echo);
    }
    ble.update_mirrors(app.config(), &app.status());
}

#[test]
fn parameterized_write_reaches_core_and_mirrors() {
    let (mut ble, mut app) = make_channel();

    // Remote sets the emission duration to 25 s: value slot, then command.
    ble.sim_write_value(25);
    ble.sim_write_command(wire::CMD_SET_EMISSION_DURATION);
    service_channel(&mut ble, &mut app, 1_000);

    assert_eq!(app.config().emission_duration_ms, 25_000);
    let m = ble.mirrored().unwrap();
    assert_eq!(m.emission_duration_secs, 25);
    assert_eq!(ble.sim_command_echo(), Some(wire::CMD_SET_EMISSION_DURATION));
}

#[test]
fn activate_over_channel_flips_phase_mirror() {
    let (mut ble, mut app) = make_channel();

    ble.sim_write_command(wire::CMD_ACTIVATE);
    service_channel(&mut ble, &mut app, 2_000);

    assert_eq!(app.phase(), Phase::Active);
    assert!(ble.mirrored().unwrap().emission_active);

    ble.sim_write_command(wire::CMD_DEACTIVATE);
    service_channel(&mut ble, &mut app, 3_000);
    assert!(!ble.mirrored().unwrap().emission_active);
}

#[test]
fn keep_alive_echoed_verbatim_over_channel() {
    let (mut ble, mut app) = make_channel();

    for value in [0u8, 9, 0xA7, 0xFF] {
        ble.sim_write_keep_alive(value);
        service_channel(&mut ble, &mut app, 5_000);
        assert_eq!(ble.sim_keep_alive_echo(), Some(value));
    }
}

#[test]
fn batched_writes_apply_in_arrival_order() {
    let (mut ble, mut app) = make_channel();

    // Duration write and activate queued in the same batch: the new
    // duration must govern the activation.
    ble.sim_write_value(3);
    ble.sim_write_command(wire::CMD_SET_EMISSION_DURATION);
    ble.sim_write_command(wire::CMD_ACTIVATE);
    service_channel(&mut ble, &mut app, 10_000);

    assert_eq!(app.phase(), Phase::Active);
    let mut hw = NullHw;
    let mut sink = NullSink;
    app.tick(12_999, &mut hw, &mut sink);
    assert_eq!(app.phase(), Phase::Active);
    app.tick(13_000, &mut hw, &mut sink);
    assert_eq!(app.phase(), Phase::Idle);
}

#[test]
fn failed_channel_is_terminal_but_core_survives() {
    let mut name = heapless::String::<24>::new();
    name.push_str("Calming Necklace").ok();
    let mut ble = BleAdapter::new(name);
    ble.sim_fail_inits(u8::MAX);
    assert!(ble.start().is_err());
    assert_eq!(ble.state(), LinkState::Failed);

    // The core keeps running its local triggers without a channel.
    let mut app = AppService::new(SystemConfig::default());
    let mut hw = NullHw;
    let mut sink = NullSink;
    app.tick(100, &mut hw, &mut sink);
    assert_eq!(app.phase(), Phase::Idle);
}

#[test]
fn out_of_table_code_is_ignored_end_to_end() {
    let (mut ble, mut app) = make_channel();
    let before = app.config().clone();

    ble.sim_write_command(99);
    service_channel(&mut ble, &mut app, 1_000);

    assert_eq!(app.config().emission_duration_ms, before.emission_duration_ms);
    assert_eq!(app.phase(), Phase::Idle);
    assert_eq!(ble.sim_command_echo(), None);
}
