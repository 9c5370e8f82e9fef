//! BLE control-channel adapter.
//!
//! Implements [`ControlPort`] — the hexagonal boundary for the wireless
//! remote controller. Inbound GATT writes become [`ControlCommand`]s and
//! keep-alive values; outbound, every tunable setting and the live status
//! are mirrored to independently addressable read slots.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid BLE GATT server via `esp_idf_svc`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## GATT layout
//!
//! | Characteristic        | UUID suffix | Perms        |
//! |-----------------------|-------------|--------------|
//! | Command               | `…0002`     | Write        |
//! | Command value         | `…0003`     | Write        |
//! | Keep-alive            | `…0004`     | R/W + Notify |
//! | Emission duration     | `…0010`     | Read+Notify  |
//! | Periodic interval     | `…0011`     | Read+Notify  |
//! | Periodic enabled      | `…0012`     | Read+Notify  |
//! | Heart-rate gating     | `…0013`     | Read+Notify  |
//! | High threshold        | `…0014`     | Read+Notify  |
//! | Low threshold         | `…0015`     | Read+Notify  |
//! | Heart rate            | `…0016`     | Read+Notify  |
//! | Emission phase        | `…0017`     | Read+Notify  |
//!
//! A parameterized command is two writes: the value slot first, then the
//! command byte. The value slot holds its content between writes, so
//! unparameterized commands simply ignore it.

use log::{error, info, warn};

use crate::app::commands::ControlCommand;
use crate::app::events::StatusSnapshot;
use crate::config::SystemConfig;
use crate::emission::Phase;
use crate::error::{CommsError, Error, Result};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x6e3c0001_8f2d_4b91_a032_5f6c9a1d7e3a;
pub const CHAR_COMMAND: u128 = 0x6e3c0002_8f2d_4b91_a032_5f6c9a1d7e3a;
pub const CHAR_COMMAND_VALUE: u128 = 0x6e3c0003_8f2d_4b91_a032_5f6c9a1d7e3a;
pub const CHAR_KEEP_ALIVE: u128 = 0x6e3c0004_8f2d_4b91_a032_5f6c9a1d7e3a;
pub const CHAR_MIRROR_BASE: u128 = 0x6e3c0010_8f2d_4b91_a032_5f6c9a1d7e3a;

/// How many inbound commands can queue between control ticks.
pub const MAX_PENDING_COMMANDS: usize = 8;

/// Init retry budget: attempts and the fixed delay between them.
pub const MAX_INIT_ATTEMPTS: u8 = 3;
pub const INIT_RETRY_DELAY_MS: u32 = 500;

// ───────────────────────────────────────────────────────────────
// State types
// ───────────────────────────────────────────────────────────────

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Advertising,
    Connected,
    /// Init retries exhausted. Terminal for the channel; the device keeps
    /// running and shows the persistent error pattern.
    Failed,
}

// ───────────────────────────────────────────────────────────────
// Mirror table
// ───────────────────────────────────────────────────────────────

/// The full set of mirrored read-back values, in wire units (durations
/// and intervals in seconds, matching what remotes write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorTable {
    pub emission_duration_secs: u32,
    pub periodic_interval_secs: u32,
    pub periodic_enabled: bool,
    pub heart_rate_gating_enabled: bool,
    pub high_threshold_bpm: i16,
    pub low_threshold_bpm: i16,
    pub heart_rate_bpm: u8,
    pub emission_active: bool,
}

impl MirrorTable {
    pub fn from_state(config: &SystemConfig, status: &StatusSnapshot) -> Self {
        Self {
            emission_duration_secs: config.emission_duration_ms / crate::config::SECS_TO_MS,
            periodic_interval_secs: config.periodic_interval_ms / crate::config::SECS_TO_MS,
            periodic_enabled: config.periodic_enabled,
            heart_rate_gating_enabled: config.heart_rate_gating_enabled,
            high_threshold_bpm: config.high_threshold_bpm,
            low_threshold_bpm: config.low_threshold_bpm,
            heart_rate_bpm: status.heart_rate_bpm,
            emission_active: status.phase == Phase::Active,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

/// The control-channel boundary consumed by the main loop.
pub trait ControlPort {
    /// Bring the channel up (with the bounded retry budget) and start
    /// advertising. On exhaustion the state becomes [`LinkState::Failed`]
    /// and the error is returned so the caller can raise the persistent
    /// visual indication.
    fn start(&mut self) -> Result<()>;

    /// Tear the channel down.
    fn stop(&mut self);

    fn state(&self) -> LinkState;

    fn is_connected(&self) -> bool;

    /// Move data buffered by the platform callbacks into the adapter.
    /// Call once per loop iteration, before draining commands.
    fn poll(&mut self);

    /// Drain the decoded commands received since the last call, in
    /// arrival order.
    fn take_pending_commands(&mut self) -> heapless::Vec<ControlCommand, MAX_PENDING_COMMANDS>;

    /// Take the most recent keep-alive value, if one arrived.
    fn take_keep_alive(&mut self) -> Option<u8>;

    /// Echo a keep-alive value back to the remote, verbatim.
    fn echo_keep_alive(&mut self, value: u8);

    /// Echo the executed command code back to the command slot.
    fn echo_command(&mut self, code: u8);

    /// Refresh every mirror slot from the live core state. Only slots
    /// whose value changed are rewritten.
    fn update_mirrors(&mut self, config: &SystemConfig, status: &StatusSnapshot);

    /// Drop the connected remote (liveness timeout enforcement).
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF static state (callback bridge)
// ───────────────────────────────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These statics bridge the callback context to the adapter;
// the adapter drains them from the main loop in `poll()`.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(u32::MAX);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
/// Latest content of the command-value slot.
#[cfg(target_os = "espidf")]
static BLE_VALUE_SLOT: AtomicU32 = AtomicU32::new(0);

/// Characteristic registration table, in registration order. The
/// ADD_CHAR callback steps through this; handles land in
/// `BLE_CHAR_HANDLES` at the same index.
#[cfg(target_os = "espidf")]
const CHAR_TABLE_LEN: usize = 11;
#[cfg(target_os = "espidf")]
static BLE_CHAR_HANDLES: [AtomicU32; CHAR_TABLE_LEN] =
    [const { AtomicU32::new(0) }; CHAR_TABLE_LEN];

#[cfg(target_os = "espidf")]
const IDX_COMMAND: usize = 0;
#[cfg(target_os = "espidf")]
const IDX_COMMAND_VALUE: usize = 1;
#[cfg(target_os = "espidf")]
const IDX_KEEP_ALIVE: usize = 2;
#[cfg(target_os = "espidf")]
const IDX_MIRROR_BASE: usize = 3;

// Data buffers bridging GATTS write callbacks → BleAdapter.
// GATTS callbacks run in the Bluedroid task (not ISR), so std Mutex is safe.
#[cfg(target_os = "espidf")]
static BLE_CMD_BUF: std::sync::Mutex<heapless::Vec<ControlCommand, MAX_PENDING_COMMANDS>> =
    std::sync::Mutex::new(heapless::Vec::new());
#[cfg(target_os = "espidf")]
static BLE_KEEP_ALIVE_BUF: std::sync::Mutex<Option<u8>> = std::sync::Mutex::new(None);

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

/// UUID for registration step `idx` of the characteristic table.
#[cfg(target_os = "espidf")]
fn char_uuid_at(idx: usize) -> u128 {
    match idx {
        IDX_COMMAND => CHAR_COMMAND,
        IDX_COMMAND_VALUE => CHAR_COMMAND_VALUE,
        IDX_KEEP_ALIVE => CHAR_KEEP_ALIVE,
        mirror => CHAR_MIRROR_BASE + (((mirror - IDX_MIRROR_BASE) as u128) << 96),
    }
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char_at(idx: usize) {
    use esp_idf_svc::sys::*;
    let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
    let (perm, prop) = match idx {
        IDX_COMMAND | IDX_COMMAND_VALUE => {
            (ESP_GATT_PERM_WRITE, ESP_GATT_CHAR_PROP_BIT_WRITE)
        }
        IDX_KEEP_ALIVE => (
            ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE,
            ESP_GATT_CHAR_PROP_BIT_READ
                | ESP_GATT_CHAR_PROP_BIT_WRITE
                | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
        ),
        _ => (
            ESP_GATT_PERM_READ,
            ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
        ),
    };
    let mut char_uuid = uuid128_to_esp(char_uuid_at(idx));
    // SAFETY: svc_handle was published by the CREATE event before any
    // ADD_CHAR step runs; Bluedroid serialises these callbacks.
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let svc_uuid = uuid128_to_esp(SERVICE_UUID);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: svc_uuid,
                    inst_id: 0,
                },
                is_primary: true,
            };
            // Handle budget: service + 11 characteristics with values.
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 32) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = unsafe { &(*param).create };
            BLE_SVC_HANDLE.store(p.service_handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", p.service_handle);
            unsafe { esp_ble_gatts_start_service(p.service_handle) };
            BLE_CHAR_STEP.store(0, AtomicOrdering::Relaxed);
            unsafe { add_gatt_char_at(0) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = unsafe { &(*param).add_char };
            let step = BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) as usize;
            if step < CHAR_TABLE_LEN {
                BLE_CHAR_HANDLES[step].store(p.attr_handle as u32, AtomicOrdering::Relaxed);
            }
            let next = step + 1;
            if next < CHAR_TABLE_LEN {
                BLE_CHAR_STEP.store(next as u32, AtomicOrdering::Relaxed);
                unsafe { add_gatt_char_at(next) };
            } else {
                log::info!("BLE GATTS: all {} characteristics registered", CHAR_TABLE_LEN);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            BLE_CONN_ID.store(p.conn_id as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central connected (conn_id={})", p.conn_id);
            crate::events::push_event(crate::events::Event::CentralConnected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONN_ID.store(u32::MAX, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central disconnected");
            crate::events::push_event(crate::events::Event::CentralDisconnected);
            // Restart advertising after disconnect.
            let mut adv_params = esp_ble_adv_params_t {
                adv_int_min: 0x20,
                adv_int_max: 0x40,
                adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                ..unsafe { core::mem::zeroed() }
            };
            unsafe { esp_ble_gap_start_advertising(&mut adv_params) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            let handle = p.handle as u32;
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };

            if handle == BLE_CHAR_HANDLES[IDX_COMMAND].load(AtomicOrdering::Relaxed) {
                let code = data.first().copied().unwrap_or(0);
                let value = BLE_VALUE_SLOT.load(AtomicOrdering::Relaxed);
                match ControlCommand::from_wire(code, value) {
                    Ok(cmd) => {
                        if let Ok(mut buf) = BLE_CMD_BUF.lock() {
                            if buf.push(cmd).is_err() {
                                log::warn!("BLE: command queue full, write dropped");
                            }
                        }
                        crate::events::push_event(crate::events::Event::CommandReceived);
                    }
                    Err(e) => log::warn!("BLE: {}", e),
                }
            } else if handle == BLE_CHAR_HANDLES[IDX_COMMAND_VALUE].load(AtomicOrdering::Relaxed) {
                let mut raw = [0u8; 4];
                for (dst, src) in raw.iter_mut().zip(data.iter()) {
                    *dst = *src;
                }
                BLE_VALUE_SLOT.store(u32::from_le_bytes(raw), AtomicOrdering::Relaxed);
            } else if handle == BLE_CHAR_HANDLES[IDX_KEEP_ALIVE].load(AtomicOrdering::Relaxed) {
                let value = data.first().copied().unwrap_or(0);
                if let Ok(mut slot) = BLE_KEEP_ALIVE_BUF.lock() {
                    *slot = Some(value);
                }
                crate::events::push_event(crate::events::Event::KeepAliveReceived);
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: LinkState,
    device_name: heapless::String<24>,
    pending_commands: heapless::Vec<ControlCommand, MAX_PENDING_COMMANDS>,
    pending_keep_alive: Option<u8>,
    /// Last mirror content actually written, for change detection.
    mirrored: Option<MirrorTable>,
    /// Simulation: latest content of the command-value slot.
    #[cfg(not(target_os = "espidf"))]
    sim_value_slot: u32,
    /// Simulation: value last echoed to the keep-alive slot.
    #[cfg(not(target_os = "espidf"))]
    sim_keep_alive_echo: Option<u8>,
    /// Simulation: code last echoed to the command slot.
    #[cfg(not(target_os = "espidf"))]
    sim_command_echo: Option<u8>,
    /// Simulation: number of init attempts to fail before succeeding.
    #[cfg(not(target_os = "espidf"))]
    sim_failing_inits: u8,
    /// Simulation: total init attempts observed (for tests).
    #[cfg(not(target_os = "espidf"))]
    sim_init_attempts: u8,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: LinkState::Idle,
            device_name,
            pending_commands: heapless::Vec::new(),
            pending_keep_alive: None,
            mirrored: None,
            #[cfg(not(target_os = "espidf"))]
            sim_value_slot: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_keep_alive_echo: None,
            #[cfg(not(target_os = "espidf"))]
            sim_command_echo: None,
            #[cfg(not(target_os = "espidf"))]
            sim_failing_inits: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_init_attempts: 0,
        }
    }

    // ── Simulation hooks (host targets only) ──────────────────

    /// Simulate a remote write to the command-value slot.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_value(&mut self, value: u32) {
        self.sim_value_slot = value;
    }

    /// Simulate a remote write to the command slot. Decodes against the
    /// current value-slot content, exactly like the GATT callback. The
    /// simulation skips the ISR event queue — the adapter is polled
    /// directly by callers on host targets.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_command(&mut self, code: u8) {
        match ControlCommand::from_wire(code, self.sim_value_slot) {
            Ok(cmd) => {
                if self.pending_commands.push(cmd).is_err() {
                    warn!("BLE(sim): command queue full, write dropped");
                }
            }
            Err(e) => warn!("BLE(sim): {}", e),
        }
    }

    /// Simulate a remote keep-alive write.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_keep_alive(&mut self, value: u8) {
        self.pending_keep_alive = Some(value);
    }

    /// Simulate a central connecting.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect(&mut self) {
        self.state = LinkState::Connected;
    }

    /// Make the next `n` init attempts fail (retry-budget tests).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_inits(&mut self, n: u8) {
        self.sim_failing_inits = n;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_init_attempts(&self) -> u8 {
        self.sim_init_attempts
    }

    /// Last value echoed to the keep-alive slot.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_keep_alive_echo(&self) -> Option<u8> {
        self.sim_keep_alive_echo
    }

    /// Last command code echoed to the command slot.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_command_echo(&self) -> Option<u8> {
        self.sim_command_echo
    }

    /// Current mirror content, if anything has been mirrored yet.
    pub fn mirrored(&self) -> Option<&MirrorTable> {
        self.mirrored.as_ref()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init(&mut self) -> core::result::Result<(), CommsError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            if esp_bt_controller_init(&mut bt_cfg) != ESP_OK as i32 {
                return Err(CommsError::BleInitFailed);
            }
            if esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE) != ESP_OK as i32 {
                return Err(CommsError::BleInitFailed);
            }
            if esp_bluedroid_init() != ESP_OK as i32 {
                return Err(CommsError::BleInitFailed);
            }
            if esp_bluedroid_enable() != ESP_OK as i32 {
                return Err(CommsError::BleInitFailed);
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            if esp_ble_gatts_app_register(0) != ESP_OK as i32 {
                return Err(CommsError::GattRegistrationFailed);
            }

            let name = self.device_name.as_bytes();
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);

            let mut adv_params = esp_ble_adv_params_t {
                adv_int_min: 0x20,
                adv_int_max: 0x40,
                adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                ..core::mem::zeroed()
            };
            if esp_ble_gap_start_advertising(&mut adv_params) != ESP_OK as i32 {
                return Err(CommsError::AdvertiseFailed);
            }
        }
        info!(
            "BLE(espidf): Bluedroid stack up, advertising as '{}'",
            self.device_name
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&mut self) -> core::result::Result<(), CommsError> {
        self.sim_init_attempts = self.sim_init_attempts.saturating_add(1);
        if self.sim_failing_inits > 0 {
            self.sim_failing_inits -= 1;
            return Err(CommsError::BleInitFailed);
        }
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        use esp_idf_svc::sys::*;
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        info!("BLE(espidf): stack shut down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("BLE(sim): stopped");
    }

    /// Write a little-endian value into a mirror slot and notify.
    #[cfg(target_os = "espidf")]
    fn platform_write_slot(&mut self, idx: usize, payload: &[u8]) {
        use esp_idf_svc::sys::*;
        let handle = BLE_CHAR_HANDLES[idx].load(AtomicOrdering::Relaxed);
        if handle == 0 {
            return;
        }
        unsafe {
            esp_ble_gatts_set_attr_value(handle as u16, payload.len() as u16, payload.as_ptr());
            let conn = BLE_CONN_ID.load(AtomicOrdering::Relaxed);
            if conn != u32::MAX {
                esp_ble_gatts_send_indicate(
                    BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8,
                    conn as u16,
                    handle as u16,
                    payload.len() as u16,
                    payload.as_ptr() as *mut u8,
                    false,
                );
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the GATT connection is done via GAP; Bluedroid fires
        // the DISCONNECT event which restarts advertising.
        use esp_idf_svc::sys::*;
        let conn = BLE_CONN_ID.load(AtomicOrdering::Relaxed);
        if conn != u32::MAX {
            unsafe {
                esp_ble_gatts_close(BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8, conn as u16);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("BLE(sim): dropping central");
    }
}

// ───────────────────────────────────────────────────────────────
// ControlPort implementation
// ───────────────────────────────────────────────────────────────

impl ControlPort for BleAdapter {
    fn start(&mut self) -> Result<()> {
        let mut last_err = CommsError::BleInitFailed;
        for attempt in 1..=MAX_INIT_ATTEMPTS {
            match self.platform_init() {
                Ok(()) => {
                    self.state = LinkState::Advertising;
                    info!("BLE: channel up (attempt {})", attempt);
                    return Ok(());
                }
                Err(e) => {
                    last_err = e;
                    warn!(
                        "BLE: init attempt {}/{} failed: {}",
                        attempt, MAX_INIT_ATTEMPTS, e
                    );
                    if attempt < MAX_INIT_ATTEMPTS {
                        std::thread::sleep(std::time::Duration::from_millis(u64::from(
                            INIT_RETRY_DELAY_MS,
                        )));
                    }
                }
            }
        }
        // Terminal for the channel only: the device keeps running its
        // local triggers and shows the persistent error pattern.
        error!("BLE: init retries exhausted, channel disabled");
        self.state = LinkState::Failed;
        Err(Error::from(last_err))
    }

    fn stop(&mut self) {
        if self.state == LinkState::Failed {
            return;
        }
        self.platform_stop();
        self.state = LinkState::Idle;
        self.pending_commands.clear();
        self.pending_keep_alive = None;
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    fn poll(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // Track the connection state maintained by the GATTS callback.
            let connected = BLE_CONN_ID.load(AtomicOrdering::Relaxed) != u32::MAX;
            match (connected, self.state) {
                (true, LinkState::Advertising) => self.state = LinkState::Connected,
                (false, LinkState::Connected) => self.state = LinkState::Advertising,
                _ => {}
            }

            if let Ok(mut buf) = BLE_CMD_BUF.lock() {
                for cmd in buf.iter() {
                    if self.pending_commands.push(*cmd).is_err() {
                        warn!("BLE: pending command overflow, dropped {:?}", cmd);
                    }
                }
                buf.clear();
            }
            if let Ok(mut slot) = BLE_KEEP_ALIVE_BUF.lock() {
                if let Some(v) = slot.take() {
                    self.pending_keep_alive = Some(v);
                }
            }
        }
    }

    fn take_pending_commands(&mut self) -> heapless::Vec<ControlCommand, MAX_PENDING_COMMANDS> {
        core::mem::take(&mut self.pending_commands)
    }

    fn take_keep_alive(&mut self) -> Option<u8> {
        self.pending_keep_alive.take()
    }

    fn echo_keep_alive(&mut self, value: u8) {
        #[cfg(target_os = "espidf")]
        self.platform_write_slot(IDX_KEEP_ALIVE, &[value]);
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_keep_alive_echo = Some(value);
        }
    }

    fn echo_command(&mut self, code: u8) {
        #[cfg(target_os = "espidf")]
        self.platform_write_slot(IDX_COMMAND, &[code]);
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_command_echo = Some(code);
        }
    }

    fn update_mirrors(&mut self, config: &SystemConfig, status: &StatusSnapshot) {
        let table = MirrorTable::from_state(config, status);
        if self.mirrored == Some(table) {
            return;
        }

        #[cfg(target_os = "espidf")]
        {
            let prev = self.mirrored;
            let changed = |pick: fn(&MirrorTable) -> u32| {
                prev.is_none() || prev.map(|p| pick(&p)) != Some(pick(&table))
            };

            if changed(|t| t.emission_duration_secs) {
                self.platform_write_slot(IDX_MIRROR_BASE, &table.emission_duration_secs.to_le_bytes());
            }
            if changed(|t| t.periodic_interval_secs) {
                self.platform_write_slot(
                    IDX_MIRROR_BASE + 1,
                    &table.periodic_interval_secs.to_le_bytes(),
                );
            }
            if changed(|t| u32::from(t.periodic_enabled)) {
                self.platform_write_slot(IDX_MIRROR_BASE + 2, &[u8::from(table.periodic_enabled)]);
            }
            if changed(|t| u32::from(t.heart_rate_gating_enabled)) {
                self.platform_write_slot(
                    IDX_MIRROR_BASE + 3,
                    &[u8::from(table.heart_rate_gating_enabled)],
                );
            }
            if changed(|t| t.high_threshold_bpm as u32) {
                self.platform_write_slot(IDX_MIRROR_BASE + 4, &table.high_threshold_bpm.to_le_bytes());
            }
            if changed(|t| t.low_threshold_bpm as u32) {
                self.platform_write_slot(IDX_MIRROR_BASE + 5, &table.low_threshold_bpm.to_le_bytes());
            }
            if changed(|t| u32::from(t.heart_rate_bpm)) {
                self.platform_write_slot(IDX_MIRROR_BASE + 6, &[table.heart_rate_bpm]);
            }
            if changed(|t| u32::from(t.emission_active)) {
                self.platform_write_slot(IDX_MIRROR_BASE + 7, &[u8::from(table.emission_active)]);
            }
        }

        self.mirrored = Some(table);
    }

    fn disconnect(&mut self) {
        if self.is_connected() {
            warn!("BLE: dropping remote (liveness timeout)");
            self.platform_disconnect();
            self.state = LinkState::Advertising;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
