//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - The control-tick timer
//! - BLE GATT callbacks (command, keep-alive writes; connect/disconnect)
//!
//! Events are consumed by the main control loop, which drains them one at
//! a time before running the tick evaluation. Payloads do not travel
//! through this queue — the BLE adapter buffers written values and the
//! loop collects them when it sees the corresponding event.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Timer ISR    │────▶│              │     │              │
//! │ GATT callback│────▶│  Event Queue │────▶│  Main Loop   │
//! │ Software     │────▶│  (lock-free) │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Control ───────────────────────────────────────────
    /// Control loop tick.
    ControlTick = 0,

    // ── Communication ─────────────────────────────────────
    /// One or more command writes are pending in the BLE adapter.
    CommandReceived = 10,
    /// A keep-alive value is pending in the BLE adapter.
    KeepAliveReceived = 11,
    /// A remote controller connected.
    CentralConnected = 12,
    /// The remote controller dropped (or was dropped).
    CentralDisconnected = 13,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Callbacks write (produce), main loop reads (consume).
// Uses atomic head/tail indices. The buffer is intentionally kept in a
// static so C callback shims can access it without a context pointer.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: EVENT_BUFFER slots are only written by the producer side of the
// ring (push_event) at indices the consumer has not yet reached, and only
// read by the consumer (pop_event) at indices the producer has published
// via the Release store on EVENT_HEAD. The atomics enforce the SPSC
// discipline; no slot is accessed concurrently.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from callback/ISR context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    // SAFETY: single producer; this slot is not visible to the consumer
    // until the Release store below.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    // SAFETY: single consumer; the producer published this slot before
    // the Acquire load of EVENT_HEAD observed it.
    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::ControlTick),
        10 => Some(Event::CommandReceived),
        11 => Some(Event::KeepAliveReceived),
        12 => Some(Event::CentralConnected),
        13 => Some(Event::CentralDisconnected),
        _ => None,
    }
}
