//! LED pattern engine with priority-based pattern selection.
//!
//! Generates time-varying RGB values for the status LED. The main loop
//! calls `tick()` each control cycle and feeds the RGB tuple into
//! `StatusLed::set_colour()`.
//!
//! ## Priority hierarchy (highest first)
//!
//! 1. **Error** — rapid red flash; persistent indication that the control
//!    channel is dead (init retries exhausted)
//! 2. **Emission** — solid red while the emitter is on
//! 3. **Connectivity** — slow blue pulse while advertising for a remote
//!
//! ## Pattern types
//!
//! | Pattern    | Description                | Rate  |
//! |------------|----------------------------|-------|
//! | Solid      | Constant colour            | —     |
//! | SlowPulse  | Triangular brightness fade | 1 Hz  |
//! | RapidFlash | Very fast on/off           | 8 Hz  |

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

/// Pattern identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternId {
    Solid,
    SlowPulse,
    RapidFlash,
    Off,
}

/// A pattern request with colour and type.
#[derive(Debug, Clone, Copy)]
pub struct PatternRequest {
    pub colour: Rgb,
    pub pattern: PatternId,
    pub priority: u8,
}

/// LED pattern engine. Stack-allocated, no heap.
pub struct LedPatternEngine {
    phase_ms: u32,
    active: Option<PatternRequest>,
    emission_request: Option<PatternRequest>,
    connectivity_request: Option<PatternRequest>,
    error_request: Option<PatternRequest>,
}

impl Default for LedPatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self {
            phase_ms: 0,
            active: None,
            emission_request: None,
            connectivity_request: None,
            error_request: None,
        }
    }

    /// Set or clear the emission-layer pattern (priority 2).
    pub fn set_emission_pattern(&mut self, request: Option<(Rgb, PatternId)>) {
        self.emission_request = request.map(|(colour, pattern)| PatternRequest {
            colour,
            pattern,
            priority: 2,
        });
    }

    /// Set or clear the connectivity-layer pattern (priority 3 — lowest).
    pub fn set_connectivity_pattern(&mut self, request: Option<(Rgb, PatternId)>) {
        self.connectivity_request = request.map(|(colour, pattern)| PatternRequest {
            colour,
            pattern,
            priority: 3,
        });
    }

    /// Set or clear the error pattern (priority 1 — highest).
    pub fn set_error_pattern(&mut self, active: bool) {
        if active {
            self.error_request = Some(PatternRequest {
                colour: COLOUR_ERROR,
                pattern: PatternId::RapidFlash,
                priority: 1,
            });
        } else {
            self.error_request = None;
        }
    }

    /// Advance the pattern phase and return the current RGB output.
    /// `delta_ms` is the time since the last call.
    pub fn tick(&mut self, delta_ms: u32) -> Rgb {
        self.phase_ms = self.phase_ms.wrapping_add(delta_ms);

        let selected = self.select_active();
        let reset_phase = match (&self.active, &selected) {
            (Some(prev), Some(next)) => {
                prev.priority != next.priority || prev.pattern != next.pattern
            }
            (None, Some(_)) => true,
            _ => false,
        };
        if reset_phase {
            self.phase_ms = 0;
        }
        self.active = selected;

        match &self.active {
            Some(req) => self.generate(req.colour, req.pattern),
            None => (0, 0, 0),
        }
    }

    fn select_active(&self) -> Option<PatternRequest> {
        // Priority: error (1) > emission (2) > connectivity (3)
        self.error_request
            .or(self.emission_request)
            .or(self.connectivity_request)
    }

    fn generate(&self, colour: Rgb, pattern: PatternId) -> Rgb {
        let (r, g, b) = colour;
        match pattern {
            PatternId::Solid => colour,
            PatternId::Off => (0, 0, 0),
            PatternId::SlowPulse => {
                let brightness = Self::sine_brightness(self.phase_ms, 1000);
                Self::scale(r, g, b, brightness)
            }
            PatternId::RapidFlash => {
                let on = (self.phase_ms % 125) < 63;
                if on { colour } else { (0, 0, 0) }
            }
        }
    }

    /// Attempt a sine-ish brightness curve without libm.
    /// Uses a triangular approximation: ramps 0→255→0 over `period_ms`.
    fn sine_brightness(phase_ms: u32, period_ms: u32) -> u8 {
        let pos = u64::from(phase_ms % period_ms);
        let half = u64::from(period_ms) / 2;
        if pos < half {
            ((pos * 255) / half) as u8
        } else {
            (((u64::from(period_ms) - pos) * 255) / half) as u8
        }
    }

    fn scale(r: u8, g: u8, b: u8, brightness: u8) -> Rgb {
        let br = u16::from(brightness);
        (
            ((u16::from(r) * br) / 255) as u8,
            ((u16::from(g) * br) / 255) as u8,
            ((u16::from(b) * br) / 255) as u8,
        )
    }
}

// ── Well-known colour constants ───────────────────────────────

/// Emitter on — solid red.
pub const COLOUR_EMITTING: Rgb = (255, 0, 0);
/// Advertising for a remote — blue.
pub const COLOUR_ADVERTISING: Rgb = (0, 60, 255);
/// Channel dead — red, rapid flash.
pub const COLOUR_ERROR: Rgb = (255, 0, 0);
