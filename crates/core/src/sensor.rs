//! Per-zone sensor presence detection and moisture conversion.
//!
//! Presence is inferred from how far the input line moves when biased up
//! and then down.  A connected capacitive probe drives the line and barely
//! moves; a floating input follows the bias rail.  The two samples are taken
//! across ticks so the dispatch loop never sleeps:
//!
//! ```text
//! Idle ──force_detect──▶ Requested ──poll──▶ PullUp ──10ms──▶ PullDown ──10ms──▶ Idle
//!                                   (bias up)       (sample A,       (sample B,
//!                                                    bias down)       release, classify)
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::hw::{PinMode, RawSensorBackend};

/// Settle time after changing the bias before sampling.
pub const SETTLE: Duration = Duration::from_millis(10);

/// Swing above this means the line follows the bias: nothing attached.
const FLOATING_SWING: i32 = 3000;
/// Pulled-down sample stuck near the top rail.
const PULLED_DOWN_CEILING: i32 = 4000;
/// Pulled-up sample stuck near the bottom rail.
const PULLED_UP_FLOOR: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorMode {
    /// No sensor, or not classified yet.
    Unknown,
    /// Capacitive probe present on the analog input.
    Analog,
}

/// Dry/wet endpoints of the analog mapping.  `wet_raw` maps to 100 % even
/// though it is usually the lower raw count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub dry_raw: i32,
    pub wet_raw: i32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            dry_raw: 4095,
            wet_raw: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectPhase {
    Idle,
    Requested,
    PullUp { since: Instant },
    PullDown { since: Instant, high: i32 },
}

/// Classify a pulled-up sample `high` and pulled-down sample `low`.
pub fn classify(high: i32, low: i32) -> SensorMode {
    let swing = (high - low).abs();
    if swing > FLOATING_SWING || low > PULLED_DOWN_CEILING || high < PULLED_UP_FLOOR {
        SensorMode::Unknown
    } else {
        SensorMode::Analog
    }
}

/// Linear map of `raw` from `[dry_raw, wet_raw]` onto `[0, 100]`, clamped.
/// Integer arithmetic, truncating toward zero.
pub fn moisture_percent(raw: i32, cal: Calibration) -> u8 {
    let range = i64::from(cal.wet_raw) - i64::from(cal.dry_raw);
    if range == 0 {
        return 0;
    }
    let m = (i64::from(raw) - i64::from(cal.dry_raw)) * 100 / range;
    m.clamp(0, 100) as u8
}

pub struct SensorClassifier {
    zone: usize,
    mode: SensorMode,
    calibration: Calibration,
    phase: DetectPhase,
    last_raw: i32,
}

impl SensorClassifier {
    pub fn new(zone: usize, calibration: Calibration) -> Self {
        Self {
            zone,
            mode: SensorMode::Unknown,
            calibration,
            phase: DetectPhase::Idle,
            last_raw: 0,
        }
    }

    pub fn zone(&self) -> usize {
        self.zone
    }

    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn is_detecting(&self) -> bool {
        self.phase != DetectPhase::Idle
    }

    /// Last plain read of the line; after a detection, the released line.
    pub fn last_raw(&self) -> i32 {
        self.last_raw
    }

    /// Schedule a fresh two-phase detection.  Restarts one already running.
    pub fn force_detect(&mut self) {
        self.phase = DetectPhase::Requested;
    }

    /// Advance a pending detection.  Returns the new mode once both samples
    /// have been taken.
    pub fn poll<B: RawSensorBackend>(&mut self, now: Instant, io: &mut B) -> Option<SensorMode> {
        match self.phase {
            DetectPhase::Idle => None,
            DetectPhase::Requested => {
                io.set_pin_mode(self.zone, PinMode::PullUp);
                self.phase = DetectPhase::PullUp { since: now };
                None
            }
            DetectPhase::PullUp { since } => {
                if now.duration_since(since) < SETTLE {
                    return None;
                }
                let high = io.read_raw(self.zone);
                self.last_raw = high;
                io.set_pin_mode(self.zone, PinMode::PullDown);
                self.phase = DetectPhase::PullDown { since: now, high };
                None
            }
            DetectPhase::PullDown { since, high } => {
                if now.duration_since(since) < SETTLE {
                    return None;
                }
                let low = io.read_raw(self.zone);
                io.set_pin_mode(self.zone, PinMode::Input);
                // Reported raw is the released line, not a biased sample.
                self.last_raw = io.read_raw(self.zone);
                self.phase = DetectPhase::Idle;
                self.mode = classify(high, low);
                match self.mode {
                    SensorMode::Analog => info!(zone = self.zone, high, low, "analog sensor detected"),
                    SensorMode::Unknown => info!(zone = self.zone, high, low, "no sensor detected (floating)"),
                }
                Some(self.mode)
            }
        }
    }

    pub fn raw_read<B: RawSensorBackend>(&mut self, io: &mut B) -> i32 {
        self.last_raw = io.read_raw(self.zone);
        self.last_raw
    }

    /// Current moisture 0..=100.  Always 0 without a classified sensor.
    pub fn value<B: RawSensorBackend>(&mut self, io: &mut B) -> u8 {
        match self.mode {
            SensorMode::Analog => {
                let raw = self.raw_read(io);
                moisture_percent(raw, self.calibration)
            }
            SensorMode::Unknown => 0,
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.is_detecting() {
            return "Searching...";
        }
        match self.mode {
            SensorMode::Analog => "Capacitive (Analog)",
            SensorMode::Unknown => "No Sensor",
        }
    }
}
