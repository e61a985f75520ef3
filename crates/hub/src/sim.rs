//! Soil and climate simulator for running the hub without hardware.
//!
//! Each zone has a probe that is either attached or not:
//! - attached: the line is driven by the probe, whatever the bias, and reads
//!   a capacitive moisture value that drifts toward the scenario's target,
//!   random-walks, carries per-probe offset and ADC noise, and gets wetter
//!   while that zone's pump runs;
//! - absent: the line floats, so it follows a pull-up or pull-down and reads
//!   garbage as a plain input.

// The GPIO build reads real probes and only uses the climate simulator.
#![cfg_attr(feature = "gpio", allow(dead_code))]

use std::fmt;

use irrigation_core::hw::{EnvironmentSensor, PinMode, RawSensorBackend};
use irrigation_core::sensor::Calibration;
use irrigation_core::MAX_ZONES;

const RAW_MAX: f64 = 4095.0;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    (0..12).map(|_| fastrand::f64()).sum::<f64>() - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Starts mid-range and dries out over a few minutes, so dry-plant
    /// watering kicks in.
    Drying,
    /// Hovers near the centre.  Good for working on the UI without pumps.
    Stable,
    /// Starts and stays wet; the policy should leave every zone alone.
    Wet,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Self::Stable,
            "wet" => Self::Wet,
            _ => Self::Drying,
        }
    }

    /// (target dryness, pull per sample, walk sigma, noise sigma in raw
    /// counts, starting dryness).  Dryness 0.0 is `wet_raw`, 1.0 `dry_raw`.
    fn params(self) -> (f64, f64, f64, f64, f64) {
        match self {
            Self::Drying => (0.85, 0.002, 0.002, 6.0, 0.5),
            Self::Stable => (0.5, 0.01, 0.001, 3.0, 0.5),
            Self::Wet => (0.15, 0.002, 0.002, 5.0, 0.2),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drying => write!(f, "drying"),
            Self::Stable => write!(f, "stable"),
            Self::Wet => write!(f, "wet"),
        }
    }
}

// ---------------------------------------------------------------------------
// Soil
// ---------------------------------------------------------------------------

struct Probe {
    /// 0.0 = saturated, 1.0 = bone dry.
    dryness: f64,
    /// Permanent calibration offset in raw counts.
    offset: f64,
    noise_sigma: f64,
    calibration: Calibration,
}

/// Stateful stand-in for the four analog inputs.
pub struct SoilSim {
    probes: [Probe; MAX_ZONES],
    present: [bool; MAX_ZONES],
    pins: [PinMode; MAX_ZONES],
    watering: [bool; MAX_ZONES],

    target: f64,
    pull: f64,
    walk_sigma: f64,
    /// Dryness removed per sample while the zone's pump runs.
    wet_rate: f64,
}

impl SoilSim {
    pub fn new(
        scenario: Scenario,
        calibrations: [Calibration; MAX_ZONES],
        present: [bool; MAX_ZONES],
    ) -> Self {
        let (target, pull, walk_sigma, noise_sigma, start) = scenario.params();

        let probes = calibrations.map(|calibration| Probe {
            dryness: (start + gaussian(0.0, 0.03)).clamp(0.0, 0.95),
            offset: gaussian(0.0, 15.0),
            noise_sigma: noise_sigma * (1.0 + 0.2 * approx_std_normal()).max(0.3),
            calibration,
        });

        tracing::info!(%scenario, ?present, "soil simulator initialised");

        Self {
            probes,
            present,
            pins: [PinMode::Input; MAX_ZONES],
            watering: [false; MAX_ZONES],
            target,
            pull,
            walk_sigma,
            wet_rate: 0.005,
        }
    }

    /// Closed loop: the pump wets the soil of its own zone only.
    pub fn set_watering(&mut self, zone: usize, on: bool) {
        if let Some(w) = self.watering.get_mut(zone) {
            *w = on;
        }
    }

    /// Advance the probe on `zone` one step and return its reading.
    fn sample(&mut self, zone: usize) -> i32 {
        let wet = if self.watering[zone] { self.wet_rate } else { 0.0 };
        let p = &mut self.probes[zone];

        let drift = self.pull * (self.target - p.dryness);
        let walk = gaussian(0.0, self.walk_sigma);
        // Capped short of the dry rail so a present probe still reads as
        // driven during detection.
        p.dryness = (p.dryness + drift + walk - wet).clamp(0.0, 0.95);

        let cal = p.calibration;
        let span = f64::from(cal.dry_raw - cal.wet_raw);
        let reading = f64::from(cal.wet_raw) + p.dryness * span + p.offset + gaussian(0.0, p.noise_sigma);
        reading.round().clamp(0.0, RAW_MAX) as i32
    }

    fn floating(&self, zone: usize) -> i32 {
        match self.pins[zone] {
            PinMode::PullUp => (RAW_MAX - gaussian(0.0, 8.0).abs()) as i32,
            PinMode::PullDown => gaussian(0.0, 8.0).abs() as i32,
            PinMode::Input => fastrand::i32(0..=RAW_MAX as i32),
        }
    }
}

impl RawSensorBackend for SoilSim {
    fn read_raw(&mut self, zone: usize) -> i32 {
        if zone >= MAX_ZONES {
            return 0;
        }
        if self.present[zone] {
            self.sample(zone)
        } else {
            self.floating(zone)
        }
    }

    fn set_pin_mode(&mut self, zone: usize, mode: PinMode) {
        if let Some(pin) = self.pins.get_mut(zone) {
            *pin = mode;
        }
    }
}

// ---------------------------------------------------------------------------
// Climate
// ---------------------------------------------------------------------------

/// Slowly wandering room temperature and humidity.
pub struct SimEnvironment {
    temp: f64,
    humidity: f64,
}

impl SimEnvironment {
    pub fn new() -> Self {
        Self {
            temp: gaussian(22.0, 1.0),
            humidity: gaussian(55.0, 3.0),
        }
    }
}

impl EnvironmentSensor for SimEnvironment {
    fn read(&mut self) -> Option<(f32, f32)> {
        self.temp = (self.temp + gaussian(0.0, 0.05)).clamp(10.0, 35.0);
        self.humidity = (self.humidity + gaussian(0.0, 0.2)).clamp(25.0, 90.0);
        Some((self.temp as f32, self.humidity as f32))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
