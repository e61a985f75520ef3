//! Pump relays, buzzer and analog inputs.  The `gpio` feature gates the real
//! rppal drivers; without it, mock outputs log state changes and the soil
//! simulator stands in for the sensors.

use anyhow::Result;
use irrigation_core::hw::{ActuatorBackend, AlertLine, PinMode, RawSensorBackend};
use irrigation_core::MAX_ZONES;
use tracing::info;

use crate::config::Config;

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

// ---------------------------------------------------------------------------
// Real GPIO outputs (production, requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------

/// One relay-driven output.
#[cfg(feature = "gpio")]
pub(crate) struct Output {
    pin: OutputPin,
    active_low: bool, // many relay boards are active-low
}

#[cfg(feature = "gpio")]
impl Output {
    fn new(gpio: &Gpio, pin_num: u8, active_low: bool) -> Result<Self> {
        let pin = gpio.get(pin_num)?.into_output();
        let mut out = Self { pin, active_low };
        // Fail-safe: ensure "OFF" at startup
        out.set(false);
        Ok(out)
    }

    fn set(&mut self, on: bool) {
        // active-low: LOW = ON; active-high: HIGH = ON
        if on != self.active_low {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

#[cfg(feature = "gpio")]
pub(crate) struct PumpBoard {
    pins: Vec<Output>, // zone index -> relay
}

#[cfg(feature = "gpio")]
impl PumpBoard {
    pub(crate) fn new(pins: [u8; MAX_ZONES], active_low: bool) -> Result<Self> {
        let gpio = Gpio::new()?;
        let pins = pins
            .iter()
            .map(|p| Output::new(&gpio, *p, active_low))
            .collect::<Result<Vec<_>>>()?;
        info!(?active_low, "pump board initialised");
        Ok(Self { pins })
    }

    pub(crate) fn set(&mut self, zone: usize, on: bool) {
        if let Some(pin) = self.pins.get_mut(zone) {
            pin.set(on);
            info!(zone, on, "pump");
        } else {
            tracing::warn!(zone, "no pump on zone");
        }
    }
}

/// The buzzer is driven active-high directly from its pin.
#[cfg(feature = "gpio")]
pub(crate) struct Buzzer {
    pin: Output,
}

#[cfg(feature = "gpio")]
impl Buzzer {
    pub(crate) fn new(pin_num: u8) -> Result<Self> {
        let gpio = Gpio::new()?;
        Ok(Self {
            pin: Output::new(&gpio, pin_num, false)?,
        })
    }

    pub(crate) fn set(&mut self, on: bool) {
        self.pin.set(on);
    }
}

#[cfg(feature = "gpio")]
type Inputs = crate::adc::AnalogFrontEnd;

#[cfg(feature = "gpio")]
fn inputs(cfg: &Config) -> Result<Inputs> {
    crate::adc::AnalogFrontEnd::new(cfg.hardware.adc_addr as u16, cfg.bias_pins())
}

// ---------------------------------------------------------------------------
// Mock outputs (development, no hardware, logs state)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "gpio"))]
pub(crate) struct PumpBoard {
    pub(super) on: [bool; MAX_ZONES],
}

#[cfg(not(feature = "gpio"))]
impl PumpBoard {
    pub(crate) fn new(pins: [u8; MAX_ZONES], _active_low: bool) -> Result<Self> {
        for (zone, pin) in pins.iter().enumerate() {
            info!(zone, gpio = pin, "[mock-gpio] registered pump (not wired)");
        }
        Ok(Self {
            on: [false; MAX_ZONES],
        })
    }

    pub(crate) fn set(&mut self, zone: usize, on: bool) {
        if let Some(state) = self.on.get_mut(zone) {
            *state = on;
            info!(zone, on, "[mock-gpio] pump");
        } else {
            tracing::warn!(zone, "[mock-gpio] no pump on zone");
        }
    }
}

#[cfg(not(feature = "gpio"))]
pub(crate) struct Buzzer {
    pub(super) on: bool,
}

#[cfg(not(feature = "gpio"))]
impl Buzzer {
    pub(crate) fn new(pin: u8) -> Result<Self> {
        info!(gpio = pin, "[mock-gpio] registered buzzer (not wired)");
        Ok(Self { on: false })
    }

    pub(crate) fn set(&mut self, on: bool) {
        self.on = on;
        tracing::trace!(on, "[mock-gpio] buzzer");
    }
}

#[cfg(not(feature = "gpio"))]
type Inputs = crate::sim::SoilSim;

#[cfg(not(feature = "gpio"))]
fn inputs(cfg: &Config) -> Result<Inputs> {
    Ok(crate::sim::SoilSim::new(
        crate::sim::Scenario::from_str_lossy(&cfg.sim.scenario),
        cfg.calibrations(),
        cfg.sim_present(),
    ))
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Everything the controller drives, behind the core's port traits.
pub struct HubBoard {
    pumps: PumpBoard,
    buzzer: Buzzer,
    inputs: Inputs,
}

impl HubBoard {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut board = Self {
            pumps: PumpBoard::new(cfg.pump_pins(), cfg.hardware.relay_active_low)?,
            buzzer: Buzzer::new(cfg.hardware.buzzer_gpio as u8)?,
            inputs: inputs(cfg)?,
        };
        board.all_off();
        Ok(board)
    }

    /// Fail-safe: every pump and the buzzer off.
    pub fn all_off(&mut self) {
        for zone in 0..MAX_ZONES {
            self.set_pump(zone, false);
        }
        self.buzzer.set(false);
    }
}

impl RawSensorBackend for HubBoard {
    fn read_raw(&mut self, zone: usize) -> i32 {
        self.inputs.read_raw(zone)
    }

    fn set_pin_mode(&mut self, zone: usize, mode: PinMode) {
        self.inputs.set_pin_mode(zone, mode);
    }
}

impl ActuatorBackend for HubBoard {
    fn set_pump(&mut self, zone: usize, on: bool) {
        self.pumps.set(zone, on);
        self.inputs.set_watering(zone, on);
    }
}

impl AlertLine for HubBoard {
    fn set_level(&mut self, on: bool) {
        self.buzzer.set(on);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
