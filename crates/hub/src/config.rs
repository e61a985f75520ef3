//! TOML config file loading and validation: loop timing, pin assignments,
//! per-zone calibration and the simulator profile.

use anyhow::{bail, Context, Result};
use irrigation_core::sensor::Calibration;
use irrigation_core::{Settings, MAX_ZONES};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub hardware: HardwareConfig,
    pub zones: Vec<ZoneEntry>,
    pub sim: SimConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: i64,
    pub sensor_interval_ms: i64,
    pub history_interval_sec: i64,
    pub cooldown_sec: i64,
    pub env_interval_ms: i64,
    pub save_retry_sec: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            sensor_interval_ms: 50,
            history_interval_sec: 3600,
            cooldown_sec: 60,
            env_interval_ms: 2000,
            save_retry_sec: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// BCM pin per zone, zone 0 first.
    pub pump_gpio: Vec<i64>,
    pub buzzer_gpio: i64,
    pub relay_active_low: bool,
    pub adc_addr: i64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            pump_gpio: vec![11, 12, 13, 14],
            buzzer_gpio: 10,
            relay_active_low: false,
            adc_addr: 0x48,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneEntry {
    pub zone: i64,
    #[serde(default = "default_dry_raw")]
    pub dry_raw: i64,
    #[serde(default = "default_wet_raw")]
    pub wet_raw: i64,
    /// Pin switched between pull-up and pull-down for presence detection.
    pub bias_gpio: Option<i64>,
}

fn default_dry_raw() -> i64 {
    i64::from(Calibration::default().dry_raw)
}

fn default_wet_raw() -> i64 {
    i64::from(Calibration::default().wet_raw)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub scenario: String,
    /// Zones with a simulated probe attached; the rest float.
    pub present: Vec<i64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scenario: "drying".to_string(),
            present: (0..MAX_ZONES as i64).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// GPIO whitelist
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
/// GPIO 28+ are not exposed on the standard header.
const VALID_GPIO_PINS: &[i64] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

/// Full scale of the 12-bit readings the controller works in.
const RAW_MAX: i64 = 4095;

/// ADS1115 ADDR pin strapping: GND, VDD, SDA, SCL.
const ADS1115_ADDRS: std::ops::RangeInclusive<i64> = 0x48..=0x4B;

const SCENARIOS: &[&str] = &["drying", "stable", "wet"];

/// The detection settle time is 10 ms; a slower loop would stretch it.
const MAX_TICK_MS: i64 = 10;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_timing(&mut errors);
        let mut seen_pins: HashSet<i64> = HashSet::new();
        self.validate_hardware(&mut errors, &mut seen_pins);
        self.validate_zones(&mut errors, &mut seen_pins);
        self.validate_sim(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_timing(&self, errors: &mut Vec<String>) {
        let t = &self.timing;
        for (name, value) in [
            ("tick_ms", t.tick_ms),
            ("sensor_interval_ms", t.sensor_interval_ms),
            ("history_interval_sec", t.history_interval_sec),
            ("cooldown_sec", t.cooldown_sec),
            ("env_interval_ms", t.env_interval_ms),
            ("save_retry_sec", t.save_retry_sec),
        ] {
            if value <= 0 {
                errors.push(format!("timing: {name} must be positive, got {value}"));
            }
        }
        if t.tick_ms > MAX_TICK_MS {
            errors.push(format!(
                "timing: tick_ms ({}) exceeds {MAX_TICK_MS} ms sensor settle time",
                t.tick_ms
            ));
        }
    }

    fn validate_hardware(&self, errors: &mut Vec<String>, seen_pins: &mut HashSet<i64>) {
        let hw = &self.hardware;

        if hw.pump_gpio.len() != MAX_ZONES {
            errors.push(format!(
                "hardware: pump_gpio must list {MAX_ZONES} pins, got {}",
                hw.pump_gpio.len()
            ));
        }
        for (zone, pin) in hw.pump_gpio.iter().enumerate() {
            check_pin(errors, seen_pins, &format!("hardware: pump_gpio[{zone}]"), *pin);
        }
        check_pin(errors, seen_pins, "hardware: buzzer_gpio", hw.buzzer_gpio);

        if !ADS1115_ADDRS.contains(&hw.adc_addr) {
            errors.push(format!(
                "hardware: adc_addr 0x{:02x} is not an ADS1115 address (0x48-0x4b)",
                hw.adc_addr
            ));
        }
    }

    fn validate_zones(&self, errors: &mut Vec<String>, seen_pins: &mut HashSet<i64>) {
        let mut seen_zones: HashSet<i64> = HashSet::new();

        for (i, z) in self.zones.iter().enumerate() {
            let ctx = format!("zones[{i}] (zone {})", z.zone);

            // ── Identity ────────────────────────────────────────
            if !(0..MAX_ZONES as i64).contains(&z.zone) {
                errors.push(format!(
                    "{ctx}: zone out of range [0, {}]",
                    MAX_ZONES - 1
                ));
            } else if !seen_zones.insert(z.zone) {
                errors.push(format!("{ctx}: duplicate zone"));
            }

            // ── Calibration bounds ──────────────────────────────
            if !(0..=RAW_MAX).contains(&z.dry_raw) {
                errors.push(format!(
                    "{ctx}: dry_raw {} out of range [0, {RAW_MAX}]",
                    z.dry_raw
                ));
            }
            if !(0..=RAW_MAX).contains(&z.wet_raw) {
                errors.push(format!(
                    "{ctx}: wet_raw {} out of range [0, {RAW_MAX}]",
                    z.wet_raw
                ));
            }
            if z.dry_raw == z.wet_raw {
                errors.push(format!(
                    "{ctx}: dry_raw and wet_raw are both {}, calibration range is zero",
                    z.dry_raw
                ));
            }

            if let Some(pin) = z.bias_gpio {
                check_pin(errors, seen_pins, &format!("{ctx}: bias_gpio"), pin);
            }
        }
    }

    fn validate_sim(&self, errors: &mut Vec<String>) {
        if !SCENARIOS.contains(&self.sim.scenario.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "sim: unknown scenario '{}' (expected one of: {})",
                self.sim.scenario,
                SCENARIOS.join(", ")
            ));
        }
        for zone in &self.sim.present {
            if !(0..MAX_ZONES as i64).contains(zone) {
                errors.push(format!("sim: present zone {zone} out of range"));
            }
        }
    }
}

fn check_pin(errors: &mut Vec<String>, seen: &mut HashSet<i64>, what: &str, pin: i64) {
    if !VALID_GPIO_PINS.contains(&pin) {
        errors.push(format!(
            "{what}: {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
        ));
    } else if !seen.insert(pin) {
        errors.push(format!("{what}: gpio {pin} is already in use"));
    }
}

// ---------------------------------------------------------------------------
// Derived values (only meaningful after `validate`)
// ---------------------------------------------------------------------------

impl Config {
    pub fn controller_settings(&self) -> Settings {
        let t = &self.timing;
        Settings {
            sensor_interval: Duration::from_millis(t.sensor_interval_ms as u64),
            history_interval: Duration::from_secs(t.history_interval_sec as u64),
            cooldown: Duration::from_secs(t.cooldown_sec as u64),
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.timing.tick_ms as u64)
    }

    pub fn env_interval(&self) -> Duration {
        Duration::from_millis(self.timing.env_interval_ms as u64)
    }

    pub fn save_retry(&self) -> Duration {
        Duration::from_secs(self.timing.save_retry_sec as u64)
    }

    /// Zones without a `[[zones]]` entry get the default calibration.
    pub fn calibrations(&self) -> [Calibration; MAX_ZONES] {
        let mut cals = [Calibration::default(); MAX_ZONES];
        for z in &self.zones {
            cals[z.zone as usize] = Calibration {
                dry_raw: z.dry_raw as i32,
                wet_raw: z.wet_raw as i32,
            };
        }
        cals
    }

    pub fn pump_pins(&self) -> [u8; MAX_ZONES] {
        std::array::from_fn(|zone| self.hardware.pump_gpio[zone] as u8)
    }

    #[cfg_attr(not(feature = "gpio"), allow(dead_code))]
    pub fn bias_pins(&self) -> [Option<u8>; MAX_ZONES] {
        let mut pins = [None; MAX_ZONES];
        for z in &self.zones {
            pins[z.zone as usize] = z.bias_gpio.map(|p| p as u8);
        }
        pins
    }

    #[cfg_attr(feature = "gpio", allow(dead_code))]
    pub fn sim_present(&self) -> [bool; MAX_ZONES] {
        std::array::from_fn(|zone| self.sim.present.contains(&(zone as i64)))
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.  A missing file yields the
/// defaults.
pub fn load(path: &str) -> Result<Config> {
    let config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?
    } else {
        tracing::warn!(path, "config file not found, using defaults");
        Config::default()
    };
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;

    tracing::info!(
        zones = config.zones.len(),
        tick_ms = config.timing.tick_ms,
        scenario = %config.sim.scenario,
        "config loaded"
    );
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
