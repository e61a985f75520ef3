//! ADS1115 over I2C for the four moisture inputs, plus the optional bias
//! pins used for presence detection.
//!
//! Single-ended reads at PGA ±4.096 V, 128 SPS, single-shot.  The 15-bit
//! single-ended result is scaled down to the 12-bit range the controller's
//! calibration and detection thresholds are written for.

use anyhow::{ensure, Result};
use irrigation_core::hw::PinMode;
use irrigation_core::MAX_ZONES;
use rppal::gpio::{Gpio, IoPin, Mode, PullUpDown};
use rppal::i2c::I2c;
use std::{thread, time::Duration};
use tracing::{error, info};

// ── ADS1115 register addresses ──────────────────────────────────────────────

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

// ── Config register bit fields ──────────────────────────────────────────────
//
//   [15]    OS       — write 1 to start single-shot conversion
//   [14:12] MUX      — input multiplexer (channel selection)
//   [11:9]  PGA      — programmable gain amplifier
//   [8]     MODE     — 0 = continuous, 1 = single-shot
//   [7:5]   DR       — data rate
//   [4:2]   comparator mode/polarity/latch
//   [1:0]   COMP_QUE — 11 = comparator off

/// OS=1, PGA=001 (±4.096 V), MODE=1, DR=100 (128 SPS), COMP_QUE=11.
const CONFIG_BASE: u16 = 0b1_000_001_1_100_0_0_0_11;

const MUX_SHIFT: u8 = 12;
/// AINx vs GND for x = 0..3.
const MUX_SINGLE_ENDED: [u16; MAX_ZONES] = [0b100, 0b101, 0b110, 0b111];

/// ~7.8 ms at 128 SPS.
const CONVERSION_WAIT: Duration = Duration::from_millis(9);

const OS_READY_BIT: u16 = 1 << 15;

fn config_for_channel(channel: usize) -> u16 {
    CONFIG_BASE | (MUX_SINGLE_ENDED[channel] << MUX_SHIFT)
}

/// 0..=32767 single-ended → 0..=4095.
fn scale_to_12_bit(raw: i16) -> i32 {
    i32::from(raw).clamp(0, i32::from(i16::MAX)) >> 3
}

// ── Driver ──────────────────────────────────────────────────────────────────

struct Ads1115 {
    i2c: I2c,
}

impl Ads1115 {
    fn new(addr: u16) -> Result<Self> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;
        info!(addr = format_args!("0x{addr:02x}"), "ads1115 initialised");
        Ok(Self { i2c })
    }

    fn read_channel(&mut self, channel: usize) -> Result<i16> {
        ensure!(channel < MAX_ZONES, "ADS1115 channel {channel} out of range");
        self.i2c
            .block_write(REG_CONFIG, &config_for_channel(channel).to_be_bytes())?;

        thread::sleep(CONVERSION_WAIT);

        for _ in 0..3 {
            let mut buf = [0u8; 2];
            self.i2c.block_read(REG_CONFIG, &mut buf)?;
            if u16::from_be_bytes(buf) & OS_READY_BIT != 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        let mut buf = [0u8; 2];
        self.i2c.block_read(REG_CONVERSION, &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }
}

// ── Front end ───────────────────────────────────────────────────────────────

/// Four analog channels, zone N on AIN N.
pub struct AnalogFrontEnd {
    adc: Ads1115,
    bias: [Option<IoPin>; MAX_ZONES],
}

impl AnalogFrontEnd {
    pub fn new(addr: u16, bias_pins: [Option<u8>; MAX_ZONES]) -> Result<Self> {
        let adc = Ads1115::new(addr)?;
        let gpio = Gpio::new()?;

        let mut bias: [Option<IoPin>; MAX_ZONES] = Default::default();
        for (zone, pin) in bias_pins.iter().enumerate() {
            if let Some(pin) = pin {
                let mut io = gpio.get(*pin)?.into_io(Mode::Input);
                io.set_pullupdown(PullUpDown::Off);
                info!(zone, gpio = pin, "bias pin ready");
                bias[zone] = Some(io);
            }
        }
        Ok(Self { adc, bias })
    }

    /// Real soil does not respond to the pumps in software.
    pub fn set_watering(&mut self, _zone: usize, _on: bool) {}

    pub fn read_raw(&mut self, zone: usize) -> i32 {
        match self.adc.read_channel(zone) {
            Ok(raw) => scale_to_12_bit(raw),
            Err(e) => {
                error!(zone, "adc read failed: {e:#}");
                0
            }
        }
    }

    /// Zones without a bias pin are sampled unbiased.
    pub fn set_pin_mode(&mut self, zone: usize, mode: PinMode) {
        let Some(Some(pin)) = self.bias.get_mut(zone) else {
            return;
        };
        pin.set_pullupdown(match mode {
            PinMode::PullUp => PullUpDown::PullUp,
            PinMode::PullDown => PullUpDown::PullDown,
            PinMode::Input => PullUpDown::Off,
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
