//! Hardware ports consumed by the controller.
//!
//! Adapters live in the hub crate (mock, simulator, rppal).  Reads are
//! infallible at this level: an adapter that fails to talk to its device
//! logs the fault and reports a floor value, which the classifier and the
//! policy already treat as "no usable reading".

/// Electrical configuration of a sensor input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Plain high-impedance input.
    Input,
    PullUp,
    PullDown,
}

/// Analog moisture inputs, one per zone, 12-bit scale (0..=4095).
pub trait RawSensorBackend {
    fn read_raw(&mut self, zone: usize) -> i32;
    fn set_pin_mode(&mut self, zone: usize, mode: PinMode);
}

/// Pump outputs, one per zone.
pub trait ActuatorBackend {
    fn set_pump(&mut self, zone: usize, on: bool);
}

/// The single buzzer output line.
pub trait AlertLine {
    fn set_level(&mut self, on: bool);
}

/// Everything the controller tick touches.
pub trait Board: RawSensorBackend + ActuatorBackend + AlertLine {}

impl<T: RawSensorBackend + ActuatorBackend + AlertLine> Board for T {}

/// Ambient temperature/humidity source.  Returns `(temp_c, humidity_pct)`,
/// or `None` when the device did not answer.
pub trait EnvironmentSensor {
    fn read(&mut self) -> Option<(f32, f32)>;
}
