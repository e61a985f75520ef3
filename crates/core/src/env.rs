use serde::Serialize;

/// Latest valid ambient reading.  Exposed for display only; scheduling never
/// looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvSnapshot {
    pub temp: f32,
    pub humidity: f32,
    /// Vapour pressure deficit in kPa.
    pub vpd: f32,
}

impl EnvSnapshot {
    /// Build a snapshot from a raw reading, rejecting NaNs and the -40 °C
    /// floor that DHT-class sensors report on a failed read.
    pub fn from_reading(temp: f32, humidity: f32) -> Option<Self> {
        if temp.is_nan() || humidity.is_nan() || temp <= -40.0 {
            return None;
        }
        Some(Self {
            temp,
            humidity,
            vpd: vapour_pressure_deficit(temp, humidity),
        })
    }
}

/// Tetens approximation of saturation vapour pressure, scaled by the
/// relative humidity deficit.
pub fn vapour_pressure_deficit(temp: f32, humidity: f32) -> f32 {
    let svp = 0.61078 * ((17.27 * temp) / (temp + 237.3)).exp();
    svp * (1.0 - humidity / 100.0)
}
