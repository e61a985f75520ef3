//! Configured plants, one per zone, with their live sensor state and a short
//! moisture history.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ControlError;
use crate::MAX_ZONES;

/// Number of hourly moisture samples retained per plant.
pub const HISTORY_LEN: usize = 6;

pub const DEFAULT_THRESHOLD: u8 = 40;
pub const DEFAULT_DURATION_SEC: u8 = 5;
pub const MAX_DURATION_SEC: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantId(pub u32);

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// History ring
// ---------------------------------------------------------------------------

/// Fixed-capacity ring of the most recent samples.  Starts zero-filled, so
/// it always holds exactly `HISTORY_LEN` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoistureHistory {
    buf: [u8; HISTORY_LEN],
    /// Slot the next sample is written to; also the oldest sample.
    next: usize,
}

impl Default for MoistureHistory {
    fn default() -> Self {
        Self {
            buf: [0; HISTORY_LEN],
            next: 0,
        }
    }
}

impl MoistureHistory {
    pub fn from_oldest_first(values: [u8; HISTORY_LEN]) -> Self {
        Self {
            buf: values,
            next: 0,
        }
    }

    pub fn push(&mut self, value: u8) {
        self.buf[self.next] = value;
        self.next = (self.next + 1) % HISTORY_LEN;
    }

    pub fn to_array(&self) -> [u8; HISTORY_LEN] {
        std::array::from_fn(|i| self.buf[(self.next + i) % HISTORY_LEN])
    }
}

// ---------------------------------------------------------------------------
// Plant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Plant {
    pub id: PlantId,
    pub zone: usize,
    pub name: String,
    /// Free-form tag; never interpreted.
    pub kind: String,
    /// Water below this moisture %.  0 disables auto-watering.
    pub threshold: u8,
    pub duration_sec: u8,

    pub moisture: u8,
    pub sensor_mode: String,
    pub error_status: bool,
    pub is_watering: bool,

    pub history: MoistureHistory,
}

impl Plant {
    fn new(id: PlantId, zone: usize, name: String, kind: String, threshold: u8) -> Self {
        Self {
            id,
            zone,
            name,
            kind,
            threshold,
            duration_sec: DEFAULT_DURATION_SEC,
            moisture: 0,
            sensor_mode: "Searching...".to_string(),
            error_status: false,
            is_watering: false,
            history: MoistureHistory::default(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_sec))
    }

    pub fn to_record(&self) -> PlantRecord {
        PlantRecord {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind.clone(),
            threshold: self.threshold,
            duration_sec: self.duration_sec,
            zone_index: self.zone,
            history: self.history.to_array(),
        }
    }
}

/// Persisted form of a plant.  Live sensor state is not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub id: PlantId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: u8,
    pub duration_sec: u8,
    pub zone_index: usize,
    /// Oldest first.
    pub history: [u8; HISTORY_LEN],
}

fn clamp_threshold(v: i32) -> u8 {
    v.clamp(0, 100) as u8
}

fn clamp_duration(v: i32) -> u8 {
    v.clamp(1, i32::from(MAX_DURATION_SEC)) as u8
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PlantRegistry {
    plants: Vec<Plant>,
    next_id: u32,
}

impl Default for PlantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlantRegistry {
    pub fn new() -> Self {
        Self {
            plants: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild from persisted records.  Every record keeps its stored zone
    /// when it is in range and the first claim on it; only the rest move, to
    /// the lowest free zones in stored order.  Records beyond capacity are
    /// dropped, as are ids that would exhaust the id space.
    pub fn from_records(records: Vec<PlantRecord>) -> Self {
        let mut reg = Self::new();

        let mut seen_ids = Vec::with_capacity(records.len());
        let mut claimed = [false; MAX_ZONES];
        let mut placed: Vec<(PlantRecord, Option<usize>)> = Vec::with_capacity(records.len());
        for r in records {
            if seen_ids.contains(&r.id) {
                warn!(id = %r.id, "duplicate stored plant id, dropping");
                continue;
            }
            if r.id.0.checked_add(1).is_none() {
                warn!(id = %r.id, name = %r.name, "stored plant id out of range, dropping");
                continue;
            }
            seen_ids.push(r.id);

            let zone = (r.zone_index < MAX_ZONES && !claimed[r.zone_index]).then_some(r.zone_index);
            if let Some(zone) = zone {
                claimed[zone] = true;
            }
            placed.push((r, zone));
        }

        for (r, zone) in &mut placed {
            if zone.is_none() {
                *zone = (0..MAX_ZONES).find(|z| !claimed[*z]);
                match zone {
                    Some(z) => {
                        claimed[*z] = true;
                        warn!(id = %r.id, stored = r.zone_index, zone = *z, "stored plant moved to free zone");
                    }
                    None => warn!(id = %r.id, name = %r.name, "registry full, dropping stored plant"),
                }
            }
        }

        for (r, zone) in placed {
            let Some(zone) = zone else { continue };
            let history = r.history.map(|v| v.min(100));
            let mut plant = Plant::new(r.id, zone, r.name, r.kind, r.threshold.min(100));
            plant.duration_sec = clamp_duration(i32::from(r.duration_sec));
            plant.history = MoistureHistory::from_oldest_first(history);
            reg.next_id = reg.next_id.max(r.id.0 + 1);
            reg.plants.push(plant);
        }
        reg
    }

    pub fn records(&self) -> Vec<PlantRecord> {
        self.plants.iter().map(Plant::to_record).collect()
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn len(&self) -> usize {
        self.plants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    pub fn get(&self, id: PlantId) -> Option<&Plant> {
        self.plants.iter().find(|p| p.id == id)
    }

    pub fn by_zone(&self, zone: usize) -> Option<&Plant> {
        self.plants.iter().find(|p| p.zone == zone)
    }

    pub fn by_zone_mut(&mut self, zone: usize) -> Option<&mut Plant> {
        self.plants.iter_mut().find(|p| p.zone == zone)
    }

    fn lowest_free_zone(&self) -> Option<usize> {
        (0..MAX_ZONES).find(|z| self.by_zone(*z).is_none())
    }

    /// Create a plant on the lowest free zone.
    pub fn add_plant(&mut self, name: &str, kind: &str, threshold: i32) -> Result<PlantId, ControlError> {
        let zone = self
            .lowest_free_zone()
            .ok_or(ControlError::CapacityExceeded)?;
        let next = self
            .next_id
            .checked_add(1)
            .ok_or(ControlError::CapacityExceeded)?;
        let id = PlantId(self.next_id);
        self.next_id = next;

        let plant = Plant::new(
            id,
            zone,
            name.to_string(),
            kind.to_string(),
            clamp_threshold(threshold),
        );
        info!(%id, zone, name, threshold = plant.threshold, "plant added");
        self.plants.push(plant);
        Ok(id)
    }

    /// Apply new settings, clamped.  A negative or absent threshold, or a
    /// non-positive or absent duration, leaves that field unchanged.
    pub fn update_config(
        &mut self,
        id: PlantId,
        threshold: Option<i32>,
        duration_sec: Option<i32>,
    ) -> Result<(), ControlError> {
        let plant = self
            .plants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ControlError::NotFound(id))?;

        if let Some(t) = threshold.filter(|t| *t >= 0) {
            plant.threshold = clamp_threshold(t);
        }
        if let Some(d) = duration_sec.filter(|d| *d > 0) {
            plant.duration_sec = clamp_duration(d);
        }
        info!(
            %id,
            threshold = plant.threshold,
            duration_sec = plant.duration_sec,
            "plant config updated"
        );
        Ok(())
    }

    pub fn delete_plant(&mut self, id: PlantId) -> Result<(), ControlError> {
        let idx = self
            .plants
            .iter()
            .position(|p| p.id == id)
            .ok_or(ControlError::NotFound(id))?;
        let plant = self.plants.remove(idx);
        info!(%id, zone = plant.zone, "plant deleted");
        Ok(())
    }

    /// Update live sensor state for whichever plant owns `zone`.
    pub fn record_moisture(&mut self, zone: usize, value: u8, mode: &str, is_error: bool) {
        if let Some(p) = self.by_zone_mut(zone) {
            p.moisture = value;
            if p.sensor_mode != mode {
                p.sensor_mode = mode.to_string();
            }
            p.error_status = is_error;
        }
    }

    pub fn set_watering(&mut self, zone: usize, on: bool) {
        if let Some(p) = self.by_zone_mut(zone) {
            p.is_watering = on;
        }
    }

    /// Append every plant's current moisture to its history.
    pub fn log_history(&mut self) {
        for p in &mut self.plants {
            p.history.push(p.moisture);
        }
    }
}
