use irrigation_core::alert::Waveform;
use irrigation_core::env::EnvSnapshot;
use irrigation_core::scheduler::StopReason;
use irrigation_core::sensor::SensorMode;
use irrigation_core::{Controller, ControllerEvent, Plant};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

/// The one lock around the controller.  The dispatch loop and every HTTP
/// handler go through it, so commands never interleave with a tick.
pub type SharedState = Arc<RwLock<SystemState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

pub struct SystemState {
    pub started_at: Instant,
    pub controller: Controller,
    pub env: Option<EnvSnapshot>,
    pub events: VecDeque<SystemEvent>,
}

#[derive(Clone, Serialize)]
pub struct SystemEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pump,
    Sensor,
    Plant,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PlantView {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: u8,
    pub duration: u8,
    pub moisture: u8,
    pub sensor_mode: String,
    pub error: bool,
    pub zone: usize,
    pub is_watering: bool,
    /// Oldest first.
    pub history: Vec<u8>,
}

impl From<&Plant> for PlantView {
    fn from(p: &Plant) -> Self {
        Self {
            id: p.id.0,
            name: p.name.clone(),
            kind: p.kind.clone(),
            threshold: p.threshold,
            duration: p.duration_sec,
            moisture: p.moisture,
            sensor_mode: p.sensor_mode.clone(),
            error: p.error_status,
            zone: p.zone,
            is_watering: p.is_watering,
            history: p.history.to_array().to_vec(),
        }
    }
}

#[derive(Serialize)]
pub struct AlertView {
    pub waveform: Waveform,
    pub alarm: bool,
    pub error: bool,
    pub critical: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub plants: Vec<PlantView>,
    pub active_zone: Option<usize>,
    pub queue: Vec<usize>,
    pub dnd: bool,
    pub alert: AlertView,
    pub env: Option<EnvSnapshot>,
    pub events: Vec<SystemEvent>,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl SystemState {
    pub fn new(controller: Controller) -> Self {
        Self {
            started_at: Instant::now(),
            controller,
            env: None,
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Turn what a tick reported into log entries.
    pub fn record_controller_events(&mut self, events: &[ControllerEvent]) {
        for ev in events {
            let (kind, detail) = describe(ev);
            self.push_event(kind, detail);
        }
    }

    pub fn record_plant(&mut self, detail: String) {
        self.push_event(EventKind::Plant, detail);
    }

    /// Record an error event.
    pub fn record_error(&mut self, detail: String) {
        self.push_event(EventKind::Error, detail);
    }

    /// Record a generic system event.
    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, detail);
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn to_status(&self) -> StatusResponse {
        let c = &self.controller;
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            plants: c.registry().plants().iter().map(PlantView::from).collect(),
            active_zone: c.scheduler().active_zone(),
            queue: c.scheduler().queue().collect(),
            dnd: c.dnd(),
            alert: AlertView {
                waveform: c.alert().waveform(),
                alarm: c.alert().alarm_active(),
                error: c.alert().error_active(),
                critical: c.critical(),
            },
            env: self.env,
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            detail,
        });
    }
}

fn describe(ev: &ControllerEvent) -> (EventKind, String) {
    match *ev {
        ControllerEvent::Enqueued { zone } => (EventKind::Pump, format!("zone {zone} queued")),
        ControllerEvent::PumpStarted { zone } => (EventKind::Pump, format!("zone {zone} pump ON")),
        ControllerEvent::PumpStopped {
            zone,
            reason,
            ran_for,
        } => {
            let secs = ran_for.as_secs_f32();
            match reason {
                StopReason::Completed => (
                    EventKind::Pump,
                    format!("zone {zone} pump OFF after {secs:.1}s"),
                ),
                StopReason::PlantRemoved => (
                    EventKind::Pump,
                    format!("zone {zone} pump OFF after {secs:.1}s: plant removed"),
                ),
                StopReason::SensorFault => (
                    EventKind::Error,
                    format!("zone {zone} pump OFF after {secs:.1}s: sensor fault"),
                ),
            }
        }
        ControllerEvent::SensorClassified { zone, mode } => {
            let label = match mode {
                SensorMode::Analog => "capacitive probe",
                SensorMode::Unknown => "no sensor",
            };
            (EventKind::Sensor, format!("zone {zone}: {label}"))
        }
        ControllerEvent::HistoryLogged => (EventKind::System, "moisture history logged".into()),
        ControllerEvent::CriticalChanged { critical: true } => {
            (EventKind::Error, "plant needs attention".into())
        }
        ControllerEvent::CriticalChanged { critical: false } => {
            (EventKind::System, "all plants ok".into())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
