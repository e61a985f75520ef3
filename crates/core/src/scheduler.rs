//! Single-slot pump scheduler.
//!
//! At most one pump runs at a time.  Watering requests, automatic and
//! manual alike, wait in one duplicate-free FIFO.
//!
//! ```text
//! Idle ──[queue non-empty]──▶ Watering(zone) ──[duration elapsed | plant gone | sensor error]──▶ Idle
//! ```
//!
//! Every stop, including a safety stop, stamps the zone's cooldown.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::hw::ActuatorBackend;
use crate::registry::PlantRegistry;
use crate::MAX_ZONES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    PlantRemoved,
    SensorFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEvent {
    Started { zone: usize },
    Stopped { zone: usize, reason: StopReason, ran_for: Duration },
}

#[derive(Debug, Clone, Copy)]
struct ActiveRun {
    zone: usize,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct PumpScheduler {
    active: Option<ActiveRun>,
    queue: VecDeque<usize>,
    last_water: [Option<Instant>; MAX_ZONES],
}

impl PumpScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_zone(&self) -> Option<usize> {
        self.active.map(|a| a.zone)
    }

    pub fn queue(&self) -> impl Iterator<Item = usize> + '_ {
        self.queue.iter().copied()
    }

    pub fn is_active(&self, zone: usize) -> bool {
        self.active_zone() == Some(zone)
    }

    pub fn is_queued(&self, zone: usize) -> bool {
        self.queue.contains(&zone)
    }

    pub fn last_water(&self, zone: usize) -> Option<Instant> {
        self.last_water.get(zone).copied().flatten()
    }

    /// A zone that has never been watered is always out of cooldown, so a
    /// plant that is already dry at boot is watered on the first tick
    /// instead of one cooldown after power-on.
    pub fn cooldown_elapsed(&self, zone: usize, now: Instant, cooldown: Duration) -> bool {
        self.last_water(zone)
            .map_or(true, |t| now.duration_since(t) >= cooldown)
    }

    /// Append `zone` to the queue unless it is already active or queued.
    /// Returns whether it was enqueued.
    pub fn request_watering(&mut self, zone: usize) -> bool {
        if zone >= MAX_ZONES || self.is_active(zone) || self.is_queued(zone) {
            return false;
        }
        self.queue.push_back(zone);
        info!(zone, depth = self.queue.len(), "zone added to water queue");
        true
    }

    /// Manual activation shares the FIFO with automatic requests.
    pub fn activate_pump(&mut self, zone: usize) -> bool {
        self.request_watering(zone)
    }

    /// Run one transition: stop the active pump if it is due (or unsafe),
    /// otherwise start the next queued zone.
    pub fn tick<A: ActuatorBackend>(
        &mut self,
        now: Instant,
        registry: &mut PlantRegistry,
        pumps: &mut A,
    ) -> Option<PumpEvent> {
        if let Some(run) = self.active {
            let reason = match registry.by_zone(run.zone) {
                None => Some(StopReason::PlantRemoved),
                Some(p) if p.error_status => Some(StopReason::SensorFault),
                Some(p) if now.duration_since(run.started) >= p.duration() => {
                    Some(StopReason::Completed)
                }
                Some(_) => None,
            };
            return reason.map(|reason| self.stop(run, now, reason, registry, pumps));
        }

        while let Some(zone) = self.queue.pop_front() {
            match registry.by_zone(zone) {
                None => {
                    warn!(zone, "queued zone has no plant, dropping request");
                    continue;
                }
                Some(p) if p.error_status => {
                    warn!(zone, "queued zone has a sensor fault, dropping request");
                    continue;
                }
                Some(_) => {}
            }

            self.active = Some(ActiveRun { zone, started: now });
            pumps.set_pump(zone, true);
            registry.set_watering(zone, true);
            info!(zone, pending = self.queue.len(), "pump started");
            return Some(PumpEvent::Started { zone });
        }
        None
    }

    fn stop<A: ActuatorBackend>(
        &mut self,
        run: ActiveRun,
        now: Instant,
        reason: StopReason,
        registry: &mut PlantRegistry,
        pumps: &mut A,
    ) -> PumpEvent {
        self.active = None;
        pumps.set_pump(run.zone, false);
        registry.set_watering(run.zone, false);
        self.last_water[run.zone] = Some(now);

        let ran_for = now.duration_since(run.started);
        match reason {
            StopReason::Completed => info!(zone = run.zone, ?ran_for, "pump stopped"),
            _ => warn!(zone = run.zone, ?reason, ?ran_for, "pump stopped by safety cutoff"),
        }
        PumpEvent::Stopped {
            zone: run.zone,
            reason,
            ran_for,
        }
    }
}
