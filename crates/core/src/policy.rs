use std::time::{Duration, Instant};

use crate::registry::PlantRegistry;
use crate::scheduler::PumpScheduler;

/// Minimum time between automatic waterings of one zone.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOutcome {
    /// Some plant reports no sensor.
    pub critical: bool,
    /// Zones newly enqueued this tick.
    pub requested: Vec<usize>,
}

/// Decides, once per tick, which zones need water.
#[derive(Debug, Clone)]
pub struct AutoWaterPolicy {
    cooldown: Duration,
}

impl Default for AutoWaterPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl AutoWaterPolicy {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Enqueue every healthy plant that is below its threshold and out of
    /// cooldown.  A zero reading never counts as dry: it is what an absent or
    /// unclassified sensor reports.
    pub fn evaluate(
        &self,
        now: Instant,
        registry: &PlantRegistry,
        scheduler: &mut PumpScheduler,
    ) -> PolicyOutcome {
        let mut outcome = PolicyOutcome::default();

        for p in registry.plants() {
            if p.error_status {
                outcome.critical = true;
                continue;
            }
            let needs_water = p.threshold > 0 && p.moisture < p.threshold && p.moisture > 0;
            if !needs_water || !scheduler.cooldown_elapsed(p.zone, now, self.cooldown) {
                continue;
            }
            if scheduler.is_active(p.zone) || scheduler.is_queued(p.zone) {
                continue;
            }
            if scheduler.request_watering(p.zone) {
                outcome.requested.push(p.zone);
            }
        }
        outcome
    }
}
