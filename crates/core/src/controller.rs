//! One pass of the dispatch loop, plus the commands a front end may issue
//! between passes.
//!
//! The controller owns every piece of decision state.  The caller owns the
//! clock and the hardware: each `tick` is handed `now` and a [`Board`], so the
//! same code runs against GPIO, the soil simulator or a test double.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alert::AlertStateMachine;
use crate::error::ControlError;
use crate::hw::Board;
use crate::policy::AutoWaterPolicy;
use crate::registry::{PlantId, PlantRecord, PlantRegistry};
use crate::scheduler::{PumpEvent, PumpScheduler, StopReason};
use crate::sensor::{Calibration, SensorClassifier, SensorMode};
use crate::MAX_ZONES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// One zone is read per interval, round-robin.
    pub sensor_interval: Duration,
    pub history_interval: Duration,
    pub cooldown: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensor_interval: Duration::from_millis(50),
            history_interval: Duration::from_secs(3600),
            cooldown: crate::policy::DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    Enqueued { zone: usize },
    PumpStarted { zone: usize },
    PumpStopped { zone: usize, reason: StopReason, ran_for: Duration },
    SensorClassified { zone: usize, mode: SensorMode },
    HistoryLogged,
    CriticalChanged { critical: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorReport {
    pub zone: usize,
    pub raw: i32,
    pub mode: &'static str,
    pub detecting: bool,
}

pub struct Controller {
    registry: PlantRegistry,
    sensors: [SensorClassifier; MAX_ZONES],
    scheduler: PumpScheduler,
    policy: AutoWaterPolicy,
    alert: AlertStateMachine,
    settings: Settings,

    next_zone: usize,
    last_sensor_read: Instant,
    last_history_log: Instant,
    critical: bool,
    /// Last level written to the alert line.
    line_level: Option<bool>,
    dirty: bool,
}

impl Controller {
    pub fn new(
        registry: PlantRegistry,
        calibrations: [Calibration; MAX_ZONES],
        settings: Settings,
        dnd: bool,
        now: Instant,
    ) -> Self {
        Self {
            registry,
            sensors: std::array::from_fn(|zone| SensorClassifier::new(zone, calibrations[zone])),
            scheduler: PumpScheduler::new(),
            policy: AutoWaterPolicy::new(settings.cooldown),
            alert: AlertStateMachine::new(now, dnd),
            settings,
            next_zone: 0,
            last_sensor_read: now,
            last_history_log: now,
            critical: false,
            line_level: None,
            dirty: false,
        }
    }

    /// Boot sequence: probe every zone and give one beep.
    pub fn start(&mut self, now: Instant) {
        for zone in 0..MAX_ZONES {
            self.sensors[zone].force_detect();
            self.sync_label(zone);
        }
        self.alert.beep(now);
        info!(plants = self.registry.len(), dnd = self.alert.dnd(), "controller started");
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub fn tick<B: Board>(&mut self, now: Instant, board: &mut B) -> Vec<ControllerEvent> {
        let mut events = Vec::new();

        // 1. deferred detections
        for sensor in &mut self.sensors {
            if let Some(mode) = sensor.poll(now, board) {
                refresh_zone(sensor, &mut self.registry, board);
                events.push(ControllerEvent::SensorClassified {
                    zone: sensor.zone(),
                    mode,
                });
            }
        }

        // 2. round-robin read
        if now.duration_since(self.last_sensor_read) >= self.settings.sensor_interval {
            self.last_sensor_read = now;
            let zone = self.next_zone;
            self.next_zone = (zone + 1) % MAX_ZONES;
            let sensor = &mut self.sensors[zone];
            if !sensor.is_detecting() {
                refresh_zone(sensor, &mut self.registry, board);
            }
        }

        // 3. policy
        let outcome = self.policy.evaluate(now, &self.registry, &mut self.scheduler);
        events.extend(
            outcome
                .requested
                .iter()
                .map(|&zone| ControllerEvent::Enqueued { zone }),
        );
        if outcome.critical != self.critical {
            self.critical = outcome.critical;
            if self.critical {
                warn!("sensor fault on a configured zone, raising error alert");
            } else {
                info!("all configured sensors healthy, clearing error alert");
            }
            events.push(ControllerEvent::CriticalChanged {
                critical: self.critical,
            });
        }
        if self.critical {
            self.alert.set_error(true, now);
            self.alert.set_alarm(false, now);
        } else {
            self.alert.set_error(false, now);
        }

        // 4. pump
        match self.scheduler.tick(now, &mut self.registry, board) {
            Some(PumpEvent::Started { zone }) => {
                self.alert.beep(now);
                events.push(ControllerEvent::PumpStarted { zone });
            }
            Some(PumpEvent::Stopped { zone, reason, ran_for }) => {
                events.push(ControllerEvent::PumpStopped {
                    zone,
                    reason,
                    ran_for,
                });
            }
            None => {}
        }

        // 5. alert line
        self.alert.tick(now);
        let level = self.alert.level();
        if self.line_level != Some(level) {
            board.set_level(level);
            self.line_level = Some(level);
        }

        // 6. history
        if now.duration_since(self.last_history_log) >= self.settings.history_interval {
            self.last_history_log = now;
            self.registry.log_history();
            self.dirty = true;
            info!(plants = self.registry.len(), "moisture history logged");
            events.push(ControllerEvent::HistoryLogged);
        }

        events
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn add_plant(
        &mut self,
        name: &str,
        kind: &str,
        threshold: i32,
        now: Instant,
    ) -> Result<PlantId, ControlError> {
        let id = self.registry.add_plant(name, kind, threshold)?;
        if let Some(zone) = self.registry.get(id).map(|p| p.zone) {
            self.sync_label(zone);
        }
        self.alert.beep(now);
        self.dirty = true;
        Ok(id)
    }

    pub fn update_config(
        &mut self,
        id: PlantId,
        threshold: Option<i32>,
        duration_sec: Option<i32>,
    ) -> Result<(), ControlError> {
        self.registry.update_config(id, threshold, duration_sec)?;
        self.dirty = true;
        Ok(())
    }

    /// A running pump on the deleted plant's zone is cut on the next tick.
    pub fn delete_plant(&mut self, id: PlantId) -> Result<(), ControlError> {
        self.registry.delete_plant(id)?;
        self.dirty = true;
        Ok(())
    }

    /// Manual watering.  Returns `false` if the zone was already active or
    /// queued.
    pub fn request_water(&mut self, zone: usize) -> Result<bool, ControlError> {
        if zone >= MAX_ZONES {
            return Err(ControlError::InvalidZone(zone));
        }
        if self.registry.by_zone(zone).is_none() {
            return Err(ControlError::EmptyZone(zone));
        }
        let queued = self.scheduler.activate_pump(zone);
        info!(zone, queued, "manual watering requested");
        Ok(queued)
    }

    pub fn force_detect_sensor(&mut self, zone: usize, now: Instant) -> Result<(), ControlError> {
        let sensor = self
            .sensors
            .get_mut(zone)
            .ok_or(ControlError::InvalidZone(zone))?;
        sensor.force_detect();
        self.sync_label(zone);
        self.alert.beep(now);
        debug!(zone, "sensor detection scheduled");
        Ok(())
    }

    pub fn set_dnd(&mut self, enable: bool) {
        if self.alert.dnd() != enable {
            self.alert.set_dnd(enable);
            self.dirty = true;
            info!(enable, "do-not-disturb changed");
        }
    }

    /// The front end is reachable.
    pub fn network_ready(&mut self, now: Instant) {
        self.alert.ready(now);
    }

    pub fn sensor_report(&self, zone: usize) -> Result<SensorReport, ControlError> {
        let sensor = self.sensors.get(zone).ok_or(ControlError::InvalidZone(zone))?;
        Ok(SensorReport {
            zone,
            raw: sensor.last_raw(),
            mode: sensor.mode_label(),
            detecting: sensor.is_detecting(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &PlantRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &PumpScheduler {
        &self.scheduler
    }

    pub fn alert(&self) -> &AlertStateMachine {
        &self.alert
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn dnd(&self) -> bool {
        self.alert.dnd()
    }

    pub fn records(&self) -> Vec<PlantRecord> {
        self.registry.records()
    }

    /// Returns whether persisted state changed since the last call, and
    /// clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Re-arm after a failed save.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Push the classifier's label onto the owning plant without reading
    /// the line.
    fn sync_label(&mut self, zone: usize) {
        let sensor = &self.sensors[zone];
        let label = sensor.mode_label();
        if let Some(p) = self.registry.by_zone_mut(zone) {
            p.sensor_mode = label.to_string();
            if !sensor.is_detecting() {
                p.error_status = sensor.mode() != SensorMode::Analog;
            }
        }
    }
}

/// Read one zone and store the result on its plant, if any.
fn refresh_zone<B: Board>(sensor: &mut SensorClassifier, registry: &mut PlantRegistry, board: &mut B) {
    let value = sensor.value(board);
    let is_error = sensor.mode() != SensorMode::Analog;
    registry.record_moisture(sensor.zone(), value, sensor.mode_label(), is_error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Waveform;
    use crate::hw::{ActuatorBackend, AlertLine, PinMode, RawSensorBackend};

    /// 50 % and 30 % with the default calibration.
    const RAW_50: i32 = 2797;
    const RAW_30: i32 = 3316;

    /// Four lines, four pumps and a buzzer.  A present probe drives its line
    /// whatever the bias; an absent one follows the pull.
    struct FakeBoard {
        raw: [i32; MAX_ZONES],
        present: [bool; MAX_ZONES],
        pins: [PinMode; MAX_ZONES],
        pumps: [bool; MAX_ZONES],
        buzzer: Vec<bool>,
    }

    impl FakeBoard {
        fn new() -> Self {
            Self {
                raw: [RAW_50; MAX_ZONES],
                present: [true; MAX_ZONES],
                pins: [PinMode::Input; MAX_ZONES],
                pumps: [false; MAX_ZONES],
                buzzer: Vec::new(),
            }
        }
    }

    impl RawSensorBackend for FakeBoard {
        fn read_raw(&mut self, zone: usize) -> i32 {
            if self.present[zone] {
                return self.raw[zone];
            }
            match self.pins[zone] {
                PinMode::PullUp => 4095,
                PinMode::PullDown => 0,
                PinMode::Input => 2048,
            }
        }

        fn set_pin_mode(&mut self, zone: usize, mode: PinMode) {
            self.pins[zone] = mode;
        }
    }

    impl ActuatorBackend for FakeBoard {
        fn set_pump(&mut self, zone: usize, on: bool) {
            self.pumps[zone] = on;
        }
    }

    impl AlertLine for FakeBoard {
        fn set_level(&mut self, on: bool) {
            self.buzzer.push(on);
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller(plants: &[(&str, i32)], dnd: bool, t0: Instant) -> Controller {
        let mut reg = PlantRegistry::new();
        for (name, threshold) in plants {
            reg.add_plant(name, "herb", *threshold).unwrap();
        }
        Controller::new(reg, [Calibration::default(); MAX_ZONES], Settings::default(), dnd, t0)
    }

    /// Tick every 10 ms over `[from, to)` and collect timestamped events.
    fn run(
        c: &mut Controller,
        board: &mut FakeBoard,
        t0: Instant,
        from_ms: u64,
        to_ms: u64,
    ) -> Vec<(u64, ControllerEvent)> {
        let mut out = Vec::new();
        let mut t = from_ms;
        while t < to_ms {
            for ev in c.tick(t0 + ms(t), board) {
                out.push((t, ev));
            }
            let watering = c.registry().plants().iter().filter(|p| p.is_watering).count();
            assert!(watering <= 1, "{watering} zones watering at {t} ms");
            assert!(board.pumps.iter().filter(|on| **on).count() <= 1);
            if let Some(a) = c.scheduler().active_zone() {
                assert!(!c.scheduler().is_queued(a));
            }
            t += 10;
        }
        out
    }

    fn times(events: &[(u64, ControllerEvent)], pred: impl Fn(&ControllerEvent) -> bool) -> Vec<u64> {
        events.iter().filter(|(_, e)| pred(e)).map(|(t, _)| *t).collect()
    }

    // -- boot ---------------------------------------------------------------

    #[test]
    fn boot_classifies_every_zone() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        board.present[3] = false;
        let mut c = controller(&[("basil", 40)], false, t0);
        c.start(t0);
        assert_eq!(c.registry().by_zone(0).unwrap().sensor_mode, "Searching...");

        let events = run(&mut c, &mut board, t0, 0, 40);
        let classified: Vec<_> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ControllerEvent::SensorClassified { zone, mode } => Some((*zone, *mode)),
                _ => None,
            })
            .collect();
        assert_eq!(
            classified,
            vec![
                (0, SensorMode::Analog),
                (1, SensorMode::Analog),
                (2, SensorMode::Analog),
                (3, SensorMode::Unknown),
            ]
        );
        let p = c.registry().by_zone(0).unwrap();
        assert_eq!(p.sensor_mode, "Capacitive (Analog)");
        assert_eq!(p.moisture, 50);
        assert!(!p.error_status);
        assert!(!c.critical(), "absent sensor on an empty zone is not critical");
    }

    #[test]
    fn boot_beep_reaches_the_line() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[], false, t0);
        c.start(t0);
        run(&mut c, &mut board, t0, 0, 300);
        assert_eq!(board.buzzer, vec![true, false]);
    }

    // -- closed loop --------------------------------------------------------

    #[test]
    fn dry_plant_is_watered_once_per_cooldown() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[("basil", 40)], false, t0);
        c.start(t0);

        let events = run(&mut c, &mut board, t0, 0, 240);
        assert!(!events
            .iter()
            .any(|(_, e)| matches!(e, ControllerEvent::Enqueued { .. })));
        assert_eq!(c.registry().by_zone(0).unwrap().moisture, 50);

        // Zone 0 is next read at 250 ms.
        board.raw[0] = RAW_30;
        let events = run(&mut c, &mut board, t0, 240, 80_000);

        let enqueued = times(&events, |e| matches!(e, ControllerEvent::Enqueued { zone: 0 }));
        let started = times(&events, |e| matches!(e, ControllerEvent::PumpStarted { zone: 0 }));
        let stopped = times(&events, |e| {
            matches!(
                e,
                ControllerEvent::PumpStopped {
                    zone: 0,
                    reason: StopReason::Completed,
                    ..
                }
            )
        });

        assert_eq!(enqueued[0], 250);
        assert_eq!(started[0], 250, "idle scheduler starts in the same tick");
        assert_eq!(stopped[0], 5250);
        // Still at 30 %, but nothing until a full minute after the stop.
        assert_eq!(enqueued[1], 5250 + 60_000);
        assert_eq!(enqueued.len(), 2);
        assert!(events.iter().any(|(_, e)| matches!(
            e,
            ControllerEvent::PumpStopped { ran_for, .. } if *ran_for == Duration::from_secs(5)
        )));
    }

    #[test]
    fn last_water_is_the_stop_time() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        board.raw[0] = RAW_30;
        let mut c = controller(&[("basil", 40)], false, t0);
        c.start(t0);
        run(&mut c, &mut board, t0, 0, 6000);
        // Dry from the first reading at 20 ms, so 20 ms to 5020 ms.
        assert_eq!(c.scheduler().last_water(0), Some(t0 + ms(5020)));
        assert!(!board.pumps[0]);
    }

    #[test]
    fn four_dry_zones_water_one_at_a_time() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        board.raw = [RAW_30; MAX_ZONES];
        let mut c = controller(&[("a", 40), ("b", 40), ("c", 40), ("d", 40)], false, t0);
        c.start(t0);

        let events = run(&mut c, &mut board, t0, 0, 25_000);
        let started: Vec<usize> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ControllerEvent::PumpStarted { zone } => Some(*zone),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![0, 1, 2, 3]);
    }

    // -- manual commands ----------------------------------------------------

    #[test]
    fn request_water_validates_zone() {
        let t0 = Instant::now();
        let mut c = controller(&[("a", 40)], false, t0);
        assert_eq!(c.request_water(MAX_ZONES), Err(ControlError::InvalidZone(4)));
        assert_eq!(c.request_water(2), Err(ControlError::EmptyZone(2)));
        assert_eq!(c.request_water(0), Ok(true));
        assert_eq!(c.request_water(0), Ok(false), "already queued");
    }

    #[test]
    fn manual_request_runs_even_when_moist() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[("a", 40)], false, t0);
        c.start(t0);
        run(&mut c, &mut board, t0, 0, 100);
        c.request_water(0).unwrap();
        let events = run(&mut c, &mut board, t0, 100, 200);
        assert_eq!(events[0], (100, ControllerEvent::PumpStarted { zone: 0 }));
        assert!(board.pumps[0]);
    }

    #[test]
    fn deleting_watering_plant_stops_pump() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[("a", 40)], false, t0);
        c.start(t0);
        c.request_water(0).unwrap();
        run(&mut c, &mut board, t0, 0, 100);
        assert!(board.pumps[0]);

        let id = c.registry().by_zone(0).unwrap().id;
        c.delete_plant(id).unwrap();
        let events = run(&mut c, &mut board, t0, 100, 110);
        assert!(matches!(
            events[0].1,
            ControllerEvent::PumpStopped {
                zone: 0,
                reason: StopReason::PlantRemoved,
                ..
            }
        ));
        assert!(!board.pumps[0]);
        assert!(c.scheduler().active_zone().is_none());
    }

    #[test]
    fn removed_probe_stops_pump_and_raises_error() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[("a", 40)], false, t0);
        c.start(t0);
        c.request_water(0).unwrap();
        run(&mut c, &mut board, t0, 0, 100);
        assert!(board.pumps[0]);

        board.present[0] = false;
        c.force_detect_sensor(0, t0 + ms(100)).unwrap();
        let events = run(&mut c, &mut board, t0, 100, 200);
        let kinds: Vec<ControllerEvent> = events.iter().map(|(_, e)| *e).collect();
        assert!(kinds.contains(&ControllerEvent::SensorClassified {
            zone: 0,
            mode: SensorMode::Unknown
        }));
        assert!(kinds.contains(&ControllerEvent::CriticalChanged { critical: true }));
        assert!(kinds.iter().any(|e| matches!(
            e,
            ControllerEvent::PumpStopped {
                reason: StopReason::SensorFault,
                ..
            }
        )));
        assert!(!board.pumps[0]);
        assert!(c.alert().error_active());
        assert_eq!(c.registry().by_zone(0).unwrap().sensor_mode, "No Sensor");

        // Probe back: error clears after the next detection.
        board.present[0] = true;
        c.force_detect_sensor(0, t0 + ms(200)).unwrap();
        let events = run(&mut c, &mut board, t0, 200, 300);
        assert!(events
            .iter()
            .any(|(_, e)| *e == ControllerEvent::CriticalChanged { critical: false }));
        assert!(!c.alert().error_active());
    }

    #[test]
    fn detecting_zone_is_not_read() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[("a", 40)], false, t0);
        c.start(t0);
        run(&mut c, &mut board, t0, 0, 40);
        c.force_detect_sensor(0, t0 + ms(40)).unwrap();
        let report = c.sensor_report(0).unwrap();
        assert!(report.detecting);
        assert_eq!(report.mode, "Searching...");
        assert_eq!(c.registry().by_zone(0).unwrap().sensor_mode, "Searching...");
        assert_eq!(c.sensor_report(7), Err(ControlError::InvalidZone(7)));
    }

    // -- alerts -------------------------------------------------------------

    #[test]
    fn dnd_mutes_beeps_but_not_error() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        board.present[0] = false;
        let mut c = controller(&[("a", 40)], true, t0);
        c.start(t0);
        c.network_ready(t0);
        c.tick(t0, &mut board);
        assert_eq!(board.buzzer, vec![false], "boot beep muted");

        // Error raised at 20 ms; second pulse from 220 ms.
        run(&mut c, &mut board, t0, 10, 250);
        assert!(c.critical());
        assert_eq!(c.alert().waveform(), Waveform::ErrorOn2);
        assert!(board.buzzer.contains(&true), "error pattern ignores dnd");
    }

    #[test]
    fn network_ready_plays_chime() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut c = controller(&[], false, t0);
        c.network_ready(t0);
        run(&mut c, &mut board, t0, 0, 400);
        assert_eq!(board.buzzer, vec![true, false, true, false]);
    }

    // -- persistence bookkeeping --------------------------------------------

    #[test]
    fn mutating_commands_mark_dirty() {
        let t0 = Instant::now();
        let mut c = controller(&[], false, t0);
        assert!(!c.take_dirty());

        let id = c.add_plant("fern", "wet", 60, t0).unwrap();
        assert!(c.take_dirty());
        assert!(!c.take_dirty(), "flag clears once taken");

        c.update_config(id, Some(30), None).unwrap();
        assert!(c.take_dirty());

        assert!(c.update_config(PlantId(99), Some(1), None).is_err());
        assert!(!c.take_dirty(), "failed command changes nothing");

        c.set_dnd(true);
        assert!(c.take_dirty());
        c.set_dnd(true);
        assert!(!c.take_dirty());

        c.delete_plant(id).unwrap();
        assert!(c.take_dirty());
    }

    #[test]
    fn add_plant_fails_when_full() {
        let t0 = Instant::now();
        let mut c = controller(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)], false, t0);
        assert_eq!(
            c.add_plant("e", "herb", 40, t0),
            Err(ControlError::CapacityExceeded)
        );
        assert!(!c.take_dirty());
    }

    #[test]
    fn history_logged_on_interval() {
        let t0 = Instant::now();
        let mut board = FakeBoard::new();
        let mut reg = PlantRegistry::new();
        reg.add_plant("a", "herb", 40).unwrap();
        let settings = Settings {
            history_interval: ms(1000),
            ..Settings::default()
        };
        let mut c = Controller::new(reg, [Calibration::default(); MAX_ZONES], settings, false, t0);
        c.start(t0);

        let events = run(&mut c, &mut board, t0, 0, 2500);
        let logged: Vec<u64> = events
            .iter()
            .filter(|(_, e)| *e == ControllerEvent::HistoryLogged)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(logged, vec![1000, 2000]);
        assert_eq!(
            c.registry().by_zone(0).unwrap().history.to_array(),
            [0, 0, 0, 0, 50, 50]
        );
        assert!(c.take_dirty());
    }
}
