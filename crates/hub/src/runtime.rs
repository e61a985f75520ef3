//! The dispatch loop: one controller tick per interval under the shared
//! lock, then the slow work (persistence) with the lock released.
//!
//! Persistence is edge-driven off the controller's dirty flag.  A failed
//! save re-arms the flag and holds further attempts off for `save_retry`,
//! so a dead disk costs one warning every few seconds rather than one per
//! tick.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use irrigation_core::env::EnvSnapshot;
use irrigation_core::hw::{Board, EnvironmentSensor};
use irrigation_core::{PlantRecord, MAX_ZONES};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::state::SharedState;
use crate::store::PlantStore;

pub struct Dispatcher<B, E, S> {
    state: SharedState,
    board: B,
    env: E,
    store: S,
    env_interval: Duration,
    save_retry: Duration,

    last_env: Option<Instant>,
    /// Earliest time the next save may be attempted after a failure.
    retry_at: Option<Instant>,
}

impl<B, E, S> Dispatcher<B, E, S>
where
    B: Board,
    E: EnvironmentSensor,
    S: PlantStore,
{
    pub fn new(
        state: SharedState,
        board: B,
        env: E,
        store: S,
        env_interval: Duration,
        save_retry: Duration,
    ) -> Self {
        Self {
            state,
            board,
            env,
            store,
            env_interval,
            save_retry,
            last_env: None,
            retry_at: None,
        }
    }

    /// Tick until ctrl-c, then leave every output off and flush pending
    /// state.
    pub async fn run(mut self, tick: Duration) -> Result<()> {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(tick_ms = tick.as_millis() as u64, "dispatch loop running");
        loop {
            tokio::select! {
                _ = interval.tick() => self.step(Instant::now()).await,
                res = &mut shutdown => {
                    res.context("failed to listen for ctrl-c")?;
                    break;
                }
            }
        }

        info!("shutting down, all outputs off");
        fail_safe(&mut self.board);
        self.retry_at = None;
        self.persist_if_dirty(Instant::now()).await;
        Ok(())
    }

    /// One pass: controller tick, environment refresh, then any save.
    pub async fn step(&mut self, now: Instant) {
        {
            let mut st = self.state.write().await;
            let events = st.controller.tick(now, &mut self.board);
            st.record_controller_events(&events);

            if self
                .last_env
                .map_or(true, |t| now.duration_since(t) >= self.env_interval)
            {
                self.last_env = Some(now);
                match self
                    .env
                    .read()
                    .and_then(|(temp, humidity)| EnvSnapshot::from_reading(temp, humidity))
                {
                    Some(snap) => st.env = Some(snap),
                    None => debug!("environment reading discarded, keeping last"),
                }
            }
        }

        self.persist_if_dirty(now).await;
    }

    async fn persist_if_dirty(&mut self, now: Instant) {
        if self.retry_at.is_some_and(|t| now < t) {
            return;
        }

        let pending = {
            let mut st = self.state.write().await;
            st.controller
                .take_dirty()
                .then(|| (st.controller.records(), st.controller.dnd()))
        };
        let Some((records, dnd)) = pending else {
            return;
        };

        match self.save(&records, dnd).await {
            Ok(()) => {
                self.retry_at = None;
                debug!(plants = records.len(), dnd, "state saved");
            }
            Err(e) => {
                warn!(
                    retry_in_secs = self.save_retry.as_secs(),
                    "saving state failed: {e:#}"
                );
                self.retry_at = Some(now + self.save_retry);
                let mut st = self.state.write().await;
                st.controller.mark_dirty();
                st.record_error(format!("save failed: {e:#}"));
            }
        }
    }

    async fn save(&self, records: &[PlantRecord], dnd: bool) -> Result<()> {
        self.store.save(records).await?;
        self.store.save_dnd(dnd).await?;
        Ok(())
    }
}

/// Every pump and the buzzer off.
fn fail_safe<B: Board>(board: &mut B) {
    for zone in 0..MAX_ZONES {
        board.set_pump(zone, false);
    }
    board.set_level(false);
}

// ===========================================================================
// Tests
// ===========================================================================
