#[cfg(feature = "gpio")]
mod adc;
mod board;
mod config;
mod db;
mod runtime;
mod sim;
mod state;
mod store;
mod web;

use anyhow::Result;
use irrigation_core::{Controller, PlantRegistry};
use std::{env, time::Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use board::HubBoard;
use db::Db;
use runtime::Dispatcher;
use sim::SimEnvironment;
use state::SystemState;
use store::PlantStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let db_url = env::var("DB_URL").unwrap_or_else(|_| "sqlite:irrigation.db?mode=rwc".to_string());
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let cfg = config::load(&config_path)?;

    // ── Database ────────────────────────────────────────────────────
    let db = Db::connect(&db_url).await?;
    db.migrate().await?;

    let records = db.load().await?;
    let dnd = db.load_dnd().await?;
    let registry = PlantRegistry::from_records(records);
    if registry.is_empty() {
        warn!("no plants configured yet, add one from the web ui");
    }
    info!(plants = registry.len(), dnd, "db ready");

    // ── Hardware ────────────────────────────────────────────────────
    let board = HubBoard::new(&cfg)?;

    // ── Controller ──────────────────────────────────────────────────
    let mut controller = Controller::new(
        registry,
        cfg.calibrations(),
        cfg.controller_settings(),
        dnd,
        Instant::now(),
    );
    controller.start(Instant::now());

    let mut st = SystemState::new(controller);
    st.record_system("hub started".to_string());
    let shared = st.shared();

    // ── Web server ──────────────────────────────────────────────────
    let listener = web::bind(port).await?;
    {
        let mut st = shared.write().await;
        st.controller.network_ready(Instant::now());
        st.record_system(format!("web ui on port {port}"));
    }
    let web_state = shared.clone();
    tokio::spawn(async move {
        if let Err(e) = web::serve(listener, web_state).await {
            error!("{e:#}");
        }
    });

    // ── Dispatch loop ───────────────────────────────────────────────
    Dispatcher::new(
        shared,
        board,
        SimEnvironment::new(),
        db,
        cfg.env_interval(),
        cfg.save_retry(),
    )
    .run(cfg.tick())
    .await
}
