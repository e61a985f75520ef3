use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post, put};
use axum::Router;
use irrigation_core::registry::DEFAULT_THRESHOLD;
use irrigation_core::{ControlError, PlantId};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::info;

use crate::state::{PlantView, SharedState};

const INDEX_HTML: &str = include_str!("ui/index.html");

/// Upper bound on how long a detect request waits for the two-phase probe.
const DETECT_WAIT: Duration = Duration::from_secs(1);
const DETECT_POLL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

struct ApiError(ControlError);

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ControlError::CapacityExceeded => StatusCode::CONFLICT,
            ControlError::NotFound(_) | ControlError::EmptyZone(_) => StatusCode::NOT_FOUND,
            ControlError::InvalidZone(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct NewPlant {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default = "default_threshold")]
    threshold: i32,
}

fn default_threshold() -> i32 {
    i32::from(DEFAULT_THRESHOLD)
}

#[derive(Deserialize)]
struct PlantPatch {
    threshold: Option<i32>,
    duration: Option<i32>,
}

#[derive(Deserialize)]
struct DndBody {
    enabled: bool,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(api_status))
        .route("/api/plants", post(create_plant))
        .route("/api/plants/{id}", patch(update_plant).delete(delete_plant))
        .route("/api/zones/{zone}/water", post(water_zone))
        .route("/api/zones/{zone}/detect", post(detect_zone))
        .route("/api/dnd", put(set_dnd))
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], INDEX_HTML)
}

async fn api_status(State(state): State<SharedState>) -> impl IntoResponse {
    let st = state.read().await;
    Json(st.to_status())
}

async fn create_plant(
    State(state): State<SharedState>,
    Json(body): Json<NewPlant>,
) -> Result<impl IntoResponse, ApiError> {
    let mut st = state.write().await;
    let id = st
        .controller
        .add_plant(&body.name, &body.kind, body.threshold, Instant::now())?;
    st.record_plant(format!("added plant {id} \"{}\"", body.name));
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn update_plant(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
    Json(body): Json<PlantPatch>,
) -> Result<Json<PlantView>, ApiError> {
    let id = PlantId(id);
    let mut st = state.write().await;
    st.controller
        .update_config(id, body.threshold, body.duration)?;
    let plant = st
        .controller
        .registry()
        .get(id)
        .map(PlantView::from)
        .ok_or(ControlError::NotFound(id))?;
    st.record_plant(format!(
        "plant {id}: threshold {}%, duration {}s",
        plant.threshold, plant.duration
    ));
    Ok(Json(plant))
}

async fn delete_plant(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    let id = PlantId(id);
    let mut st = state.write().await;
    st.controller.delete_plant(id)?;
    st.record_plant(format!("removed plant {id}"));
    Ok(StatusCode::NO_CONTENT)
}

async fn water_zone(
    State(state): State<SharedState>,
    Path(zone): Path<usize>,
) -> Result<impl IntoResponse, ApiError> {
    let mut st = state.write().await;
    let queued = st.controller.request_water(zone)?;
    if queued {
        st.record_plant(format!("manual watering requested on zone {zone}"));
    }
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": queued }))))
}

/// Schedules a detection, then polls until the dispatch loop has finished
/// it.  Returns 202 with the in-progress report if it did not finish in
/// time.
async fn detect_zone(
    State(state): State<SharedState>,
    Path(zone): Path<usize>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .write()
        .await
        .controller
        .force_detect_sensor(zone, Instant::now())?;

    let deadline = Instant::now() + DETECT_WAIT;
    loop {
        tokio::time::sleep(DETECT_POLL).await;
        let report = state.read().await.controller.sensor_report(zone)?;
        if !report.detecting {
            let body = json!({ "raw": report.raw, "mode": report.mode });
            return Ok((StatusCode::OK, Json(body)));
        }
        if Instant::now() >= deadline {
            let body = json!({ "raw": report.raw, "mode": report.mode });
            return Ok((StatusCode::ACCEPTED, Json(body)));
        }
    }
}

async fn set_dnd(
    State(state): State<SharedState>,
    Json(body): Json<DndBody>,
) -> impl IntoResponse {
    let mut st = state.write().await;
    if st.controller.dnd() != body.enabled {
        st.controller.set_dnd(body.enabled);
        st.record_system(format!("do-not-disturb {}", if body.enabled { "on" } else { "off" }));
    }
    Json(json!({ "enabled": st.controller.dnd() }))
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {addr}"))?;
    info!("web ui listening on http://{addr}");
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: SharedState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SystemState;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use irrigation_core::hw::{ActuatorBackend, AlertLine, PinMode, RawSensorBackend};
    use irrigation_core::sensor::Calibration;
    use irrigation_core::{Controller, PlantRegistry, Settings, MAX_ZONES};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state() -> SharedState {
        let controller = Controller::new(
            PlantRegistry::new(),
            [Calibration::default(); MAX_ZONES],
            Settings::default(),
            false,
            Instant::now(),
        );
        SystemState::new(controller).shared()
    }

    async fn send(state: &SharedState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = router(state.clone())
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add(state: &SharedState, name: &str) -> (StatusCode, Value) {
        send(
            state,
            Method::POST,
            "/api/plants",
            Some(json!({ "name": name, "type": "herb", "threshold": 35 })),
        )
        .await
    }

    // -- pages --------------------------------------------------------------

    #[tokio::test]
    async fn index_serves_html() {
        let resp = router(app_state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn status_starts_empty() {
        let state = app_state();
        let (status, body) = send(&state, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plants"], json!([]));
        assert_eq!(body["active_zone"], Value::Null);
        assert_eq!(body["dnd"], false);
    }

    // -- plants -------------------------------------------------------------

    #[tokio::test]
    async fn create_plant_returns_id_and_fills_zones() {
        let state = app_state();
        for expected in 1..=4 {
            let (status, body) = add(&state, "Basil").await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["id"], expected);
        }

        let (status, body) = add(&state, "One too many").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("occupied"));

        let (_, body) = send(&state, Method::GET, "/api/status", None).await;
        let zones: Vec<_> = body["plants"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["zone"].as_u64().unwrap())
            .collect();
        assert_eq!(zones, [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn create_plant_defaults_threshold() {
        let state = app_state();
        let (status, _) = send(&state, Method::POST, "/api/plants", Some(json!({ "name": "Mint" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let st = state.read().await;
        assert_eq!(st.controller.registry().plants()[0].threshold, DEFAULT_THRESHOLD);
    }

    #[tokio::test]
    async fn patch_plant_clamps_and_reports() {
        let state = app_state();
        add(&state, "Basil").await;

        let (status, body) = send(
            &state,
            Method::PATCH,
            "/api/plants/1",
            Some(json!({ "threshold": 150, "duration": 90 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threshold"], 100);
        assert_eq!(body["duration"], 60);

        let (status, _) = send(&state, Method::PATCH, "/api/plants/9", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_plant_frees_zone() {
        let state = app_state();
        add(&state, "Basil").await;

        let (status, _) = send(&state, Method::DELETE, "/api/plants/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&state, Method::DELETE, "/api/plants/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(state.read().await.controller.registry().is_empty());
    }

    // -- zones --------------------------------------------------------------

    #[tokio::test]
    async fn water_zone_queues_once() {
        let state = app_state();
        add(&state, "Basil").await;

        let (status, body) = send(&state, Method::POST, "/api/zones/0/water", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["queued"], true);

        let (_, body) = send(&state, Method::POST, "/api/zones/0/water", None).await;
        assert_eq!(body["queued"], false, "already queued");

        let (_, body) = send(&state, Method::GET, "/api/status", None).await;
        assert_eq!(body["queue"], json!([0]));
    }

    #[tokio::test]
    async fn water_zone_rejects_bad_zones() {
        let state = app_state();
        let (status, _) = send(&state, Method::POST, "/api/zones/4/water", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&state, Method::POST, "/api/zones/1/water", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "no plant on zone 1");
    }

    #[tokio::test]
    async fn detect_rejects_bad_zone() {
        let state = app_state();
        let (status, _) = send(&state, Method::POST, "/api/zones/7/detect", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Every line reads a steady mid-range value, as a probe would.
    struct SteadyBoard;

    impl RawSensorBackend for SteadyBoard {
        fn read_raw(&mut self, _zone: usize) -> i32 {
            2500
        }
        fn set_pin_mode(&mut self, _zone: usize, _mode: PinMode) {}
    }

    impl ActuatorBackend for SteadyBoard {
        fn set_pump(&mut self, _zone: usize, _on: bool) {}
    }

    impl AlertLine for SteadyBoard {
        fn set_level(&mut self, _on: bool) {}
    }

    #[tokio::test]
    async fn detect_waits_for_the_dispatch_loop() {
        let state = app_state();
        let ticker = {
            let state = state.clone();
            tokio::spawn(async move {
                let mut board = SteadyBoard;
                loop {
                    state.write().await.controller.tick(Instant::now(), &mut board);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        };

        let (status, body) = send(&state, Method::POST, "/api/zones/2/detect", None).await;
        ticker.abort();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raw"], 2500);
        assert_eq!(body["mode"], "Capacitive (Analog)");
    }

    #[tokio::test]
    async fn detect_without_loop_times_out_as_accepted() {
        let state = app_state();
        let (status, body) = send(&state, Method::POST, "/api/zones/0/detect", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["mode"], "Searching...");
    }

    // -- dnd ----------------------------------------------------------------

    #[tokio::test]
    async fn dnd_toggle() {
        let state = app_state();
        let (status, body) = send(&state, Method::PUT, "/api/dnd", Some(json!({ "enabled": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);

        let st = state.read().await;
        assert!(st.controller.dnd());
        assert!(st.controller.alert().dnd());
    }
}
