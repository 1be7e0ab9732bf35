//! ==============================================================================
//! server.rs - web dashboard and json api
//! ==============================================================================
//!
//! purpose:
//!     serves the dashboard page and the per-tick frame API. the page is a
//!     self-contained document that polls /api/frame on the configured
//!     interval and redraws the gauge, the two line charts, and the status
//!     block from the returned JSON. page cosmetics carry no logic; all data
//!     shaping happens in refresh.rs.
//!
//! routes:
//!     GET /              dashboard page
//!     GET /api/frame     one refresh frame (optional ?tick= override)
//!     GET /api/readings  raw store snapshot
//!
//! relationships:
//!     - uses: refresh.rs (RefreshCycle), store.rs (snapshot)
//!     - started by: main.rs
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::refresh::{Frame, RefreshCycle};
use crate::store::{Reading, ReadingStore};

/// shared handles for request handlers
#[derive(Clone)]
pub struct ServerState {
    pub store: ReadingStore,
    pub refresh: Arc<RefreshCycle>,
    pub refresh_interval_ms: u64,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/frame", get(frame_handler))
        .route("/api/readings", get(readings_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// bind and serve until ctrl-c
pub async fn serve(state: ServerState, host: &str, port: u16) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
}

async fn dashboard_handler(State(state): State<ServerState>) -> Html<String> {
    Html(DASHBOARD_PAGE.replace("{{interval_ms}}", &state.refresh_interval_ms.to_string()))
}

#[derive(Deserialize)]
struct FrameParams {
    tick: Option<u64>,
}

/// one refresh frame. the page passes its own tick counter; callers that
/// omit it get the server-side counter instead.
async fn frame_handler(
    State(state): State<ServerState>,
    Query(params): Query<FrameParams>,
) -> Json<Frame> {
    let tick = params.tick.unwrap_or_else(|| state.refresh.next_tick());
    Json(state.refresh.tick(tick))
}

#[derive(Serialize)]
struct ReadingsResponse {
    count: usize,
    /// unix timestamp (ms) of the newest reading
    last_update_ms: Option<i64>,
    readings: Vec<Reading>,
}

/// json endpoint for programmatic access to the raw store contents
async fn readings_handler(State(state): State<ServerState>) -> Json<ReadingsResponse> {
    let readings = state.store.snapshot();
    Json(ReadingsResponse {
        count: readings.len(),
        last_update_ms: readings.last().map(|r| r.timestamp.timestamp_millis()),
        readings,
    })
}

// ==============================================================================
// dashboard page
// ==============================================================================
// single document, no build step. the inline script polls /api/frame every
// {{interval_ms}} ms with an incrementing tick and renders whatever comes
// back, including degraded error frames.

const DASHBOARD_PAGE: &str = r##"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Temperature and Humidity Dashboard</title>
<style>
  body { font-family: "Inter", system-ui, sans-serif; background: #092043; color: #333; margin: 0; padding: 20px; min-height: 100vh; box-sizing: border-box; }
  h1 { text-align: center; color: #e3f2fd; margin-bottom: 30px; font-size: 2.4em; font-weight: 700; padding-top: 20px; }
  #debug-info { text-align: center; padding: 15px; margin: 20px auto 30px; background: #e3f2fd; border: 1px solid #90caf9; border-radius: 8px; color: #1a237e; max-width: 600px; font-size: 0.95em; white-space: pre-line; }
  #debug-info.error { color: #b71c1c; font-weight: bold; }
  .gauge-wrap { margin-bottom: 50px; padding: 20px; }
  .gauge { width: 180px; height: 180px; border-radius: 50%; background: linear-gradient(145deg, #4FC3F7, #2196F3); margin: auto; box-shadow: 0 8px 16px rgba(0,123,255,0.3); display: flex; align-items: center; justify-content: center; }
  .gauge span { font-size: 34px; color: white; font-weight: bold; }
  .gauge-label { text-align: center; margin-top: 15px; font-size: 22px; color: #90caf9; font-weight: 600; }
  .charts { display: flex; flex-wrap: wrap; justify-content: center; gap: 30px; }
  .chart-card { flex: 1; min-width: 300px; background: #ffffff; border-radius: 10px; box-shadow: 0 4px 8px rgba(0,0,0,0.1); padding: 20px; }
  .chart-card h2 { font-size: 1.0em; color: #2c3e50; text-align: center; margin: 0 0 10px; }
  .chart-card svg { width: 100%; height: 260px; }
</style>
</head>
<body>
  <h1>Temperature and Humidity Dashboard</h1>
  <div id="debug-info">waiting for first update...</div>
  <div class="gauge-wrap">
    <div class="gauge"><span id="humidity-value">--</span></div>
    <div class="gauge-label">Humidity</div>
  </div>
  <div class="charts">
    <div class="chart-card"><h2 id="temp-title"></h2><svg id="temp-chart"></svg></div>
    <div class="chart-card"><h2 id="hum-title"></h2><svg id="hum-chart"></svg></div>
  </div>
<script>
const INTERVAL_MS = {{interval_ms}};
let tick = 0;

async function refresh() {
  try {
    const response = await fetch(`/api/frame?tick=${tick}`);
    render(await response.json());
  } catch (err) {
    const box = document.getElementById('debug-info');
    box.textContent = `Error fetching update #${tick}: ${err}`;
    box.classList.add('error');
  }
  tick += 1;
}

function render(frame) {
  document.getElementById('humidity-value').textContent = frame.humidity_label;
  drawChart('temp-chart', 'temp-title', frame.temperature, '#ef553b');
  drawChart('hum-chart', 'hum-title', frame.humidity, '#29B6F6');
  const box = document.getElementById('debug-info');
  box.textContent = frame.status_text;
  box.classList.toggle('error', frame.error !== null);
}

function drawChart(svgId, titleId, series, color) {
  document.getElementById(titleId).textContent = series.title;
  const svg = document.getElementById(svgId);
  const w = 420, h = 260, pad = 36;
  svg.setAttribute('viewBox', `0 0 ${w} ${h}`);
  if (series.values.length === 0) { svg.innerHTML = ''; return; }

  const min = Math.min(...series.values), max = Math.max(...series.values);
  const span = (max - min) || 1;
  const x = i => pad + (i / Math.max(series.values.length - 1, 1)) * (w - 2 * pad);
  const y = v => h - pad - ((v - min) / span) * (h - 2 * pad);

  const points = series.values.map((v, i) => `${x(i).toFixed(1)},${y(v).toFixed(1)}`).join(' ');
  const markers = series.values.map((v, i) =>
    `<circle cx="${x(i).toFixed(1)}" cy="${y(v).toFixed(1)}" r="2.5" fill="${color}"/>`).join('');
  const first = series.labels[0], last = series.labels[series.labels.length - 1];
  svg.innerHTML =
    `<polyline fill="none" stroke="${color}" stroke-width="3" points="${points}"/>` + markers +
    `<text x="${pad}" y="${h - 8}" font-size="11" fill="#666">${first}</text>` +
    `<text x="${w - pad}" y="${h - 8}" font-size="11" fill="#666" text-anchor="end">${last}</text>` +
    `<text x="6" y="${y(max) + 4}" font-size="11" fill="#666">${max.toFixed(1)}${series.unit}</text>` +
    `<text x="6" y="${y(min) + 4}" font-size="11" fill="#666">${min.toFixed(1)}${series.unit}</text>`;
}

setInterval(refresh, INTERVAL_MS);
refresh();
</script>
</body>
</html>
"##;
