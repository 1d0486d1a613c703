//! HTTP transport
//!
//! - `POST /start`  form `player1name`, `player2name` -> HTML page with the
//!   opening rack and a hidden `table_id` field
//! - `POST /shoot`  form `table_id`, `velX`, `velY` -> JSON `{table_id, parent, frames}`
//! - `GET /index.html`, `GET /game.js` -> static assets
//! - anything else -> 404
//!
//! The table id travels with the client; the server keeps no notion of a
//! current game.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::session::{SessionManager, SessionStart};
use crate::table::TableId;

/// Shared by every request
pub struct AppState {
    pub sessions: SessionManager,
    /// Seeds a fresh rack RNG per `/start`
    rng: Mutex<Pcg32>,
    static_dir: PathBuf,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(sessions: SessionManager, seed: u64, static_dir: impl Into<PathBuf>) -> SharedState {
        Arc::new(Self {
            sessions,
            rng: Mutex::new(Pcg32::seed_from_u64(seed)),
            static_dir: static_dir.into(),
        })
    }

    fn next_rack_rng(&self) -> Pcg32 {
        let seed: u64 = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .random();
        Pcg32::seed_from_u64(seed)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StartForm {
    pub player1name: Option<String>,
    pub player2name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShootForm {
    pub table_id: Option<String>,
    #[serde(rename = "velX")]
    pub vel_x: Option<String>,
    #[serde(rename = "velY")]
    pub vel_y: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, GameError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GameError::InvalidInput(format!("missing field {field}")))
}

fn parse_component(value: &Option<String>, field: &str) -> Result<f64, GameError> {
    let raw = required(value, field)?;
    let parsed: f64 = raw
        .parse()
        .map_err(|_| GameError::InvalidInput(format!("{field} is not a number: {raw:?}")))?;
    if !parsed.is_finite() {
        return Err(GameError::InvalidInput(format!("{field} must be finite")));
    }
    Ok(parsed)
}

impl ShootForm {
    /// Table id and cue velocity
    pub fn parse(&self) -> Result<(TableId, DVec2), GameError> {
        let raw_id = required(&self.table_id, "table_id")?;
        let id = raw_id
            .parse()
            .map_err(|_| GameError::InvalidInput(format!("table_id is not an id: {raw_id:?}")))?;
        let vel = DVec2::new(
            parse_component(&self.vel_x, "velX")?,
            parse_component(&self.vel_y, "velY")?,
        );
        Ok((id, vel))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShootResponse {
    pub table_id: u64,
    pub parent: u64,
    pub frames: Vec<String>,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match &self {
            GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::InvalidState(_) => StatusCode::CONFLICT,
            GameError::StoreUnavailable(_) | GameError::EngineUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("Rejected request ({}): {}", self.kind(), self);
        }
        let body = format!("{}: {}", self.kind(), self);
        if self.is_retryable() {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Minimal escaping for text placed in HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Game page returned by `/start`
pub fn game_page(start: &SessionStart, player1: &str, player2: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <script src="https://ajax.googleapis.com/ajax/libs/jquery/3.6.3/jquery.min.js"></script>
    <script src="game.js"></script>
    <title>Pool Hall</title>
  </head>
  <body>
    <input type="hidden" id="table_id" name="table_id" value="{id}">
    <div id="table">
{svg}
    </div>
    <h1>Player 1: {p1}</h1>
    <h1>Player 2: {p2}</h1>
  </body>
</html>
"#,
        id = start.table_id,
        svg = start.snapshot,
        p1 = escape_html(player1),
        p2 = escape_html(player2),
    )
}

fn worker_failed(err: tokio::task::JoinError) -> GameError {
    GameError::EngineUnavailable(format!("worker failed: {err}"))
}

pub async fn start(
    State(state): State<SharedState>,
    Form(form): Form<StartForm>,
) -> Result<Html<String>, GameError> {
    let player1 = form.player1name.unwrap_or_default();
    let player2 = form.player2name.unwrap_or_default();
    let mut rng = state.next_rack_rng();

    let worker = Arc::clone(&state);
    let (p1, p2) = (player1.clone(), player2.clone());
    let started = tokio::task::spawn_blocking(move || {
        worker.sessions.start_session(&p1, &p2, &mut rng)
    })
    .await
    .map_err(worker_failed)??;

    Ok(Html(game_page(&started, &player1, &player2)))
}

pub async fn shoot(
    State(state): State<SharedState>,
    Form(form): Form<ShootForm>,
) -> Result<Json<ShootResponse>, GameError> {
    let (id, velocity) = form.parse()?;

    // The engine may take a while; keep it off the async workers
    let receipt = tokio::task::spawn_blocking(move || state.sessions.apply_shot(id, velocity))
        .await
        .map_err(worker_failed)??;

    Ok(Json(ShootResponse {
        table_id: receipt.table_id.get(),
        parent: receipt.parent.get(),
        frames: receipt.frames,
    }))
}

async fn asset(state: &AppState, name: &str, content_type: &'static str) -> Response {
    let path = state.static_dir.join(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        Err(e) => {
            log::warn!("Static asset {} unavailable: {}", path.display(), e);
            not_found_body(&format!("/{name}"))
        }
    }
}

pub async fn index(State(state): State<SharedState>) -> Response {
    asset(&state, "index.html", "text/html").await
}

pub async fn game_js(State(state): State<SharedState>) -> Response {
    asset(&state, "game.js", "application/javascript").await
}

fn not_found_body(path: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("404: {path} not found")).into_response()
}

pub async fn not_found(uri: Uri) -> Response {
    not_found_body(uri.path())
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/shoot", post(shoot))
        .route("/index.html", get(index))
        .route("/game.js", get(game_js))
        .fallback(not_found)
        .with_state(state)
}
