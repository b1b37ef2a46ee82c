use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use compute::pipeline::{Tile, TileError};
use foundation::tile::TileCoord;
use foundation::value::Value;
use maproom::dashboard::LayerUrl;
use maproom::error::TileRequestError;
use runtime::dispatch::{Dispatch, LiveState};
use runtime::metrics::{
    MetricsSnapshot, TILE_RENDER_MS, TILES_FAILED, TILES_OUT_OF_BOUNDS, TILES_RENDERED, VIEWS_CLOSED,
    VIEWS_EVICTED, VIEWS_OPENED,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, View};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/layout", get(get_layout))
        .route("/api/bindings", get(get_bindings))
        .route("/api/metrics", get(get_metrics))
        .route("/api/views", post(open_view))
        .route("/api/views/:view", delete(close_view))
        .route("/api/views/:view/inputs", post(set_input))
        .route("/:layer/:z/:x/:y", get(get_tile));

    let prefix = state.dashboard.prefix().to_string();
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{prefix}"), api)
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn get_layout(State(state): State<AppState>) -> Response {
    Json(state.dashboard.layout()).into_response()
}

async fn get_bindings(State(state): State<AppState>) -> Response {
    Json(state.dashboard.bindings()).into_response()
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.lock().snapshot())
}

#[derive(Debug, Serialize)]
struct ViewOpened {
    view: Uuid,
    #[serde(flatten)]
    dispatch: Dispatch,
    layers: Vec<LayerUrl>,
}

async fn open_view(State(state): State<AppState>) -> Result<Json<ViewOpened>, ApiError> {
    if state.views.len() >= state.config.max_views {
        evict(&state, Instant::now());
        if state.views.len() >= state.config.max_views {
            warn!(max_views = state.config.max_views, "view limit reached");
            return Err(ApiError::Unavailable(format!(
                "{} views are open; close one first",
                state.config.max_views
            )));
        }
    }

    let (live, dispatch) = state.dashboard.open_view();
    let layers = state.dashboard.layer_urls(live.inputs());
    let view = Uuid::new_v4();
    state.views.insert(view, Arc::new(View::new(live)));
    {
        let mut metrics = state.metrics.lock();
        metrics.inc_counter(VIEWS_OPENED, 1);
        metrics.record_dispatch(&dispatch);
    }
    info!(%view, outputs = dispatch.updates.len(), "view opened");
    Ok(Json(ViewOpened {
        view,
        dispatch,
        layers,
    }))
}

async fn close_view(State(state): State<AppState>, AxumPath(view): AxumPath<String>) -> Result<StatusCode, ApiError> {
    let view_id = parse_view_id(&view)?;
    if state.views.remove(&view_id).is_none() {
        return Err(ApiError::NotFound(format!("view {view_id}")));
    }
    state.metrics.lock().inc_counter(VIEWS_CLOSED, 1);
    info!(view = %view_id, "view closed");
    Ok(StatusCode::NO_CONTENT)
}

fn evict(state: &AppState, now: Instant) {
    let evicted = state.evict_idle(now);
    if evicted > 0 {
        state.metrics.lock().inc_counter(VIEWS_EVICTED, evicted as u64);
        info!(evicted, open = state.views.len(), "idle views evicted");
    }
}

/// Periodically drops views that have been idle past the configured limit.
pub async fn evict_idle_views(state: AppState) {
    let period = (state.config.view_idle() / 4).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        evict(&state, Instant::now());
    }
}

fn parse_view_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid view id `{raw}`")))
}

#[derive(Debug, Deserialize)]
struct InputEvent {
    id: String,
    value: Value,
}

async fn set_input(
    State(state): State<AppState>,
    AxumPath(view): AxumPath<String>,
    Json(event): Json<InputEvent>,
) -> Result<Response, ApiError> {
    let view_id = parse_view_id(&view)?;
    let view = state
        .views
        .get(&view_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ApiError::NotFound(format!("view {view_id}")))?;
    view.touch();

    // Queue on the view's lock before leaving the async context so events
    // for one view are applied in arrival order.
    let guard = view.live.clone().lock_owned().await;
    let dashboard = state.dashboard.clone();
    let change = tokio::task::spawn_blocking(move || {
        let mut guard = guard;
        let state: &mut LiveState = &mut guard;
        dashboard.set_input(state, &event.id, event.value)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("input task failed: {err}")))??;

    state.metrics.lock().record_dispatch(&change.dispatch);
    Ok(Json(change).into_response())
}

async fn get_tile(
    State(state): State<AppState>,
    AxumPath((layer, z, x, y)): AxumPath<(String, u8, u32, String)>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Response, ApiError> {
    let index = parse_layer_segment(&layer).ok_or_else(|| ApiError::NotFound(format!("no route `{layer}`")))?;
    let y = parse_tile_y(&y).ok_or_else(|| ApiError::BadRequest("invalid tile index".to_string()))?;
    let coord = TileCoord::new(z, x, y);

    let started = Instant::now();
    let dashboard = state.dashboard.clone();
    let task = tokio::task::spawn_blocking(move || dashboard.render_tile(index, coord, &query));

    // Failures are served as the empty tile but counted apart from tiles
    // that missed the dataset.
    let (tile, failed) = match tokio::time::timeout(state.config.tile_timeout(), task).await {
        Ok(Ok(Ok(tile))) => (tile, false),
        Ok(Ok(Err(TileRequestError::Input(err)))) => return Err(err.into()),
        Ok(Ok(Err(TileRequestError::Tile(err)))) => match err {
            TileError::InvalidTile { .. } => return Err(err.into()),
            err => {
                warn!(layer = index, z, x, y, error = %err, "tile compute failed");
                (Tile::Empty, true)
            }
        },
        Ok(Err(err)) => {
            warn!(layer = index, z, x, y, error = %err, "tile task panicked");
            (Tile::Empty, true)
        }
        Err(_) => {
            warn!(layer = index, z, x, y, timeout_ms = state.config.tile_timeout_ms, "tile compute timed out");
            (Tile::Empty, true)
        }
    };

    {
        let mut metrics = state.metrics.lock();
        match (&tile, failed) {
            (_, true) => metrics.inc_counter(TILES_FAILED, 1),
            (Tile::Empty, false) => metrics.inc_counter(TILES_OUT_OF_BOUNDS, 1),
            (Tile::Image(_), false) => metrics.inc_counter(TILES_RENDERED, 1),
        }
        metrics.record_histogram(TILE_RENDER_MS, started.elapsed().as_millis() as i64);
    }

    let body = state.dashboard.encode_tile(&tile)?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    Ok((StatusCode::OK, headers, Body::from(body)).into_response())
}

/// `tile-<i>` → `i`.
fn parse_layer_segment(raw: &str) -> Option<usize> {
    raw.strip_prefix("tile-")?.parse::<usize>().ok()
}

fn parse_tile_y(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_end_matches(".png");
    trimmed.parse::<u32>().ok()
}
