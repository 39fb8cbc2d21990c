use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::aggregator::AggregatedData;
use crate::error::MapdexError;
use crate::initiative::Initiative;
use crate::services::{DataServices, LoadOutcome, ResetTarget};
use crate::state::PropEquality;
use crate::state_manager::StateManager;
use crate::value::PropValue;

/// What the handlers share: the data services and one state manager.
pub struct AppContext {
    pub services: Arc<DataServices>,
    pub manager: Mutex<StateManager>,
}

impl AppContext {
    /// Seeds the state manager from whatever `services` has published.
    pub fn new(services: Arc<DataServices>) -> Result<Self, MapdexError> {
        let initiatives = services.aggregated_data()?.loaded_initiatives.clone();
        let manager = StateManager::new(initiatives).with_handler(|change| {
            info!(action = ?change.action, visible = change.result.visible_count(), "state changed");
        });
        Ok(Self {
            services,
            manager: Mutex::new(manager),
        })
    }

    /// Restarts the state manager over `data`, unless a later load has
    /// published since. The check happens under the manager lock, so the
    /// newest aggregate is always the last one seeded.
    pub fn reseed(&self, data: &Arc<AggregatedData>) -> Result<bool, MapdexError> {
        let mut manager = self.manager.lock()?;
        if !Arc::ptr_eq(data, &self.services.aggregated_data()?) {
            warn!(initiatives = data.len(), "not reseeding from a superseded aggregate");
            return Ok(false);
        }
        manager.reset(Some(data.loaded_initiatives.clone()));
        Ok(true)
    }
}

struct ApiError(MapdexError);

impl From<MapdexError> for ApiError {
    fn from(e: MapdexError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            MapdexError::NotFound(_) => StatusCode::NOT_FOUND,
            MapdexError::Config(_) | MapdexError::Schema(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let msg = self.0.to_string();
        warn!(%msg, code = %status.as_u16(), "request failed");
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: String,
}

#[derive(Serialize)]
pub struct InitiativeSummary {
    pub uri: String,
    pub name: String,
    pub dataset: String,
}

impl From<&Arc<Initiative>> for InitiativeSummary {
    fn from(initiative: &Arc<Initiative>) -> Self {
        Self {
            uri: initiative.uri().to_string(),
            name: initiative.name().to_string(),
            dataset: initiative.dataset().to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StateRequest {
    TextSearch { search: String },
    PropFilter { prop_name: String, value_required: PropValue },
    ClearPropFilter { prop_name: String },
    ClearPropFilters,
    ClearAll,
    Back,
    Forward,
}

#[derive(Serialize)]
pub struct StateResponse {
    pub changed: bool,
    pub search: String,
    pub filters: Vec<PropEquality>,
    pub visible: Vec<String>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

impl StateResponse {
    fn of(manager: &StateManager, changed: bool) -> Self {
        let state = manager.current_state();
        Self {
            changed,
            search: state.text_search().text().to_string(),
            filters: state.prop_filters().values().cloned().collect(),
            visible: state
                .visible_initiatives()
                .map(|initiative| initiative.uri().to_string())
                .collect(),
            can_go_back: manager.can_go_back(),
            can_go_forward: manager.can_go_forward(),
        }
    }
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub published: bool,
    pub generation: u64,
    pub initiatives: usize,
}

pub fn router(context: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/initiatives", get(search))
        .route("/v1/state", get(current_state).post(change_state))
        .route("/v1/values/:prop", get(alternative_values))
        .route("/v1/reload", post(reload))
        .layer(cors)
        .with_state(context)
}

async fn search(
    State(context): State<Arc<AppContext>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<InitiativeSummary>>, ApiError> {
    let found = context.services.search(&params.search)?;
    info!(search = %params.search, found = found.len(), "search");
    Ok(Json(found.iter().map(InitiativeSummary::from).collect()))
}

async fn current_state(State(context): State<Arc<AppContext>>) -> Result<Json<StateResponse>, ApiError> {
    let manager = context.manager.lock().map_err(MapdexError::from)?;
    Ok(Json(StateResponse::of(&manager, false)))
}

async fn change_state(
    State(context): State<Arc<AppContext>>,
    Json(request): Json<StateRequest>,
) -> Result<Json<StateResponse>, ApiError> {
    let mut manager = context.manager.lock().map_err(MapdexError::from)?;
    let before = manager.current().clone();
    let changed = match request {
        StateRequest::TextSearch { search } => manager.text_search(&search),
        StateRequest::PropFilter { prop_name, value_required } => {
            manager.prop_filter(PropEquality::new(prop_name, value_required))
        }
        StateRequest::ClearPropFilter { prop_name } => manager.clear_prop_filter(&prop_name),
        StateRequest::ClearPropFilters => manager.clear_prop_filters(),
        StateRequest::ClearAll => manager.clear_filters_and_search(),
        StateRequest::Back => {
            manager.back();
            *manager.current() != before
        }
        StateRequest::Forward => {
            manager.forward();
            *manager.current() != before
        }
    };
    Ok(Json(StateResponse::of(&manager, changed)))
}

async fn alternative_values(
    State(context): State<Arc<AppContext>>,
    Path(prop): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    if !context.services.schema().contains(&prop) {
        return Err(MapdexError::NotFound(format!("no property '{prop}'")).into());
    }
    let manager = context.manager.lock().map_err(MapdexError::from)?;
    Ok(Json(manager.alt_values(&prop).into_iter().collect()))
}

async fn reload(State(context): State<Arc<AppContext>>) -> Result<Json<ReloadResponse>, ApiError> {
    let outcome = context.services.reset(ResetTarget::All).await?;
    let generation = context.services.generation();
    let body = match outcome {
        LoadOutcome::Published(data) if context.reseed(&data)? => ReloadResponse {
            published: true,
            generation,
            initiatives: data.len(),
        },
        _ => ReloadResponse {
            published: false,
            generation,
            initiatives: 0,
        },
    };
    Ok(Json(body))
}
