use std::{
    collections::{BTreeMap, HashMap, HashSet},
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::optimizer::CancellationFlag;
use crate::overlap::{HourSlot, LocalMeetingTime, WeeklySlots, find_availability_overlap};
use crate::persistence::sqlite::SqliteCohortStore;
use crate::{
    CohortScheduler, CohortSchedulingResult, MultiCourseSchedulingResult, Person, Scheduler,
    SchedulingError, SchedulingInvoker, SchedulingOptions, SchedulingResult, facilitators_for_run,
};

#[derive(Clone)]
pub struct AppState {
    scheduler: Arc<Scheduler>,
    invoker: Arc<dyn SchedulingInvoker>,
    options: Arc<RwLock<SchedulingOptions>>,
}

impl AppState {
    pub fn new(store: SqliteCohortStore, options: SchedulingOptions) -> Self {
        let invoker = CohortScheduler::new(Arc::new(store), Scheduler::new());
        Self::with_invoker(Arc::new(invoker), options)
    }

    pub fn with_invoker(invoker: Arc<dyn SchedulingInvoker>, options: SchedulingOptions) -> Self {
        Self {
            scheduler: Arc::new(Scheduler::new()),
            invoker,
            options: Arc::new(RwLock::new(options)),
        }
    }

    fn options(&self) -> SchedulingOptions {
        self.options.read().clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Invalid(String),
    Cancelled(String),
    Internal(String),
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<SchedulingError> for ApiError {
    fn from(value: SchedulingError) -> Self {
        match value {
            SchedulingError::CohortNotFound(_) => ApiError::NotFound(value.to_string()),
            SchedulingError::NoUsers
            | SchedulingError::NoFacilitators
            | SchedulingError::InvalidOptions(_) => ApiError::Invalid(value.to_string()),
            SchedulingError::Cancelled => ApiError::Cancelled(value.to_string()),
            SchedulingError::Optimizer(_) | SchedulingError::Persistence(_) => {
                ApiError::Internal(value.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Cancelled(message) => (StatusCode::CONFLICT, "cancelled", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Cancels the in-flight run if the request future is dropped before the run finishes.
struct CancelOnDrop(CancellationFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct SchedulePayload {
    people: Vec<Person>,
    #[serde(default)]
    facilitator_ids: HashSet<String>,
    #[serde(default)]
    options: Option<SchedulingOptions>,
}

#[derive(Debug, Deserialize)]
struct OverlapPayload {
    member_ids: Vec<String>,
    availability: HashMap<String, WeeklySlots>,
    /// IANA timezone per member, used to render the match locally.
    #[serde(default)]
    timezones: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct OverlapResponse {
    slot: Option<HourSlot>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    local_times: BTreeMap<String, LocalMeetingTime>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/options", get(get_options).put(update_options))
        .route("/schedule", post(schedule_people))
        .route("/overlap", post(find_overlap))
        .route("/cohorts/:id/schedule", post(schedule_cohort))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_options(State(state): State<AppState>) -> Json<SchedulingOptions> {
    Json(state.options())
}

async fn update_options(
    State(state): State<AppState>,
    Json(options): Json<SchedulingOptions>,
) -> Result<Json<SchedulingOptions>, ApiError> {
    options.validate()?;
    *state.options.write() = options.clone();
    Ok(Json(options))
}

async fn schedule_people(
    State(state): State<AppState>,
    Json(payload): Json<SchedulePayload>,
) -> Result<Json<MultiCourseSchedulingResult>, ApiError> {
    let SchedulePayload {
        mut people,
        facilitator_ids,
        options,
    } = payload;
    for person in &mut people {
        person
            .normalize()
            .map_err(|err| ApiError::Invalid(format!("person {}: {err}", person.id)))?;
    }
    let options = options.unwrap_or_else(|| state.options());
    let scheduler = state.scheduler.clone();

    let flag = CancellationFlag::new();
    let _guard = CancelOnDrop(flag.clone());
    let result = tokio::task::spawn_blocking(move || -> SchedulingResult<_> {
        let facilitators = facilitators_for_run(&options, &facilitator_ids)?;
        scheduler.schedule_people(&people, &options, facilitators, &flag)
    })
    .await
    .map_err(|err| ApiError::internal(format!("scheduling task failed: {err}")))??;

    info!(summary = %result.summary(), "schedule request served");
    Ok(Json(result))
}

async fn find_overlap(Json(payload): Json<OverlapPayload>) -> Json<OverlapResponse> {
    let slot = find_availability_overlap(&payload.member_ids, &payload.availability);
    let local_times = slot
        .map(|slot| {
            payload
                .member_ids
                .iter()
                .filter_map(|id| {
                    let tz = payload.timezones.get(id)?;
                    Some((id.clone(), slot.to_local(tz)))
                })
                .collect()
        })
        .unwrap_or_default();
    Json(OverlapResponse { slot, local_times })
}

async fn schedule_cohort(
    State(state): State<AppState>,
    Path(cohort_id): Path<i64>,
) -> Result<Json<CohortSchedulingResult>, ApiError> {
    let options = state.options();
    let invoker = state.invoker.clone();

    let flag = CancellationFlag::new();
    let _guard = CancelOnDrop(flag.clone());
    let result = tokio::task::spawn_blocking(move || {
        invoker.schedule_cohort(cohort_id, &options, &flag)
    })
    .await
    .map_err(|err| ApiError::internal(format!("scheduling task failed: {err}")))?
    .inspect_err(|err| warn!(cohort_id, error = %err, "cohort scheduling failed"))?;

    Ok(Json(result))
}
