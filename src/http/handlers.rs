use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::IntoResponse;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{RescheduleOutcome, Reservation, RoomId};
use crate::observability::{self, Operation};

use super::AppState;
use super::error::ApiError;

pub const RESERVATION_ID_HEADER: HeaderName = HeaderName::from_static("x-reservation-id");

#[derive(Debug, Serialize, Deserialize)]
pub struct ReservationList {
    pub result: Vec<Reservation>,
}

/// Update body. Accepts the original record either nested under
/// `reservation` or flattened alongside the new dates.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdateRequest {
    Nested {
        reservation: Reservation,
        new_start_date: NaiveDate,
        new_end_date: NaiveDate,
    },
    Flat {
        #[serde(flatten)]
        reservation: Reservation,
        new_start_date: NaiveDate,
        new_end_date: NaiveDate,
    },
}

impl UpdateRequest {
    fn into_parts(self) -> (Reservation, NaiveDate, NaiveDate) {
        match self {
            UpdateRequest::Nested {
                reservation,
                new_start_date,
                new_end_date,
            }
            | UpdateRequest::Flat {
                reservation,
                new_start_date,
                new_end_date,
            } => (reservation, new_start_date, new_end_date),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub new_start_date: NaiveDate,
    pub new_end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Record metrics for a finished handler and pass the result through.
fn finish<T>(op: Operation, started: Instant, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let status = match &result {
        Ok(_) => "ok",
        Err(e) if e.status().is_server_error() => "error",
        Err(_) => "rejected",
    };
    observability::record(op, status, started);
    result
}

pub async fn query_by_name(State(state): State<AppState>, Path(name): Path<String>) -> Json<ReservationList> {
    let started = Instant::now();
    let result = state.engine.query_by_name(&name).await;
    observability::record(Operation::QueryByName, "ok", started);
    Json(ReservationList { result })
}

pub async fn query_by_room(State(state): State<AppState>, Path(room_id): Path<RoomId>) -> Json<ReservationList> {
    let started = Instant::now();
    let result = state.engine.query_by_room(room_id).await;
    observability::record(Operation::QueryByRoom, "ok", started);
    Json(ReservationList { result })
}

pub async fn availability(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Query(params): Query<AvailabilityParams>,
) -> Json<AvailabilityResponse> {
    let started = Instant::now();
    let available = state
        .engine
        .is_available(room_id, params.start_date, params.end_date)
        .await;
    observability::record(Operation::Availability, "ok", started);
    Json(AvailabilityResponse { available })
}

pub async fn create(
    State(state): State<AppState>,
    Json(reservation): Json<Reservation>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let result = state.engine.create(reservation).await.map_err(ApiError::from);
    let id = finish(Operation::Create, started, result)?;
    Ok([(RESERVATION_ID_HEADER, id.to_string())])
}

pub async fn update(State(state): State<AppState>, Json(req): Json<UpdateRequest>) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    let (reservation, new_start_date, new_end_date) = req.into_parts();
    let result = state
        .engine
        .update(&reservation, new_start_date, new_end_date)
        .await
        .map_err(ApiError::from);
    log_outcome(finish(Operation::Update, started, result)?);
    Ok(StatusCode::OK)
}

pub async fn cancel(State(state): State<AppState>, Json(reservation): Json<Reservation>) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    let result = state.engine.cancel(&reservation).await.map_err(ApiError::from);
    if finish(Operation::Cancel, started, result)?.is_none() {
        debug!("cancel matched nothing in room {}", reservation.room_id);
    }
    Ok(StatusCode::OK)
}

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<Ulid>) -> Result<Json<Reservation>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .get(id)
        .await
        .ok_or(ApiError(EngineError::NotFound(id)));
    finish(Operation::Get, started, result).map(Json)
}

pub async fn reschedule_by_id(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .reschedule_by_id(id, req.new_start_date, req.new_end_date)
        .await
        .map_err(ApiError::from);
    log_outcome(finish(Operation::RescheduleById, started, result)?);
    Ok(StatusCode::OK)
}

pub async fn cancel_by_id(State(state): State<AppState>, Path(id): Path<Ulid>) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    let result = state.engine.cancel_by_id(id).await.map_err(ApiError::from);
    finish(Operation::CancelById, started, result)?;
    Ok(StatusCode::OK)
}

pub async fn health() -> &'static str {
    "ok"
}

fn log_outcome(outcome: RescheduleOutcome) {
    match outcome {
        RescheduleOutcome::Rescheduled(_) => {}
        RescheduleOutcome::NotFound => debug!("update matched no reservation"),
        RescheduleOutcome::ZeroLengthIgnored => debug!("same-day update accepted without change"),
    }
}
