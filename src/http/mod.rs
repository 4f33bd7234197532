//! HTTP boundary: maps routes onto [`Engine`] operations.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{AvailabilityResponse, RESERVATION_ID_HEADER, ReservationList};

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::engine::Engine;
use crate::limits::MAX_BODY_BYTES;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/reservation", post(handlers::create))
        .route("/reservation/by-name/:name", get(handlers::query_by_name))
        .route("/reservation/by-room/:room_id", get(handlers::query_by_room))
        .route("/reservation/availability/:room_id", get(handlers::availability))
        .route("/reservation/update", put(handlers::update))
        .route("/reservation/delete", delete(handlers::cancel))
        .route(
            "/reservation/id/:id",
            get(handlers::get_by_id)
                .put(handlers::reschedule_by_id)
                .delete(handlers::cancel_by_id),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(AppState { engine })
}
