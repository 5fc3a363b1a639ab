//! # Event Feed
//!
//! The hash-chained notification log, for indexers and UIs that poll.
//! `?since=N` returns records with a sequence number greater than `N`.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use dbb_core::EventRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

/// Query parameters for the feed.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Return records after this sequence number.
    #[serde(default)]
    pub since: u64,
}

/// One notification.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    pub sequence: u64,
    pub emitted_at: String,
    /// Notification name, e.g. `milestone_paid`.
    pub event_type: String,
    /// The notification's fields, tagged with `type`.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub event_digest: String,
    pub chain_digest: String,
}

impl TryFrom<&EventRecord> for EventResponse {
    type Error = AppError;

    fn try_from(r: &EventRecord) -> Result<Self, Self::Error> {
        let payload = serde_json::to_value(&r.event)
            .map_err(|e| AppError::Internal(format!("event {} payload: {e}", r.sequence)))?;
        Ok(Self {
            sequence: r.sequence,
            emitted_at: r.emitted_at.to_iso8601(),
            event_type: r.event.name().to_string(),
            payload,
            event_digest: r.event_digest.to_hex(),
            chain_digest: r.chain_digest.to_hex(),
        })
    }
}

/// Build the events router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", get(list_events))
}

/// GET /v1/events — Notifications, oldest first.
#[utoipa::path(
    get,
    path = "/v1/events",
    params(EventsQuery),
    responses((status = 200, description = "Notifications", body = Vec<EventResponse>)),
    tag = "events"
)]
async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let query = extract_query(query)?;
    let records = state.ledger.events_since(query.since);
    let events = records
        .iter()
        .map(EventResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(events))
}
