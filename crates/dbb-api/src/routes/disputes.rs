//! # Dispute API Routes
//!
//! Querying disputes and casting votes. Any address may vote once per
//! dispute; the first vote that gives one side a strict lead resolves it.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use dbb_core::DisputeId;
use dbb_state::{Dispute, VoteOutcome};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// A single vote.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// `true` upholds the dispute, `false` rejects it.
    pub vote: bool,
}

/// Dispute view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputeResponse {
    pub id: u64,
    pub project_id: u64,
    pub disputant: String,
    pub reason: String,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub voters: Vec<String>,
    pub resolved: bool,
    /// Present once resolved: `true` if upheld.
    pub result: Option<bool>,
    pub raised_at: String,
}

impl From<&Dispute> for DisputeResponse {
    fn from(d: &Dispute) -> Self {
        Self {
            id: d.id.get(),
            project_id: d.project_id.get(),
            disputant: d.disputant.to_string(),
            reason: d.reason.clone(),
            yes_votes: d.yes_votes,
            no_votes: d.no_votes,
            voters: d.voters.iter().map(|v| v.to_string()).collect(),
            resolved: d.resolved,
            result: d.outcome.map(|o| o.as_bool()),
            raised_at: d.raised_at.to_iso8601(),
        }
    }
}

/// Result of casting a vote.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoteResponse {
    pub dispute_id: u64,
    pub voter: String,
    pub yes_votes: u64,
    pub no_votes: u64,
    /// Whether this vote resolved the dispute.
    pub resolved: bool,
    /// Present when `resolved`: `true` if upheld.
    pub result: Option<bool>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the disputes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes/:id", get(get_dispute))
        .route("/v1/disputes/:id/votes", post(vote))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /v1/disputes/:id — Fetch one dispute with its tally.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}",
    params(("id" = u64, Path, description = "Dispute id")),
    responses(
        (status = 200, description = "Dispute", body = DisputeResponse),
        (status = 404, description = "No such dispute"),
    ),
    tag = "disputes"
)]
async fn get_dispute(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DisputeResponse>, AppError> {
    let dispute = state.ledger.dispute(DisputeId::new(id))?;
    Ok(Json(DisputeResponse::from(&dispute)))
}

/// POST /v1/disputes/:id/votes — Cast the caller's vote.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/votes",
    params(("id" = u64, Path, description = "Dispute id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 404, description = "No such dispute"),
        (status = 409, description = "Dispute already resolved"),
        (status = 422, description = "Caller already voted"),
    ),
    tag = "disputes"
)]
async fn vote(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Caller(voter): Caller,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, AppError> {
    let req = extract_json(body)?;
    let outcome = state
        .ledger
        .vote_on_dispute(&voter, DisputeId::new(id), req.vote)?;
    let tally = outcome.tally();
    let result = match outcome {
        VoteOutcome::Pending(_) => None,
        VoteOutcome::Resolved(o, _) => Some(o.as_bool()),
    };
    Ok(Json(VoteResponse {
        dispute_id: id,
        voter: voter.to_string(),
        yes_votes: tally.yes,
        no_votes: tally.no,
        resolved: result.is_some(),
        result,
    }))
}
