//! # Project API Routes
//!
//! Posting projects, bidding, selection, milestone release and raising
//! disputes. The acting address comes from the [`Caller`] extractor; the
//! ledger decides whether that address may act.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dbb_core::{Amount, ProjectId};
use dbb_state::{Bid, Project};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::disputes::DisputeResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to post a project.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PostProjectRequest {
    #[serde(default)]
    pub description: String,
    /// Declared budget in smallest units (integer or decimal string).
    #[schema(value_type = String, example = "600")]
    pub budget: Amount,
    /// Deadline as Unix seconds. Not enforced.
    #[serde(default)]
    pub deadline: u64,
    /// Milestone payment amounts, in order. Must not be empty.
    #[schema(value_type = Vec<String>)]
    pub milestones: Vec<Amount>,
}

/// Request to bid on a project.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitBidRequest {
    #[schema(value_type = String, example = "590")]
    pub bid_amount: Amount,
    /// Proposed completion time. Metadata only.
    #[serde(default)]
    pub completion_time: u64,
    /// One amount per project milestone.
    #[schema(value_type = Vec<String>)]
    pub proposed_milestones: Vec<Amount>,
}

/// Request to select a bid.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectBidRequest {
    pub bid_index: usize,
}

/// Request to open a dispute.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RaiseDisputeRequest {
    #[serde(default)]
    pub reason: String,
}

/// Project view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: u64,
    pub owner: String,
    pub description: String,
    pub budget: String,
    pub deadline: u64,
    pub created_at: String,
    /// True while bidding is open.
    pub active: bool,
    pub bidding_phase: String,
    pub dispute_status: String,
    pub selected_bidder: Option<String>,
    pub selected_bid_index: usize,
    pub milestones: Vec<String>,
    pub milestone_paid: Vec<bool>,
    /// Sum of the milestones paid so far.
    pub paid_total: Option<String>,
    /// True once every milestone is paid. The project stays listed.
    pub fully_paid: bool,
    pub dispute_raised: bool,
}

impl From<&Project> for ProjectResponse {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id.get(),
            owner: p.owner.to_string(),
            description: p.description.clone(),
            budget: p.budget.to_string(),
            deadline: p.deadline,
            created_at: p.created_at.to_iso8601(),
            active: p.is_active(),
            bidding_phase: p.bidding_phase().as_str().to_string(),
            dispute_status: p.dispute_status().as_str().to_string(),
            selected_bidder: p.selected_bidder().map(|a| a.to_string()),
            selected_bid_index: p.selected_bid_index(),
            milestones: p.milestones().iter().map(|m| m.to_string()).collect(),
            milestone_paid: p.milestone_paid().to_vec(),
            paid_total: p.paid_total().map(|a| a.to_string()),
            fully_paid: p.all_milestones_paid(),
            dispute_raised: p.dispute_raised(),
        }
    }
}

/// Bid view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BidResponse {
    pub id: u64,
    pub project_id: u64,
    pub index: usize,
    pub bidder: String,
    pub bid_amount: String,
    pub completion_time: u64,
    pub proposed_milestones: Vec<String>,
    pub selected: bool,
    pub submitted_at: String,
}

impl From<&Bid> for BidResponse {
    fn from(b: &Bid) -> Self {
        Self {
            id: b.id.get(),
            project_id: b.project_id.get(),
            index: b.index,
            bidder: b.bidder.to_string(),
            bid_amount: b.bid_amount.to_string(),
            completion_time: b.completion_time,
            proposed_milestones: b.proposed_milestones.iter().map(|m| m.to_string()).collect(),
            selected: b.selected,
            submitted_at: b.submitted_at.to_iso8601(),
        }
    }
}

/// Result of a milestone release.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReleaseResponse {
    pub project_id: u64,
    pub milestone_index: usize,
    pub recipient: String,
    pub amount: String,
    /// Pool balance after the release.
    pub escrow_balance: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the projects router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/projects", post(post_project).get(list_projects))
        .route("/v1/projects/:id", get(get_project))
        .route("/v1/projects/:id/bids", post(submit_bid).get(list_bids))
        .route("/v1/projects/:id/select", post(select_bid))
        .route(
            "/v1/projects/:id/milestones/:index/release",
            post(release_milestone),
        )
        .route(
            "/v1/projects/:id/disputes",
            post(raise_dispute).get(list_project_disputes),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/projects — Post a project open for bidding.
#[utoipa::path(
    post,
    path = "/v1/projects",
    request_body = PostProjectRequest,
    responses(
        (status = 201, description = "Project posted", body = ProjectResponse),
        (status = 400, description = "Missing caller or malformed body"),
        (status = 422, description = "Empty milestone list"),
    ),
    tag = "projects"
)]
async fn post_project(
    State(state): State<AppState>,
    Caller(owner): Caller,
    body: Result<Json<PostProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let req = extract_json(body)?;
    let id = state
        .ledger
        .post_project(owner, req.description, req.budget, req.deadline, req.milestones)?;
    let project = state.ledger.project(id)?;
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(&project))))
}

/// GET /v1/projects — List all projects.
#[utoipa::path(
    get,
    path = "/v1/projects",
    responses((status = 200, description = "All projects", body = Vec<ProjectResponse>)),
    tag = "projects"
)]
async fn list_projects(State(state): State<AppState>) -> Json<Vec<ProjectResponse>> {
    let projects = state.ledger.projects();
    Json(projects.iter().map(ProjectResponse::from).collect())
}

/// GET /v1/projects/:id — Fetch one project.
#[utoipa::path(
    get,
    path = "/v1/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 404, description = "No such project"),
    ),
    tag = "projects"
)]
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = state.ledger.project(ProjectId::new(id))?;
    Ok(Json(ProjectResponse::from(&project)))
}

/// POST /v1/projects/:id/bids — Bid on an open project.
#[utoipa::path(
    post,
    path = "/v1/projects/{id}/bids",
    params(("id" = u64, Path, description = "Project id")),
    request_body = SubmitBidRequest,
    responses(
        (status = 201, description = "Bid recorded", body = BidResponse),
        (status = 404, description = "No such project"),
        (status = 409, description = "Bidding is closed"),
        (status = 422, description = "Milestone count mismatch"),
    ),
    tag = "projects"
)]
async fn submit_bid(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Caller(bidder): Caller,
    body: Result<Json<SubmitBidRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BidResponse>), AppError> {
    let req = extract_json(body)?;
    let project_id = ProjectId::new(id);
    let index = state.ledger.submit_bid(
        &bidder,
        project_id,
        req.bid_amount,
        req.completion_time,
        req.proposed_milestones,
    )?;
    let bid = state.ledger.bid(project_id, index)?;
    Ok((StatusCode::CREATED, Json(BidResponse::from(&bid))))
}

/// GET /v1/projects/:id/bids — List a project's bids in submission order.
#[utoipa::path(
    get,
    path = "/v1/projects/{id}/bids",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Bids", body = Vec<BidResponse>),
        (status = 404, description = "No such project"),
    ),
    tag = "projects"
)]
async fn list_bids(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<BidResponse>>, AppError> {
    let bids = state.ledger.bids(ProjectId::new(id))?;
    Ok(Json(bids.iter().map(BidResponse::from).collect()))
}

/// POST /v1/projects/:id/select — Owner selects a bid; bidding closes.
#[utoipa::path(
    post,
    path = "/v1/projects/{id}/select",
    params(("id" = u64, Path, description = "Project id")),
    request_body = SelectBidRequest,
    responses(
        (status = 200, description = "Bid selected", body = ProjectResponse),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "No such project or bid"),
        (status = 409, description = "A dispute is open"),
    ),
    tag = "projects"
)]
async fn select_bid(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Caller(caller): Caller,
    body: Result<Json<SelectBidRequest>, JsonRejection>,
) -> Result<Json<ProjectResponse>, AppError> {
    let req = extract_json(body)?;
    let project_id = ProjectId::new(id);
    state.ledger.select_bid(&caller, project_id, req.bid_index)?;
    let project = state.ledger.project(project_id)?;
    Ok(Json(ProjectResponse::from(&project)))
}

/// POST /v1/projects/:id/milestones/:index/release — Pay one milestone.
#[utoipa::path(
    post,
    path = "/v1/projects/{id}/milestones/{index}/release",
    params(
        ("id" = u64, Path, description = "Project id"),
        ("index" = usize, Path, description = "Milestone index"),
    ),
    responses(
        (status = 200, description = "Milestone paid", body = ReleaseResponse),
        (status = 403, description = "Caller is not the owner"),
        (status = 409, description = "A dispute is open"),
        (status = 422, description = "No selected bidder, bad index or already paid"),
        (status = 502, description = "Transfer failed; nothing changed"),
    ),
    tag = "projects"
)]
async fn release_milestone(
    State(state): State<AppState>,
    Path((id, index)): Path<(u64, usize)>,
    Caller(caller): Caller,
) -> Result<Json<ReleaseResponse>, AppError> {
    let project_id = ProjectId::new(id);
    let amount = state
        .ledger
        .release_milestone_payment(&caller, project_id, index)?;
    let project = state.ledger.project(project_id)?;
    let recipient = project
        .selected_bidder()
        .map(|a| a.to_string())
        .ok_or_else(|| AppError::Internal(format!("{project_id} paid without a selected bidder")))?;
    Ok(Json(ReleaseResponse {
        project_id: id,
        milestone_index: index,
        recipient,
        amount: amount.to_string(),
        escrow_balance: state.ledger.escrow_balance().to_string(),
    }))
}

/// POST /v1/projects/:id/disputes — Open a dispute on a project.
#[utoipa::path(
    post,
    path = "/v1/projects/{id}/disputes",
    params(("id" = u64, Path, description = "Project id")),
    request_body = RaiseDisputeRequest,
    responses(
        (status = 201, description = "Dispute opened", body = DisputeResponse),
        (status = 403, description = "Caller may not raise a dispute"),
        (status = 404, description = "No such project"),
        (status = 409, description = "A dispute is already open"),
    ),
    tag = "projects"
)]
async fn raise_dispute(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Caller(caller): Caller,
    body: Result<Json<RaiseDisputeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DisputeResponse>), AppError> {
    let req = extract_json(body)?;
    let dispute_id = state
        .ledger
        .raise_dispute(&caller, ProjectId::new(id), req.reason)?;
    let dispute = state.ledger.dispute(dispute_id)?;
    Ok((StatusCode::CREATED, Json(DisputeResponse::from(&dispute))))
}

/// GET /v1/projects/:id/disputes — Every dispute ever raised on a project.
#[utoipa::path(
    get,
    path = "/v1/projects/{id}/disputes",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Disputes", body = Vec<DisputeResponse>),
        (status = 404, description = "No such project"),
    ),
    tag = "projects"
)]
async fn list_project_disputes(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<DisputeResponse>>, AppError> {
    let disputes = state.ledger.disputes_for_project(ProjectId::new(id))?;
    Ok(Json(disputes.iter().map(DisputeResponse::from).collect()))
}
