//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Design-Bid-Build Ledger API",
        version = "0.1.0",
        description = "Project posting, competitive bidding, escrowed milestone release and majority-vote dispute resolution.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Projects
        crate::routes::projects::post_project,
        crate::routes::projects::list_projects,
        crate::routes::projects::get_project,
        crate::routes::projects::submit_bid,
        crate::routes::projects::list_bids,
        crate::routes::projects::select_bid,
        crate::routes::projects::release_milestone,
        crate::routes::projects::raise_dispute,
        crate::routes::projects::list_project_disputes,
        // Disputes
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::vote,
        // Escrow
        crate::routes::escrow::deposit,
        crate::routes::escrow::get_escrow,
        crate::routes::escrow::get_account,
        // Events
        crate::routes::events::list_events,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::projects::PostProjectRequest,
        crate::routes::projects::SubmitBidRequest,
        crate::routes::projects::SelectBidRequest,
        crate::routes::projects::RaiseDisputeRequest,
        crate::routes::projects::ProjectResponse,
        crate::routes::projects::BidResponse,
        crate::routes::projects::ReleaseResponse,
        crate::routes::disputes::VoteRequest,
        crate::routes::disputes::DisputeResponse,
        crate::routes::disputes::VoteResponse,
        crate::routes::escrow::DepositRequest,
        crate::routes::escrow::EscrowResponse,
        crate::routes::escrow::AccountResponse,
        crate::routes::events::EventResponse,
    )),
    tags(
        (name = "projects", description = "Projects, bids, selection and milestone release"),
        (name = "disputes", description = "Dispute voting"),
        (name = "escrow", description = "Pooled escrow balance and payouts"),
        (name = "events", description = "Hash-chained notification feed"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for expected in [
            "/v1/projects",
            "/v1/projects/{id}",
            "/v1/projects/{id}/bids",
            "/v1/projects/{id}/select",
            "/v1/projects/{id}/milestones/{index}/release",
            "/v1/projects/{id}/disputes",
            "/v1/disputes/{id}",
            "/v1/disputes/{id}/votes",
            "/v1/escrow",
            "/v1/escrow/deposits",
            "/v1/accounts/{address}",
            "/v1/events",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing path {expected}"
            );
        }
    }
}
