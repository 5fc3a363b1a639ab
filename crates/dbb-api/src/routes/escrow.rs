//! # Escrow API Routes
//!
//! Deposits into the pooled escrow balance and balance queries. Account
//! balances reflect what milestone releases have paid out through the
//! in-process [`dbb_ledger::AccountBook`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dbb_core::{Address, Amount};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Request to fund the pool.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Amount in smallest units. Must be non-zero.
    #[schema(value_type = String, example = "1000")]
    pub amount: Amount,
}

/// Pool balance.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowResponse {
    pub balance: String,
}

/// Balance credited to one recipient.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub address: String,
    pub balance: String,
}

/// Build the escrow router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/escrow", get(get_escrow))
        .route("/v1/escrow/deposits", post(deposit))
        .route("/v1/accounts/:address", get(get_account))
}

/// POST /v1/escrow/deposits — Add funds to the pool.
#[utoipa::path(
    post,
    path = "/v1/escrow/deposits",
    request_body = DepositRequest,
    responses(
        (status = 201, description = "Deposit accepted", body = EscrowResponse),
        (status = 422, description = "Zero amount"),
    ),
    tag = "escrow"
)]
async fn deposit(
    State(state): State<AppState>,
    Caller(from): Caller,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EscrowResponse>), AppError> {
    let req = extract_json(body)?;
    let balance = state.ledger.deposit(&from, req.amount)?;
    Ok((
        StatusCode::CREATED,
        Json(EscrowResponse {
            balance: balance.to_string(),
        }),
    ))
}

/// GET /v1/escrow — Current pool balance.
#[utoipa::path(
    get,
    path = "/v1/escrow",
    responses((status = 200, description = "Pool balance", body = EscrowResponse)),
    tag = "escrow"
)]
async fn get_escrow(State(state): State<AppState>) -> Json<EscrowResponse> {
    Json(EscrowResponse {
        balance: state.ledger.escrow_balance().to_string(),
    })
}

/// GET /v1/accounts/:address — Amount paid out to an address.
#[utoipa::path(
    get,
    path = "/v1/accounts/{address}",
    params(("address" = String, Path, description = "Recipient address")),
    responses(
        (status = 200, description = "Balance", body = AccountResponse),
        (status = 400, description = "Malformed address"),
    ),
    tag = "escrow"
)]
async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let address = Address::new(address)
        .map_err(|e| AppError::BadRequest(format!("invalid address: {e}")))?;
    Ok(Json(AccountResponse {
        balance: state.accounts.balance_of(&address).to_string(),
        address: address.to_string(),
    }))
}
