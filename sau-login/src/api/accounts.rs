//! GET /getValidAccounts

use crate::error::{ApiResponse, ApiResult};
use crate::AppState;
use axum::{extract::State, Json};
use sau_common::db::AccountRecord;

/// All recorded accounts, newest first
pub async fn get_valid_accounts(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<AccountRecord>>>> {
    let accounts = state.accounts.list().await?;
    tracing::debug!(count = accounts.len(), "Listing accounts");
    Ok(ApiResponse::ok(accounts, "Accounts loaded"))
}
