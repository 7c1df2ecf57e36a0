//! sau-login library - QR-code login service
//!
//! Drives a browser through a creator platform's QR login, streams the QR
//! code and progress to the caller as server-sent events, then saves the
//! browser's credential state and records the account.

use axum::Router;
use chrono::{DateTime, Utc};
use sau_common::db::AccountStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod browser;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod login;
pub mod profiles;
pub mod registry;

use login::LoginContext;
use registry::ActiveLogins;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session Store (account table)
    pub accounts: AccountStore,
    /// Dependencies handed to every login run
    pub login: Arc<LoginContext>,
    /// Runs in flight, keyed by account name
    pub active_logins: ActiveLogins,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(accounts: AccountStore, login: LoginContext) -> Self {
        Self {
            accounts,
            login: Arc::new(login),
            active_logins: ActiveLogins::new(),
            started_at: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/login", get(api::login_stream))
        .route("/getValidAccounts", get(api::get_valid_accounts))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
