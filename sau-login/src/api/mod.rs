//! HTTP API handlers

pub mod accounts;
pub mod health;
pub mod login;

pub use accounts::get_valid_accounts;
pub use health::health_routes;
pub use login::login_stream;
