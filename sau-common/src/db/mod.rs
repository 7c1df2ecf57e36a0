//! Database initialization and the account Session Store

pub mod accounts;
pub mod init;

pub use accounts::{AccountRecord, AccountStore, CreateAccountError, STATUS_ACTIVE, STATUS_PENDING};
pub use init::init_database;
