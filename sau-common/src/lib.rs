//! # SAU Common Library
//!
//! Shared code for the SAU (social auto upload) services:
//! - Error type shared by storage and configuration code
//! - Root folder and TOML configuration resolution
//! - Supported short-video platforms
//! - SQLite initialization and the account Session Store

pub mod config;
pub mod db;
pub mod error;
pub mod platform;

pub use error::{Error, Result};
pub use platform::PlatformType;
