//! QR-code login runs
//!
//! A run opens one browser, walks the [`machine::LoginMachine`] through the
//! platform's login flow and reports progress on an [`crate::events`]
//! channel. See [`run::run_login`] for the lifecycle guarantees.

pub mod machine;
pub mod probe;
pub mod run;
pub mod state;
pub mod store;

use crate::browser::BrowserLauncher;
use crate::profiles::PlatformProfiles;
use sau_common::config::RootFolder;
use sau_common::PlatformType;
use std::sync::Arc;
use std::time::Duration;

pub use machine::{AuthPath, LoginMachine};
pub use run::{run_login, validate_credentials, LoginReport};
pub use state::{LoginError, LoginState, ScanSignal};
pub use store::SessionStore;

/// Timing knobs of a login run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTimings {
    /// Wait after each navigation for late scripts to render
    pub settle_delay: Duration,
    /// How long one QR candidate is retried
    pub qr_candidate_timeout: Duration,
    /// Bound on the whole QR probe
    pub qr_probe_budget: Duration,
    pub probe_step: Duration,
    pub poll_interval: Duration,
    /// How long the user has to scan
    pub scan_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Bound on navigation through verification
    pub run_deadline: Duration,
}

impl Default for LoginTimings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            qr_candidate_timeout: Duration::from_secs(3),
            qr_probe_budget: Duration::from_secs(30),
            probe_step: Duration::from_millis(250),
            poll_interval: Duration::from_secs(1),
            scan_timeout: Duration::from_secs(180),
            heartbeat_interval: Duration::from_secs(10),
            run_deadline: Duration::from_secs(300),
        }
    }
}

/// One login attempt for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub account_name: String,
    pub platform: PlatformType,
}

/// Everything a run needs besides its request and channel
#[derive(Clone)]
pub struct LoginContext {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub store: Arc<dyn SessionStore>,
    pub root: RootFolder,
    pub profiles: PlatformProfiles,
    pub timings: LoginTimings,
}
