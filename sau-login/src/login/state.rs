//! Login run states, scan signals and errors

use crate::browser::{BrowserError, Locator};
use crate::credentials::CredentialError;
use crate::events::OutcomeKind;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Login state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginState {
    Navigating,
    LocatingQr,
    QrReady,
    PollingScan,
    Verifying,
    Persisting,
    Succeeded,
    Failed,
}

impl LoginState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoginState::Succeeded | LoginState::Failed)
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginState::Navigating => "NAVIGATING",
            LoginState::LocatingQr => "LOCATING_QR",
            LoginState::QrReady => "QR_READY",
            LoginState::PollingScan => "POLLING_SCAN",
            LoginState::Verifying => "VERIFYING",
            LoginState::Persisting => "PERSISTING",
            LoginState::Succeeded => "DONE(success)",
            LoginState::Failed => "DONE(failure)",
        };
        f.write_str(name)
    }
}

/// Which post-login signal ended the scan wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSignal {
    Url(String),
    Title(String),
    LoggedInElement(Locator),
    LoginPromptGone,
}

impl ScanSignal {
    pub fn describe(&self) -> String {
        match self {
            ScanSignal::Url(url) => format!("Login detected, page moved to {}", url),
            ScanSignal::Title(title) => format!("Login detected, page title is now \"{}\"", title),
            ScanSignal::LoggedInElement(locator) => {
                format!("Login detected, found logged-in element {}", locator)
            }
            ScanSignal::LoginPromptGone => "Login detected, the login form is gone".to_string(),
        }
    }
}

/// Why a login run did not succeed
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Could not start the browser: {0}")]
    Launch(#[source] BrowserError),

    #[error("Could not open {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("No QR code found on the login page")]
    QrNotFound,

    #[error("Could not capture the QR code: {0}")]
    QrCapture(#[source] BrowserError),

    #[error("QR code was not scanned within {0} seconds")]
    ScanTimeout(u64),

    #[error("Login could not be verified, ended up on {0}")]
    Verification(String),

    #[error("Could not read browser login state: {0}")]
    StorageExport(#[source] BrowserError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("Account {0} already exists")]
    AlreadyExists(String),

    #[error("Could not record the account: {0}")]
    Storage(String),

    #[error("Login was cancelled")]
    Cancelled,

    #[error("Login did not finish within {0} seconds")]
    DeadlineExceeded(u64),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoginError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            LoginError::Launch(_) => OutcomeKind::Launch,
            LoginError::Navigation { .. } => OutcomeKind::Navigation,
            LoginError::QrNotFound => OutcomeKind::QrNotFound,
            LoginError::QrCapture(_) => OutcomeKind::QrCapture,
            LoginError::ScanTimeout(_) => OutcomeKind::ScanTimeout,
            LoginError::Verification(_) => OutcomeKind::Verification,
            LoginError::StorageExport(_) | LoginError::Credentials(_) => OutcomeKind::Persistence,
            LoginError::AlreadyExists(_) => OutcomeKind::AlreadyExists,
            LoginError::Storage(_) => OutcomeKind::Storage,
            LoginError::Cancelled | LoginError::DeadlineExceeded(_) => OutcomeKind::Cancelled,
            LoginError::Browser(_) => OutcomeKind::Browser,
            LoginError::Internal(_) => OutcomeKind::Internal,
        }
    }
}
