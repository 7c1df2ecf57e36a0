//! Login State Machine
//!
//! One [`LoginMachine`] drives one browser session through
//! `NAVIGATING → LOCATING_QR → QR_READY → POLLING_SCAN → VERIFYING` (the
//! authenticate phase) and then `PERSISTING` (the commit phase). The caller
//! owns the session and the terminal event; the machine only reports
//! progress and returns `Result`s.

use super::probe::{self, ProbeBudget};
use super::state::{LoginError, LoginState, ScanSignal};
use super::{LoginContext, LoginRequest};
use crate::browser::{BrowserError, BrowserResult, BrowserSession, Locator};
use crate::credentials;
use crate::events::EventSender;
use crate::profiles::PlatformProfile;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sau_common::db::{AccountRecord, CreateAccountError};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How the authenticate phase reached `VERIFYING`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPath {
    /// QR code shown and scanned
    Scanned(ScanSignal),
    /// No QR code and no login form: the browser was already logged in
    AlreadyAuthenticated,
}

pub struct LoginMachine<'a> {
    run_id: Uuid,
    ctx: &'a LoginContext,
    request: &'a LoginRequest,
    profile: &'a PlatformProfile,
    events: &'a EventSender,
    state: LoginState,
    trail: Vec<LoginState>,
}

impl<'a> LoginMachine<'a> {
    pub fn new(
        run_id: Uuid,
        ctx: &'a LoginContext,
        request: &'a LoginRequest,
        profile: &'a PlatformProfile,
        events: &'a EventSender,
    ) -> Self {
        Self {
            run_id,
            ctx,
            request,
            profile,
            events,
            state: LoginState::Navigating,
            trail: Vec::new(),
        }
    }

    /// Every state entered so far, in order
    pub fn into_trail(self) -> Vec<LoginState> {
        self.trail
    }

    pub fn transition_to(&mut self, next: LoginState) {
        debug!(
            run_id = %self.run_id,
            account = %self.request.account_name,
            from = %self.state,
            to = %next,
            "Login state transition"
        );
        self.state = next;
        self.trail.push(next);
    }

    async fn settle(&self) {
        if !self.ctx.timings.settle_delay.is_zero() {
            tokio::time::sleep(self.ctx.timings.settle_delay).await;
        }
    }

    async fn open(&self, session: &dyn BrowserSession, url: &str) -> Result<(), LoginError> {
        session
            .navigate(url)
            .await
            .map_err(|source| LoginError::Navigation {
                url: url.to_string(),
                source,
            })?;
        self.settle().await;
        Ok(())
    }

    /// Navigation through verification
    pub async fn authenticate(&mut self, session: &dyn BrowserSession) -> Result<AuthPath, LoginError> {
        let platform = self.request.platform;

        self.transition_to(LoginState::Navigating);
        self.events
            .message(format!("Opening the {} creator login page...", platform));
        self.open(session, &self.profile.login_url).await?;

        self.transition_to(LoginState::LocatingQr);
        self.events.message("Waiting for the QR code to load...");
        let budget = ProbeBudget {
            per_candidate: self.ctx.timings.qr_candidate_timeout,
            overall: self.ctx.timings.qr_probe_budget,
            step: self.ctx.timings.probe_step,
        };
        let located = probe::first_visible(session, &self.profile.qr_locators, budget).await?;

        let path = match located {
            Some(found) => {
                info!(
                    run_id = %self.run_id,
                    locator = %found.locator,
                    "QR code located"
                );
                self.transition_to(LoginState::QrReady);
                let png = session
                    .screenshot(&found.element)
                    .await
                    .map_err(LoginError::QrCapture)?;
                self.events.qr_image(BASE64.encode(png));
                self.events
                    .message(format!("Scan the QR code with the {} app", platform));

                self.transition_to(LoginState::PollingScan);
                let signal = self.wait_for_scan(session).await?;
                info!(run_id = %self.run_id, signal = ?signal, "Scan detected");
                self.events.message(signal.describe());
                AuthPath::Scanned(signal)
            }
            None => {
                if !self.login_prompt_absent(session).await? {
                    return Err(LoginError::QrNotFound);
                }
                info!(run_id = %self.run_id, "No QR code and no login form, checking existing login");
                self.events
                    .message("No QR code shown, the browser seems to be logged in already");
                AuthPath::AlreadyAuthenticated
            }
        };

        self.transition_to(LoginState::Verifying);
        self.events.message("Verifying login...");
        self.open(session, &self.profile.verify_url).await?;
        let url = session.current_url().await?;
        if !self.profile.is_logged_in_url(&url) {
            return Err(LoginError::Verification(url));
        }

        Ok(path)
    }

    /// Poll the post-login signals until one holds or the scan deadline passes
    async fn wait_for_scan(&self, session: &dyn BrowserSession) -> Result<ScanSignal, LoginError> {
        let timings = &self.ctx.timings;
        let started = Instant::now();
        let deadline = started + timings.scan_timeout;
        let mut next_heartbeat = started + timings.heartbeat_interval;

        loop {
            match self.check_signals(session).await {
                Ok(Some(signal)) => return Ok(signal),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(LoginError::Browser(e)),
                Err(e) => warn!(run_id = %self.run_id, "Scan check failed: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LoginError::ScanTimeout(timings.scan_timeout.as_secs()));
            }
            if now >= next_heartbeat {
                let waited = now.duration_since(started).as_secs();
                self.events
                    .message(format!("Waited {} seconds, please scan the QR code", waited));
                next_heartbeat += timings.heartbeat_interval;
            }

            tokio::time::sleep(timings.poll_interval).await;
        }
    }

    /// Evaluate the post-login signals in order; the first that holds wins
    async fn check_signals(&self, session: &dyn BrowserSession) -> BrowserResult<Option<ScanSignal>> {
        let url = session.current_url().await?;
        if self.profile.is_logged_in_url(&url) {
            return Ok(Some(ScanSignal::Url(url)));
        }

        let title = session.title().await?;
        if self.profile.logged_in_title(&title).is_some() {
            return Ok(Some(ScanSignal::Title(title)));
        }

        for locator in &self.profile.logged_in_locators {
            if count_or_zero(session, locator).await? > 0 {
                return Ok(Some(ScanSignal::LoggedInElement(locator.clone())));
            }
        }

        if self.login_prompt_absent(session).await? {
            return Ok(Some(ScanSignal::LoginPromptGone));
        }

        Ok(None)
    }

    /// True only if there are login-form locators and none of them matches
    async fn login_prompt_absent(&self, session: &dyn BrowserSession) -> BrowserResult<bool> {
        if self.profile.login_prompt_locators.is_empty() {
            return Ok(false);
        }
        for locator in &self.profile.login_prompt_locators {
            if count_or_zero(session, locator).await? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Credential write and account insert
    pub async fn commit(&mut self, session: &dyn BrowserSession) -> Result<AccountRecord, LoginError> {
        let account = &self.request.account_name;
        let platform = self.request.platform;

        self.transition_to(LoginState::Persisting);
        self.events.message("Saving login state...");

        let state = session
            .storage_state()
            .await
            .map_err(LoginError::StorageExport)?;
        let relative = platform.credential_file_path(account);
        let path = self.ctx.root.resolve(&relative);
        credentials::write_storage_state(&path, &state).await?;
        info!(
            run_id = %self.run_id,
            account = %account,
            path = %path.display(),
            cookies = state.cookies.len(),
            "Credential file saved"
        );

        match self.ctx.store.create(account, platform).await {
            Ok(record) => Ok(record),
            Err(CreateAccountError::AlreadyExists(name)) => Err(LoginError::AlreadyExists(name)),
            Err(CreateAccountError::Storage(e)) => Err(LoginError::Storage(e.to_string())),
        }
    }
}

async fn count_or_zero(
    session: &dyn BrowserSession,
    locator: &Locator,
) -> Result<usize, BrowserError> {
    match session.count(locator).await {
        Ok(n) => Ok(n),
        Err(e) if e.is_not_found() => Ok(0),
        Err(e) => Err(e),
    }
}
