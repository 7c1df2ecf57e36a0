//! Run lifecycle around the state machine
//!
//! Guarantees, for every run that got a browser:
//! - the session is closed exactly once, whatever happened;
//! - the authenticate phase stops on cancellation or when the run deadline
//!   passes, the commit phase always runs to completion;
//! - a panic inside either phase becomes an `internal` outcome;
//! - the event channel ends with exactly one terminal event;
//! - the run's registry entry is released before that terminal event.

use super::machine::{AuthPath, LoginMachine};
use super::state::{LoginError, LoginState};
use super::{LoginContext, LoginRequest};
use crate::browser::BrowserSession;
use crate::credentials;
use crate::events::{EventSender, Outcome, OutcomeKind};
use crate::profiles::PlatformProfile;
use crate::registry::RunGuard;
use futures::FutureExt;
use sau_common::db::AccountRecord;
use sau_common::PlatformType;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What happened in one run
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub run_id: Uuid,
    pub outcome: Outcome,
    /// States entered, in order, ending in a terminal state
    pub states: Vec<LoginState>,
    pub auth_path: Option<AuthPath>,
    pub account: Option<AccountRecord>,
    pub elapsed: Duration,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("login run panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("login run panicked: {}", s)
    } else {
        "login run panicked".to_string()
    }
}

/// Execute one login run to completion
///
/// Always consumes `events` by emitting its terminal event. `registration`
/// is dropped first, so a client reacting to the terminal code can start a
/// new run for the same account right away.
pub async fn run_login(
    ctx: &LoginContext,
    request: LoginRequest,
    events: EventSender,
    cancel: CancellationToken,
    registration: Option<RunGuard>,
) -> LoginReport {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    let profile = ctx.profiles.get(request.platform);

    info!(
        run_id = %run_id,
        account = %request.account_name,
        platform = %request.platform,
        "Login run started"
    );

    events.message(format!("Starting browser for {} login...", request.platform));
    let session = match ctx.launcher.launch(None).await {
        Ok(session) => session,
        Err(e) => {
            let states = vec![LoginState::Failed];
            drop(registration);
            return conclude(run_id, &request, events, Err(LoginError::Launch(e)), states, None, started);
        }
    };

    let mut machine = LoginMachine::new(run_id, ctx, &request, &profile, &events);
    let deadline = started + ctx.timings.run_deadline;
    let deadline_secs = ctx.timings.run_deadline.as_secs();

    let authenticated = AssertUnwindSafe(async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LoginError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(LoginError::DeadlineExceeded(deadline_secs)),
            result = machine.authenticate(&*session) => result,
        }
    })
    .catch_unwind()
    .await
    .unwrap_or_else(|panic| Err(LoginError::Internal(panic_message(panic))));

    let (result, auth_path) = match authenticated {
        Ok(path) => {
            let committed = AssertUnwindSafe(machine.commit(&*session))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(LoginError::Internal(panic_message(panic))));
            (committed, Some(path))
        }
        Err(e) => (Err(e), None),
    };

    machine.transition_to(if result.is_ok() {
        LoginState::Succeeded
    } else {
        LoginState::Failed
    });
    let states = machine.into_trail();

    session.close().await;
    drop(registration);

    conclude(run_id, &request, events, result, states, auth_path, started)
}

fn conclude(
    run_id: Uuid,
    request: &LoginRequest,
    events: EventSender,
    result: Result<AccountRecord, LoginError>,
    states: Vec<LoginState>,
    auth_path: Option<AuthPath>,
    started: Instant,
) -> LoginReport {
    let elapsed = started.elapsed();
    let (outcome, account) = match result {
        Ok(record) => {
            info!(
                run_id = %run_id,
                account = %record.account_name,
                id = record.id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Login run succeeded"
            );
            let message = format!(
                "{} account {} logged in and saved",
                request.platform, request.account_name
            );
            (Outcome::new(OutcomeKind::Success, message), Some(record))
        }
        Err(LoginError::AlreadyExists(name)) => {
            warn!(run_id = %run_id, account = %name, "Login succeeded for an already registered account");
            let message = format!(
                "Login succeeded, but account {} already exists; its credential file was refreshed",
                name
            );
            (Outcome::new(OutcomeKind::AlreadyExists, message), None)
        }
        Err(e) => {
            let kind = e.kind();
            match kind {
                OutcomeKind::Internal => error!(run_id = %run_id, account = %request.account_name, "Login run failed: {}", e),
                _ => warn!(run_id = %run_id, account = %request.account_name, kind = ?kind, "Login run failed: {}", e),
            }
            (Outcome::new(kind, e.to_string()), None)
        }
    };

    events.message(outcome.message.clone());
    events.finish(outcome.clone());

    LoginReport {
        run_id,
        outcome,
        states,
        auth_path,
        account,
        elapsed,
    }
}

/// Check whether a saved credential file still logs the account in
///
/// Opens a browser seeded with the file's storage state, loads the
/// platform's logged-in-only page and tests the URL signal.
pub async fn validate_credentials(
    ctx: &LoginContext,
    account_name: &str,
    platform: PlatformType,
) -> Result<bool, LoginError> {
    let profile = ctx.profiles.get(platform);
    let path = ctx.root.resolve(&platform.credential_file_path(account_name));
    let state = credentials::read_storage_state(&path).await?;

    let session = ctx
        .launcher
        .launch(Some(&state))
        .await
        .map_err(LoginError::Launch)?;

    let checked = AssertUnwindSafe(lands_logged_in(&*session, &profile, ctx.timings.settle_delay))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(LoginError::Internal(panic_message(panic))));

    session.close().await;

    let valid = checked?;
    info!(account = %account_name, platform = %platform, valid, "Credential check finished");
    Ok(valid)
}

async fn lands_logged_in(
    session: &dyn BrowserSession,
    profile: &PlatformProfile,
    settle: Duration,
) -> Result<bool, LoginError> {
    session
        .navigate(&profile.verify_url)
        .await
        .map_err(|source| LoginError::Navigation {
            url: profile.verify_url.clone(),
            source,
        })?;
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    let url = session.current_url().await?;
    Ok(profile.is_logged_in_url(&url))
}
