//! Test Helper Utilities
//!
//! Shared utilities for testing sau-login
#![allow(dead_code)]

pub mod fake_browser;
pub mod memory_store;

pub use fake_browser::{FakeLauncher, Script};
pub use memory_store::MemoryStore;

use sau_common::config::RootFolder;
use sau_common::PlatformType;
use sau_login::events::{self, Outcome, ProgressEvent};
use sau_login::login::{run_login, LoginContext, LoginReport, LoginRequest, LoginTimings, SessionStore};
use sau_login::profiles::PlatformProfiles;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timings with no settle delay and a short QR probe
pub fn test_timings() -> LoginTimings {
    LoginTimings {
        settle_delay: Duration::ZERO,
        qr_candidate_timeout: Duration::from_secs(1),
        qr_probe_budget: Duration::from_secs(5),
        probe_step: Duration::from_millis(250),
        poll_interval: Duration::from_secs(1),
        scan_timeout: Duration::from_secs(180),
        heartbeat_interval: Duration::from_secs(10),
        run_deadline: Duration::from_secs(600),
    }
}

/// Context wired to the fake site for every platform
pub fn login_context(
    root: &Path,
    launcher: Arc<FakeLauncher>,
    store: Arc<dyn SessionStore>,
) -> LoginContext {
    LoginContext {
        launcher,
        store,
        root: RootFolder::new(root.to_path_buf()),
        profiles: PlatformProfiles::with_overrides(
            PlatformType::ALL.map(fake_browser::test_profile),
        ),
        timings: test_timings(),
    }
}

pub fn douyin_request(account: &str) -> LoginRequest {
    LoginRequest {
        account_name: account.to_string(),
        platform: PlatformType::Douyin,
    }
}

/// Run to completion and drain the channel
pub async fn run_to_end(
    ctx: &LoginContext,
    request: LoginRequest,
) -> (LoginReport, Vec<ProgressEvent>) {
    run_with_token(ctx, request, CancellationToken::new()).await
}

pub async fn run_with_token(
    ctx: &LoginContext,
    request: LoginRequest,
    cancel: CancellationToken,
) -> (LoginReport, Vec<ProgressEvent>) {
    let (sender, receiver) = events::channel();
    let report = run_login(ctx, request, sender, cancel, None).await;
    (report, receiver.collect().await)
}

/// Exactly one terminal event, and it is the last one
pub fn single_terminal(events: &[ProgressEvent]) -> Outcome {
    let terminals: Vec<&ProgressEvent> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminals.len(), 1, "expected exactly one terminal in {:?}", events);
    match events.last() {
        Some(ProgressEvent::Terminal(outcome)) => outcome.clone(),
        other => panic!("last event is not terminal: {:?}", other),
    }
}

pub fn messages(events: &[ProgressEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Message(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn qr_images(events: &[ProgressEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::QrImage(_)))
        .map(ProgressEvent::payload)
        .collect()
}
