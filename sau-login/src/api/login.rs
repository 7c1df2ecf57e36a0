//! GET /login - QR-code login as a server-sent event stream
//!
//! Each unnamed event carries one payload: a status line, a
//! `data:image/png;base64,...` QR image, or finally the terminal code
//! (`200`, `500` or `409`). A named `outcome` event with the structured
//! result is sent right before the terminal code.

use crate::error::{ApiError, ApiResult};
use crate::events::{self, ProgressEvent};
use crate::login::{run_login, LoginRequest};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use sau_common::PlatformType;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Platform used when the request has no `type`
const DEFAULT_PLATFORM_CODE: &str = "1";

const MAX_ACCOUNT_NAME_CHARS: usize = 128;

/// Query parameters of GET /login
#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// Platform code `1`..`4` (or name)
    #[serde(rename = "type")]
    pub platform: Option<String>,
    /// Account name
    pub id: Option<String>,
}

/// Account names end up in credential file names
pub fn validate_account_name(raw: Option<&str>) -> ApiResult<String> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Missing required parameter: id".into()));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(ApiError::BadRequest(format!(
            "Account name must not contain path separators or control characters: {:?}",
            name
        )));
    }
    if name.chars().count() > MAX_ACCOUNT_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Account name longer than {} characters",
            MAX_ACCOUNT_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

pub fn parse_platform(raw: Option<&str>) -> ApiResult<PlatformType> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_PLATFORM_CODE)
        .parse()
        .map_err(|e: sau_common::platform::UnknownPlatform| ApiError::BadRequest(e.to_string()))
}

/// `data:` lines cannot carry carriage returns
fn sse_text(payload: String) -> String {
    if payload.contains('\r') {
        payload.replace('\r', "")
    } else {
        payload
    }
}

/// GET /login?type=<platform>&id=<account>
pub async fn login_stream(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> ApiResult<Response> {
    let account_name = validate_account_name(params.id.as_deref())?;
    let platform = parse_platform(params.platform.as_deref())?;

    let registration = state.active_logins.try_start(&account_name).ok_or_else(|| {
        ApiError::Conflict(format!("A login for account {} is already in progress", account_name))
    })?;

    info!(account = %account_name, platform = %platform, "Login requested");

    let (sender, mut receiver) = events::channel();
    let cancel = registration.token();
    // Cancels the run when the client goes away before the terminal event
    let disconnect = registration.token().drop_guard();

    let context = state.login.clone();
    let request = LoginRequest {
        account_name,
        platform,
    };
    tokio::spawn(async move {
        let report = run_login(&context, request, sender, cancel, Some(registration)).await;
        debug!(
            run_id = %report.run_id,
            states = ?report.states,
            kind = ?report.outcome.kind,
            "Login run finished"
        );
    });

    let stream = async_stream::stream! {
        let _disconnect = disconnect;

        while let Some(event) = receiver.recv().await {
            match event {
                ProgressEvent::Terminal(outcome) => {
                    match Event::default().event("outcome").json_data(&outcome) {
                        Ok(frame) => yield Ok::<Event, Infallible>(frame),
                        Err(e) => warn!("Could not serialize login outcome: {}", e),
                    }
                    yield Ok(Event::default().data(outcome.code.as_str()));
                    break;
                }
                other => {
                    yield Ok(Event::default().data(sse_text(other.payload())));
                }
            }
        }
    };

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        sse,
    )
        .into_response())
}
