//! Ordered locator probing
//!
//! Tries each candidate in turn, retrying it every `step` until its own
//! timeout runs out. "Not found" style errors mean "try the next one"; any
//! other driver error stops the probe.

use crate::browser::{BrowserResult, BrowserSession, ElementHandle, Locator};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Probe timing
#[derive(Debug, Clone, Copy)]
pub struct ProbeBudget {
    pub per_candidate: Duration,
    pub overall: Duration,
    pub step: Duration,
}

/// The candidate that matched and its element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub locator: Locator,
    pub element: ElementHandle,
}

/// First candidate with a visible element, or `None` if the budget ran out
pub async fn first_visible(
    session: &dyn BrowserSession,
    candidates: &[Locator],
    budget: ProbeBudget,
) -> BrowserResult<Option<Located>> {
    let deadline = Instant::now() + budget.overall;

    for locator in candidates {
        let now = Instant::now();
        if now >= deadline {
            debug!("Probe budget exhausted before {}", locator);
            break;
        }
        let until = (now + budget.per_candidate).min(deadline);

        if let Some(element) = wait_visible(session, locator, until, budget.step).await? {
            debug!("Probe matched {}", locator);
            return Ok(Some(Located {
                locator: locator.clone(),
                element,
            }));
        }
        debug!("Probe miss {}", locator);
    }

    Ok(None)
}

async fn wait_visible(
    session: &dyn BrowserSession,
    locator: &Locator,
    until: Instant,
    step: Duration,
) -> BrowserResult<Option<ElementHandle>> {
    loop {
        match session.find_visible(locator).await {
            Ok(Some(element)) => return Ok(Some(element)),
            Ok(None) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if Instant::now() + step > until {
            return Ok(None);
        }
        tokio::time::sleep(step).await;
    }
}
