//! In-progress login registry
//!
//! Keyed by account name: at most one run per account at a time. The entry
//! holds the run's cancellation token and is removed when the [`RunGuard`]
//! returned by [`ActiveLogins::try_start`] is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Registry of login runs currently in flight
#[derive(Clone, Default)]
pub struct ActiveLogins {
    // std Mutex: never held across an await, and RunGuard::drop needs a sync lock
    runs: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ActiveLogins {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a run for `account`; `None` if one is already active
    pub fn try_start(&self, account: &str) -> Option<RunGuard> {
        let mut runs = self.lock();
        if runs.contains_key(account) {
            return None;
        }
        let token = CancellationToken::new();
        runs.insert(account.to_string(), token.clone());
        Some(RunGuard {
            registry: self.clone(),
            account: account.to_string(),
            token,
        })
    }

    pub fn is_active(&self, account: &str) -> bool {
        self.lock().contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal the run for `account` to stop; false if none is active
    pub fn cancel(&self, account: &str) -> bool {
        match self.lock().get(account) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal every active run to stop (used on shutdown)
    pub fn cancel_all(&self) -> usize {
        let runs = self.lock();
        for token in runs.values() {
            token.cancel();
        }
        runs.len()
    }
}

/// Registration of one run; unregisters on drop
pub struct RunGuard {
    registry: ActiveLogins,
    account: String,
    token: CancellationToken,
}

impl RunGuard {
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Token cancelled on disconnect, shutdown or explicit cancel
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.account);
    }
}
