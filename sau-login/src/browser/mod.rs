//! Browser Driver abstraction
//!
//! The login state machine only talks to [`BrowserLauncher`] and
//! [`BrowserSession`]; the production backend is [`webdriver`], tests use a
//! scripted fake.

pub mod locator;
pub mod storage;
pub mod webdriver;

use async_trait::async_trait;
use thiserror::Error;

pub use locator::Locator;
pub use storage::{Cookie, LocalStorageEntry, OriginState, StorageState};
pub use webdriver::{WebDriverConfig, WebDriverLauncher, WebDriverSession};

/// Browser Driver failure
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    /// Operation did not complete within its timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Element missing or detached from the page
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Page could not be loaded
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Browser session no longer exists
    #[error("Browser session gone: {0}")]
    SessionGone(String),

    /// Could not reach the browser backend
    #[error("Browser transport error: {0}")]
    Transport(String),

    /// Backend answered with an unexpected error or payload
    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Expected probe misses: element absent, stale, or not there yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrowserError::NotFound(_) | BrowserError::Timeout(_))
    }

    /// The session cannot be used any more
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::SessionGone(_) | BrowserError::Transport(_))
    }
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Opaque reference to an element of the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch one browser with one page, optionally pre-seeded with a
    /// credential blob
    async fn launch(&self, seed: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserSession>>;
}

/// One browser process with a single page
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load `url` and wait for the load event
    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    async fn current_url(&self) -> BrowserResult<String>;

    async fn title(&self) -> BrowserResult<String>;

    /// Number of elements matching `locator` (visible or not)
    async fn count(&self, locator: &Locator) -> BrowserResult<usize>;

    /// First element matching `locator` that is displayed
    async fn find_visible(&self, locator: &Locator) -> BrowserResult<Option<ElementHandle>>;

    /// PNG screenshot of a single element
    async fn screenshot(&self, element: &ElementHandle) -> BrowserResult<Vec<u8>>;

    /// Cookies and local storage of the browser context
    async fn storage_state(&self) -> BrowserResult<StorageState>;

    /// Tear the browser down; idempotent, never fails
    async fn close(&self);
}
