//! Scripted fake browser
//!
//! Simulates a creator login page on `creator.example.com`: a QR code that
//! disappears once the user "scans" it, a login prompt, and a redirect to
//! the creator home page after login. Timing uses tokio's clock, so tests
//! running with paused time advance it deterministically.

use async_trait::async_trait;
use sau_common::PlatformType;
use sau_login::browser::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, Cookie, ElementHandle,
    LocalStorageEntry, Locator, OriginState, StorageState,
};
use sau_login::profiles::PlatformProfile;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const LOGIN_URL: &str = "https://creator.example.com/login";
pub const VERIFY_URL: &str = "https://creator.example.com/creator-micro/upload";
pub const HOME_URL: &str = "https://creator.example.com/creator-micro/home";
pub const QR_SELECTOR: &str = ".qr-code img";
pub const LOGIN_PROMPT: &str = r#"text="扫码登录""#;
pub const AVATAR_SELECTOR: &str = ".user-avatar";
pub const SESSION_COOKIE: &str = "sessionid";
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Profile matching the fake site
pub fn test_profile(platform: PlatformType) -> PlatformProfile {
    PlatformProfile {
        platform,
        login_url: LOGIN_URL.to_string(),
        verify_url: VERIFY_URL.to_string(),
        logged_in_url_patterns: vec!["creator.example.com/creator-micro".to_string()],
        logged_in_titles: Vec::new(),
        qr_locators: vec![Locator::parse(".missing-qr"), Locator::parse(QR_SELECTOR)],
        logged_in_locators: vec![Locator::parse(AVATAR_SELECTOR)],
        login_prompt_locators: vec![Locator::parse(LOGIN_PROMPT)],
    }
}

/// How the fake site behaves
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub launch_error: Option<BrowserError>,
    pub qr_visible: bool,
    pub prompt_shown: bool,
    /// Time after launch at which the QR code gets scanned; never if `None`
    pub scan_after: Option<Duration>,
    pub logged_in_at_start: bool,
    /// After login the page stays on the login URL and only an avatar shows up
    pub signal_via_element: bool,
    /// Verify page bounces back to the login page even when logged in
    pub verify_rejects: bool,
    pub navigate_error: Option<BrowserError>,
    pub screenshot_error: Option<BrowserError>,
    pub storage_error: Option<BrowserError>,
    pub panic_on_title: bool,
    /// Every call fails with `SessionGone` after this long
    pub session_dies_after: Option<Duration>,
}

impl Script {
    /// Login page with a QR code, scanned after `after`
    pub fn scanned_after(after: Duration) -> Self {
        Self {
            qr_visible: true,
            prompt_shown: true,
            scan_after: Some(after),
            ..Self::default()
        }
    }

    /// Login page with a QR code nobody scans
    pub fn never_scanned() -> Self {
        Self {
            qr_visible: true,
            prompt_shown: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct BrowserStats {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    pub seeded: Mutex<Option<StorageState>>,
}

impl BrowserStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn seeded(&self) -> Option<StorageState> {
        self.seeded.lock().unwrap().clone()
    }
}

pub struct FakeLauncher {
    pub script: Script,
    pub stats: Arc<BrowserStats>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            stats: Arc::new(BrowserStats::default()),
        })
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, seed: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserSession>> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(state) = seed {
            *self.stats.seeded.lock().unwrap() = Some(state.clone());
        }
        if let Some(err) = &self.script.launch_error {
            return Err(err.clone());
        }

        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            stats: self.stats.clone(),
            launched_at: Instant::now(),
            seeded_login: seed.map_or(false, |s| s.has_cookie(SESSION_COOKIE)),
            url: Mutex::new("about:blank".to_string()),
        }))
    }
}

pub struct FakeSession {
    script: Script,
    stats: Arc<BrowserStats>,
    launched_at: Instant,
    seeded_login: bool,
    url: Mutex<String>,
}

impl FakeSession {
    fn logged_in(&self) -> bool {
        self.seeded_login
            || self.script.logged_in_at_start
            || self
                .script
                .scan_after
                .map_or(false, |after| Instant::now() >= self.launched_at + after)
    }

    fn check_alive(&self) -> BrowserResult<()> {
        match self.script.session_dies_after {
            Some(after) if Instant::now() >= self.launched_at + after => {
                Err(BrowserError::SessionGone("browser crashed".into()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.stats.navigations.lock().unwrap().push(url.to_string());
        self.check_alive()?;
        if let Some(err) = &self.script.navigate_error {
            return Err(err.clone());
        }

        let logged_in = self.logged_in();
        let landed = if url == VERIFY_URL {
            if logged_in && !self.script.verify_rejects {
                VERIFY_URL
            } else {
                LOGIN_URL
            }
        } else if url == LOGIN_URL && logged_in && !self.script.signal_via_element {
            HOME_URL
        } else {
            url
        };
        *self.url.lock().unwrap() = landed.to_string();
        Ok(())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        self.check_alive()?;
        let mut url = self.url.lock().unwrap();
        if *url == LOGIN_URL && self.logged_in() && !self.script.signal_via_element {
            *url = HOME_URL.to_string();
        }
        Ok(url.clone())
    }

    async fn title(&self) -> BrowserResult<String> {
        self.check_alive()?;
        if self.script.panic_on_title {
            panic!("title lookup exploded");
        }
        Ok("Creator Center".to_string())
    }

    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        self.check_alive()?;
        let logged_in = self.logged_in();
        if *locator == Locator::parse(LOGIN_PROMPT) {
            return Ok(usize::from(!logged_in && self.script.prompt_shown));
        }
        if *locator == Locator::parse(AVATAR_SELECTOR) {
            return Ok(usize::from(logged_in && self.script.signal_via_element));
        }
        Err(BrowserError::NotFound(locator.to_string()))
    }

    async fn find_visible(&self, locator: &Locator) -> BrowserResult<Option<ElementHandle>> {
        self.check_alive()?;
        if *locator == Locator::parse(QR_SELECTOR) && self.script.qr_visible && !self.logged_in() {
            return Ok(Some(ElementHandle("qr-element".into())));
        }
        Err(BrowserError::NotFound(locator.to_string()))
    }

    async fn screenshot(&self, _element: &ElementHandle) -> BrowserResult<Vec<u8>> {
        self.check_alive()?;
        match &self.script.screenshot_error {
            Some(err) => Err(err.clone()),
            None => Ok(PNG_BYTES.to_vec()),
        }
    }

    async fn storage_state(&self) -> BrowserResult<StorageState> {
        self.check_alive()?;
        if let Some(err) = &self.script.storage_error {
            return Err(err.clone());
        }
        Ok(StorageState {
            cookies: vec![Cookie {
                name: SESSION_COOKIE.into(),
                value: "logged-in".into(),
                domain: ".example.com".into(),
                path: "/".into(),
                expires: -1.0,
                http_only: true,
                secure: true,
                same_site: "Lax".into(),
            }],
            origins: vec![OriginState {
                origin: "https://creator.example.com".into(),
                local_storage: vec![LocalStorageEntry {
                    name: "creator_token".into(),
                    value: "t0k3n".into(),
                }],
            }],
        })
    }

    async fn close(&self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}
