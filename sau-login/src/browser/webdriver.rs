//! W3C WebDriver backend (chromedriver)
//!
//! Talks to an already-running chromedriver over HTTP. Chrome-specific
//! DevTools commands (`goog/cdp/execute`) are used for the things plain
//! WebDriver cannot do: reading cookies of every domain, seeding cookies
//! before the first navigation, and hiding `navigator.webdriver`.

use super::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, Cookie, ElementHandle, Locator,
    OriginState, StorageState,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key of the element reference in W3C responses
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Extra time given to the HTTP call on top of the driver's own timeouts
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['zh-CN', 'zh', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

const READ_LOCAL_STORAGE_SCRIPT: &str = r#"
const entries = [];
for (let i = 0; i < window.localStorage.length; i++) {
  const name = window.localStorage.key(i);
  entries.push({ name: name, value: window.localStorage.getItem(name) });
}
return { origin: window.location.origin, localStorage: entries };
"#;

const WRITE_LOCAL_STORAGE_SCRIPT: &str = r#"
for (const entry of arguments[0]) {
  window.localStorage.setItem(entry.name, entry.value);
}
"#;

/// Connection and launch settings for chromedriver
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the running chromedriver, e.g. `http://127.0.0.1:9515`
    pub endpoint: String,
    pub headless: bool,
    /// Page load and script timeout applied to the session
    pub operation_timeout: Duration,
    /// Chrome binary; chromedriver's default lookup when `None`
    pub browser_binary: Option<String>,
    pub user_agent: Option<String>,
    pub window_size: (u32, u32),
    pub extra_args: Vec<String>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9515".to_string(),
            headless: true,
            operation_timeout: Duration::from_secs(30),
            browser_binary: None,
            user_agent: None,
            window_size: (1280, 900),
            extra_args: Vec::new(),
        }
    }
}

impl WebDriverConfig {
    /// Chrome command line for login sessions
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            "--lang=zh-CN".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        if let Some(user_agent) = &self.user_agent {
            args.push(format!("--user-agent={}", user_agent));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// New-session request body
    pub fn capabilities(&self) -> Value {
        let mut chrome_options = json!({
            "args": self.chrome_args(),
            "excludeSwitches": ["enable-automation"],
            "useAutomationExtension": false,
        });
        if let Some(binary) = &self.browser_binary {
            chrome_options["binary"] = json!(binary);
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "goog:chromeOptions": chrome_options,
                }
            }
        })
    }
}

/// Map a WebDriver error code to a [`BrowserError`]
pub fn classify_error(error: &str, message: &str) -> BrowserError {
    match error {
        "no such element" | "stale element reference" | "no such frame" => {
            BrowserError::NotFound(message.to_string())
        }
        "timeout" | "script timeout" => BrowserError::Timeout(message.to_string()),
        "invalid session id" | "no such window" => BrowserError::SessionGone(message.to_string()),
        _ if message.contains("net::ERR_") => BrowserError::Navigation(message.to_string()),
        _ => BrowserError::Protocol(format!("{}: {}", error, message)),
    }
}

fn transport_error(err: reqwest::Error) -> BrowserError {
    if err.is_timeout() {
        BrowserError::Timeout(err.to_string())
    } else {
        BrowserError::Transport(err.to_string())
    }
}

/// Send one WebDriver command and unwrap its `value`
async fn send(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> BrowserResult<Value> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("Unreadable response ({}): {}", status, e)))?;

    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    Err(classify_error(error, message))
}

/// Launches chromedriver sessions
pub struct WebDriverLauncher {
    http: reqwest::Client,
    config: WebDriverConfig,
}

impl WebDriverLauncher {
    pub fn new(config: WebDriverConfig) -> BrowserResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.operation_timeout + HTTP_TIMEOUT_MARGIN)
            .build()
            .map_err(|e| BrowserError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self, seed: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserSession>> {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        let created = send(
            &self.http,
            Method::POST,
            &format!("{}/session", endpoint),
            Some(self.config.capabilities()),
        )
        .await?;

        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("New session response without sessionId".into()))?
            .to_string();

        info!(session = %session_id, headless = self.config.headless, "Browser session started");

        let session = WebDriverSession {
            http: self.http.clone(),
            base: format!("{}/session/{}", endpoint, session_id),
            session_id,
            closed: AtomicBool::new(false),
        };

        if let Err(e) = session.prepare(&self.config, seed).await {
            session.close().await;
            return Err(e);
        }

        Ok(Box::new(session))
    }
}

/// One chromedriver session
pub struct WebDriverSession {
    http: reqwest::Client,
    base: String,
    session_id: String,
    closed: AtomicBool,
}

impl WebDriverSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> BrowserResult<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrowserError::SessionGone("session already closed".into()));
        }
        send(&self.http, method, &format!("{}{}", self.base, path), body).await
    }

    async fn cdp(&self, cmd: &str, params: Value) -> BrowserResult<Value> {
        self.command(
            Method::POST,
            "/goog/cdp/execute",
            Some(json!({ "cmd": cmd, "params": params })),
        )
        .await
    }

    async fn execute(&self, script: &str, args: Value) -> BrowserResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Timeouts, stealth patch and optional seeding
    async fn prepare(&self, config: &WebDriverConfig, seed: Option<&StorageState>) -> BrowserResult<()> {
        let timeout_ms = config.operation_timeout.as_millis() as u64;
        self.command(
            Method::POST,
            "/timeouts",
            Some(json!({ "pageLoad": timeout_ms, "script": timeout_ms, "implicit": 0 })),
        )
        .await?;

        if let Err(e) = self
            .cdp(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": STEALTH_SCRIPT }),
            )
            .await
        {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(session = %self.session_id, "Could not install navigator.webdriver mask: {}", e);
        }

        if let Some(state) = seed {
            self.seed_storage(state).await?;
        }
        Ok(())
    }

    async fn seed_storage(&self, state: &StorageState) -> BrowserResult<()> {
        if !state.cookies.is_empty() {
            let cookies: Vec<Value> = state.cookies.iter().map(devtools_cookie_param).collect();
            self.cdp("Network.setCookies", json!({ "cookies": cookies }))
                .await?;
            debug!(session = %self.session_id, count = state.cookies.len(), "Seeded cookies");
        }

        for origin in &state.origins {
            if origin.local_storage.is_empty() {
                continue;
            }
            self.navigate(&origin.origin).await?;
            self.execute(WRITE_LOCAL_STORAGE_SCRIPT, json!([origin.local_storage]))
                .await?;
            debug!(
                session = %self.session_id,
                origin = %origin.origin,
                count = origin.local_storage.len(),
                "Seeded local storage"
            );
        }
        Ok(())
    }

    async fn find_elements(&self, locator: &Locator) -> BrowserResult<Vec<String>> {
        let (using, value) = locator.webdriver_strategy();
        let found = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;

        let elements = found
            .as_array()
            .ok_or_else(|| BrowserError::Protocol("Find elements did not return a list".into()))?;

        Ok(elements
            .iter()
            .filter_map(|e| e.get(ELEMENT_KEY).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn all_cookies(&self) -> BrowserResult<Vec<Cookie>> {
        match self.cdp("Network.getAllCookies", json!({})).await {
            Ok(value) => {
                let cookies: Vec<DevToolsCookie> =
                    serde_json::from_value(value.get("cookies").cloned().unwrap_or(Value::Null))
                        .map_err(|e| BrowserError::Protocol(format!("Unreadable cookies: {}", e)))?;
                Ok(cookies.into_iter().map(Cookie::from).collect())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("DevTools cookie export unavailable ({}), using page cookies", e);
                let value = self.command(Method::GET, "/cookie", None).await?;
                let cookies: Vec<WireCookie> = serde_json::from_value(value)
                    .map_err(|e| BrowserError::Protocol(format!("Unreadable cookies: {}", e)))?;
                Ok(cookies.into_iter().map(Cookie::from).collect())
            }
        }
    }

    async fn current_origin_storage(&self) -> BrowserResult<Option<OriginState>> {
        let value = self.execute(READ_LOCAL_STORAGE_SCRIPT, json!([])).await?;
        let origin: OriginState = serde_json::from_value(value)
            .map_err(|e| BrowserError::Protocol(format!("Unreadable local storage: {}", e)))?;

        if origin.origin == "null" || origin.local_storage.is_empty() {
            return Ok(None);
        }
        Ok(Some(origin))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        debug!(session = %self.session_id, url = %url, "Navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
            .map_err(|e| match e {
                BrowserError::Protocol(message) => BrowserError::Navigation(message),
                other => other,
            })
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Protocol("URL is not a string".into()))
    }

    async fn title(&self) -> BrowserResult<String> {
        let value = self.command(Method::GET, "/title", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        Ok(self.find_elements(locator).await?.len())
    }

    async fn find_visible(&self, locator: &Locator) -> BrowserResult<Option<ElementHandle>> {
        for id in self.find_elements(locator).await? {
            match self
                .command(Method::GET, &format!("/element/{}/displayed", id), None)
                .await
            {
                Ok(displayed) if displayed.as_bool() == Some(true) => {
                    return Ok(Some(ElementHandle(id)));
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn screenshot(&self, element: &ElementHandle) -> BrowserResult<Vec<u8>> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/screenshot", element.0),
                None,
            )
            .await?;

        let encoded = value
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("Screenshot is not a string".into()))?;
        BASE64
            .decode(encoded)
            .map_err(|e| BrowserError::Protocol(format!("Screenshot is not base64: {}", e)))
    }

    async fn storage_state(&self) -> BrowserResult<StorageState> {
        let cookies = self.all_cookies().await?;

        let origins = match self.current_origin_storage().await {
            Ok(origin) => origin.into_iter().collect(),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(session = %self.session_id, "Could not read local storage: {}", e);
                Vec::new()
            }
        };

        Ok(StorageState { cookies, origins })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match send(&self.http, Method::DELETE, &self.base, None).await {
            Ok(_) => info!(session = %self.session_id, "Browser session closed"),
            Err(e) => warn!(session = %self.session_id, "Browser session close failed: {}", e),
        }
    }
}

/// Cookie as returned by `Network.getAllCookies`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevToolsCookie {
    name: String,
    value: String,
    domain: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    expires: f64,
    #[serde(default)]
    http_only: bool,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    same_site: Option<String>,
    #[serde(default)]
    session: bool,
}

impl From<DevToolsCookie> for Cookie {
    fn from(c: DevToolsCookie) -> Self {
        Cookie {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: if c.path.is_empty() { "/".to_string() } else { c.path },
            expires: if c.session { -1.0 } else { c.expires },
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site.unwrap_or_else(|| "Lax".to_string()),
        }
    }
}

/// Cookie as returned by the W3C `GET /cookie` endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    expiry: Option<f64>,
    #[serde(default)]
    http_only: bool,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    same_site: Option<String>,
}

impl From<WireCookie> for Cookie {
    fn from(c: WireCookie) -> Self {
        Cookie {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path.unwrap_or_else(|| "/".to_string()),
            expires: c.expiry.unwrap_or(-1.0),
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site.unwrap_or_else(|| "Lax".to_string()),
        }
    }
}

/// `Network.setCookies` parameter for one stored cookie
fn devtools_cookie_param(cookie: &Cookie) -> Value {
    let mut param = json!({
        "name": cookie.name,
        "value": cookie.value,
        "domain": cookie.domain,
        "path": cookie.path,
        "httpOnly": cookie.http_only,
        "secure": cookie.secure,
    });
    if cookie.expires > 0.0 {
        param["expires"] = json!(cookie.expires);
    }
    if matches!(cookie.same_site.as_str(), "Strict" | "Lax" | "None") {
        param["sameSite"] = json!(cookie.same_site);
    }
    param
}
