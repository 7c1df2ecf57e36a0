//! sau-login configuration
//!
//! Priority: command line (and its env fallbacks) > TOML file > defaults.
//! The root folder follows the shared resolver order in
//! [`sau_common::config`].

use crate::browser::WebDriverConfig;
use crate::login::LoginTimings;
use crate::profiles::{PlatformProfile, PlatformProfiles};
use clap::Parser;
use sau_common::config::{load_toml_config, RootFolderResolver};
use sau_common::{Error, Result};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const MODULE_NAME: &str = "sau-login";

/// Port of the original login backend
pub const DEFAULT_PORT: u16 = 5409;

/// Command-line arguments for sau-login
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "sau-login")]
#[command(about = "QR-code login service for short-video creator platforms")]
#[command(version)]
pub struct Args {
    /// Root folder holding db/ and cookies/
    #[arg(short, long)]
    pub root_folder: Option<PathBuf>,

    /// TOML config file (default: ~/.config/sau/sau-login.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "SAU_BIND")]
    pub bind: Option<SocketAddr>,

    /// chromedriver endpoint
    #[arg(long, env = "SAU_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "SAU_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Contents of `sau-login.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub root_folder: Option<PathBuf>,
    pub bind: SocketAddr,
    pub log_level: String,
    pub browser: BrowserSettings,
    pub login: TimingSettings,
    /// `[[platform]]` tables replacing built-in profiles
    #[serde(rename = "platform")]
    pub platforms: Vec<PlatformProfile>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            log_level: "info".to_string(),
            browser: BrowserSettings::default(),
            login: TimingSettings::default(),
            platforms: Vec::new(),
        }
    }
}

/// `[browser]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub operation_timeout_secs: u64,
    pub binary: Option<String>,
    pub user_agent: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        let defaults = WebDriverConfig::default();
        Self {
            webdriver_url: defaults.endpoint,
            headless: defaults.headless,
            operation_timeout_secs: defaults.operation_timeout.as_secs(),
            binary: None,
            user_agent: None,
            window_width: defaults.window_size.0,
            window_height: defaults.window_size.1,
            extra_args: Vec::new(),
        }
    }
}

/// `[login]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub settle_delay_ms: u64,
    pub qr_candidate_timeout_ms: u64,
    pub qr_probe_budget_secs: u64,
    pub probe_step_ms: u64,
    pub poll_interval_ms: u64,
    pub scan_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub run_deadline_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let defaults = LoginTimings::default();
        Self {
            settle_delay_ms: defaults.settle_delay.as_millis() as u64,
            qr_candidate_timeout_ms: defaults.qr_candidate_timeout.as_millis() as u64,
            qr_probe_budget_secs: defaults.qr_probe_budget.as_secs(),
            probe_step_ms: defaults.probe_step.as_millis() as u64,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            scan_timeout_secs: defaults.scan_timeout.as_secs(),
            heartbeat_interval_secs: defaults.heartbeat_interval.as_secs(),
            run_deadline_secs: defaults.run_deadline.as_secs(),
        }
    }
}

impl ServiceConfig {
    /// Read the TOML file, or defaults when there is none
    pub fn from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => load_toml_config(path),
            None => Ok(Self::default()),
        }
    }

    /// Command-line values win over the file
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(url) = &args.webdriver_url {
            self.browser.webdriver_url = url.clone();
        }
        if args.headed {
            self.browser.headless = false;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let login = &self.login;
        for (name, value) in [
            ("login.poll_interval_ms", login.poll_interval_ms),
            ("login.probe_step_ms", login.probe_step_ms),
            ("login.scan_timeout_secs", login.scan_timeout_secs),
            ("login.heartbeat_interval_secs", login.heartbeat_interval_secs),
            ("login.run_deadline_secs", login.run_deadline_secs),
            ("browser.operation_timeout_secs", self.browser.operation_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }

        let url = &self.browser.webdriver_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "browser.webdriver_url must be an http(s) URL, got {:?}",
                url
            )));
        }

        if login.run_deadline_secs <= login.scan_timeout_secs {
            warn!(
                "login.run_deadline_secs ({}) does not exceed login.scan_timeout_secs ({}); runs will be cut off before the scan timeout",
                login.run_deadline_secs, login.scan_timeout_secs
            );
        }
        Ok(())
    }

    pub fn root_folder(&self, args: &Args) -> PathBuf {
        RootFolderResolver::new()
            .with_cli_arg(args.root_folder.clone())
            .with_toml_value(self.root_folder.clone())
            .resolve()
    }

    pub fn timings(&self) -> LoginTimings {
        let login = &self.login;
        LoginTimings {
            settle_delay: Duration::from_millis(login.settle_delay_ms),
            qr_candidate_timeout: Duration::from_millis(login.qr_candidate_timeout_ms),
            qr_probe_budget: Duration::from_secs(login.qr_probe_budget_secs),
            probe_step: Duration::from_millis(login.probe_step_ms),
            poll_interval: Duration::from_millis(login.poll_interval_ms),
            scan_timeout: Duration::from_secs(login.scan_timeout_secs),
            heartbeat_interval: Duration::from_secs(login.heartbeat_interval_secs),
            run_deadline: Duration::from_secs(login.run_deadline_secs),
        }
    }

    pub fn webdriver(&self) -> WebDriverConfig {
        let browser = &self.browser;
        WebDriverConfig {
            endpoint: browser.webdriver_url.clone(),
            headless: browser.headless,
            operation_timeout: Duration::from_secs(browser.operation_timeout_secs),
            browser_binary: browser.binary.clone(),
            user_agent: browser.user_agent.clone(),
            window_size: (browser.window_width, browser.window_height),
            extra_args: browser.extra_args.clone(),
        }
    }

    pub fn profiles(&self) -> PlatformProfiles {
        PlatformProfiles::with_overrides(self.platforms.iter().cloned())
    }
}
