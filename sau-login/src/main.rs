//! sau-login - QR-code login service
//!
//! Serves `/login` (SSE), `/getValidAccounts` and `/health` on
//! 127.0.0.1:5409 by default. Browsers are driven through an external
//! chromedriver.

use anyhow::{Context, Result};
use clap::Parser;
use sau_common::config::{resolve_config_path, RootFolder};
use sau_common::db::{init_database, AccountStore};
use sau_login::browser::WebDriverLauncher;
use sau_login::config::{Args, ServiceConfig, MODULE_NAME};
use sau_login::login::LoginContext;
use sau_login::{build_router, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), MODULE_NAME);
    let mut config = ServiceConfig::from_file(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.apply_args(&args);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Log build identification immediately after tracing init
    info!(
        "Starting SAU Login Service (sau-login) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file not found at {}, using defaults", path.display()),
        None => info!("No config directory available, using defaults"),
    }
    config.validate()?;

    let root = RootFolder::new(config.root_folder(&args));
    root.ensure_directory_exists()?;

    let db_path = root.database_path();
    info!("Database path: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };
    let accounts = AccountStore::new(pool);

    let webdriver = config.webdriver();
    info!(
        "Browser backend: chromedriver at {} ({})",
        webdriver.endpoint,
        if webdriver.headless { "headless" } else { "headed" }
    );
    let launcher = WebDriverLauncher::new(webdriver).context("Failed to create WebDriver client")?;

    let profiles = config.profiles();
    for platform in sau_common::PlatformType::ALL {
        if profiles.is_overridden(platform) {
            info!("Using configured login profile for {}", platform);
        }
    }

    let context = LoginContext {
        launcher: Arc::new(launcher),
        store: Arc::new(accounts.clone()),
        root,
        profiles,
        timings: config.timings(),
    };

    let state = AppState::new(accounts, context);
    let active_logins = state.active_logins.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("sau-login listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let cancelled = active_logins.cancel_all();
            if cancelled > 0 {
                info!("Cancelled {} login run(s) in progress", cancelled);
            }
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
