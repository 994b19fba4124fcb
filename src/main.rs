//! Greenlight - JSON API for a movie catalog
//!
//! Serves the `/v1` API with token authentication, per-client rate limiting
//! and permission-gated movie routes.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use greenlight::{
    config::{self, LogFormat},
    create_router,
    db::{self, token_repository},
    middleware::rate_limit::EVICTION_PERIOD,
    services::Mailer,
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("Greenlight {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must outlive the server so file logs are flushed
    let _log_guard = init_logging(&config);

    info!(
        environment = %config.server.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Greenlight starting up"
    );

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    let mailer = match config.smtp {
        Some(ref smtp) => {
            info!(host = %smtp.host, port = smtp.port, "Initializing SMTP mailer");
            Some(Mailer::new(smtp).context("Failed to initialize SMTP mailer")?)
        }
        None => {
            warn!("SMTP not configured, outgoing emails will be logged and dropped");
            None
        }
    };

    let state = AppState::new(config.clone(), db.clone(), mailer)
        .context("Failed to initialize application state")?;

    let sweeper = if state.rate_limiter.is_enabled() {
        info!(
            rps = config.limiter.requests_per_second,
            burst = config.limiter.burst,
            "Rate limiter enabled"
        );
        Some(state.rate_limiter.spawn_eviction(EVICTION_PERIOD))
    } else {
        info!("Rate limiter disabled");
        None
    };

    let purge = token_repository::spawn_expired_purge(db.clone(), token_repository::PURGE_PERIOD);

    let background = state.background.clone();
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting HTTP server on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    purge.abort();

    info!(pending = background.len(), "Completing background tasks");
    background.close();
    background.wait().await;

    db.close().await;
    info!("Stopped server");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "Shutting down server"),
        _ = terminate => info!(signal = "SIGTERM", "Shutting down server"),
    }
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber.with(file_layer(&log_config.format, writer)), &log_config.format);
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Formatting layer writing to `writer`, boxed so the three formats share a type
fn file_layer<S>(
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Initialize console logging on top of `subscriber`
fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
    }
}

/// Initialize file-only logging
fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::prelude::*;

    subscriber.with(file_layer(format, writer)).init();
}

/// Ensure the directory holding the SQLite file exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = sqlite_path(&config.database.url) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// File path portion of a `sqlite://` URL, without query parameters
fn sqlite_path(url: &str) -> Option<&str> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then_some(path)
}

/// Print help message
fn print_help() {
    println!(
        r#"Greenlight {}

USAGE:
    greenlight [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information

ENVIRONMENT:
    GREENLIGHT_CONFIG       Path to configuration file (default: config.yaml)
    GREENLIGHT_PORT         Port to listen on (default: 4000)
    GREENLIGHT_ENV          development | staging | production
    GREENLIGHT_DB_DSN       SQLite connection URL (also read from DATABASE_URL)
    GREENLIGHT_LIMITER_*    ENABLED, RPS and BURST for the per-client rate limiter
    GREENLIGHT_CORS_TRUSTED_ORIGINS
                            Space separated list of trusted CORS origins
    SMTP_HOST, SMTP_PORT, SMTP_USERNAME, SMTP_PASSWORD, SMTP_SENDER
                            Outgoing mail server

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by GREENLIGHT_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/greenlight/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
