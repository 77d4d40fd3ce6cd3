//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and, when the log
//! directory is writable, to a JSON file per process.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// `RUST_LOG` takes precedence over the environment-derived level.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(filter());

        let log_dir = PathBuf::from("log");
        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("zendb.{environment}.{pid}.{timestamp}.log");

        match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                let file = fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(filter());

                if tracing_subscriber::registry()
                    .with(console)
                    .with(file)
                    .try_init()
                    .is_err()
                {
                    tracing::debug!("Global tracing subscriber already initialized");
                }

                tracing::info!(
                    pid = pid,
                    environment = %environment,
                    log_file = %log_dir.join(&log_filename).display(),
                    "🔧 STRUCTURED LOGGING: Initialized with file output"
                );

                // The writer flushes on drop; keep it alive for the process lifetime.
                std::mem::forget(guard);
            }
            Err(e) => {
                if tracing_subscriber::registry().with(console).try_init().is_err() {
                    tracing::debug!("Global tracing subscriber already initialized");
                }
                tracing::warn!(
                    error = %e,
                    "🔧 STRUCTURED LOGGING: Log directory unavailable, console output only"
                );
            }
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ZENDB_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for a remote fetch
pub fn log_fetch_operation(
    operation: &str,
    uri: &str,
    status: &str,
    http_status: Option<u16>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        uri = %uri,
        status = %status,
        http_status = http_status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🌐 FETCH_OPERATION"
    );
}

/// Log structured data for database operations
pub fn log_database_operation(
    operation: &str,
    table: Option<&str>,
    rows: Option<usize>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        table = table,
        rows = rows,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "💾 DATABASE_OPERATION"
    );
}

/// Log a pipeline stage boundary
pub fn log_stage_operation(run_id: &str, stage: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        run_id = %run_id,
        stage = %stage,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 STAGE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
