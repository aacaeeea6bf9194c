//! # Structured Logging Module
//!
//! Environment-aware structured logging for the binding and for the native
//! library log lines forwarded through the log trampoline.

use crate::ffi::RawHandle;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Target used for lines forwarded from the native library.
pub const NATIVE_LOG_TARGET: &str = "smosquitto::native";

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call any number of times. A subscriber already installed by the
/// host application is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("SMOSQUITTO_LOG_FORMAT").is_ok_and(|format| format == "json");

        let console = if json {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(std::io::stderr().is_terminal())
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Current environment name from environment variables.
pub fn get_environment() -> String {
    std::env::var("SMOSQUITTO_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive for an environment.
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for lifecycle operations crossing the foreign boundary
pub fn log_ffi_operation(
    operation: &str,
    handle: Option<RawHandle>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        handle = ?handle,
        status = %status,
        details = details,
        "🌉 FFI_OPERATION"
    );
}
