//! Tracing setup for the binary and anything embedding the data layer.
//!
//! Repository and session events are emitted through `tracing`; SeaORM and
//! sqlx still log through the `log` facade, so both are routed into one
//! subscriber here.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Per-statement sqlx logging is noisy at `info`; keep it at `warn` unless
/// the configured level names sqlx itself.
const SQLX_STATEMENT_DIRECTIVE: &str = "sqlx::query=warn";

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to route `log` records into tracing: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static SUBSCRIBER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(config: &AppConfig) -> String {
    if config.log_level.contains("sqlx") {
        config.log_level.clone()
    } else {
        format!("{},{SQLX_STATEMENT_DIRECTIVE}", config.log_level)
    }
}

/// Installs the global subscriber on first call; later calls do nothing.
///
/// Failing to install either the `log` bridge or the subscriber is reported
/// on stderr and does not abort startup.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if SUBSCRIBER_INSTALLED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        // A bridge installed by an earlier caller is fine.
        if !type_name_of_val(log::logger()).contains("LogTracer") {
            eprintln!("clinic-data: SeaORM statement logs will be dropped ({err})");
        }
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().with_current_span(false).boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        SUBSCRIBER_INSTALLED.store(false, Ordering::SeqCst);
        eprintln!("clinic-data: keeping the existing tracing subscriber ({err})");
    }

    Ok(())
}

/// Whether [`init_tracing`] installed the global subscriber.
pub fn is_initialized() -> bool {
    SUBSCRIBER_INSTALLED.load(Ordering::SeqCst)
}
