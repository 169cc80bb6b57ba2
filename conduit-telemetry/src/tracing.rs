use std::sync::Once;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable enabling log output in tests.
const ENABLE_TRACING_ENV: &str = "ENABLE_TRACING";

/// Guards the one-time subscriber installation in tests.
static INIT_TEST_TRACING: Once = Once::new();

/// Errors that can occur while installing the global tracing subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Installs a global subscriber printing structured logs to stdout.
///
/// The filter is read from `RUST_LOG` and defaults to `info` for `app_name` and the conduit
/// crates when the variable is not set.
pub fn init_tracing(app_name: &str) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(app_name).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()?;

    Ok(())
}

/// Installs a test subscriber once per process if `ENABLE_TRACING` is set.
///
/// Tests call this unconditionally, output stays silent unless explicitly requested.
pub fn init_test_tracing() {
    if std::env::var(ENABLE_TRACING_ENV).is_err() {
        return;
    }

    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into());

        // Another test harness may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

fn default_filter(app_name: &str) -> String {
    let app_target = app_name.replace('-', "_");
    format!("{app_target}=info,conduit=info")
}
