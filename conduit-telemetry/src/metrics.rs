use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Interval between two upkeep runs of the recorder.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// Installing a recorder is fallible and only possible once per process.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs a global Prometheus recorder and returns a handle that renders its metrics.
///
/// The recorder is installed on the first call. Later calls return a clone of the same handle,
/// which lets several tests or components share it.
///
/// Must be called from within a tokio runtime, which runs the periodic recorder upkeep.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(UPKEEP_INTERVAL).await;
            trace!("running metrics upkeep");
            upkeep_handle.run_upkeep();
        }
    });

    Ok(handle)
}
