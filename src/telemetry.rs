use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::{RequestToken, StreamKind};

/// Structured, in-process event hook for observability.
///
/// The library never prints. Callers provide an implementation that forwards these events to
/// their logger, metrics or a custom sink.
pub trait ViewEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: ViewEvent);
}

/// Names of the worker threads owned by [`crate::ViewCore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Store,
    Downsample,
    Aggregate,
}

impl WorkerKind {
    pub fn thread_name(&self) -> &'static str {
        match self {
            WorkerKind::Store => "chunkview-store",
            WorkerKind::Downsample => "chunkview-downsample",
            WorkerKind::Aggregate => "chunkview-aggregate",
        }
    }
}

/// Structured events emitted by the core.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    WorkerStarted { worker: WorkerKind },
    WorkerStopping { worker: WorkerKind },
    WorkerPanicked { worker: WorkerKind },

    IngestStarted,
    IngestCompleted { rows: u64, invalid_rows: u64, elapsed: Duration },
    IngestFailed { error: String },
    DatasetReleased,

    StaleResponseDropped { stream: StreamKind, token: RequestToken },
    EmptyResponseSuppressed { stream: StreamKind, token: RequestToken },
    SlowComputation { stream: StreamKind, rows: usize, elapsed: Duration },

    ContextFailure { worker: WorkerKind, error: String },
}

#[derive(Debug)]
pub struct NoopEventListener;

impl ViewEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: ViewEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn ViewEventListener> {
    Arc::new(NoopEventListener)
}

/// Metrics instrumentation.
///
/// Emitting is a no-op until a recorder is installed. With the `prometheus` feature the
/// caller can install an in-process recorder and render the exposition text on demand.
pub mod view_metrics {
    use super::*;

    use ::metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

    #[cfg(feature = "prometheus")]
    use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
    #[cfg(feature = "prometheus")]
    use std::sync::atomic::{AtomicBool, Ordering};
    #[cfg(feature = "prometheus")]
    use std::sync::Mutex;
    #[cfg(feature = "prometheus")]
    use std::thread::JoinHandle;

    // Counters are exposed as `<name>_total` by the Prometheus exporter.
    pub const INGEST_ROWS: &str = "chunkview_ingest_rows";
    pub const INGEST_INVALID_ROWS: &str = "chunkview_ingest_invalid_rows";
    pub const INGEST_DURATION_SECONDS: &str = "chunkview_ingest_duration_seconds";
    pub const STORE_ROWS: &str = "chunkview_store_rows";

    pub const WINDOW_ROWS: &str = "chunkview_window_rows";
    pub const DOWNSAMPLE_DURATION_SECONDS: &str = "chunkview_downsample_duration_seconds";
    pub const AGGREGATE_DURATION_SECONDS: &str = "chunkview_aggregate_duration_seconds";
    pub const STALE_RESPONSES: &str = "chunkview_stale_responses";

    /// Handle to the in-process Prometheus recorder. Does not start an HTTP server.
    #[cfg(feature = "prometheus")]
    #[derive(Debug)]
    pub struct InProcessPrometheus {
        handle: PrometheusHandle,
        stop: Arc<AtomicBool>,
        upkeep_thread: Mutex<Option<JoinHandle<()>>>,
    }

    #[cfg(feature = "prometheus")]
    impl InProcessPrometheus {
        /// Installs a global recorder (once per process) and starts a small upkeep thread.
        pub fn install(upkeep_interval: Duration) -> Result<Self, MetricsInitError> {
            describe_all();

            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(MetricsInitError::from_build_error)?;

            let stop = Arc::new(AtomicBool::new(false));
            let stop_clone = stop.clone();
            let handle_clone = handle.clone();
            let upkeep_thread = std::thread::Builder::new()
                .name("chunkview-metrics-upkeep".to_string())
                .spawn(move || {
                    while !stop_clone.load(Ordering::Relaxed) {
                        std::thread::sleep(upkeep_interval);
                        handle_clone.run_upkeep();
                    }
                })
                .map_err(|e| MetricsInitError::ThreadSpawn(e.to_string()))?;

            Ok(Self {
                handle,
                stop,
                upkeep_thread: Mutex::new(Some(upkeep_thread)),
            })
        }

        /// Renders the current metrics in the Prometheus text exposition format.
        pub fn render(&self) -> String {
            self.handle.render()
        }
    }

    #[cfg(feature = "prometheus")]
    impl Drop for InProcessPrometheus {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Ok(mut guard) = self.upkeep_thread.lock() {
                if let Some(t) = guard.take() {
                    let _ = t.join();
                }
            }
        }
    }

    #[cfg(feature = "prometheus")]
    #[derive(Debug, thiserror::Error)]
    pub enum MetricsInitError {
        #[error("metrics recorder already installed")]
        AlreadyInstalled,
        #[error("failed to install prometheus recorder: {0}")]
        Install(String),
        #[error("failed to spawn upkeep thread: {0}")]
        ThreadSpawn(String),
    }

    #[cfg(feature = "prometheus")]
    impl MetricsInitError {
        fn from_build_error(e: BuildError) -> Self {
            match e {
                BuildError::FailedToSetGlobalRecorder(_) => MetricsInitError::AlreadyInstalled,
                other => MetricsInitError::Install(other.to_string()),
            }
        }
    }

    #[inline]
    pub fn record_ingest(duration: Duration, rows: u64, invalid_rows: u64) {
        ::metrics::histogram!(INGEST_DURATION_SECONDS).record(duration.as_secs_f64());
        if rows > 0 {
            ::metrics::counter!(INGEST_ROWS).increment(rows);
        }
        if invalid_rows > 0 {
            ::metrics::counter!(INGEST_INVALID_ROWS).increment(invalid_rows);
        }
    }

    #[inline]
    pub fn record_store_rows(rows: usize) {
        ::metrics::gauge!(STORE_ROWS).set(rows as f64);
    }

    #[inline]
    pub fn record_window(rows: usize) {
        ::metrics::histogram!(WINDOW_ROWS).record(rows as f64);
    }

    #[inline]
    pub fn record_computation(stream: StreamKind, duration: Duration) {
        let name = match stream {
            StreamKind::Downsample => DOWNSAMPLE_DURATION_SECONDS,
            StreamKind::Aggregate => AGGREGATE_DURATION_SECONDS,
        };
        ::metrics::histogram!(name).record(duration.as_secs_f64());
    }

    #[inline]
    pub fn record_stale_response(stream: StreamKind) {
        ::metrics::counter!(STALE_RESPONSES, "stream" => stream.to_string()).increment(1);
    }

    #[cfg_attr(not(feature = "prometheus"), allow(dead_code))]
    fn describe_all() {
        describe_counter!(INGEST_ROWS, Unit::Count, "Total number of valid rows ingested.");
        describe_counter!(
            INGEST_INVALID_ROWS,
            Unit::Count,
            "Total number of rows skipped because they did not decode to two finite numbers."
        );
        describe_counter!(
            STALE_RESPONSES,
            Unit::Count,
            "Worker responses dropped because a newer request superseded them."
        );

        describe_histogram!(
            INGEST_DURATION_SECONDS,
            Unit::Seconds,
            "Wall time of a dataset load, decode included."
        );
        describe_histogram!(WINDOW_ROWS, Unit::Count, "Rows copied per window read.");
        describe_histogram!(
            DOWNSAMPLE_DURATION_SECONDS,
            Unit::Seconds,
            "Time spent downsampling one window."
        );
        describe_histogram!(
            AGGREGATE_DURATION_SECONDS,
            Unit::Seconds,
            "Time spent aggregating one window."
        );

        describe_gauge!(STORE_ROWS, Unit::Count, "Rows in the currently loaded dataset.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recording(Mutex<Vec<String>>);

    impl ViewEventListener for Recording {
        fn on_event(&self, event: ViewEvent) {
            self.0.lock().unwrap().push(format!("{:?}", event));
        }
    }

    #[test]
    fn listener_receives_events() {
        let rec = Arc::new(Recording::default());
        let listener: Arc<dyn ViewEventListener> = rec.clone();
        listener.on_event(ViewEvent::WorkerStarted { worker: WorkerKind::Store });
        listener.on_event(ViewEvent::DatasetReleased);
        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("Store"));
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        view_metrics::record_ingest(Duration::from_millis(3), 10, 1);
        view_metrics::record_window(100);
        view_metrics::record_computation(StreamKind::Downsample, Duration::from_micros(5));
        view_metrics::record_stale_response(StreamKind::Aggregate);
        view_metrics::record_store_rows(10);
    }
}
