//! View core: owns the store worker and the compute workers, and routes their responses
//! through the per-stream coordinators.
//!
//! Data flow for one view request:
//! `request_view` -> store worker copies the window -> aggregate worker gets a copy of `y`,
//! downsample worker gets the window -> both answer on the shared response channel ->
//! `poll`/`recv_timeout` deliver only the responses for the latest tokens.

use crate::aggregate::aggregate;
use crate::coordinator::{Acceptance, RequestToken, StreamCoordinator, StreamKind};
use crate::downsample::{
    clamp_threshold, derive_stride, downsample_with, DEFAULT_PARALLEL_MIN_ROWS, MIN_THRESHOLD,
};
use crate::error::ViewError;
use crate::ingest::{ingest_path, ingest_reader, HeaderMode, IngestOptions, Ingested};
use crate::storage::{ChunkedStore, DEFAULT_CHUNK_SIZE};
use crate::telemetry::{noop_event_listener, view_metrics, ViewEvent, ViewEventListener, WorkerKind};
use crate::types::{AggregateResult, DownsampleResult, IngestReport, Value, Window};

use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration options for the ViewCore
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Rows per store chunk
    pub chunk_size: usize,
    /// Smallest point budget accepted by `request_view`; smaller requests are clamped up
    pub min_threshold: usize,
    /// Windows at least this long downsample on the rayon pool
    pub parallel_min_rows: usize,
    /// Drop the current dataset before loading a new one (lower peak memory, but a failed
    /// load leaves the store empty)
    pub release_before_load: bool,
    /// Header handling for CSV input
    pub header: HeaderMode,
    /// CSV field delimiter
    pub delimiter: u8,
    /// Computations slower than this emit `ViewEvent::SlowComputation`
    pub slow_computation_threshold: Duration,
    /// Structured event hook for observability (no-op by default).
    pub event_listener: Arc<dyn ViewEventListener>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_threshold: MIN_THRESHOLD,
            parallel_min_rows: DEFAULT_PARALLEL_MIN_ROWS,
            release_before_load: false,
            header: HeaderMode::Auto,
            delimiter: b',',
            slow_computation_threshold: Duration::from_millis(10),
            event_listener: noop_event_listener(),
        }
    }
}

impl ViewConfig {
    fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            header: self.header,
            chunk_size: self.chunk_size,
            delimiter: self.delimiter,
        }
    }
}

/// Where a dataset is loaded from.
pub enum IngestSource {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

impl std::fmt::Debug for IngestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            IngestSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Commands handled by the store worker, the sole owner of the chunked store.
enum StoreCommand {
    Load {
        source: IngestSource,
        ack: mpsc::Sender<Result<IngestReport, ViewError>>,
    },
    ReadWindow {
        start: usize,
        count: usize,
        ack: mpsc::Sender<Window>,
    },
    View {
        start: usize,
        count: usize,
        threshold: usize,
        downsample: RequestToken,
        aggregate: RequestToken,
    },
    Release {
        ack: mpsc::Sender<()>,
    },
    Shutdown,
}

impl std::fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreCommand::Load { source, .. } => write!(f, "Load({:?})", source),
            StoreCommand::ReadWindow { start, count, .. } => write!(f, "ReadWindow({}, {})", start, count),
            StoreCommand::View { start, count, .. } => write!(f, "View({}, {})", start, count),
            StoreCommand::Release { .. } => f.write_str("Release"),
            StoreCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

enum DownsampleCommand {
    Run {
        token: RequestToken,
        dataset_version: u64,
        window: Window,
        threshold: usize,
        stride: usize,
    },
    Shutdown,
}

enum AggregateCommand {
    Run {
        token: RequestToken,
        dataset_version: u64,
        y: Vec<Value>,
    },
    Shutdown,
}

/// Messages sent back by the compute workers.
enum WorkerResponse {
    Downsampled {
        token: RequestToken,
        dataset_version: u64,
        start: usize,
        stride: usize,
        result: DownsampleResult,
    },
    Aggregated {
        token: RequestToken,
        dataset_version: u64,
        result: AggregateResult,
    },
}

/// Tokens minted for one `request_view` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRequest {
    pub downsample: RequestToken,
    pub aggregate: RequestToken,
}

/// A result accepted by the coordinators.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    Downsampled {
        token: RequestToken,
        /// Absolute index of the first row of the window that was reduced.
        start: usize,
        stride: usize,
        result: DownsampleResult,
    },
    Aggregated {
        token: RequestToken,
        result: AggregateResult,
    },
}

/// Pending dataset load, resolved by the store worker.
#[derive(Debug)]
pub struct PendingLoad {
    rx: mpsc::Receiver<Result<IngestReport, ViewError>>,
}

impl PendingLoad {
    /// Returns the outcome if the load has finished.
    pub fn try_result(&self) -> Option<Result<IngestReport, ViewError>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(ViewError::ContextFailure(
                "store worker dropped the load request".to_string(),
            ))),
        }
    }

    /// Blocks until the load finishes.
    pub fn wait(self) -> Result<IngestReport, ViewError> {
        self.rx
            .recv()
            .map_err(|e| ViewError::ContextFailure(format!("Failed to receive load ack: {}", e)))?
    }
}

/// State shared between the handle and the store worker.
#[derive(Debug, Default)]
struct SharedState {
    total_rows: AtomicU64,
    dataset_version: AtomicU64,
    loading: AtomicBool,
}

/// Explicitly owned handle over the store and compute workers.
///
/// Creating it spawns the workers; dropping it shuts them down and joins them.
#[derive(Debug)]
pub struct ViewCore {
    store_tx: mpsc::Sender<StoreCommand>,
    downsample_tx: mpsc::Sender<DownsampleCommand>,
    aggregate_tx: mpsc::Sender<AggregateCommand>,
    response_rx: mpsc::Receiver<WorkerResponse>,
    workers: Vec<(WorkerKind, JoinHandle<()>)>,
    shared: Arc<SharedState>,
    downsample_stream: StreamCoordinator,
    aggregate_stream: StreamCoordinator,
    config: ViewConfig,
}

fn spawn_named<F>(kind: WorkerKind, body: F) -> Result<JoinHandle<()>, ViewError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(kind.thread_name().to_string())
        .spawn(body)
        .map_err(|e| ViewError::ContextFailure(format!("failed to spawn {}: {}", kind.thread_name(), e)))
}

impl ViewCore {
    /// Spawns the store, downsample and aggregate workers.
    ///
    /// # Errors
    /// Returns `ViewError::ContextFailure` if a worker thread cannot be spawned.
    pub fn with_config(config: ViewConfig) -> Result<Self, ViewError> {
        let shared = Arc::new(SharedState::default());

        let (store_tx, store_rx) = mpsc::channel::<StoreCommand>();
        let (downsample_tx, downsample_rx) = mpsc::channel::<DownsampleCommand>();
        let (aggregate_tx, aggregate_rx) = mpsc::channel::<AggregateCommand>();
        let (response_tx, response_rx) = mpsc::channel::<WorkerResponse>();

        let mut workers = Vec::with_capacity(3);

        let events = config.event_listener.clone();
        let parallel_min_rows = config.parallel_min_rows;
        let slow = config.slow_computation_threshold;
        let tx = response_tx.clone();
        workers.push((
            WorkerKind::Downsample,
            spawn_named(WorkerKind::Downsample, move || {
                run_downsample_worker(downsample_rx, tx, events, parallel_min_rows, slow)
            })?,
        ));

        let events = config.event_listener.clone();
        let tx = response_tx;
        workers.push((
            WorkerKind::Aggregate,
            spawn_named(WorkerKind::Aggregate, move || {
                run_aggregate_worker(aggregate_rx, tx, events, slow)
            })?,
        ));

        let store_worker = StoreWorker {
            store: ChunkedStore::new(config.chunk_size),
            shared: shared.clone(),
            downsample_tx: downsample_tx.clone(),
            aggregate_tx: aggregate_tx.clone(),
            ingest_options: config.ingest_options(),
            release_before_load: config.release_before_load,
            events: config.event_listener.clone(),
        };
        workers.push((
            WorkerKind::Store,
            spawn_named(WorkerKind::Store, move || store_worker.run(store_rx))?,
        ));

        Ok(ViewCore {
            store_tx,
            downsample_tx,
            aggregate_tx,
            response_rx,
            workers,
            shared,
            downsample_stream: StreamCoordinator::new(StreamKind::Downsample),
            aggregate_stream: StreamCoordinator::new(StreamKind::Aggregate),
            config,
        })
    }

    fn send_store(&self, cmd: StoreCommand) -> Result<(), ViewError> {
        self.store_tx
            .send(cmd)
            .map_err(|e| ViewError::ContextFailure(format!("Failed to send store command: {:?}", e.0)))
    }

    /// Starts loading a dataset on the store worker without waiting for it.
    ///
    /// On success the new dataset replaces the current one wholesale. On failure the current
    /// dataset is kept, unless `release_before_load` already dropped it. Views requested
    /// before this call are superseded either way.
    pub fn submit_load(&mut self, source: IngestSource) -> Result<PendingLoad, ViewError> {
        let (ack, rx) = mpsc::channel();
        self.send_store(StoreCommand::Load { source, ack })?;
        self.downsample_stream.invalidate();
        self.aggregate_stream.invalidate();
        Ok(PendingLoad { rx })
    }

    /// Loads a dataset and waits for the outcome.
    pub fn load(&mut self, source: IngestSource) -> Result<IngestReport, ViewError> {
        self.submit_load(source)?.wait()
    }

    /// Loads a CSV file and waits for the outcome.
    pub fn load_path(&mut self, path: impl Into<PathBuf>) -> Result<IngestReport, ViewError> {
        self.load(IngestSource::Path(path.into()))
    }

    /// Drops the current dataset and anything still in flight for it.
    pub fn release(&mut self) -> Result<(), ViewError> {
        let (ack, rx) = mpsc::channel();
        self.send_store(StoreCommand::Release { ack })?;
        rx.recv()
            .map_err(|e| ViewError::ContextFailure(format!("Failed to receive release ack: {}", e)))?;
        self.downsample_stream.invalidate();
        self.aggregate_stream.invalidate();
        Ok(())
    }

    /// Copies rows `[start, start + count)` out of the store (clamped like
    /// [`ChunkedStore::read_window`]).
    pub fn read_window(&self, start: usize, count: usize) -> Result<Window, ViewError> {
        let (ack, rx) = mpsc::channel();
        self.send_store(StoreCommand::ReadWindow { start, count, ack })?;
        rx.recv()
            .map_err(|e| ViewError::ContextFailure(format!("Failed to receive window: {}", e)))
    }

    /// Issues a new view over rows `[start, start + count)` reduced to at most `threshold`
    /// points. Earlier requests are superseded; their results will be dropped.
    pub fn request_view(
        &mut self,
        start: usize,
        count: usize,
        threshold: usize,
    ) -> Result<ViewRequest, ViewError> {
        let threshold = clamp_threshold(threshold.max(self.config.min_threshold));
        let expect_rows = count > 0 && self.total_rows() > 0;

        let request = ViewRequest {
            downsample: self.downsample_stream.issue(expect_rows),
            aggregate: self.aggregate_stream.issue(expect_rows),
        };
        self.send_store(StoreCommand::View {
            start,
            count,
            threshold,
            downsample: request.downsample,
            aggregate: request.aggregate,
        })?;
        Ok(request)
    }

    /// Delivers every accepted response that has already arrived, without blocking.
    pub fn poll(&mut self) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(update) = self.filter(response) {
                updates.push(update);
            }
        }
        updates
    }

    /// Waits up to `timeout` for the next accepted response.
    ///
    /// Returns `Ok(None)` on timeout; superseded responses received meanwhile are dropped.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<ViewUpdate>, ViewError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if let Some(update) = self.filter(response) {
                        return Ok(Some(update));
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ViewError::ContextFailure(
                        "compute workers disconnected".to_string(),
                    ))
                }
            }
        }
    }

    /// Waits until both streams resolve their latest tokens, or `timeout` elapses.
    ///
    /// Returns the latest downsample and aggregate results seen while waiting.
    pub fn wait_for_view(
        &mut self,
        timeout: Duration,
    ) -> Result<(Option<ViewUpdate>, Option<ViewUpdate>), ViewError> {
        let deadline = Instant::now() + timeout;
        let mut downsampled = None;
        let mut aggregated = None;
        while !self.is_settled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.recv_timeout(remaining)? {
                Some(update @ ViewUpdate::Downsampled { .. }) => downsampled = Some(update),
                Some(update @ ViewUpdate::Aggregated { .. }) => aggregated = Some(update),
                None => break,
            }
        }
        Ok((downsampled, aggregated))
    }

    /// True when no stream has a request in flight.
    pub fn is_settled(&self) -> bool {
        [&self.downsample_stream, &self.aggregate_stream]
            .iter()
            .all(|s| !matches!(s.state(), crate::coordinator::StreamState::Pending(_)))
    }

    fn filter(&mut self, response: WorkerResponse) -> Option<ViewUpdate> {
        let current_version = self.dataset_version();
        let (stream, token, version, is_empty) = match &response {
            WorkerResponse::Downsampled { token, dataset_version, result, .. } => {
                (StreamKind::Downsample, *token, *dataset_version, result.is_empty())
            }
            WorkerResponse::Aggregated { token, dataset_version, result } => {
                (StreamKind::Aggregate, *token, *dataset_version, result.count == 0)
            }
        };

        let events = &self.config.event_listener;
        if version != current_version {
            view_metrics::record_stale_response(stream);
            events.on_event(ViewEvent::StaleResponseDropped { stream, token });
            return None;
        }

        let coordinator = match stream {
            StreamKind::Downsample => &mut self.downsample_stream,
            StreamKind::Aggregate => &mut self.aggregate_stream,
        };
        match coordinator.accept(token, is_empty) {
            Acceptance::Accepted => {}
            Acceptance::Stale => {
                view_metrics::record_stale_response(stream);
                events.on_event(ViewEvent::StaleResponseDropped { stream, token });
                return None;
            }
            Acceptance::SuppressedEmpty => {
                events.on_event(ViewEvent::EmptyResponseSuppressed { stream, token });
                return None;
            }
        }

        Some(match response {
            WorkerResponse::Downsampled { token, start, stride, result, .. } => {
                ViewUpdate::Downsampled { token, start, stride, result }
            }
            WorkerResponse::Aggregated { token, result, .. } => ViewUpdate::Aggregated { token, result },
        })
    }

    /// Rows in the current dataset.
    pub fn total_rows(&self) -> usize {
        self.shared.total_rows.load(Ordering::Acquire) as usize
    }

    /// Incremented every time the dataset is replaced or released.
    pub fn dataset_version(&self) -> u64 {
        self.shared.dataset_version.load(Ordering::Acquire)
    }

    /// True while the store worker is ingesting.
    pub fn is_loading(&self) -> bool {
        self.shared.loading.load(Ordering::Acquire)
    }

    pub fn downsample_stream(&self) -> &StreamCoordinator {
        &self.downsample_stream
    }

    pub fn aggregate_stream(&self) -> &StreamCoordinator {
        &self.aggregate_stream
    }

    pub fn get_config(&self) -> &ViewConfig {
        &self.config
    }
}

/// Gracefully stop and join every worker.
impl Drop for ViewCore {
    fn drop(&mut self) {
        // The store worker goes first so it cannot forward work to a stopped compute worker.
        let _ = self.store_tx.send(StoreCommand::Shutdown);
        let mut workers = std::mem::take(&mut self.workers);
        if let Some(pos) = workers.iter().position(|(k, _)| *k == WorkerKind::Store) {
            let (kind, handle) = workers.remove(pos);
            join_worker(kind, handle, &self.config.event_listener);
        }

        let _ = self.downsample_tx.send(DownsampleCommand::Shutdown);
        let _ = self.aggregate_tx.send(AggregateCommand::Shutdown);
        for (kind, handle) in workers {
            join_worker(kind, handle, &self.config.event_listener);
        }
    }
}

fn join_worker(kind: WorkerKind, handle: JoinHandle<()>, events: &Arc<dyn ViewEventListener>) {
    if handle.join().is_err() {
        events.on_event(ViewEvent::WorkerPanicked { worker: kind });
    }
}

struct StoreWorker {
    store: ChunkedStore,
    shared: Arc<SharedState>,
    downsample_tx: mpsc::Sender<DownsampleCommand>,
    aggregate_tx: mpsc::Sender<AggregateCommand>,
    ingest_options: IngestOptions,
    release_before_load: bool,
    events: Arc<dyn ViewEventListener>,
}

impl StoreWorker {
    fn run(mut self, rx: mpsc::Receiver<StoreCommand>) {
        self.events.on_event(ViewEvent::WorkerStarted { worker: WorkerKind::Store });
        // Ends on Shutdown or when the handle is dropped.
        while let Ok(cmd) = rx.recv() {
            match cmd {
                StoreCommand::Load { source, ack } => {
                    let res = self.load(source);
                    let _ = ack.send(res);
                }
                StoreCommand::ReadWindow { start, count, ack } => {
                    let window = self.store.read_window(start, count);
                    view_metrics::record_window(window.len());
                    let _ = ack.send(window);
                }
                StoreCommand::View { start, count, threshold, downsample, aggregate } => {
                    self.dispatch_view(start, count, threshold, downsample, aggregate);
                }
                StoreCommand::Release { ack } => {
                    self.release();
                    let _ = ack.send(());
                }
                StoreCommand::Shutdown => break,
            }
        }
        self.events.on_event(ViewEvent::WorkerStopping { worker: WorkerKind::Store });
    }

    fn load(&mut self, source: IngestSource) -> Result<IngestReport, ViewError> {
        self.events.on_event(ViewEvent::IngestStarted);
        self.shared.loading.store(true, Ordering::Release);
        if self.release_before_load {
            self.release();
        }

        let result = match source {
            IngestSource::Path(path) => ingest_path(&path, &self.ingest_options),
            IngestSource::Reader(reader) => ingest_reader(reader, &self.ingest_options),
        };

        let outcome = match result {
            Ok(Ingested { store, report }) => {
                // The previous dataset is dropped here, only after the new one is complete.
                self.store = store;
                self.shared
                    .total_rows
                    .store(self.store.total_rows() as u64, Ordering::Release);
                self.shared.dataset_version.fetch_add(1, Ordering::AcqRel);
                view_metrics::record_ingest(report.elapsed, report.total_rows, report.invalid_rows);
                view_metrics::record_store_rows(self.store.total_rows());
                self.events.on_event(ViewEvent::IngestCompleted {
                    rows: report.total_rows,
                    invalid_rows: report.invalid_rows,
                    elapsed: report.elapsed,
                });
                Ok(report)
            }
            Err(e) => {
                self.events.on_event(ViewEvent::IngestFailed { error: e.to_string() });
                Err(e)
            }
        };
        self.shared.loading.store(false, Ordering::Release);
        outcome
    }

    fn release(&mut self) {
        self.store.reset();
        self.shared.total_rows.store(0, Ordering::Release);
        self.shared.dataset_version.fetch_add(1, Ordering::AcqRel);
        view_metrics::record_store_rows(0);
        self.events.on_event(ViewEvent::DatasetReleased);
    }

    fn dispatch_view(
        &self,
        start: usize,
        count: usize,
        threshold: usize,
        downsample: RequestToken,
        aggregate: RequestToken,
    ) {
        let window = self.store.read_window(start, count);
        view_metrics::record_window(window.len());
        let dataset_version = self.shared.dataset_version.load(Ordering::Acquire);
        let stride = derive_stride(window.len(), threshold);

        // The aggregate worker gets its own copy; the window itself moves to the downsampler.
        let y = window.y.clone();
        if self
            .aggregate_tx
            .send(AggregateCommand::Run { token: aggregate, dataset_version, y })
            .is_err()
        {
            self.events.on_event(ViewEvent::ContextFailure {
                worker: WorkerKind::Aggregate,
                error: "aggregate worker is gone".to_string(),
            });
        }
        if self
            .downsample_tx
            .send(DownsampleCommand::Run {
                token: downsample,
                dataset_version,
                window,
                threshold,
                stride,
            })
            .is_err()
        {
            self.events.on_event(ViewEvent::ContextFailure {
                worker: WorkerKind::Downsample,
                error: "downsample worker is gone".to_string(),
            });
        }
    }
}

fn run_downsample_worker(
    rx: mpsc::Receiver<DownsampleCommand>,
    tx: mpsc::Sender<WorkerResponse>,
    events: Arc<dyn ViewEventListener>,
    parallel_min_rows: usize,
    slow: Duration,
) {
    events.on_event(ViewEvent::WorkerStarted { worker: WorkerKind::Downsample });
    while let Ok(DownsampleCommand::Run { token, dataset_version, window, threshold, stride }) = rx.recv() {
        let started = Instant::now();
        let result = downsample_with(&window.x, &window.y, threshold, stride, window.start, parallel_min_rows);
        let elapsed = started.elapsed();
        view_metrics::record_computation(StreamKind::Downsample, elapsed);
        if elapsed > slow {
            events.on_event(ViewEvent::SlowComputation {
                stream: StreamKind::Downsample,
                rows: window.len(),
                elapsed,
            });
        }
        let response = WorkerResponse::Downsampled {
            token,
            dataset_version,
            start: window.start,
            stride,
            result,
        };
        if tx.send(response).is_err() {
            break;
        }
    }
    events.on_event(ViewEvent::WorkerStopping { worker: WorkerKind::Downsample });
}

fn run_aggregate_worker(
    rx: mpsc::Receiver<AggregateCommand>,
    tx: mpsc::Sender<WorkerResponse>,
    events: Arc<dyn ViewEventListener>,
    slow: Duration,
) {
    events.on_event(ViewEvent::WorkerStarted { worker: WorkerKind::Aggregate });
    while let Ok(AggregateCommand::Run { token, dataset_version, y }) = rx.recv() {
        let started = Instant::now();
        let result = aggregate(&y);
        let elapsed = started.elapsed();
        view_metrics::record_computation(StreamKind::Aggregate, elapsed);
        if elapsed > slow {
            events.on_event(ViewEvent::SlowComputation {
                stream: StreamKind::Aggregate,
                rows: y.len(),
                elapsed,
            });
        }
        if tx
            .send(WorkerResponse::Aggregated { token, dataset_version, result })
            .is_err()
        {
            break;
        }
    }
    events.on_event(ViewEvent::WorkerStopping { worker: WorkerKind::Aggregate });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_rows(n: usize) -> String {
        (0..n).map(|i| format!("{},{}\n", i, (i % 7) as f64)).collect()
    }

    fn core_with_rows(n: usize) -> ViewCore {
        let config = ViewConfig { chunk_size: 64, ..ViewConfig::default() };
        let mut core = ViewCore::with_config(config).unwrap();
        let report = core
            .load(IngestSource::Reader(Box::new(std::io::Cursor::new(csv_rows(n)))))
            .unwrap();
        assert_eq!(report.total_rows, n as u64);
        core
    }

    #[test]
    fn test_load_updates_shared_state() {
        let core = core_with_rows(500);
        assert_eq!(core.total_rows(), 500);
        assert_eq!(core.dataset_version(), 1);
        assert!(!core.is_loading());
    }

    #[test]
    fn test_read_window_round_trip_through_worker() {
        let core = core_with_rows(200);
        let w = core.read_window(60, 10).unwrap();
        assert_eq!(w.start, 60);
        assert_eq!(w.x, (60..70).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_load_supersedes_pending_views() {
        let mut core = core_with_rows(1000);
        core.request_view(0, 1000, 100).unwrap();
        core.load(IngestSource::Reader(Box::new(std::io::Cursor::new(csv_rows(500)))))
            .unwrap();
        assert!(core.is_settled());
        assert_eq!(core.downsample_stream().last_issued(), None);
        assert_eq!(core.aggregate_stream().last_issued(), None);
    }

    #[test]
    fn test_view_delivers_both_streams() {
        let mut core = core_with_rows(1000);
        let req = core.request_view(0, 1000, 100).unwrap();
        let (ds, agg) = core.wait_for_view(Duration::from_secs(5)).unwrap();
        match ds {
            Some(ViewUpdate::Downsampled { token, stride, result, .. }) => {
                assert_eq!(token, req.downsample);
                assert_eq!(stride, 10);
                assert_eq!(result.len(), 100);
            }
            other => panic!("unexpected downsample update: {:?}", other),
        }
        match agg {
            Some(ViewUpdate::Aggregated { token, result }) => {
                assert_eq!(token, req.aggregate);
                assert_eq!(result.count, 1000);
                assert_eq!(result.min, 0.0);
                assert_eq!(result.max, 6.0);
            }
            other => panic!("unexpected aggregate update: {:?}", other),
        }
        assert!(core.is_settled());
    }

    #[test]
    fn test_threshold_is_clamped() {
        let mut core = core_with_rows(100);
        core.request_view(0, 100, 0).unwrap();
        let (ds, _) = core.wait_for_view(Duration::from_secs(5)).unwrap();
        match ds {
            Some(ViewUpdate::Downsampled { result, .. }) => assert!(result.len() <= MIN_THRESHOLD),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
