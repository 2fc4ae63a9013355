#![doc = include_str!("../README.md")]
// Declare modules
pub mod aggregate;
pub mod coordinator;
pub mod core;
pub mod downsample;
pub mod error;
pub mod ingest;
pub mod playback;
pub mod storage;
pub mod telemetry;
pub mod types;

/// Two-pass min/max/mean/population-variance over a window's `y` values.
pub use crate::aggregate::aggregate;
/// Per-stream request tokens and stale-response filtering.
pub use crate::coordinator::{RequestToken, StreamCoordinator, StreamKind};
/// Configuration options for the view core.
pub use crate::core::ViewConfig;
/// Main entry point: owned handle over the store and compute workers.
pub use crate::core::{IngestSource, PendingLoad, ViewCore, ViewRequest, ViewUpdate};
/// Stride-aligned downsampling.
pub use crate::downsample::{derive_stride, downsample};
/// Error type for loading and view operations.
pub use crate::error::ViewError;
/// CSV ingestion options.
pub use crate::ingest::{HeaderMode, IngestOptions};
/// Window-position arithmetic for scrubbing and playback.
pub use crate::playback::{target_points, Playhead};
/// Append-only chunked columnar store.
pub use crate::storage::ChunkedStore;
/// Structured event hook for observability.
pub use crate::telemetry::{ViewEvent, ViewEventListener};
/// Value types produced by the core.
pub use crate::types::{AggregateResult, Bucket, DownsampleResult, IngestReport, Value, Window};
