use std::time::Duration;

/// Sample type for both columns.
pub type Value = f64;

/// A copied, read-only slice of the dataset addressed by absolute row index.
///
/// A window owns its buffers; it never borrows from the chunked store, so it stays valid
/// after the store is reset or handed to another thread.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Window {
    /// Absolute index of the first row in the window.
    pub start: usize,
    pub x: Vec<Value>,
    pub y: Vec<Value>,
}

impl Window {
    pub fn empty() -> Self {
        Window::default()
    }

    /// Returns the number of rows in the window.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the window holds no rows.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// One reduced output unit of downsampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// `x` at the local midpoint of the bucket's range.
    pub x: Value,
    /// Mean of the finite `y` values in the range.
    pub y_line: Value,
    pub y_min: Value,
    pub y_max: Value,
}

/// Downsampled window in columnar form, ready for a chart surface.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DownsampleResult {
    pub x: Vec<Value>,
    pub y_line: Vec<Value>,
    pub y_min: Vec<Value>,
    pub y_max: Vec<Value>,
}

impl DownsampleResult {
    pub fn with_capacity(capacity: usize) -> Self {
        DownsampleResult {
            x: Vec::with_capacity(capacity),
            y_line: Vec::with_capacity(capacity),
            y_min: Vec::with_capacity(capacity),
            y_max: Vec::with_capacity(capacity),
        }
    }

    /// One-to-one copy of a window: every row is its own bucket.
    pub fn passthrough(x: &[Value], y: &[Value]) -> Self {
        DownsampleResult {
            x: x.to_vec(),
            y_line: y.to_vec(),
            y_min: y.to_vec(),
            y_max: y.to_vec(),
        }
    }

    pub fn push(&mut self, bucket: Bucket) {
        self.x.push(bucket.x);
        self.y_line.push(bucket.y_line);
        self.y_min.push(bucket.y_min);
        self.y_max.push(bucket.y_max);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterates over the result row by row.
    pub fn buckets(&self) -> impl Iterator<Item = Bucket> + '_ {
        (0..self.len()).map(move |i| Bucket {
            x: self.x[i],
            y_line: self.y_line[i],
            y_min: self.y_min[i],
            y_max: self.y_max[i],
        })
    }
}

impl FromIterator<Bucket> for DownsampleResult {
    fn from_iter<I: IntoIterator<Item = Bucket>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut out = DownsampleResult::with_capacity(iter.size_hint().0);
        for bucket in iter {
            out.push(bucket);
        }
        out
    }
}

/// Summary statistics over a window's `y` values.
///
/// When no finite value was seen every field is 0, by convention.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AggregateResult {
    pub min: Value,
    pub max: Value,
    pub mean: Value,
    /// Population variance (divides by `count`).
    pub variance: Value,
    /// Number of finite values that contributed.
    pub count: u64,
}

impl AggregateResult {
    pub fn std_dev(&self) -> Value {
        self.variance.sqrt()
    }
}

/// Outcome of a successful dataset load.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub total_rows: u64,
    pub elapsed: Duration,
    pub invalid_rows: u64,
}

impl IngestReport {
    /// Advisory text for skipped rows, if any were skipped.
    pub fn warning(&self) -> Option<String> {
        if self.invalid_rows > 0 {
            Some(format!(
                "{} row(s) skipped due to invalid data.",
                self.invalid_rows
            ))
        } else {
            None
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
