use crate::error::AppendError;
use crate::types::{Value, Window};

/// Default number of rows per chunk (~16MB for the two `f64` columns).
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// A fixed-capacity block of the two columns. Allocated once at full size, never resized.
#[derive(Debug)]
struct Chunk {
    x: Box<[Value]>,
    y: Box<[Value]>,
}

impl Chunk {
    fn new(capacity: usize) -> Self {
        Chunk {
            x: vec![0.0; capacity].into_boxed_slice(),
            y: vec![0.0; capacity].into_boxed_slice(),
        }
    }
}

/// Append-only columnar storage of `(x, y)` rows, organized in fixed-size chunks.
///
/// Row `i` lives in chunk `i / chunk_size` at offset `i % chunk_size`. Memory grows one chunk
/// at a time and existing chunks are never copied.
#[derive(Debug)]
pub struct ChunkedStore {
    chunks: Vec<Chunk>,
    chunk_size: usize,
    total: usize,
}

impl Default for ChunkedStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedStore {
    /// Creates an empty store. A `chunk_size` of 0 is treated as 1.
    pub fn new(chunk_size: usize) -> Self {
        ChunkedStore {
            chunks: Vec::new(),
            chunk_size: chunk_size.max(1),
            total: 0,
        }
    }

    /// Appends one row at the next free index and returns that index.
    ///
    /// Rows that are not a pair of finite numbers are rejected and nothing is written.
    pub fn append(&mut self, x: Value, y: Value) -> Result<usize, AppendError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(AppendError::NonFinite { x, y });
        }
        let index = self.total;
        self.ensure_capacity(index);
        let (chunk_idx, offset) = self.locate(index);
        let chunk = &mut self.chunks[chunk_idx];
        chunk.x[offset] = x;
        chunk.y[offset] = y;
        self.total += 1;
        Ok(index)
    }

    /// Allocates chunks until `index` is addressable. Returns the number of chunks allocated.
    pub fn ensure_capacity(&mut self, index: usize) -> usize {
        let mut allocated = 0;
        while index >= self.capacity() {
            self.chunks.push(Chunk::new(self.chunk_size));
            allocated += 1;
        }
        allocated
    }

    /// Copies rows `[start, start + count)` into a fresh window.
    ///
    /// `start` is clamped to `[0, total - 1]` and `count` to the rows remaining after it.
    /// An empty store yields an empty window.
    pub fn read_window(&self, start: usize, count: usize) -> Window {
        if self.total == 0 {
            return Window::empty();
        }
        let start = start.min(self.total - 1);
        let len = count.min(self.total - start);

        let mut x = Vec::with_capacity(len);
        let mut y = Vec::with_capacity(len);

        let end = start + len;
        let mut idx = start;
        while idx < end {
            let (chunk_idx, offset) = self.locate(idx);
            let take = (self.chunk_size - offset).min(end - idx);
            let chunk = &self.chunks[chunk_idx];
            x.extend_from_slice(&chunk.x[offset..offset + take]);
            y.extend_from_slice(&chunk.y[offset..offset + take]);
            idx += take;
        }

        Window { start, x, y }
    }

    /// Drops every chunk and resets the row count.
    pub fn reset(&mut self) {
        self.chunks = Vec::new();
        self.total = 0;
    }

    pub fn total_rows(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of rows addressable without allocating another chunk.
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.chunk_size, index % self.chunk_size)
    }
}
