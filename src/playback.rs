//! Window-position arithmetic for scrubbing and playback.
//!
//! Only the index math lives here; timers and UI state belong to the caller.

/// Default window size in rows.
pub const DEFAULT_WINDOW: usize = 5_000;
/// Default playback step in rows.
pub const DEFAULT_STEP: usize = 10;

/// Points to request for a plot `width` pixels wide at `ratio` pixels per point.
#[inline]
pub fn target_points(width: usize, ratio: usize) -> usize {
    (width / ratio.max(1)).max(1)
}

/// Result of one playback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved,
    /// The window reached the end of the dataset and playback should stop.
    Finished,
}

/// Current view position over a dataset of `total` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playhead {
    pub start: usize,
    pub window: usize,
    pub step: usize,
    pub wrap: bool,
}

impl Default for Playhead {
    fn default() -> Self {
        Playhead {
            start: 0,
            window: DEFAULT_WINDOW,
            step: DEFAULT_STEP,
            wrap: false,
        }
    }
}

impl Playhead {
    /// Sets the window size, clamped to `[1, total]`, and pulls `start` back so the window
    /// stays inside the dataset. With `total == 0` only the lower bound applies.
    pub fn set_window(&mut self, window: usize, total: usize) {
        let upper = if total > 0 { total } else { window };
        self.window = window.min(upper).max(1);
        let max_start = total.saturating_sub(self.window);
        self.start = self.start.min(max_start);
    }

    /// Last start index that keeps a full window in bounds.
    pub fn max_start(&self, total: usize) -> usize {
        total.saturating_sub(self.window)
    }

    /// Moves `start` forward by `max(1, step)`.
    ///
    /// With `wrap` the position cycles modulo `max_start + 1`; without it, it stops at
    /// `max_start` and reports [`Advance::Finished`].
    pub fn advance(&mut self, total: usize) -> Advance {
        let max_start = self.max_start(total);
        let step = self.step.max(1);
        if self.wrap {
            self.start = (self.start + step) % (max_start + 1);
            Advance::Moved
        } else {
            self.start = (self.start + step).min(max_start);
            if self.start >= max_start {
                Advance::Finished
            } else {
                Advance::Moved
            }
        }
    }

    pub fn jump_to_end(&mut self, total: usize) {
        self.start = self.max_start(total);
    }

    pub fn reset(&mut self) {
        self.start = 0;
    }
}
