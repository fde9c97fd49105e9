use std::collections::VecDeque;
use serde::Serialize;
use crate::stream::StreamError;
/// One `(x, y)` point of a plotted trace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}
impl Sample {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
/// Fixed-capacity FIFO of samples that keeps the Y range of its contents cached.
///
/// Logical index 0 is always the oldest retained sample. Once full, every append
/// evicts exactly that sample. The cached range is extended on insert and only
/// rescanned when an evicted sample sat on one of the extremes.
///
/// The buffer has no locking of its own. When it is shared between a producer
/// and a reader, every append and every read group must run inside the same
/// critical section (see [`crate::stream::pipeline`]).
#[derive(Clone, Debug)]
pub struct SlidingBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    y_min: f64,
    y_max: f64,
    range_valid: bool,
}
impl SlidingBuffer {
    pub fn new(capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::invalid(
                "buffer capacity must be greater than zero",
            ));
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            y_min: f64::MAX,
            y_max: f64::MIN,
            range_valid: false,
        })
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }
    pub fn append(&mut self, sample: Sample) {
        let evicted = if self.is_full() {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        self.update_range(sample.y, evicted.map(|s| s.y));
    }
    /// Sample at a logical position, 0 being the oldest.
    pub fn at(&self, index: usize) -> Result<&Sample, StreamError> {
        self.samples.get(index).ok_or(StreamError::IndexOutOfRange {
            index,
            len: self.samples.len(),
        })
    }
    pub fn get(&self, index: usize) -> Result<Sample, StreamError> {
        self.at(index).copied()
    }
    pub fn front(&self) -> Result<Sample, StreamError> {
        self.samples.front().copied().ok_or(StreamError::EmptyBuffer)
    }
    pub fn back(&self) -> Result<Sample, StreamError> {
        self.samples.back().copied().ok_or(StreamError::EmptyBuffer)
    }
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
    /// Copies the logical range `[imin, imax]` after clamping it to the retained
    /// samples. Bounds come from a counter that races the buffer, so an empty or
    /// inverted range yields an empty vector instead of an error.
    pub fn slice(&self, imin: i64, imax: i64) -> Vec<Sample> {
        if self.samples.is_empty() {
            return Vec::new();
        }
        let imin = imin.max(0);
        let imax = imax.min(self.samples.len() as i64 - 1);
        if imin > imax {
            return Vec::new();
        }
        self.samples
            .range(imin as usize..=imax as usize)
            .copied()
            .collect()
    }
    pub fn slice_all(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
    /// Cached `(min, max)` of the Y values currently retained.
    pub fn y_range(&self) -> Result<(f64, f64), StreamError> {
        if self.samples.is_empty() || !self.range_valid {
            return Err(StreamError::EmptyBuffer);
        }
        Ok((self.y_min, self.y_max))
    }
    /// Rebuilds the cached range with a full scan.
    pub fn reset_range(&mut self) {
        self.recalculate_range();
    }
    pub fn clear(&mut self) {
        self.samples.clear();
        self.invalidate_range();
    }
    fn update_range(&mut self, new_y: f64, evicted_y: Option<f64>) {
        if !self.range_valid || self.samples.len() <= 1 {
            self.y_min = new_y;
            self.y_max = new_y;
            self.range_valid = true;
            return;
        }
        self.y_min = self.y_min.min(new_y);
        self.y_max = self.y_max.max(new_y);
        // Equality does not prove the extreme is gone (another sample may tie it),
        // but a rescan is always correct.
        if let Some(old) = evicted_y {
            if old == self.y_min || old == self.y_max {
                self.recalculate_range();
            }
        }
    }
    fn recalculate_range(&mut self) {
        let mut ys = self.samples.iter().map(|s| s.y);
        let Some(first) = ys.next() else {
            self.invalidate_range();
            return;
        };
        let (min, max) = ys.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y)));
        self.y_min = min;
        self.y_max = max;
        self.range_valid = true;
    }
    fn invalidate_range(&mut self) {
        self.y_min = f64::MAX;
        self.y_max = f64::MIN;
        self.range_valid = false;
    }
}
