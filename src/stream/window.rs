use serde::Serialize;
use crate::stream::buffer::Sample;
/// Logical index range and X axis span of the visible window for the newest sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WindowBounds {
    pub imin: i64,
    pub imax: i64,
    pub x_min: f64,
    pub x_max: f64,
}
impl WindowBounds {
    /// The window ends at sample `x` until the buffer is full, then sticks to
    /// the newest `window_size` retained samples while the X axis keeps scrolling.
    pub fn for_x(x: f64, capacity: usize, window_size: usize) -> Self {
        let newest = x.floor() as i64;
        let imax = (capacity as i64 - 1).min(newest);
        let imin = (imax - window_size as i64 + 1).max(0);
        let x_min = (newest - window_size as i64 + 1).max(0) as f64;
        Self {
            imin,
            imax,
            x_min,
            x_max: x,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.imin > self.imax
    }
}
/// Both traces of one window, read under a single lock.
#[derive(Clone, Debug, Serialize)]
pub struct WindowSnapshot {
    pub bounds: WindowBounds,
    pub left: Vec<Sample>,
    pub right: Vec<Sample>,
    /// Range over everything retained, not only the window.
    pub left_range: Option<(f64, f64)>,
    pub right_range: Option<(f64, f64)>,
}
impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.left.len()
    }
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}
/// Y axis that only moves when the data escapes it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}
impl Default for AxisRange {
    fn default() -> Self {
        // Fits the synthetic waveform (amplitude 10 plus jitter) without rescaling.
        Self {
            min: -12.0,
            max: 12.0,
        }
    }
}
impl AxisRange {
    /// Adopts `range` when any part of it falls outside the current axis.
    /// Returns whether the axis changed.
    pub fn follow(&mut self, range: (f64, f64)) -> bool {
        let (min, max) = range;
        if min < self.min || max > self.max {
            self.min = min;
            self.max = max;
            return true;
        }
        false
    }
}
