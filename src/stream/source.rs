use std::collections::VecDeque;
use rand::{rngs::StdRng, Rng, SeedableRng};
use crate::types::Notification;
/// Something that yields one sample pair per producer tick.
///
/// `None` means the source is exhausted and the producer should stop.
pub trait SampleSource: Send {
    fn next_sample(&mut self) -> Option<Notification>;
}
/// Synthetic sine/cosine pair with a small random jitter.
///
/// Each instance is phase-shifted by `instance_id * 0.1` so concurrent
/// pipelines are easy to tell apart. The jitter comes from an owned, seeded
/// generator, so two generators built with the same arguments agree exactly.
pub struct WaveGenerator {
    phase: f64,
    rng: StdRng,
    next_x: u64,
    limit: Option<u64>,
}
impl WaveGenerator {
    pub const AMPLITUDE: f64 = 10.0;
    pub const LEFT_RATE: f64 = 0.05;
    pub const RIGHT_RATE: f64 = 0.03;
    pub fn new(instance_id: i32, seed: u64) -> Self {
        Self {
            phase: instance_id as f64 * 0.1,
            rng: StdRng::seed_from_u64(seed),
            next_x: 0,
            limit: None,
        }
    }
    /// Stops after `limit` samples.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
    pub fn produced(&self) -> u64 {
        self.next_x
    }
    fn jitter(&mut self) -> f64 {
        self.rng.gen_range(0..100u32) as f64 / 100.0
    }
}
impl SampleSource for WaveGenerator {
    fn next_sample(&mut self) -> Option<Notification> {
        if self.limit.is_some_and(|limit| self.next_x >= limit) {
            return None;
        }
        let x = self.next_x as f64;
        self.next_x += 1;
        let y_left = Self::AMPLITUDE * (Self::LEFT_RATE * x + self.phase).sin() + self.jitter();
        let y_right = Self::AMPLITUDE * (Self::RIGHT_RATE * x + self.phase).cos() + self.jitter();
        Some(Notification { x, y_left, y_right })
    }
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Notification>,
}
impl ManualSource {
    pub fn new(samples: impl IntoIterator<Item = Notification>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
        }
    }
}
impl SampleSource for ManualSource {
    fn next_sample(&mut self) -> Option<Notification> {
        self.queue.pop_front()
    }
}
