//! Producer/consumer plumbing around a pair of [`SlidingBuffer`]s.
//!
//! A producer tick pulls the next sample from the source, then takes the
//! buffer lock, checks that its run is still the current one, appends the
//! sample to both traces and queues its notification. The source is polled
//! outside the lock, so a slow source never holds up a reader or a stop
//! request. Inline and offloaded modes differ only in who runs the tick (the
//! foreground timer in [`StreamPipeline::pump`] or a background thread), so
//! both modes leave the buffers in the same state for the same source.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use crate::config::PipelineConfig;
use crate::stream::buffer::{Sample, SlidingBuffer};
use crate::stream::error::StreamError;
use crate::stream::source::{SampleSource, WaveGenerator};
use crate::stream::window::{WindowBounds, WindowSnapshot};
use crate::types::{ExecutionMode, Notification, PipelineState, Trace};
/// Overdue ticks a producer may catch up back to back before its schedule is re-based.
const MAX_CATCH_UP_TICKS: u32 = 1000;
/// Run id meaning "stopped".
const NO_RUN: u64 = 0;
/// Left and right traces, always appended together.
#[derive(Clone, Debug)]
pub struct TraceBuffers {
    pub left: SlidingBuffer,
    pub right: SlidingBuffer,
}
impl TraceBuffers {
    pub fn new(capacity: usize) -> Result<Self, StreamError> {
        Ok(Self {
            left: SlidingBuffer::new(capacity)?,
            right: SlidingBuffer::new(capacity)?,
        })
    }
    pub fn push(&mut self, n: &Notification) {
        self.left.append(Sample::new(n.x, n.y_left));
        self.right.append(Sample::new(n.x, n.y_right));
    }
    pub fn trace(&self, trace: Trace) -> &SlidingBuffer {
        match trace {
            Trace::Left => &self.left,
            Trace::Right => &self.right,
        }
    }
    pub fn len(&self) -> usize {
        self.left.len()
    }
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.left.capacity()
    }
    pub fn window(&self, bounds: WindowBounds) -> WindowSnapshot {
        WindowSnapshot {
            bounds,
            left: self.left.slice(bounds.imin, bounds.imax),
            right: self.right.slice(bounds.imin, bounds.imax),
            left_range: self.left.y_range().ok(),
            right_range: self.right.y_range().ok(),
        }
    }
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
/// Outcome of handing notifications to the consumer queue.
///
/// The receiving end lives in the [`StreamPipeline`] and outlives every run of
/// its producer, so `dropped` stays at zero in normal operation. It only moves
/// if a send ever fails, which is then counted and logged once instead of
/// stopping the producer.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    sent: AtomicU64,
    dropped: AtomicU64,
}
impl DeliveryStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
    /// Samples handed to the queue, delivered or not.
    pub fn produced(&self) -> u64 {
        self.sent() + self.dropped()
    }
    fn record<T>(&self, instance_id: i32, result: Result<(), SendError<T>>) {
        match result {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    warn!("pipeline {instance_id}: consumer is gone, dropping notifications");
                }
            }
        }
    }
}
struct Shared {
    instance_id: i32,
    buffers: Mutex<TraceBuffers>,
    source: Mutex<Box<dyn SampleSource>>,
    // Id of the active run, NO_RUN when stopped. A producer only appends while
    // its own id is current, so one left behind by a timed-out stop stays inert.
    run: AtomicU64,
    delivery: DeliveryStats,
}
impl Shared {
    fn lock(&self) -> MutexGuard<'_, TraceBuffers> {
        // Appends never leave the buffers half-written, so a poisoned lock is still usable.
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn current_run(&self) -> u64 {
        self.run.load(Ordering::Acquire)
    }
    fn is_running(&self) -> bool {
        self.current_run() != NO_RUN
    }
    /// Produces, stores and announces one sample for `run`. Returns false once
    /// that run is over or the source has run dry.
    fn produce_one(&self, run: u64, tx: &Sender<Notification>) -> bool {
        if self.current_run() != run {
            return false;
        }
        let next = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_sample();
        let mut buffers = self.lock();
        if self.current_run() != run {
            return false;
        }
        let Some(sample) = next else {
            let _ = self
                .run
                .compare_exchange(run, NO_RUN, Ordering::AcqRel, Ordering::Acquire);
            debug!("pipeline {}: sample source exhausted", self.instance_id);
            return false;
        };
        buffers.push(&sample);
        self.delivery.record(self.instance_id, tx.send(sample));
        true
    }
    /// Ends the current run without waiting. Returns whether one was active.
    fn end_run(&self) -> bool {
        self.run.swap(NO_RUN, Ordering::AcqRel) != NO_RUN
    }
    /// Waits out an append that passed its run check before `end_run`. The
    /// source is never polled under this lock, so the wait is one append long.
    fn barrier(&self) {
        drop(self.lock());
    }
}
/// Read access to a pipeline's buffers. Each call is one locked read group.
#[derive(Clone)]
pub struct BufferReader {
    shared: Arc<Shared>,
    window_size: usize,
}
impl BufferReader {
    /// Runs `f` with the buffers locked. Keep it short: the producer waits.
    pub fn read<R>(&self, f: impl FnOnce(&TraceBuffers) -> R) -> R {
        f(&self.shared.lock())
    }
    pub fn len(&self) -> usize {
        self.read(TraceBuffers::len)
    }
    pub fn is_empty(&self) -> bool {
        self.read(TraceBuffers::is_empty)
    }
    pub fn slice(&self, trace: Trace, imin: i64, imax: i64) -> Vec<Sample> {
        self.read(|b| b.trace(trace).slice(imin, imax))
    }
    pub fn y_range(&self, trace: Trace) -> Result<(f64, f64), StreamError> {
        self.read(|b| b.trace(trace).y_range())
    }
    pub fn window(&self, bounds: WindowBounds) -> WindowSnapshot {
        self.read(|b| b.window(bounds))
    }
    /// Window ending at the sample carried by `n`.
    pub fn frame(&self, n: &Notification) -> WindowSnapshot {
        self.read(|b| b.window(WindowBounds::for_x(n.x, b.capacity(), self.window_size)))
    }
}
/// Stops a pipeline from anywhere, including from inside its own sample handler.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}
impl StopHandle {
    pub fn stop(&self) {
        if self.shared.end_run() {
            info!("pipeline {}: stop requested", self.shared.instance_id);
        }
        self.shared.barrier();
    }
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}
struct Worker {
    handle: JoinHandle<()>,
    // Dropping the sender wakes the producer out of its sleep.
    cancel: Sender<()>,
    // Disconnects when the producer thread returns.
    done: Receiver<()>,
}
impl Worker {
    fn shutdown(self, shared: &Shared, timeout: Duration) {
        drop(self.cancel);
        shared.barrier();
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if self.handle.join().is_err() {
                    warn!("pipeline {}: producer thread panicked", shared.instance_id);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "pipeline {}: producer did not exit within {timeout:?}, detaching it",
                    shared.instance_id
                );
            }
        }
    }
}
/// Fixed-cadence tick times: tick `k` is due at `start + k * period`. After
/// `MAX_CATCH_UP_TICKS` overdue ticks in a row the schedule restarts from now.
#[derive(Clone, Copy, Debug)]
struct TickSchedule {
    next: Instant,
    period: Duration,
    overdue: u32,
}
impl TickSchedule {
    fn new(start: Instant, period: Duration) -> Result<Self, StreamError> {
        let next = start
            .checked_add(period)
            .ok_or_else(|| StreamError::invalid("period is too large"))?;
        Ok(Self {
            next,
            period,
            overdue: 0,
        })
    }
    fn is_due(&self, now: Instant) -> bool {
        self.next <= now
    }
    /// Moves past the tick that just fired. Returns true when missed ticks were skipped.
    fn advance(&mut self, now: Instant) -> bool {
        let next = self.next.checked_add(self.period).unwrap_or(self.next);
        if next > now {
            self.overdue = 0;
            self.next = next;
            return false;
        }
        self.overdue += 1;
        if self.overdue < MAX_CATCH_UP_TICKS {
            self.next = next;
            return false;
        }
        self.overdue = 0;
        self.next = now.checked_add(self.period).unwrap_or(now);
        true
    }
}
enum Driver {
    Idle,
    Timer { schedule: TickSchedule, run: u64 },
    Worker(Worker),
}
type Handler = Box<dyn FnMut(&Notification, &BufferReader) + Send>;
/// A producer feeding two sliding buffers and a consumer notified once per sample.
pub struct StreamPipeline {
    config: PipelineConfig,
    shared: Arc<Shared>,
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    handler: Option<Handler>,
    driver: Driver,
    last_run: u64,
    produced_before_run: u64,
}
impl StreamPipeline {
    /// Offloaded pipeline with the synthetic waveform and default window.
    pub fn configure(
        capacity: usize,
        period_ms: u64,
        instance_id: i32,
    ) -> Result<Self, StreamError> {
        let defaults = PipelineConfig::default();
        Self::new(PipelineConfig {
            capacity,
            period_ms,
            instance_id,
            window_size: defaults.window_size.min(capacity.max(1)),
            ..defaults
        })
    }
    pub fn new(config: PipelineConfig) -> Result<Self, StreamError> {
        let source = WaveGenerator::new(config.instance_id, config.seed)
            .with_limit(config.max_samples);
        Self::with_source(config, source)
    }
    pub fn with_source(
        config: PipelineConfig,
        source: impl SampleSource + 'static,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        let buffers = TraceBuffers::new(config.capacity)?;
        let shared = Arc::new(Shared {
            instance_id: config.instance_id,
            buffers: Mutex::new(buffers),
            source: Mutex::new(Box::new(source)),
            run: AtomicU64::new(NO_RUN),
            delivery: DeliveryStats::default(),
        });
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            config,
            shared,
            tx,
            rx,
            handler: None,
            driver: Driver::Idle,
            last_run: NO_RUN,
            produced_before_run: 0,
        })
    }
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
    pub fn instance_id(&self) -> i32 {
        self.config.instance_id
    }
    pub fn state(&self) -> PipelineState {
        if self.shared.is_running() {
            PipelineState::Running
        } else {
            PipelineState::Stopped
        }
    }
    pub fn reader(&self) -> BufferReader {
        BufferReader {
            shared: Arc::clone(&self.shared),
            window_size: self.config.window_size,
        }
    }
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }
    pub fn delivery(&self) -> &DeliveryStats {
        &self.shared.delivery
    }
    /// Samples produced since the most recent `start`.
    pub fn samples_this_run(&self) -> u64 {
        self.shared.delivery.produced() - self.produced_before_run
    }
    /// Registers the consumer callback, replacing any previous one.
    pub fn on_sample<F>(&mut self, handler: F)
    where
        F: FnMut(&Notification, &BufferReader) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.shared.is_running() {
            debug!("pipeline {}: already running", self.instance_id());
            return Ok(());
        }
        // A producer that stopped by itself may still need reaping.
        self.release_driver();
        self.last_run += 1;
        let run = self.last_run;
        self.produced_before_run = self.shared.delivery.produced();
        self.shared.run.store(run, Ordering::Release);
        let period = self.config.period();
        let schedule = match TickSchedule::new(Instant::now(), period) {
            Ok(schedule) => schedule,
            Err(err) => {
                self.shared.end_run();
                return Err(err);
            }
        };
        match self.config.mode {
            ExecutionMode::Inline => {
                self.driver = Driver::Timer { schedule, run };
            }
            ExecutionMode::Offloaded => match self.spawn_worker(schedule, run) {
                Ok(worker) => self.driver = Driver::Worker(worker),
                Err(err) => {
                    self.shared.end_run();
                    return Err(err);
                }
            },
        }
        info!(
            "pipeline {} started ({}, period {:?})",
            self.instance_id(),
            self.config.mode.tag(),
            period
        );
        Ok(())
    }
    /// Idempotent. Once this returns the producer emits nothing more; already
    /// queued notifications can still be drained with [`Self::pump`]. Waits at
    /// most `stop_timeout_ms` for the producer thread, then detaches it.
    pub fn stop(&mut self) {
        let was_running = self.shared.end_run();
        self.release_driver();
        if was_running {
            info!(
                "pipeline {} stopped after {} samples",
                self.instance_id(),
                self.samples_this_run()
            );
        }
    }
    /// Runs any due inline timer ticks, then hands every queued notification
    /// to the handler in production order. Returns how many were handed over.
    pub fn pump(&mut self) -> usize {
        let now = Instant::now();
        if let Driver::Timer { schedule, run } = &mut self.driver {
            while schedule.is_due(now) && self.shared.produce_one(*run, &self.tx) {
                if schedule.advance(now) {
                    debug!(
                        "pipeline {}: inline timer fell behind, skipping missed ticks",
                        self.config.instance_id
                    );
                }
            }
        }
        self.drain()
    }
    /// One immediate inline tick, independent of the timer. Offloaded pipelines
    /// already have their single writer, so this only drains there.
    pub fn step(&mut self) -> usize {
        let run = self.shared.current_run();
        if self.config.mode == ExecutionMode::Inline && run != NO_RUN {
            self.shared.produce_one(run, &self.tx);
        }
        self.drain()
    }
    pub fn clear_buffers(&self) {
        self.shared.lock().clear();
    }
    fn drain(&mut self) -> usize {
        let reader = self.reader();
        let mut handed = 0;
        while let Ok(n) = self.rx.try_recv() {
            if let Some(handler) = self.handler.as_mut() {
                handler(&n, &reader);
            }
            handed += 1;
        }
        handed
    }
    fn spawn_worker(&self, schedule: TickSchedule, run: u64) -> Result<Worker, StreamError> {
        let (cancel, cancel_rx) = mpsc::channel::<()>();
        let (done_tx, done) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let tx = self.tx.clone();
        let handle = thread::Builder::new()
            .name(format!("producer-{}", self.instance_id()))
            .spawn(move || {
                let _done = done_tx;
                run_producer(&shared, &tx, schedule, &cancel_rx, run);
            })
            .map_err(StreamError::Spawn)?;
        Ok(Worker {
            handle,
            cancel,
            done,
        })
    }
    fn release_driver(&mut self) {
        match std::mem::replace(&mut self.driver, Driver::Idle) {
            Driver::Worker(worker) => worker.shutdown(&self.shared, self.config.stop_timeout()),
            Driver::Timer { .. } | Driver::Idle => self.shared.barrier(),
        }
    }
}
impl Drop for StreamPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
/// Background producer loop, one tick per schedule slot until cancelled,
/// stopped or out of samples.
fn run_producer(
    shared: &Shared,
    tx: &Sender<Notification>,
    mut schedule: TickSchedule,
    cancel: &Receiver<()>,
    run: u64,
) {
    loop {
        let wait = schedule.next.saturating_duration_since(Instant::now());
        match cancel.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if !shared.produce_one(run, tx) {
            break;
        }
        if schedule.advance(Instant::now()) {
            debug!(
                "pipeline {}: producer fell behind, skipping missed ticks",
                shared.instance_id
            );
        }
    }
    debug!("pipeline {}: producer thread exiting", shared.instance_id);
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::source::ManualSource;
    fn config(mode: ExecutionMode, capacity: usize, max_samples: Option<u64>) -> PipelineConfig {
        PipelineConfig {
            capacity,
            period_ms: 1,
            instance_id: 1,
            mode,
            seed: 5,
            window_size: capacity.min(10),
            stop_timeout_ms: 2000,
            max_samples,
        }
    }
    fn collector(pipeline: &mut StreamPipeline) -> Arc<Mutex<Vec<Notification>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pipeline.on_sample(move |n, _| sink.lock().unwrap().push(*n));
        seen
    }
    fn pump_until_stopped(pipeline: &mut StreamPipeline) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while pipeline.state() == PipelineState::Running && Instant::now() < deadline {
            pipeline.pump();
            thread::sleep(Duration::from_millis(1));
        }
        pipeline.pump();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
    fn expected_stream(cfg: &PipelineConfig, n: u64) -> Vec<Notification> {
        let mut generator = WaveGenerator::new(cfg.instance_id, cfg.seed).with_limit(Some(n));
        std::iter::from_fn(|| generator.next_sample()).collect()
    }
    #[test]
    fn configure_rejects_zero_period_and_capacity() {
        assert!(matches!(
            StreamPipeline::configure(100, 0, 0),
            Err(StreamError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            StreamPipeline::configure(0, 10, 0),
            Err(StreamError::InvalidConfiguration(_))
        ));
        let pipeline = StreamPipeline::configure(100, 10, 4).unwrap();
        assert_eq!(pipeline.config().window_size, 100);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
    #[test]
    fn offloaded_consumer_sees_every_sample_in_order() {
        let cfg = config(ExecutionMode::Offloaded, 1000, Some(200));
        let mut pipeline = StreamPipeline::new(cfg.clone()).unwrap();
        let seen = collector(&mut pipeline);
        pipeline.start().unwrap();
        pump_until_stopped(&mut pipeline);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, expected_stream(&cfg, 200));
        let reader = pipeline.reader();
        let left = reader.slice(Trace::Left, 0, i64::MAX);
        assert_eq!(left.len(), 200);
        for (sample, n) in left.iter().zip(&seen) {
            assert_eq!(*sample, Sample::new(n.x, n.y_left));
        }
        assert_eq!(pipeline.delivery().sent(), 200);
        assert_eq!(pipeline.delivery().dropped(), 0);
    }
    #[test]
    fn inline_and_offloaded_fill_identical_buffers() {
        let inline_cfg = config(ExecutionMode::Inline, 64, Some(150));
        let mut inline = StreamPipeline::new(inline_cfg).unwrap();
        inline.start().unwrap();
        while inline.state() == PipelineState::Running {
            inline.step();
        }
        let mut offloaded =
            StreamPipeline::new(config(ExecutionMode::Offloaded, 64, Some(150))).unwrap();
        offloaded.start().unwrap();
        pump_until_stopped(&mut offloaded);
        let a = inline.reader().read(|b| b.clone());
        let b = offloaded.reader().read(|b| b.clone());
        assert_eq!(a.len(), 64);
        assert_eq!(a.left.slice_all(), b.left.slice_all());
        assert_eq!(a.right.slice_all(), b.right.slice_all());
        assert_eq!(a.left.y_range().unwrap(), b.left.y_range().unwrap());
        assert_eq!(a.right.y_range().unwrap(), b.right.y_range().unwrap());
    }
    #[test]
    fn inline_timer_produces_on_pump() {
        let mut pipeline =
            StreamPipeline::new(config(ExecutionMode::Inline, 100, None)).unwrap();
        let seen = collector(&mut pipeline);
        assert_eq!(pipeline.pump(), 0);
        pipeline.start().unwrap();
        thread::sleep(Duration::from_millis(15));
        let handed = pipeline.pump();
        assert!(handed >= 1, "expected due ticks after 15ms, got {handed}");
        pipeline.stop();
        assert_eq!(seen.lock().unwrap().len(), handed);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(pipeline.pump(), 0);
    }
    #[test]
    fn stop_is_idempotent_and_final() {
        let mut pipeline =
            StreamPipeline::new(config(ExecutionMode::Offloaded, 100_000, None)).unwrap();
        let seen = collector(&mut pipeline);
        pipeline.start().unwrap();
        pipeline.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        pipeline.stop();
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        let reader = pipeline.reader();
        let frozen = reader.len();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(reader.len(), frozen);
        pipeline.pump();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(pipeline.pump(), 0);
        // Everything queued before stop is still delivered, nothing after.
        assert_eq!(seen.lock().unwrap().len(), frozen);
    }
    #[test]
    fn handler_can_stop_its_own_pipeline() {
        let mut pipeline =
            StreamPipeline::new(config(ExecutionMode::Offloaded, 1000, None)).unwrap();
        let stop = pipeline.stop_handle();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pipeline.on_sample(move |n, reader| {
            // Reading from inside the handler must not block on our own lock.
            let _ = reader.frame(n);
            sink.lock().unwrap().push(n.x);
            if n.x >= 5.0 {
                stop.stop();
            }
        });
        pipeline.start().unwrap();
        pump_until_stopped(&mut pipeline);
        let frozen = pipeline.reader().len();
        thread::sleep(Duration::from_millis(10));
        pipeline.pump();
        assert_eq!(pipeline.reader().len(), frozen);
        assert_eq!(seen.lock().unwrap().len(), frozen);
        assert!(seen.lock().unwrap().contains(&5.0));
        pipeline.stop();
    }
    #[test]
    fn handler_reads_window_for_each_sample() {
        let mut cfg = config(ExecutionMode::Inline, 20, None);
        cfg.window_size = 5;
        let samples: Vec<Notification> = (0..30)
            .map(|i| Notification {
                x: i as f64,
                y_left: i as f64,
                y_right: -(i as f64),
            })
            .collect();
        let mut pipeline = StreamPipeline::with_source(cfg, ManualSource::new(samples)).unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        pipeline.on_sample(move |n, reader| sink.lock().unwrap().push(reader.frame(n)));
        pipeline.start().unwrap();
        for _ in 0..30 {
            assert_eq!(pipeline.step(), 1);
        }
        let frames = frames.lock().unwrap();
        let first = &frames[0];
        assert_eq!(first.left, vec![Sample::new(0.0, 0.0)]);
        assert_eq!(first.left_range, Some((0.0, 0.0)));
        let last = frames.last().unwrap();
        assert_eq!((last.bounds.imin, last.bounds.imax), (15, 19));
        assert_eq!(last.left.len(), 5);
        assert_eq!(last.left.last().unwrap().x, 29.0);
        assert_eq!(last.left_range, Some((10.0, 29.0)));
        assert_eq!(last.right_range, Some((-29.0, -10.0)));
        assert_eq!(pipeline.step(), 0);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
    #[test]
    fn restart_continues_the_same_stream() {
        let cfg = config(ExecutionMode::Inline, 100, None);
        let mut pipeline = StreamPipeline::new(cfg.clone()).unwrap();
        let seen = collector(&mut pipeline);
        pipeline.start().unwrap();
        for _ in 0..3 {
            pipeline.step();
        }
        pipeline.stop();
        assert_eq!(pipeline.step(), 0);
        pipeline.start().unwrap();
        for _ in 0..2 {
            pipeline.step();
        }
        assert_eq!(*seen.lock().unwrap(), expected_stream(&cfg, 5));
        pipeline.clear_buffers();
        assert!(pipeline.reader().is_empty());
        assert!(matches!(
            pipeline.reader().y_range(Trace::Left),
            Err(StreamError::EmptyBuffer)
        ));
    }
    #[test]
    fn failed_delivery_is_counted_not_fatal() {
        let pipeline = StreamPipeline::new(config(ExecutionMode::Inline, 10, None)).unwrap();
        let (tx, rx) = mpsc::channel();
        drop(rx);
        pipeline.shared.run.store(1, Ordering::Release);
        assert!(pipeline.shared.produce_one(1, &tx));
        assert!(pipeline.shared.produce_one(1, &tx));
        assert_eq!(pipeline.delivery().dropped(), 2);
        assert_eq!(pipeline.reader().len(), 2);
    }
    struct SlowSource {
        delay: Duration,
        next_x: f64,
    }
    impl SampleSource for SlowSource {
        fn next_sample(&mut self) -> Option<Notification> {
            thread::sleep(self.delay);
            let x = self.next_x;
            self.next_x += 1.0;
            Some(Notification {
                x,
                y_left: x,
                y_right: -x,
            })
        }
    }
    #[test]
    fn slow_source_does_not_hold_up_stop_or_readers() {
        let mut cfg = config(ExecutionMode::Offloaded, 100, None);
        cfg.stop_timeout_ms = 50;
        let source = SlowSource {
            delay: Duration::from_millis(300),
            next_x: 0.0,
        };
        let mut pipeline = StreamPipeline::with_source(cfg, source).unwrap();
        let seen = collector(&mut pipeline);
        pipeline.start().unwrap();
        // The producer is now parked inside next_sample.
        thread::sleep(Duration::from_millis(20));
        let read_started = Instant::now();
        assert!(pipeline.reader().is_empty());
        assert!(read_started.elapsed() < Duration::from_millis(100));
        let stop_started = Instant::now();
        pipeline.stop();
        let took = stop_started.elapsed();
        assert!(took < Duration::from_millis(250), "stop took {took:?}");
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        // Let the detached producer finish its sample; it must not land.
        thread::sleep(Duration::from_millis(400));
        assert!(pipeline.reader().is_empty());
        assert_eq!(pipeline.pump(), 0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(pipeline.samples_this_run(), 0);
        pipeline.stop();
    }
    #[test]
    fn sample_count_resets_each_run() {
        let mut pipeline =
            StreamPipeline::new(config(ExecutionMode::Inline, 100, None)).unwrap();
        pipeline.start().unwrap();
        for _ in 0..3 {
            pipeline.step();
        }
        pipeline.stop();
        assert_eq!(pipeline.samples_this_run(), 3);
        pipeline.start().unwrap();
        assert_eq!(pipeline.samples_this_run(), 0);
        for _ in 0..2 {
            pipeline.step();
        }
        pipeline.stop();
        assert_eq!(pipeline.samples_this_run(), 2);
        assert_eq!(pipeline.delivery().sent(), 5);
        assert_eq!(pipeline.delivery().dropped(), 0);
    }
    #[test]
    fn schedule_skips_ticks_after_catch_up_limit() {
        let period = Duration::from_millis(1);
        let t0 = Instant::now();
        let mut schedule = TickSchedule::new(t0, period).unwrap();
        assert!(!schedule.is_due(t0));
        let late = t0 + Duration::from_secs(10);
        assert!(schedule.is_due(late));
        for _ in 1..MAX_CATCH_UP_TICKS {
            assert!(!schedule.advance(late));
            assert!(schedule.is_due(late));
        }
        assert!(schedule.advance(late));
        assert_eq!(schedule.next, late + period);
        assert!(!schedule.is_due(late));
        // Back on time: steady cadence, no skipping.
        assert!(!schedule.advance(late));
        assert_eq!(schedule.next, late + period * 2);
    }
}
