//! Sliding sample buffers with incremental Y-range tracking, fed by a
//! fixed-period producer that runs inline or on its own thread.
pub mod config;
pub mod stream;
pub mod types;
pub use config::{DemoConfig, PipelineConfig};
pub use stream::{
    BufferReader, Sample, SlidingBuffer, StopHandle, StreamError, StreamPipeline, WindowSnapshot,
};
pub use types::{ExecutionMode, Notification, PipelineState, Trace};
