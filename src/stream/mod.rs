// src/stream/mod.rs
// 缓冲区 / 管线 / 信号源 / 窗口 子模块
pub mod buffer;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod window;
// 公开导出常用类型，方便外部调用
pub use buffer::{Sample, SlidingBuffer};
pub use error::StreamError;
pub use pipeline::{BufferReader, DeliveryStats, StopHandle, StreamPipeline, TraceBuffers};
pub use source::{ManualSource, SampleSource, WaveGenerator};
pub use window::{AxisRange, WindowBounds, WindowSnapshot};
