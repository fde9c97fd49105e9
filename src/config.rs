use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::stream::StreamError;
use crate::types::ExecutionMode;

/// Settings for one pipeline. Every field has a default so a config file only
/// needs to name what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples retained per trace.
    pub capacity: usize,
    /// Producer period in milliseconds.
    pub period_ms: u64,
    /// Shifts the generated waveform phase; has no effect on buffering.
    pub instance_id: i32,
    pub mode: ExecutionMode,
    /// Seed for the jitter generator.
    pub seed: u64,
    /// Samples shown per frame.
    pub window_size: usize,
    /// Upper bound on waiting for the producer thread at teardown.
    pub stop_timeout_ms: u64,
    /// Stop producing after this many samples.
    pub max_samples: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 25 * 60 * 20,
            period_ms: 10,
            instance_id: 0,
            mode: ExecutionMode::Offloaded,
            seed: 0,
            window_size: 25 * 60 * 5,
            stop_timeout_ms: 3000,
            max_samples: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.capacity == 0 {
            return Err(StreamError::invalid("capacity must be greater than zero"));
        }
        if self.period_ms == 0 {
            return Err(StreamError::invalid("period_ms must be greater than zero"));
        }
        if self.window_size == 0 {
            return Err(StreamError::invalid("window_size must be greater than zero"));
        }
        if self.window_size > self.capacity {
            return Err(StreamError::InvalidConfiguration(format!(
                "window_size {} exceeds capacity {}",
                self.window_size, self.capacity
            )));
        }
        Ok(())
    }
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Settings for the demo binary: several independent pipelines pumped from one loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub pipelines: usize,
    pub run_secs: u64,
    pub frame_interval_ms: u64,
    /// Print the last frame of every pipeline as JSON before exiting.
    pub dump_last_frame: bool,
    /// Template; pipeline `i` gets `instance_id + i` and `seed + i`.
    pub pipeline: PipelineConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            pipelines: 1,
            run_secs: 5,
            frame_interval_ms: 16,
            dump_last_frame: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self, StreamError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
    pub fn from_json(raw: &str) -> Result<Self, StreamError> {
        let config: DemoConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.pipelines == 0 {
            return Err(StreamError::invalid("pipelines must be at least 1"));
        }
        if self.frame_interval_ms == 0 {
            return Err(StreamError::invalid("frame_interval_ms must be greater than zero"));
        }
        self.pipeline.validate()
    }
    pub fn pipeline_config(&self, index: usize) -> PipelineConfig {
        PipelineConfig {
            instance_id: self.pipeline.instance_id + index as i32,
            seed: self.pipeline.seed.wrapping_add(index as u64),
            ..self.pipeline.clone()
        }
    }
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}
