use thiserror::Error;
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("buffer is empty; append at least one sample first")]
    EmptyBuffer,
    #[error("index {index} out of range for buffer holding {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("failed to spawn producer thread: {0}")]
    Spawn(std::io::Error),
    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
impl StreamError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StreamError::InvalidConfiguration(msg.into())
    }
}
