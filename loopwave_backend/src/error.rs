use loopwave_core::GeneratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// No output device, or the transport refused to open/start the stream.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device cannot run the requested rate/channel layout.
    #[error("unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// The real-time side can no longer receive loops.
    #[error("loop player has been dropped")]
    Disconnected,
}

pub type StreamResult<T> = Result<T, StreamError>;
