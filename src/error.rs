use thiserror::Error;

use crate::processing::StreamState;

/// Severity of a stream-level fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSeverity {
    /// Degraded output for a bounded number of cycles, then recovery
    Transient,
    /// Drives the orchestrator to `Faulted`
    Persistent,
}

/// Device or pipeline fault observed while streaming
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFault {
    /// Not enough captured input to fill a block
    #[error("input underrun")]
    InputUnderrun,

    /// Input block did not carry `block_size` frames per channel
    #[error("input block of {actual} frames, expected {expected}")]
    InputBlockSize { expected: usize, actual: usize },

    /// The device asked for more frames than the session can produce
    #[error("output block of {actual} frames exceeds {max}")]
    OutputBlockSize { max: usize, actual: usize },

    /// Block processing took longer than the block duration
    #[error("block deadline overrun")]
    DeadlineOverrun,

    /// The rate converter rejected a block
    #[error("rate converter failure")]
    Resampler,

    /// The FFT convolution rejected a block
    #[error("convolution failure")]
    Convolution,

    /// Backend reported a recoverable stream error
    #[error("device stream error")]
    Device,

    /// Audio device disappeared
    #[error("device not available")]
    DeviceLost,

    /// Transient faults exceeded the degraded-cycle budget
    #[error("{consecutive} consecutive degraded blocks")]
    Exhausted { consecutive: usize },
}

impl StreamFault {
    pub fn severity(&self) -> FaultSeverity {
        match self {
            Self::DeviceLost | Self::Exhausted { .. } => FaultSeverity::Persistent,
            _ => FaultSeverity::Transient,
        }
    }
}

#[derive(Error, Debug)]
pub enum FirError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("Resampler error: {0}")]
    Resampler(String),

    #[error("Stream fault: {0}")]
    StreamFault(StreamFault),

    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: StreamState, to: StreamState },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FirError>;
