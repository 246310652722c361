//! Error taxonomy for the tracking pipeline.
//!
//! Per-frame inference failures are recoverable: they become an
//! error-tagged frame payload and the stream continues. Transport
//! failures are fatal to the affected server and surfaced through its
//! join handle.

use thiserror::Error;

/// Per-frame failure inside the video processing stage.
///
/// Carried inside a frame message rather than aborting the stream; the
/// downstream tracker treats the affected frame as zero detections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// The frame could not be read from the source (corrupt or missing).
    #[error("frame {frame_index} could not be read: {reason}")]
    FrameRead { frame_index: u64, reason: String },
    /// The model rejected or failed on the input frame.
    #[error("model inference failed: {0}")]
    Model(String),
}

/// A messaging channel was closed while a server still needed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport channel disconnected")]
    Disconnected,
}

/// A seek command targeted a frame outside the source range.
///
/// Reported back to the controller as a command rejection; the server
/// remains in its prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeekError {
    #[error("seek target {target} out of range, source has {len} frames")]
    OutOfRange { target: u64, len: u64 },
}

/// Failure while writing or reading exported trace history.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
