//! Typed messages exchanged over the pipeline transport.
//!
//! Every channel carries one closed enum, exhaustively matched by its
//! receiver; there are no dynamic payloads.

use serde::{Deserialize, Serialize};

use crate::tracker::{Detection, TrackSnapshot};

/// Playback commands issued by the controller to the video server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Play,
    Pause,
    /// Jump to the given frame index; in-flight work for stale positions
    /// is discarded, never delivered.
    Seek(u64),
    Stop,
}

/// Payload of one frame message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FramePayload {
    /// Peak-extraction output of the video processing stage.
    Detections(Vec<Detection>),
    /// Track assignments from the track processing stage.
    Tracks(Vec<TrackSnapshot>),
    /// Inference failed for this frame; the stream continues.
    InferenceError(String),
}

/// The unit exchanged between pipeline stages, ordered by `frame_index`
/// within a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    /// Seek generation this frame belongs to. Receivers discard
    /// messages from older generations; that is the only sanctioned
    /// frame loss.
    pub generation: u64,
    pub frame_index: u64,
    /// Milliseconds since the emitting server started.
    pub timestamp_ms: f64,
    pub payload: FramePayload,
}

/// Live throughput statistics, regenerated each reporting interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_per_second: f64,
    /// Frames buffered or in flight inside the emitting server.
    pub queue_depth: usize,
    /// Processing latency of the most recent frame.
    pub last_latency_ms: f64,
}

/// Out-of-band notifications from a server to its controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlEvent {
    Stats(StatsSnapshot),
    /// A command could not be applied; the server kept its prior state.
    Rejected { command: Command, reason: String },
    /// The frame source ran out; the server is idle and still accepts
    /// commands.
    StreamEnded,
}

/// Commands understood by the track processing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackCommand {
    Stop,
    /// Attach an opaque label to a live track.
    SetLabel { track_id: u64, label: String },
}
