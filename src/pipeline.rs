//! The two-stage processing pipeline and its messaging transport.
//!
//! The video processing server turns frames into detection sets; the
//! track processing server turns detection sets into track assignments.
//! The servers share no mutable state: everything moves over typed,
//! bounded channels, with `frame_index` as the sole sequencing key.

mod messages;
mod track_server;
mod transport;
mod video_server;

pub use messages::{
    Command, ControlEvent, FrameMessage, FramePayload, StatsSnapshot, TrackCommand,
};
pub use track_server::{TrackProcessingServer, TrackServerConfig, TrackServerHandle};
pub use transport::{Pair, pair};
pub use video_server::{
    Frame, FrameSource, InferenceModel, VideoProcessingServer, VideoServerConfig,
    VideoServerHandle,
};
