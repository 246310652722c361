//! Real-time animal pose tracking.
//!
//! Two cooperating servers turn video into persistent identities: the
//! video processing server runs inference and heatmap peak extraction
//! per frame, the track processing server assigns the resulting
//! detections to tracks with a bank of constant-velocity Kalman filters
//! and gated optimal assignment. All communication between the stages
//! (and with a UI controller) goes over typed, bounded channels.
//!
//! The tracker can also be driven directly for offline use:
//!
//! ```
//! use posetrack_rs::{Detection, PointTracker, TrackerConfig};
//!
//! let mut tracker = PointTracker::new(TrackerConfig::default());
//! let snapshots = tracker.update(0, &[Detection::new(0, 10.0, 10.0, 0.9)]);
//! assert_eq!(snapshots.len(), 1);
//! ```

pub mod error;
pub mod export;
pub mod heatmap;
pub mod pipeline;
pub mod tracker;

pub use error::{ExportError, InferenceError, SeekError, TransportError};
pub use export::{TraceRecord, collect_records, read_records, write_records};
pub use heatmap::{PeakConfig, find_peaks};
pub use pipeline::{
    Command, ControlEvent, Frame, FrameMessage, FramePayload, FrameSource, InferenceModel,
    StatsSnapshot, TrackCommand, TrackProcessingServer, TrackServerConfig, TrackServerHandle,
    VideoProcessingServer, VideoServerConfig, VideoServerHandle,
};
pub use tracker::{
    Detection, KalmanConfig, KalmanFilter, Point, PointTracker, Track, TrackSnapshot, TrackStatus,
    TrackerConfig,
};
