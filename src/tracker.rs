mod kalman_filter;
mod matching;
mod point;
mod point_tracker;
mod track;
mod track_state;

pub use kalman_filter::{KalmanConfig, KalmanFilter};
pub use matching::{AssignmentResult, Detection, distance_matrix, linear_assignment};
pub use point::Point;
pub use point_tracker::{PointTracker, TrackerConfig};
pub use track::{Track, TrackSnapshot};
pub use track_state::TrackStatus;
