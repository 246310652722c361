//! The per-frame predict/associate/update/manage tracking cycle.

use log::debug;

use crate::tracker::kalman_filter::{KalmanConfig, KalmanFilter};
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::point::Point;
use crate::tracker::track::{Track, TrackSnapshot};
use crate::tracker::track_state::TrackStatus;

/// Configuration for the point tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Maximum cost at which a detection may be matched to a track.
    pub gating_distance: f32,
    /// Consecutive unmatched frames tolerated before termination.
    pub miss_budget: u32,
    /// Consecutive matches required to promote a tentative track.
    pub min_confirmation_hits: u32,
    /// Detections below this confidence are penalized during association.
    pub confidence_threshold: f32,
    /// Cost added to pairs whose detection is below the confidence
    /// threshold.
    pub low_confidence_penalty: f32,
    pub kalman: KalmanConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gating_distance: 20.0,
            miss_budget: 25,
            min_confirmation_hits: 3,
            confidence_threshold: 0.0,
            low_confidence_penalty: 10.0,
            kalman: KalmanConfig::default(),
        }
    }
}

/// Multi-object tracker over point detections.
///
/// Owns the bank of active tracks exclusively; one `update` call per
/// frame, strictly sequential, since the Kalman state of frame N+1
/// depends on frame N. Track ids count up from 1 and are never reused
/// within a tracker instance.
pub struct PointTracker {
    tracks: Vec<Track>,
    next_id: u64,
    kalman_filter: KalmanFilter,
    config: TrackerConfig,
}

impl PointTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let kalman_filter = KalmanFilter::new(config.kalman.clone());
        Self {
            tracks: Vec::new(),
            next_id: 0,
            kalman_filter,
            config,
        }
    }

    /// Run one tracking cycle for `frame_index` and return the per-frame
    /// snapshots, ordered by track id.
    ///
    /// Terminated tracks appear one last time with
    /// [`TrackStatus::Terminated`] before leaving the active set. An
    /// empty detection slice (or a skipped frame fed as one) only
    /// increments the miss counts; it never creates tracks.
    pub fn update(&mut self, frame_index: u64, detections: &[Detection]) -> Vec<TrackSnapshot> {
        // Predict: advance every active track one time step.
        for track in &mut self.tracks {
            track.predict_step(&self.kalman_filter);
        }

        // Associate: gated minimum-cost assignment against predictions.
        let predicted: Vec<Point> = self.tracks.iter().map(|t| t.position()).collect();
        let costs = matching::distance_matrix(
            &predicted,
            detections,
            self.config.confidence_threshold,
            self.config.low_confidence_penalty,
        );
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&costs, self.config.gating_distance);

        // Update matched tracks with their detections.
        for &(track_idx, det_idx) in &matches {
            self.tracks[track_idx].apply_match(
                &detections[det_idx],
                &self.kalman_filter,
                self.config.min_confirmation_hits,
            );
        }

        // Manage unmatched tracks: miss counting and termination.
        for &track_idx in &unmatched_tracks {
            self.tracks[track_idx].mark_missed(frame_index, self.config.miss_budget);
        }

        // Manage unmatched detections: each seeds a tentative track.
        for &det_idx in &unmatched_detections {
            self.next_id += 1;
            let track = Track::new(self.next_id, &detections[det_idx], &self.kalman_filter);
            debug!(
                "track {} created at frame {} from detection {:?}",
                track.id, frame_index, detections[det_idx].position
            );
            self.tracks.push(track);
        }

        let mut snapshots: Vec<TrackSnapshot> = self
            .tracks
            .iter()
            .map(|t| t.snapshot(frame_index))
            .collect();
        snapshots.sort_by_key(|s| s.track_id);

        // Terminated tracks were snapshotted above; drop them now.
        self.tracks.retain(|t| t.status.is_active());

        snapshots
    }

    /// Attach an opaque label to a live track. Labels persist until the
    /// track terminates and are never transferred to another object.
    pub fn set_label(&mut self, track_id: u64, label: impl Into<String>) -> bool {
        match self.tracks.iter_mut().find(|t| t.id == track_id) {
            Some(track) => {
                track.label = Some(label.into());
                true
            }
            None => false,
        }
    }

    /// Currently active tracks.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
