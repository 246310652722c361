//! Single-object track with Kalman motion state and trace history.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::point::Point;
use crate::tracker::track_state::TrackStatus;

/// Per-frame view of one track, the unit carried in track frame
/// messages and consumed by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub track_id: u64,
    pub frame_index: u64,
    /// Filtered position estimate for this frame.
    pub position: Point,
    pub status: TrackStatus,
    pub label: Option<String>,
}

/// A persistent object identity maintained across frames.
///
/// Owned exclusively by the tracker; everything outside sees only
/// emitted [`TrackSnapshot`]s.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique identifier, never reused within a session.
    pub id: u64,
    pub status: TrackStatus,
    /// Opaque, externally settable name; persists until termination.
    pub label: Option<String>,
    /// Consecutive frames without a matched detection.
    pub missed_count: u32,
    /// Consecutive matched frames, drives tentative-to-confirmed promotion.
    pub hits: u32,
    /// Frame the track was created on.
    pub start_frame: u64,
    /// Last frame whose cycle touched this track.
    pub frame_index: u64,
    /// Kalman state mean `[x, y, vx, vy]`.
    pub mean: Array1<f64>,
    /// Kalman state covariance (4x4).
    pub covariance: Array2<f64>,
    /// `(frame_index, position)` history, strictly increasing in frame index.
    pub trace: Vec<(u64, Point)>,
}

impl Track {
    /// Create a tentative track from an unmatched detection, zero
    /// initial velocity.
    pub fn new(id: u64, detection: &Detection, kalman_filter: &KalmanFilter) -> Self {
        let measurement = [detection.position.x as f64, detection.position.y as f64];
        let (mean, covariance) = kalman_filter.initiate(measurement);

        Self {
            id,
            status: TrackStatus::Tentative,
            label: None,
            missed_count: 0,
            hits: 1,
            start_frame: detection.frame_index,
            frame_index: detection.frame_index,
            mean,
            covariance,
            trace: vec![(detection.frame_index, detection.position)],
        }
    }

    /// Filtered position estimate.
    pub fn position(&self) -> Point {
        Point::new(self.mean[0] as f32, self.mean[1] as f32)
    }

    /// Advance the motion state one frame.
    pub fn predict_step(&mut self, kalman_filter: &KalmanFilter) {
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
    }

    /// Apply a matched detection: measurement update, trace append and
    /// status promotion once enough consecutive hits accumulate.
    pub fn apply_match(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        min_confirmation_hits: u32,
    ) {
        let measurement = [detection.position.x as f64, detection.position.y as f64];
        let (mean, covariance) = kalman_filter.update(&self.mean, &self.covariance, measurement);
        self.mean = mean;
        self.covariance = covariance;

        self.missed_count = 0;
        self.hits += 1;
        self.frame_index = detection.frame_index;

        // Trace stays strictly increasing in frame index.
        let position = self.position();
        match self.trace.last() {
            Some(&(last, _)) if last >= detection.frame_index => {}
            _ => self.trace.push((detection.frame_index, position)),
        }

        // Confirmation is sticky: a confirmed track that was lost goes
        // straight back to confirmed on a re-match.
        self.status = if self.status == TrackStatus::Confirmed
            || self.hits >= min_confirmation_hits
        {
            TrackStatus::Confirmed
        } else {
            TrackStatus::Tentative
        };
    }

    /// Record a frame without a match; terminated once the missed count
    /// exceeds the miss budget.
    pub fn mark_missed(&mut self, frame_index: u64, miss_budget: u32) {
        self.missed_count += 1;
        // Confirmation requires consecutive matches, so a missed frame
        // restarts the count for tracks that never got confirmed.
        if self.status == TrackStatus::Tentative {
            self.hits = 0;
        }
        self.frame_index = frame_index;
        self.status = if self.missed_count > miss_budget {
            TrackStatus::Terminated
        } else {
            TrackStatus::Lost
        };
    }

    /// Snapshot of the track as of the given frame.
    pub fn snapshot(&self, frame_index: u64) -> TrackSnapshot {
        TrackSnapshot {
            track_id: self.id,
            frame_index,
            position: self.position(),
            status: self.status,
            label: self.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_track_is_tentative() {
        let kf = KalmanFilter::default();
        let det = Detection::new(0, 10.0, 10.0, 0.9);
        let track = Track::new(1, &det, &kf);
        assert_eq!(track.status, TrackStatus::Tentative);
        assert_eq!(track.trace, vec![(0, Point::new(10.0, 10.0))]);
        assert_eq!(track.position(), Point::new(10.0, 10.0));
    }

    #[test]
    fn test_confirmation_after_consecutive_hits() {
        let kf = KalmanFilter::default();
        let mut track = Track::new(1, &Detection::new(0, 10.0, 10.0, 0.9), &kf);

        track.predict_step(&kf);
        track.apply_match(&Detection::new(1, 10.5, 10.0, 0.9), &kf, 3);
        assert_eq!(track.status, TrackStatus::Tentative);

        track.predict_step(&kf);
        track.apply_match(&Detection::new(2, 11.0, 10.0, 0.9), &kf, 3);
        assert_eq!(track.status, TrackStatus::Confirmed);
    }

    #[test]
    fn test_trace_strictly_increasing() {
        let kf = KalmanFilter::default();
        let mut track = Track::new(1, &Detection::new(3, 10.0, 10.0, 0.9), &kf);
        track.apply_match(&Detection::new(3, 10.0, 10.0, 0.9), &kf, 3);
        track.apply_match(&Detection::new(4, 10.0, 10.0, 0.9), &kf, 3);
        let frames: Vec<u64> = track.trace.iter().map(|&(f, _)| f).collect();
        assert_eq!(frames, vec![3, 4]);
    }

    #[test]
    fn test_miss_budget_termination() {
        let kf = KalmanFilter::default();
        let mut track = Track::new(1, &Detection::new(0, 10.0, 10.0, 0.9), &kf);

        for frame in 1..=3 {
            track.mark_missed(frame, 3);
            assert_eq!(track.status, TrackStatus::Lost);
            assert_eq!(track.missed_count, frame as u32);
        }
        track.mark_missed(4, 3);
        assert_eq!(track.status, TrackStatus::Terminated);
    }
}
