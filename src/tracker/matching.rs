//! Matching utilities for multi-object tracking.
//!
//! Builds the track-to-detection cost matrix and solves it as a
//! minimum-cost bipartite assignment restricted by a gating distance.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::tracker::point::Point;

/// Weight of the confidence term folded into the cost so that equal
/// distances deterministically prefer the higher-confidence detection.
/// Small enough to never override a real distance difference.
const CONFIDENCE_TIEBREAK: f32 = 1e-3;

/// A candidate body-part position extracted from one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Index of the frame this detection was extracted from.
    pub frame_index: u64,
    /// Position in image space.
    pub position: Point,
    /// Peak confidence from the heatmap.
    pub confidence: f32,
}

impl Detection {
    pub fn new(frame_index: u64, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            frame_index,
            position: Point::new(x, y),
            confidence,
        }
    }
}

/// Cost matrix between predicted track positions (rows) and detections
/// (columns).
///
/// Cost is the Euclidean distance from the predicted position, with a
/// fixed penalty added for detections below the confidence threshold and
/// a tiny confidence tie-break term.
pub fn distance_matrix(
    predicted: &[Point],
    detections: &[Detection],
    confidence_threshold: f32,
    low_confidence_penalty: f32,
) -> Array2<f32> {
    let mut costs = Array2::zeros((predicted.len(), detections.len()));
    for (i, p) in predicted.iter().enumerate() {
        for (j, d) in detections.iter().enumerate() {
            let mut cost = p.distance(&d.position);
            if d.confidence < confidence_threshold {
                cost += low_confidence_penalty;
            }
            cost += (1.0 - d.confidence) * CONFIDENCE_TIEBREAK;
            costs[[i, j]] = cost;
        }
    }
    costs
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// Matched `(track_index, detection_index)` pairs.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the gated minimum-cost assignment.
///
/// The matrix is padded square with a large constant and solved with
/// lapjv; pairs whose cost exceeds `gate` are treated as no-match, never
/// forced. An empty matrix degenerates to all-unmatched rather than an
/// error. The result is a partial injective mapping: each track and
/// each detection appears in at most one matched pair.
pub fn linear_assignment(cost_matrix: &Array2<f32>, gate: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);

    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let result = lapjv::lapjv(&padded);
    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match result {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate() {
                if row_idx >= num_rows {
                    continue;
                }
                if col_idx >= num_cols {
                    unmatched_tracks.push(row_idx);
                } else if cost_matrix[[row_idx, col_idx]] <= gate {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}
