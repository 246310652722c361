//! Heatmap peak extraction.
//!
//! Converts a dense per-channel confidence field into a sparse set of
//! candidate body-part detections. A cell is a local peak when it is
//! strictly greater than each of its 8 neighbors and above the minimum
//! confidence; nearby candidates from the same blob are removed by
//! greedy suppression within a configurable radius.

use ndarray::Array3;

use crate::tracker::{Detection, Point};

/// Parameters for peak extraction.
#[derive(Debug, Clone)]
pub struct PeakConfig {
    /// Cells at or below this heatmap value are never peaks.
    pub min_confidence: f32,
    /// Euclidean radius inside which weaker candidate peaks of the same
    /// channel are suppressed.
    pub suppression_radius: f32,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.2,
            suppression_radius: 3.0,
        }
    }
}

/// Find local peaks in a `[channel, row, col]` heatmap.
///
/// Deterministic: candidates are ranked per channel by descending score,
/// ties broken by lower row then lower column. An all-below-threshold
/// heatmap yields an empty vec. The caller supplies the `frame_index`
/// stamped onto the emitted detections; peak x/y are column/row
/// coordinates in heatmap space.
pub fn find_peaks(heatmap: &Array3<f32>, frame_index: u64, config: &PeakConfig) -> Vec<Detection> {
    let (channels, rows, cols) = heatmap.dim();
    let mut detections = Vec::new();

    for c in 0..channels {
        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();

        for r in 0..rows {
            for col in 0..cols {
                let v = heatmap[[c, r, col]];
                if v <= config.min_confidence {
                    continue;
                }
                if is_local_maximum(heatmap, c, r, col, v) {
                    candidates.push((v, r, col));
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let radius_sq = config.suppression_radius * config.suppression_radius;
        let mut accepted: Vec<(f32, f32, f32)> = Vec::new();
        for (score, r, col) in candidates {
            let x = col as f32;
            let y = r as f32;
            let suppressed = accepted
                .iter()
                .any(|&(ax, ay, _)| (ax - x).powi(2) + (ay - y).powi(2) <= radius_sq);
            if !suppressed {
                accepted.push((x, y, score));
            }
        }

        detections.extend(
            accepted
                .into_iter()
                .map(|(x, y, score)| Detection::new(frame_index, x, y, score)),
        );
    }

    detections
}

/// Strictly-greater-than-8-neighbors test, the grayscale-dilation
/// formulation of local maximum finding.
fn is_local_maximum(heatmap: &Array3<f32>, c: usize, r: usize, col: usize, v: f32) -> bool {
    let (_, rows, cols) = heatmap.dim();
    for dr in -1i64..=1 {
        for dc in -1i64..=1 {
            if dr == 0 && dc == 0 {
                continue;
            }
            let nr = r as i64 + dr;
            let nc = col as i64 + dc;
            if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                continue;
            }
            if heatmap[[c, nr as usize, nc as usize]] >= v {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn heatmap_with_peaks(peaks: &[(usize, usize, usize, f32)]) -> Array3<f32> {
        let mut map = Array3::zeros((2, 32, 32));
        for &(c, r, col, v) in peaks {
            map[[c, r, col]] = v;
        }
        map
    }

    #[test]
    fn test_single_peak() {
        let map = heatmap_with_peaks(&[(0, 10, 12, 0.9)]);
        let dets = find_peaks(&map, 7, &PeakConfig::default());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].frame_index, 7);
        assert_eq!(dets[0].position, Point::new(12.0, 10.0));
        assert_eq!(dets[0].confidence, 0.9);
    }

    #[test]
    fn test_below_threshold_is_empty() {
        let map = heatmap_with_peaks(&[(0, 5, 5, 0.1), (1, 20, 20, 0.19)]);
        let dets = find_peaks(&map, 0, &PeakConfig::default());
        assert!(dets.is_empty());
    }

    #[test]
    fn test_plateau_is_not_a_peak() {
        // Two equal adjacent cells: neither strictly exceeds the other.
        let map = heatmap_with_peaks(&[(0, 10, 10, 0.8), (0, 10, 11, 0.8)]);
        let dets = find_peaks(&map, 0, &PeakConfig::default());
        assert!(dets.is_empty());
    }

    #[test]
    fn test_nearby_peaks_suppressed() {
        // Two maxima of the same blob, 2 cells apart, radius 3 keeps the stronger.
        let map = heatmap_with_peaks(&[(0, 10, 10, 0.9), (0, 10, 12, 0.7)]);
        let dets = find_peaks(&map, 0, &PeakConfig::default());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].confidence, 0.9);
    }

    #[test]
    fn test_peaks_in_separate_channels_both_kept() {
        let map = heatmap_with_peaks(&[(0, 10, 10, 0.9), (1, 10, 10, 0.8)]);
        let dets = find_peaks(&map, 0, &PeakConfig::default());
        assert_eq!(dets.len(), 2);
    }

    #[test]
    fn test_distant_peaks_kept() {
        let map = heatmap_with_peaks(&[(0, 5, 5, 0.9), (0, 25, 25, 0.6)]);
        let dets = find_peaks(&map, 0, &PeakConfig::default());
        assert_eq!(dets.len(), 2);
        // Ranked by descending score.
        assert!(dets[0].confidence > dets[1].confidence);
    }
}
