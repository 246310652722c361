//! Trace history export for downstream analysis.
//!
//! One JSON record per line, ordered by `(track_id, frame_index)`;
//! reading back yields the identical record sequence.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::tracker::{Point, Track, TrackSnapshot};

/// One exported trace point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub frame_index: u64,
    pub track_id: u64,
    pub position: Point,
    pub label: Option<String>,
}

impl From<&TrackSnapshot> for TraceRecord {
    fn from(snapshot: &TrackSnapshot) -> Self {
        Self {
            frame_index: snapshot.frame_index,
            track_id: snapshot.track_id,
            position: snapshot.position,
            label: snapshot.label.clone(),
        }
    }
}

/// Flatten track trace histories into export records, ordered by
/// `(track_id, frame_index)`.
pub fn collect_records<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Vec<TraceRecord> {
    let mut records: Vec<TraceRecord> = tracks
        .into_iter()
        .flat_map(|track| {
            track.trace.iter().map(|&(frame_index, position)| TraceRecord {
                frame_index,
                track_id: track.id,
                position,
                label: track.label.clone(),
            })
        })
        .collect();
    records.sort_by_key(|r| (r.track_id, r.frame_index));
    records
}

/// Write records as JSON lines.
pub fn write_records<W: Write>(writer: &mut W, records: &[TraceRecord]) -> Result<(), ExportError> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Read back a JSON-lines trace export. Blank lines are skipped.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>, ExportError> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{Detection, KalmanFilter};

    #[test]
    fn test_round_trip() {
        let records = vec![
            TraceRecord {
                frame_index: 0,
                track_id: 1,
                position: Point::new(10.0, 10.0),
                label: Some("female".to_string()),
            },
            TraceRecord {
                frame_index: 1,
                track_id: 1,
                position: Point::new(10.5, 10.0),
                label: Some("female".to_string()),
            },
            TraceRecord {
                frame_index: 0,
                track_id: 2,
                position: Point::new(50.0, 60.0),
                label: None,
            },
        ];

        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();
        let decoded = read_records(buf.as_slice()).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_collect_records_ordering() {
        let kf = KalmanFilter::default();
        let mut a = Track::new(2, &Detection::new(5, 1.0, 1.0, 0.9), &kf);
        a.apply_match(&Detection::new(6, 1.5, 1.0, 0.9), &kf, 3);
        let b = Track::new(1, &Detection::new(7, 9.0, 9.0, 0.9), &kf);

        let records = collect_records([&a, &b]);
        let keys: Vec<(u64, u64)> = records.iter().map(|r| (r.track_id, r.frame_index)).collect();
        assert_eq!(keys, vec![(1, 7), (2, 5), (2, 6)]);
    }

    #[test]
    fn test_records_from_streamed_snapshots() {
        use crate::tracker::TrackStatus;

        // Client-side accumulation: snapshots received off the track
        // stream convert straight into export records.
        let snapshots = vec![
            TrackSnapshot {
                track_id: 1,
                frame_index: 4,
                position: Point::new(12.0, 8.0),
                status: TrackStatus::Confirmed,
                label: Some("resident".to_string()),
            },
            TrackSnapshot {
                track_id: 2,
                frame_index: 4,
                position: Point::new(40.0, 41.0),
                status: TrackStatus::Tentative,
                label: None,
            },
        ];

        let records: Vec<TraceRecord> = snapshots.iter().map(TraceRecord::from).collect();
        assert_eq!(records[0].track_id, 1);
        assert_eq!(records[0].frame_index, 4);
        assert_eq!(records[0].position, Point::new(12.0, 8.0));
        assert_eq!(records[0].label.as_deref(), Some("resident"));
        assert_eq!(records[1].label, None);
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let input = b"\n\n".to_vec();
        assert!(read_records(input.as_slice()).unwrap().is_empty());
    }
}
