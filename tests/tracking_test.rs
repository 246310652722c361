use posetrack_rs::{
    Detection, Point, PointTracker, TrackStatus, TrackerConfig, collect_records, read_records,
    write_records,
};

fn det(frame: u64, x: f32, y: f32) -> Detection {
    Detection::new(frame, x, y, 0.9)
}

#[test]
fn test_basic_tracking() {
    let mut tracker = PointTracker::new(TrackerConfig {
        min_confirmation_hits: 2,
        ..TrackerConfig::default()
    });

    // Frame 0: one detection creates a tentative track.
    let tracks = tracker.update(0, &[det(0, 100.0, 100.0)]);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].status, TrackStatus::Tentative);
    let id = tracks[0].track_id;

    // Frame 1: same animal moved slightly; id persists, track confirms.
    let tracks = tracker.update(1, &[det(1, 102.0, 101.0)]);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].track_id, id);
    assert_eq!(tracks[0].status, TrackStatus::Confirmed);

    // Frame 2: animal briefly undetected; the track goes lost, not away.
    let tracks = tracker.update(2, &[]);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].status, TrackStatus::Lost);

    // Frame 3: reappears near the prediction and is refound with its id.
    let tracks = tracker.update(3, &[det(3, 105.0, 102.0)]);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].track_id, id);
    assert_eq!(tracks[0].status, TrackStatus::Confirmed);
}

#[test]
fn test_two_animals_keep_identities() {
    let mut tracker = PointTracker::new(TrackerConfig::default());

    let first = tracker.update(0, &[det(0, 50.0, 50.0), det(0, 200.0, 200.0)]);
    assert_eq!(first.len(), 2);
    let id_a = first[0].track_id;
    let id_b = first[1].track_id;
    assert_ne!(id_a, id_b);

    // Both animals drift toward each other but stay separated.
    for frame in 1..30 {
        let f = frame as f32;
        let tracks = tracker.update(
            frame,
            &[det(frame, 50.0 + f, 50.0), det(frame, 200.0 - f, 200.0)],
        );
        assert_eq!(tracks.len(), 2);
        let a = tracks.iter().find(|t| t.track_id == id_a).unwrap();
        let b = tracks.iter().find(|t| t.track_id == id_b).unwrap();
        // No identity swap: track A stays on the left trajectory.
        assert!(a.position.x < b.position.x);
    }
}

#[test]
fn test_occlusion_within_miss_budget() {
    let config = TrackerConfig {
        miss_budget: 5,
        min_confirmation_hits: 2,
        ..TrackerConfig::default()
    };
    let mut tracker = PointTracker::new(config);

    // Establish a track moving right at 2 px/frame.
    let mut id = None;
    for frame in 0..5u64 {
        let tracks = tracker.update(frame, &[det(frame, 10.0 + frame as f32 * 2.0, 20.0)]);
        id = Some(tracks[0].track_id);
    }
    let id = id.unwrap();

    // Full occlusion for three frames.
    for frame in 5..8u64 {
        let tracks = tracker.update(frame, &[]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].status, TrackStatus::Lost);
    }

    // Reappears where the constant-velocity prediction expects it.
    let tracks = tracker.update(8, &[det(8, 26.0, 20.0)]);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].track_id, id);
    assert_eq!(tracks[0].status, TrackStatus::Confirmed);
}

#[test]
fn test_ids_are_never_reused() {
    let config = TrackerConfig {
        miss_budget: 0,
        ..TrackerConfig::default()
    };
    let mut tracker = PointTracker::new(config);

    let mut seen = Vec::new();
    // Each burst creates a track that dies on the following empty frame.
    for burst in 0..5u64 {
        let frame = burst * 2;
        let tracks = tracker.update(frame, &[det(frame, 300.0, 300.0)]);
        seen.push(tracks[0].track_id);
        tracker.update(frame + 1, &[]);
    }

    let mut unique = seen.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), seen.len());
}

#[test]
fn test_trace_export_round_trip() {
    let mut tracker = PointTracker::new(TrackerConfig::default());
    for frame in 0..10u64 {
        tracker.update(
            frame,
            &[
                det(frame, 10.0 + frame as f32, 10.0),
                det(frame, 100.0, 100.0 + frame as f32),
            ],
        );
    }
    tracker.set_label(1, "resident");

    let records = collect_records(tracker.tracks().iter());
    assert!(!records.is_empty());

    // Ordered by (track_id, frame_index), strictly increasing per track.
    for pair in records.windows(2) {
        assert!((pair[0].track_id, pair[0].frame_index) < (pair[1].track_id, pair[1].frame_index));
    }
    assert_eq!(records[0].label.as_deref(), Some("resident"));
    assert_eq!(records[0].position, Point::new(10.0, 10.0));

    let mut buf = Vec::new();
    write_records(&mut buf, &records).unwrap();
    let decoded = read_records(buf.as_slice()).unwrap();
    assert_eq!(decoded, records);
}
