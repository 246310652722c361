//! Track processing server: drives the tracker over the ordered
//! detection stream.
//!
//! The tracker's per-frame cycle is strictly sequential, so the whole
//! server is a single loop: receive a frame message, feed the tracker,
//! emit the track assignments. The bounded input channel is the
//! buffering bound; when this server falls behind, the upstream sender
//! blocks rather than dropping frames. The only sanctioned loss is a
//! stale generation after an upstream seek.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, info, warn};

use crate::error::TransportError;
use crate::pipeline::messages::{
    ControlEvent, FrameMessage, FramePayload, StatsSnapshot, TrackCommand,
};
use crate::pipeline::transport::{Pair, pair};
use crate::tracker::{Detection, PointTracker, TrackerConfig};

/// Configuration for the track processing server.
#[derive(Debug, Clone)]
pub struct TrackServerConfig {
    pub tracker: TrackerConfig,
    /// Bound of the outgoing track-frame channel.
    pub output_capacity: usize,
    /// Bound of the command/event control channels.
    pub control_capacity: usize,
    /// Emit a stats snapshot every this many processed frames.
    pub stats_interval: u64,
}

impl Default for TrackServerConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            output_capacity: 8,
            control_capacity: 32,
            stats_interval: 25,
        }
    }
}

/// Controller-side handle to a spawned track processing server.
pub struct TrackServerHandle {
    control: Pair<TrackCommand, ControlEvent>,
    join: JoinHandle<Result<(), TransportError>>,
}

impl TrackServerHandle {
    pub fn send(&self, command: TrackCommand) -> Result<(), TransportError> {
        self.control.send(command)
    }

    pub fn recv_event(&self) -> Result<ControlEvent, TransportError> {
        self.control.recv()
    }

    pub fn try_recv_event(&self) -> Option<ControlEvent> {
        self.control.try_recv()
    }

    pub fn events(&self) -> &Receiver<ControlEvent> {
        self.control.receiver()
    }

    /// Wait for the server to finish. It exits cleanly on
    /// [`TrackCommand::Stop`] or when the upstream stream closes; a
    /// closed downstream channel surfaces here as a transport failure.
    pub fn join(self) -> Result<(), TransportError> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(TransportError::Disconnected),
        }
    }
}

/// The track processing server loop.
pub struct TrackProcessingServer {
    config: TrackServerConfig,
    control: Pair<ControlEvent, TrackCommand>,
    frames_in: Receiver<FrameMessage>,
    frames_out: Sender<FrameMessage>,
    tracker: PointTracker,
    generation: u64,
    last_frame: Option<u64>,
    started: Instant,
    last_latency_ms: f64,
    processed_since_stats: u64,
    stats_marker: Instant,
}

impl TrackProcessingServer {
    pub fn spawn(
        frames_in: Receiver<FrameMessage>,
        config: TrackServerConfig,
    ) -> (TrackServerHandle, Receiver<FrameMessage>) {
        let (client_control, server_control) = pair(config.control_capacity);
        let (frame_tx, frame_rx) = bounded(config.output_capacity);

        let tracker = PointTracker::new(config.tracker.clone());
        let server = Self {
            config,
            control: server_control,
            frames_in,
            frames_out: frame_tx,
            tracker,
            generation: 0,
            last_frame: None,
            started: Instant::now(),
            last_latency_ms: 0.0,
            processed_since_stats: 0,
            stats_marker: Instant::now(),
        };

        let join = thread::Builder::new()
            .name("track-server".to_string())
            .spawn(move || server.run())
            .expect("failed to spawn track server");

        (
            TrackServerHandle {
                control: client_control,
                join,
            },
            frame_rx,
        )
    }

    fn run(mut self) -> Result<(), TransportError> {
        info!("track processing server started");
        loop {
            select! {
                recv(self.control.receiver()) -> command => match command {
                    Ok(TrackCommand::Stop) => {
                        info!("stop requested");
                        break;
                    }
                    Ok(TrackCommand::SetLabel { track_id, label }) => {
                        if !self.tracker.set_label(track_id, label) {
                            debug!("label for unknown track {track_id} ignored");
                        }
                    }
                    Err(_) => {
                        info!("controller disconnected, stopping");
                        break;
                    }
                },
                recv(self.frames_in) -> message => match message {
                    Ok(message) => self.handle_frame(message)?,
                    Err(_) => {
                        info!("detection stream closed, stopping");
                        break;
                    }
                },
            }
        }
        info!("track processing server stopped");
        Ok(())
    }

    fn handle_frame(&mut self, message: FrameMessage) -> Result<(), TransportError> {
        // Stale generation: cancelled by an upstream seek, discard.
        if message.generation < self.generation {
            debug!(
                "discarding frame {} from stale generation {}",
                message.frame_index, message.generation
            );
            return Ok(());
        }
        // New generation: the stream is no longer contiguous with the
        // tracker's causal history, so the track bank is re-seeded.
        if message.generation > self.generation {
            info!(
                "generation {} -> {}: reseeding tracker",
                self.generation, message.generation
            );
            self.generation = message.generation;
            self.tracker = PointTracker::new(self.config.tracker.clone());
            self.last_frame = None;
        }
        // Duplicate delivery of an already-processed frame: discard.
        if let Some(last) = self.last_frame
            && message.frame_index <= last
        {
            debug!("duplicate frame {} discarded", message.frame_index);
            return Ok(());
        }

        let detections: Vec<Detection> = match message.payload {
            FramePayload::Detections(detections) => detections,
            FramePayload::InferenceError(reason) => {
                // A failed frame counts as zero detections: misses
                // increment, tracker state stays intact.
                debug!(
                    "frame {} carried an inference error: {reason}",
                    message.frame_index
                );
                Vec::new()
            }
            FramePayload::Tracks(_) => {
                warn!("unexpected track payload on the detection stream");
                return Ok(());
            }
        };

        let started = Instant::now();
        let snapshots = self.tracker.update(message.frame_index, &detections);
        self.last_latency_ms = started.elapsed().as_secs_f64() * 1e3;
        self.last_frame = Some(message.frame_index);

        let out = FrameMessage {
            generation: self.generation,
            frame_index: message.frame_index,
            timestamp_ms: self.started.elapsed().as_secs_f64() * 1e3,
            payload: FramePayload::Tracks(snapshots),
        };
        if self.frames_out.send(out).is_err() {
            warn!("track stream consumer disconnected");
            return Err(TransportError::Disconnected);
        }

        self.processed_since_stats += 1;
        if self.processed_since_stats >= self.config.stats_interval {
            self.emit_stats();
        }
        Ok(())
    }

    fn emit_stats(&mut self) {
        let elapsed = self.stats_marker.elapsed().as_secs_f64();
        let frames_per_second = if elapsed > 0.0 {
            self.processed_since_stats as f64 / elapsed
        } else {
            0.0
        };
        let snapshot = StatsSnapshot {
            frames_per_second,
            queue_depth: self.frames_in.len(),
            last_latency_ms: self.last_latency_ms,
        };
        self.processed_since_stats = 0;
        self.stats_marker = Instant::now();

        let _ = self.control.try_send(ControlEvent::Stats(snapshot));
    }
}
