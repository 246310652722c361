//! Video processing server: frame reading, inference and peak
//! extraction behind a command interface.
//!
//! Inference is the bottleneck, so it runs on a pool of worker threads
//! fed from a bounded job channel; the control loop reorders finished
//! results by frame index and emits them strictly in order. A seek bumps
//! the generation counter, and any in-flight result carrying an older
//! generation is discarded on arrival instead of delivered.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, info, warn};
use ndarray::Array3;

use crate::error::{InferenceError, SeekError, TransportError};
use crate::heatmap::{PeakConfig, find_peaks};
use crate::pipeline::messages::{Command, ControlEvent, FrameMessage, FramePayload, StatsSnapshot};
use crate::pipeline::transport::{Pair, pair};
use crate::tracker::Detection;

/// A decoded video frame, `[row, col, channel]`.
pub type Frame = Array3<f32>;

/// Sequentially readable, seekable frame supply (a video file reader in
/// production, a synthetic source in tests).
pub trait FrameSource: Send {
    /// Total number of frames.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the frame at the given index. A failed read is recoverable:
    /// it becomes an error-tagged frame message downstream.
    fn read(&mut self, frame_index: u64) -> Result<Frame, InferenceError>;
}

/// Opaque, potentially slow, fallible heatmap model: frame in, dense
/// `[channel, row, col]` score field out.
pub trait InferenceModel: Send + Sync {
    fn infer(&self, frame: &Frame) -> Result<Array3<f32>, InferenceError>;
}

/// Configuration for the video processing server.
#[derive(Debug, Clone)]
pub struct VideoServerConfig {
    /// Number of parallel inference workers.
    pub worker_count: usize,
    /// Bound of the outgoing detection-frame channel; emission blocks
    /// once the downstream consumer lags this far behind.
    pub frame_capacity: usize,
    /// Bound of the command/event control channels.
    pub control_capacity: usize,
    /// Emit a stats snapshot every this many emitted frames.
    pub stats_interval: u64,
    pub peak: PeakConfig,
}

impl Default for VideoServerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            frame_capacity: 8,
            control_capacity: 32,
            stats_interval: 25,
            peak: PeakConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayState {
    Idle,
    Running,
    Paused,
    Stopped,
}

struct Job {
    generation: u64,
    frame_index: u64,
    frame: Frame,
}

struct WorkerResult {
    generation: u64,
    frame_index: u64,
    result: Result<Vec<Detection>, InferenceError>,
    latency_ms: f64,
}

/// Controller-side handle to a spawned video processing server.
pub struct VideoServerHandle {
    control: Pair<Command, ControlEvent>,
    join: JoinHandle<Result<(), TransportError>>,
}

impl VideoServerHandle {
    /// Send a playback command to the server.
    pub fn send(&self, command: Command) -> Result<(), TransportError> {
        self.control.send(command)
    }

    /// Block until the next out-of-band event (stats, rejection, end of
    /// stream).
    pub fn recv_event(&self) -> Result<ControlEvent, TransportError> {
        self.control.recv()
    }

    pub fn try_recv_event(&self) -> Option<ControlEvent> {
        self.control.try_recv()
    }

    /// Raw event receiver, for `select!`-style consumers.
    pub fn events(&self) -> &Receiver<ControlEvent> {
        self.control.receiver()
    }

    /// Wait for the server thread to finish (send [`Command::Stop`]
    /// first). Transport failures fatal to the server surface here.
    pub fn join(self) -> Result<(), TransportError> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(TransportError::Disconnected),
        }
    }
}

/// The video processing server loop. Created through [`Self::spawn`],
/// which returns the controller handle and the ordered detection-frame
/// stream for the track processing server.
pub struct VideoProcessingServer<S: FrameSource> {
    source: S,
    config: VideoServerConfig,
    control: Pair<ControlEvent, Command>,
    frames_out: Sender<FrameMessage>,
    job_tx: Option<Sender<Job>>,
    done_rx: Receiver<WorkerResult>,
    workers: Vec<JoinHandle<()>>,
    state: PlayState,
    generation: u64,
    next_submit: u64,
    next_emit: u64,
    in_flight: usize,
    pending: BTreeMap<u64, Result<Vec<Detection>, InferenceError>>,
    started: Instant,
    last_latency_ms: f64,
    emitted_since_stats: u64,
    stats_marker: Instant,
    ended_notified: bool,
}

impl<S: FrameSource + 'static> VideoProcessingServer<S> {
    pub fn spawn<M>(
        source: S,
        model: M,
        config: VideoServerConfig,
    ) -> (VideoServerHandle, Receiver<FrameMessage>)
    where
        M: InferenceModel + 'static,
    {
        let (client_control, server_control) = pair(config.control_capacity);
        let (frame_tx, frame_rx) = bounded(config.frame_capacity);

        let worker_count = config.worker_count.max(1);
        let (job_tx, job_rx) = bounded::<Job>(worker_count * 2);
        let (done_tx, done_rx) = bounded::<WorkerResult>(worker_count * 2);

        let model = Arc::new(model);
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let model = Arc::clone(&model);
            let peak = config.peak.clone();
            let handle = thread::Builder::new()
                .name(format!("inference-{i}"))
                .spawn(move || worker_loop(model, peak, jobs, done))
                .expect("failed to spawn inference worker");
            workers.push(handle);
        }
        drop(done_tx);

        let server = Self {
            source,
            config,
            control: server_control,
            frames_out: frame_tx,
            job_tx: Some(job_tx),
            done_rx,
            workers,
            state: PlayState::Idle,
            generation: 0,
            next_submit: 0,
            next_emit: 0,
            in_flight: 0,
            pending: BTreeMap::new(),
            started: Instant::now(),
            last_latency_ms: 0.0,
            emitted_since_stats: 0,
            stats_marker: Instant::now(),
            ended_notified: false,
        };

        let join = thread::Builder::new()
            .name("video-server".to_string())
            .spawn(move || server.run())
            .expect("failed to spawn video server");

        (
            VideoServerHandle {
                control: client_control,
                join,
            },
            frame_rx,
        )
    }

    fn run(mut self) -> Result<(), TransportError> {
        info!(
            "video processing server started: {} frames, {} workers",
            self.source.len(),
            self.workers.len()
        );
        let result = self.serve();
        self.shutdown();
        result
    }

    fn serve(&mut self) -> Result<(), TransportError> {
        while self.state != PlayState::Stopped {
            if self.state == PlayState::Running {
                self.running_cycle()?;
            } else {
                self.idle_cycle()?;
            }
        }
        Ok(())
    }

    /// Idle/paused: block until a command arrives, while still draining
    /// in-flight results so pipelined work finishes emitting.
    fn idle_cycle(&mut self) -> Result<(), TransportError> {
        select! {
            recv(self.control.receiver()) -> command => match command {
                Ok(command) => self.handle_command(command)?,
                Err(_) => {
                    info!("controller disconnected, stopping");
                    self.state = PlayState::Stopped;
                }
            },
            recv(self.done_rx) -> done => match done {
                Ok(done) => {
                    self.collect(done);
                    self.flush()?;
                }
                Err(_) => {
                    warn!("inference workers gone, stopping");
                    self.state = PlayState::Stopped;
                }
            },
        }
        Ok(())
    }

    fn running_cycle(&mut self) -> Result<(), TransportError> {
        while let Some(command) = self.control.try_recv() {
            self.handle_command(command)?;
            if self.state != PlayState::Running {
                return Ok(());
            }
        }

        self.dispatch();

        select! {
            recv(self.control.receiver()) -> command => match command {
                Ok(command) => self.handle_command(command)?,
                Err(_) => {
                    info!("controller disconnected, stopping");
                    self.state = PlayState::Stopped;
                    return Ok(());
                }
            },
            recv(self.done_rx) -> done => match done {
                Ok(done) => self.collect(done),
                Err(_) => {
                    warn!("inference workers gone, stopping");
                    self.state = PlayState::Stopped;
                    return Ok(());
                }
            },
            default(Duration::from_millis(1)) => {}
        }

        self.flush()?;
        self.maybe_finish()
    }

    /// Feed the worker pool as long as it has capacity.
    fn dispatch(&mut self) {
        let Some(job_tx) = self.job_tx.as_ref() else {
            return;
        };
        while self.next_submit < self.source.len() && !job_tx.is_full() {
            let frame_index = self.next_submit;
            self.next_submit += 1;
            match self.source.read(frame_index) {
                Ok(frame) => {
                    let job = Job {
                        generation: self.generation,
                        frame_index,
                        frame,
                    };
                    if job_tx.send(job).is_err() {
                        warn!("inference workers gone, stopping");
                        self.state = PlayState::Stopped;
                        return;
                    }
                    self.in_flight += 1;
                }
                Err(err) => {
                    debug!("frame {frame_index} read failed: {err}");
                    self.pending.insert(frame_index, Err(err));
                }
            }
        }
    }

    fn collect(&mut self, done: WorkerResult) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if done.generation != self.generation {
            debug!(
                "discarding stale result for frame {} (generation {} != {})",
                done.frame_index, done.generation, self.generation
            );
            return;
        }
        self.last_latency_ms = done.latency_ms;
        self.pending.insert(done.frame_index, done.result);
    }

    /// Emit every buffered frame that is next in order. Blocking send:
    /// this is where downstream backpressure takes hold.
    fn flush(&mut self) -> Result<(), TransportError> {
        while let Some(result) = self.pending.remove(&self.next_emit) {
            let frame_index = self.next_emit;
            self.next_emit += 1;

            let payload = match result {
                Ok(detections) => FramePayload::Detections(detections),
                Err(err) => FramePayload::InferenceError(err.to_string()),
            };
            let message = FrameMessage {
                generation: self.generation,
                frame_index,
                timestamp_ms: self.started.elapsed().as_secs_f64() * 1e3,
                payload,
            };
            if self.frames_out.send(message).is_err() {
                warn!("detection stream consumer disconnected");
                return Err(TransportError::Disconnected);
            }

            self.emitted_since_stats += 1;
            if self.emitted_since_stats >= self.config.stats_interval {
                self.emit_stats();
            }
        }
        Ok(())
    }

    fn maybe_finish(&mut self) -> Result<(), TransportError> {
        let exhausted = self.next_submit >= self.source.len()
            && self.in_flight == 0
            && self.pending.is_empty();
        if self.state != PlayState::Running || !exhausted {
            return Ok(());
        }

        if self.emitted_since_stats > 0 {
            self.emit_stats();
        }
        if !self.ended_notified {
            self.ended_notified = true;
            if self.control.send(ControlEvent::StreamEnded).is_err() {
                self.state = PlayState::Stopped;
                return Ok(());
            }
        }
        if self.state == PlayState::Running {
            info!("playback complete at frame {}", self.next_emit);
            self.state = PlayState::Idle;
        }
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> Result<(), TransportError> {
        match command {
            Command::Play => {
                if self.state != PlayState::Stopped {
                    debug!("play from frame {}", self.next_submit);
                    self.state = PlayState::Running;
                }
            }
            Command::Pause => {
                if self.state == PlayState::Running {
                    debug!("paused at frame {}", self.next_emit);
                    self.state = PlayState::Paused;
                }
            }
            Command::Seek(target) => self.handle_seek(target),
            Command::Stop => {
                info!("stop requested");
                self.state = PlayState::Stopped;
            }
        }
        Ok(())
    }

    fn handle_seek(&mut self, target: u64) {
        if target >= self.source.len() {
            let reason = SeekError::OutOfRange {
                target,
                len: self.source.len(),
            }
            .to_string();
            warn!("rejected seek: {reason}");
            let rejection = ControlEvent::Rejected {
                command: Command::Seek(target),
                reason,
            };
            if self.control.send(rejection).is_err() {
                self.state = PlayState::Stopped;
            }
            return;
        }

        // Everything buffered or in flight for the old position is now
        // stale; late worker results are filtered by generation.
        self.generation += 1;
        self.pending.clear();
        self.next_submit = target;
        self.next_emit = target;
        self.ended_notified = false;
        info!("seek to frame {target}, generation {}", self.generation);
    }

    fn emit_stats(&mut self) {
        let elapsed = self.stats_marker.elapsed().as_secs_f64();
        let frames_per_second = if elapsed > 0.0 {
            self.emitted_since_stats as f64 / elapsed
        } else {
            0.0
        };
        let snapshot = StatsSnapshot {
            frames_per_second,
            queue_depth: self.in_flight + self.pending.len(),
            last_latency_ms: self.last_latency_ms,
        };
        self.emitted_since_stats = 0;
        self.stats_marker = Instant::now();

        // Stats are ephemeral: dropped when the controller is not
        // draining, fatal only if the controller is gone entirely.
        if self.control.try_send(ControlEvent::Stats(snapshot)).is_err() {
            self.state = PlayState::Stopped;
        }
    }

    fn shutdown(&mut self) {
        // Closing the job channel lets the workers drain and exit.
        self.job_tx = None;
        while self.done_rx.recv().is_ok() {}
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!("video processing server stopped");
    }
}

fn worker_loop<M: InferenceModel>(
    model: Arc<M>,
    peak: PeakConfig,
    jobs: Receiver<Job>,
    done: Sender<WorkerResult>,
) {
    while let Ok(job) = jobs.recv() {
        let started = Instant::now();
        let result = model
            .infer(&job.frame)
            .map(|heatmap| find_peaks(&heatmap, job.frame_index, &peak));
        let latency_ms = started.elapsed().as_secs_f64() * 1e3;
        let message = WorkerResult {
            generation: job.generation,
            frame_index: job.frame_index,
            result,
            latency_ms,
        };
        if done.send(message).is_err() {
            break;
        }
    }
}
