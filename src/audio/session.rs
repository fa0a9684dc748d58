use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::cues::{Cue, CueSink};
use crate::clipboard::ClipboardSink;
use crate::error::AudioError;
use crate::model::ModelManager;
use crate::transcription::{worker, TranscriptionOutcome};

/// Fixed capture format: mono 16-bit PCM
pub const CAPTURE_SAMPLE_RATE: u32 = 44_100;
pub const CAPTURE_CHANNELS: u16 = 1;
pub const CAPTURE_BLOCK_FRAMES: u32 = 8_192;

/// How long `Completed` is shown before auto-reverting to `Idle`
const COMPLETED_DWELL: Duration = Duration::from_secs(3);

/// Bounded wait for the in-flight worker at shutdown
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const JOIN_POLL: Duration = Duration::from_millis(50);

/// Lifecycle of one recording cycle: Idle → Recording → Processing →
/// Completed → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Processing,
    Completed,
}

/// Chunks appended by the capture callback during one recording.
/// A fresh buffer is allocated on every `start`, so buffers are never
/// shared across recordings.
type ChunkBuffer = Arc<Mutex<Vec<Vec<i16>>>>;

/// Control surface of an open capture stream
pub trait StreamControl {
    /// Activate the microphone
    fn start(&self) -> anyhow::Result<()>;
    /// Deactivate the microphone. Must tolerate an already-inactive stream.
    fn stop(&self) -> anyhow::Result<()>;
}

type StreamFactory =
    Box<dyn Fn(Arc<AtomicBool>, ChunkBuffer) -> Result<Box<dyn StreamControl>, AudioError>>;

/// The recording state machine.
///
/// Owned by the control thread. The capture callback (audio subsystem
/// context) is the only writer to the chunk buffer, and only while
/// `is_recording` is set; worker completion arrives over a channel drained
/// by [`Self::pump`] on the control thread, which is the single
/// cross-thread state mutation point.
pub struct RecordingSession {
    state: RecordingState,
    state_changed_at: Instant,
    /// False only during `start()`'s setup, guarding re-entrant toggles
    ready: bool,
    is_recording: Arc<AtomicBool>,
    buffer: ChunkBuffer,
    stream: Option<Box<dyn StreamControl>>,
    open_stream: StreamFactory,
    manager: Arc<ModelManager>,
    cues: CueSink,
    clipboard: Box<dyn ClipboardSink>,
    worker: Option<JoinHandle<()>>,
    outcome_tx: Sender<TranscriptionOutcome>,
    outcome_rx: Receiver<TranscriptionOutcome>,
}

impl RecordingSession {
    /// Session capturing from the default input device
    #[must_use]
    pub fn new(
        manager: Arc<ModelManager>,
        cues: CueSink,
        clipboard: Box<dyn ClipboardSink>,
    ) -> Self {
        Self::with_stream_factory(manager, cues, clipboard, Box::new(open_capture_stream))
    }

    fn with_stream_factory(
        manager: Arc<ModelManager>,
        cues: CueSink,
        clipboard: Box<dyn ClipboardSink>,
        open_stream: StreamFactory,
    ) -> Self {
        let (outcome_tx, outcome_rx) = std::sync::mpsc::channel();
        Self {
            state: RecordingState::Idle,
            state_changed_at: Instant::now(),
            ready: true,
            is_recording: Arc::new(AtomicBool::new(false)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            open_stream,
            manager,
            cues,
            clipboard,
            worker: None,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Current state, read by the shell for display
    #[must_use]
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Number of captured chunks so far in this recording
    #[must_use]
    pub fn buffered_chunks(&self) -> usize {
        lock_buffer(&self.buffer).len()
    }

    /// Hotkey edge: start from `Idle`, stop otherwise.
    pub fn toggle(&mut self) {
        if self.state == RecordingState::Idle {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Begin a new recording. No-op with a warning if already recording or
    /// a start is in flight.
    pub fn start(&mut self) {
        if self.state == RecordingState::Recording || !self.ready {
            warn!("cannot start recording: already recording or not ready");
            return;
        }

        info!("starting recording");
        self.ready = false;

        // Fresh buffer per recording: the previous one was retired on stop
        self.buffer = Arc::new(Mutex::new(Vec::new()));

        self.set_state(RecordingState::Recording);
        self.cues.play(Cue::Start);

        // Flag set before the stream starts so the first blocks are kept
        self.is_recording.store(true, Ordering::Relaxed);

        let opened = (self.open_stream)(Arc::clone(&self.is_recording), Arc::clone(&self.buffer))
            .and_then(|stream| {
                stream
                    .start()
                    .map_err(|e| AudioError::StreamOpenFailed(format!("{e:#}")))?;
                Ok(stream)
            });

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
            }
            Err(e) => {
                error!("error starting recording: {e}");
                self.is_recording.store(false, Ordering::Relaxed);
                self.teardown_stream();
                self.set_state(RecordingState::Idle);
                self.cues.play(Cue::Error);
            }
        }

        // Restored on success and failure so a new attempt is always possible
        self.ready = true;
    }

    /// Stop recording and hand the capture off for transcription.
    /// No-op with a warning if not recording.
    pub fn stop(&mut self) {
        if self.state != RecordingState::Recording {
            warn!("cannot stop recording: not currently recording");
            return;
        }

        info!("stopping recording");
        self.is_recording.store(false, Ordering::Relaxed);
        self.teardown_stream();

        self.set_state(RecordingState::Processing);
        self.cues.play(Cue::Stop);

        let chunks = std::mem::take(&mut *lock_buffer(&self.buffer));
        if chunks.is_empty() {
            // A warning, not an error cue: the user just tapped the hotkey
            warn!("{}", AudioError::NoAudioCaptured);
            self.set_state(RecordingState::Idle);
            return;
        }

        let samples: Vec<i16> = chunks.concat();
        debug!(samples = samples.len(), "capture buffer concatenated");

        let manager = Arc::clone(&self.manager);
        let tx = self.outcome_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("transcription".to_owned())
            .spawn(move || {
                let outcome = worker::run(&samples, CAPTURE_SAMPLE_RATE, &manager);
                if tx.send(outcome).is_err() {
                    warn!("session dropped before transcription outcome was delivered");
                }
            });

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                error!("failed to spawn transcription worker: {e}");
                self.cues.play(Cue::Error);
                self.set_state(RecordingState::Idle);
            }
        }
    }

    /// Drain worker outcomes. Called from the control loop; this is where
    /// transcription results mutate session state.
    pub fn pump(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.reap_finished_worker();
            match outcome {
                TranscriptionOutcome::Text(text) => {
                    self.clipboard.set_text(&text);
                    self.cues.play(Cue::Success);
                    self.set_state(RecordingState::Completed);
                }
                TranscriptionOutcome::NoSpeech => {
                    warn!("no transcription result");
                    self.cues.play(Cue::Error);
                    self.set_state(RecordingState::Idle);
                }
                TranscriptionOutcome::Failed => {
                    self.cues.play(Cue::Error);
                    self.set_state(RecordingState::Idle);
                }
            }
        }
    }

    /// Periodic tick from the shell: decays `Completed` back to `Idle`
    /// after the dwell time.
    pub fn tick(&mut self) {
        if self.state == RecordingState::Completed
            && self.state_changed_at.elapsed() >= COMPLETED_DWELL
        {
            debug!("auto-resetting from completed to idle");
            self.set_state(RecordingState::Idle);
        }
    }

    /// Ordered teardown: stop capture, then wait (bounded) for the worker.
    ///
    /// A worker still running after the timeout is abandoned; that is
    /// accepted behavior at process exit, not a bug.
    pub fn shutdown(&mut self) {
        info!("shutting down recording session");
        self.is_recording.store(false, Ordering::Relaxed);
        self.teardown_stream();

        if let Some(handle) = self.worker.take() {
            let deadline = Instant::now() + WORKER_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(JOIN_POLL);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("transcription worker panicked");
                }
            } else {
                warn!(
                    "transcription still running after {}s, abandoning",
                    WORKER_JOIN_TIMEOUT.as_secs()
                );
            }
        }

        self.set_state(RecordingState::Idle);
    }

    /// Single teardown funnel for the capture stream. Safe when no stream
    /// exists, when it is already stopped, and mid-failure.
    fn teardown_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.stop() {
                debug!("stream already inactive during teardown: {e:#}");
            }
        }
    }

    fn set_state(&mut self, state: RecordingState) {
        debug!(from = ?self.state, to = ?state, "session state change");
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    fn reap_finished_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("transcription worker panicked");
                }
            } else {
                self.worker = Some(handle);
            }
        }
    }

    #[cfg(test)]
    fn force_state(&mut self, state: RecordingState, changed_at: Instant) {
        self.state = state;
        self.state_changed_at = changed_at;
    }
}

fn lock_buffer(buffer: &ChunkBuffer) -> std::sync::MutexGuard<'_, Vec<Vec<i16>>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// CPAL-backed capture stream at the fixed format
struct CpalStream {
    stream: cpal::Stream,
}

impl StreamControl for CpalStream {
    fn start(&self) -> anyhow::Result<()> {
        use anyhow::Context;
        self.stream.play().context("failed to start audio stream")
    }

    fn stop(&self) -> anyhow::Result<()> {
        use anyhow::Context;
        self.stream.pause().context("failed to stop audio stream")
    }
}

fn open_capture_stream(
    is_recording: Arc<AtomicBool>,
    buffer: ChunkBuffer,
) -> Result<Box<dyn StreamControl>, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AudioError::StreamOpenFailed("no input device available".to_owned()))?;

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());
    info!(device = %device_name, "opening capture stream");

    let config = cpal::StreamConfig {
        channels: CAPTURE_CHANNELS,
        sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Fixed(CAPTURE_BLOCK_FRAMES),
    };

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if is_recording.load(Ordering::Relaxed) {
                    lock_buffer(&buffer).push(data.to_vec());
                }
            },
            // Overruns and other stream status reports are logged without
            // interrupting capture
            |err| warn!("audio stream status: {err}"),
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed(e.to_string()))?;

    Ok(Box::new(CpalStream { stream }))
}
