use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::vad;
use crate::error::TranscribeError;
use crate::model::ModelSettings;

/// Beam search width for all transcriptions
const BEAM_WIDTH: i32 = 5;

/// Whisper inference engine, loaded with a fixed set of compute settings.
///
/// One engine instance corresponds to one resident model. When the
/// [`crate::model::ModelManager`] decides different settings are needed it
/// drops the instance and loads a new one rather than mutating this.
pub struct TranscriptionEngine {
    /// Whisper context (exclusive access via the mutex)
    ctx: Arc<Mutex<WhisperContext>>,
    settings: ModelSettings,
}

impl std::fmt::Debug for TranscriptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TranscriptionEngine {
    /// Load the model weights at `path`.
    ///
    /// # Errors
    /// Returns error if the weights file is missing, corrupt, or the thread
    /// count does not fit the whisper API.
    pub fn load(path: &Path, settings: ModelSettings) -> Result<Self> {
        if settings.cpu_threads == 0 {
            return Err(anyhow!("cpu_threads must be > 0"));
        }
        i32::try_from(settings.cpu_threads).map_err(|_| anyhow!("cpu_threads value too large"))?;

        tracing::info!(
            path = %path.display(),
            threads = settings.cpu_threads,
            workers = settings.num_workers,
            precision = settings.precision.as_str(),
            "loading whisper model"
        );

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("model path contains invalid UTF-8"))?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| anyhow!("whisper context creation failed: {e:?}"))
            .with_context(|| format!("failed to load model from {}", path.display()))?;

        tracing::info!("whisper model loaded");

        Ok(Self {
            ctx: Arc::new(Mutex::new(ctx)),
            settings,
        })
    }

    /// Settings this engine was loaded with
    #[must_use]
    pub fn settings(&self) -> ModelSettings {
        self.settings
    }

    /// Transcribe 16 kHz mono f32 samples.
    ///
    /// Returns the trimmed, non-empty segment texts in emission order. An
    /// empty vec means no speech was detected; audio that fails the
    /// voice-activity gate never reaches inference.
    ///
    /// # Errors
    /// Returns error if whisper inference fails.
    pub fn transcribe(&self, samples: &[f32]) -> Result<Vec<String>, TranscribeError> {
        let _span = tracing::debug_span!("transcription", samples = samples.len()).entered();

        let activity = vad::detect(samples, 16_000, vad::MIN_SILENCE_MS);
        if !activity.has_speech {
            tracing::debug!("voice activity gate: no speech in buffer");
            return Ok(Vec::new());
        }

        let mut state = self
            .ctx
            .lock()
            .map_err(|e| TranscribeError::InferenceFailed(format!("context lock poisoned: {e}")))?
            .create_state()
            .map_err(|e| TranscribeError::InferenceFailed(format!("state creation failed: {e:?}")))?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: BEAM_WIDTH,
            patience: -1.0,
        });
        params.set_n_threads(self.settings.cpu_threads as i32);
        params.set_token_timestamps(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(None);
        params.set_translate(false);

        let start = std::time::Instant::now();
        state
            .full(params, samples)
            .map_err(|e| TranscribeError::InferenceFailed(format!("whisper inference failed: {e:?}")))?;
        let inference_duration = start.elapsed();

        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string().trim().to_owned();
            if !text.is_empty() {
                segments.push(text);
            }
        }

        tracing::info!(
            segments = segments.len(),
            inference_ms = inference_duration.as_millis(),
            "transcription completed"
        );

        Ok(segments)
    }
}

// SAFETY: the WhisperContext is only reachable through the Arc<Mutex<>>, so
// all access is serialized; whisper-rs contexts are safe to use from any
// thread under external synchronization.
#[allow(unsafe_code)]
unsafe impl Send for TranscriptionEngine {}
#[allow(unsafe_code)]
unsafe impl Sync for TranscriptionEngine {}
