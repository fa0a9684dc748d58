//! Background transcription of one captured recording.
//!
//! Runs off the control thread so the hotkey and shell stay responsive.
//! Exactly one worker is live at a time: the session does not start a new
//! recording worker until the previous outcome has been consumed.
//!
//! The worker never lets an error escape: every failure collapses into
//! [`TranscriptionOutcome::Failed`] so the session can recover its state.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::audio::cleanup::TRANSIENT_PREFIX;
use crate::audio::convert;
use crate::error::TranscribeError;
use crate::model::ModelManager;
use crate::text;

/// Result of one stop-and-transcribe cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    /// Normalized transcript ready for the clipboard
    Text(String),
    /// Inference ran but found nothing to transcribe (not an error)
    NoSpeech,
    /// Something went wrong; details are in the log
    Failed,
}

/// Transcribe one recording's samples. Never panics or returns an error.
#[must_use]
pub fn run(samples: &[i16], sample_rate: u32, manager: &ModelManager) -> TranscriptionOutcome {
    match transcribe(samples, sample_rate, manager) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("error during transcription: {e:#}");
            TranscriptionOutcome::Failed
        }
    }
}

fn transcribe(
    samples: &[i16],
    sample_rate: u32,
    manager: &ModelManager,
) -> Result<TranscriptionOutcome, TranscribeError> {
    let duration_secs = samples.len() as f64 / f64::from(sample_rate);
    info!(
        samples = samples.len(),
        duration_secs,
        "starting transcription"
    );

    // The guard removes the transient file when this function returns,
    // success or failure.
    let transient = write_transient_wav(samples, sample_rate)?;

    manager.ensure_ready_for(duration_secs)?;
    let engine = manager.acquire()?;

    let model_input = read_model_input(transient.path())?;
    let segments = engine.transcribe(&model_input)?;

    if segments.is_empty() {
        warn!("no speech detected in audio");
        return Ok(TranscriptionOutcome::NoSpeech);
    }

    let transcript = text::normalize(&segments.join(" "));

    // Timeout check only; the model normally stays resident for the next
    // recording
    manager.release_idle_if_expired();

    info!(chars = transcript.chars().count(), "transcription successful");
    Ok(TranscriptionOutcome::Text(transcript))
}

/// Write samples to a scoped transient WAV in the fixed capture format.
///
/// The returned guard deletes the file on drop.
pub fn write_transient_wav(
    samples: &[i16],
    sample_rate: u32,
) -> Result<NamedTempFile, TranscribeError> {
    let file = tempfile::Builder::new()
        .prefix(TRANSIENT_PREFIX)
        .suffix(".wav")
        .tempfile()?;

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(file.path(), spec).map_err(wav_io_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(wav_io_error)?;
    }
    writer.finalize().map_err(wav_io_error)?;

    Ok(file)
}

/// Read a transient WAV back and convert it to the model's input format.
fn read_model_input(path: &Path) -> Result<Vec<f32>, TranscribeError> {
    let mut reader = hound::WavReader::open(path).map_err(wav_io_error)?;
    let sample_rate = reader.spec().sample_rate;

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(wav_io_error)?;

    Ok(convert::to_model_format(&samples, sample_rate))
}

fn wav_io_error(e: hound::Error) -> TranscribeError {
    TranscribeError::FileIo(io::Error::other(e))
}
