/// Whisper model inference engine
pub mod engine;
/// Background transcription worker
pub mod worker;

pub use engine::TranscriptionEngine;
pub use worker::{run as run_worker, TranscriptionOutcome};
