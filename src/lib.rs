//! ScribeKey - hotkey dictation for macOS
//!
//! Records microphone audio on a global hotkey, transcribes it locally
//! with whisper.cpp, normalizes the text, and places it on the clipboard.

/// Audio capture, session state machine, cues, and conversion
pub mod audio;
/// Clipboard sink
pub mod clipboard;
/// Persisted configuration and application paths
pub mod config;
/// Domain error types
pub mod error;
/// Global hotkey toggle signal
pub mod hotkey;
/// Model catalog, downloads, and resident model lifecycle
pub mod model;
/// Interactive first-run setup flow
pub mod setup;
/// Operation timing and memory measurements
pub mod stats;
/// Host memory, disk, and capability probes
pub mod system;
/// Logging initialization
pub mod telemetry;
/// Transcript normalization
pub mod text;
/// Whisper inference engine and background worker
pub mod transcription;
