use thiserror::Error;

/// Errors from model selection, download, and lifecycle management
#[derive(Debug, Error)]
pub enum ModelError {
    /// Requested tier is not in the catalog
    #[error("invalid model tier: '{0}'")]
    InvalidTier(String),

    /// Tier is known but its files are not in the cache
    #[error("model '{0}' not found. Please download it first")]
    ModelNotFound(String),

    /// No tier has been selected yet
    #[error("no model currently selected")]
    NoTierSelected,

    /// Download completed but verification never succeeded
    #[error("model download failed: {0}")]
    DownloadFailed(String),

    /// Not enough free space on the cache volume
    #[error("insufficient disk space: {0}")]
    InsufficientDiskSpace(String),

    /// The inference engine failed to load the weights
    #[error("failed to load model '{tier}': {source}")]
    LoadFailed {
        tier: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors from the recording session's capture path
#[derive(Debug, Error)]
pub enum AudioError {
    /// Opening or starting the input stream failed
    #[error("failed to open capture stream: {0}")]
    StreamOpenFailed(String),

    /// Stop was reached with an empty capture buffer
    #[error("no audio was captured")]
    NoAudioCaptured,
}

/// Errors from a transcription attempt
///
/// "No speech detected" is NOT an error; it is modeled as
/// [`crate::transcription::TranscriptionOutcome::NoSpeech`].
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// Whisper inference failed
    #[error("transcription failed: {0}")]
    InferenceFailed(String),

    /// Writing or removing the transient audio file failed
    #[error("transient audio file error: {0}")]
    FileIo(#[from] std::io::Error),

    /// The model could not be made ready
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tier_message_names_tier() {
        let err = ModelError::InvalidTier("huge".to_owned());
        assert!(err.to_string().contains("huge"));
    }

    #[test]
    fn test_model_error_converts_into_transcribe_error() {
        let err: TranscribeError = ModelError::NoTierSelected.into();
        assert!(matches!(err, TranscribeError::Model(ModelError::NoTierSelected)));
    }
}
