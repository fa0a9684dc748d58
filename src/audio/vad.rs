//! Energy-based voice activity detection.
//!
//! Gates transcription on RMS energy so silent recordings short-circuit to
//! a no-speech outcome instead of letting the model hallucinate text.

use tracing::debug;

/// Analysis frame length in milliseconds
const FRAME_MS: usize = 20;

/// RMS energy above which a frame counts as speech
const ENERGY_THRESHOLD: f32 = 0.01;

/// Silence gaps shorter than this are bridged into the surrounding speech
pub const MIN_SILENCE_MS: usize = 500;

/// Outcome of scanning a sample buffer for speech
#[derive(Debug, Clone, Copy)]
pub struct VadResult {
    pub has_speech: bool,
    /// Total speech duration, with sub-threshold gaps bridged
    pub speech_secs: f32,
}

/// Scan 16 kHz mono samples for voice activity.
///
/// Frames are classified by RMS energy; silence runs shorter than
/// `min_silence_ms` between speech frames are counted as speech, so brief
/// pauses do not fragment an utterance.
#[must_use]
pub fn detect(samples: &[f32], sample_rate: u32, min_silence_ms: usize) -> VadResult {
    if samples.is_empty() {
        return VadResult {
            has_speech: false,
            speech_secs: 0.0,
        };
    }

    let frame_len = (sample_rate as usize * FRAME_MS) / 1000;
    let min_silence_frames = min_silence_ms / FRAME_MS;

    let speech_flags: Vec<bool> = samples
        .chunks(frame_len.max(1))
        .map(|frame| rms(frame) >= ENERGY_THRESHOLD)
        .collect();

    // Bridge short silence gaps between speech frames
    let mut bridged = speech_flags.clone();
    let mut i = 0;
    while i < speech_flags.len() {
        if !speech_flags[i] {
            let gap_start = i;
            while i < speech_flags.len() && !speech_flags[i] {
                i += 1;
            }
            let gap_len = i - gap_start;
            let bounded_by_speech = gap_start > 0 && i < speech_flags.len();
            if bounded_by_speech && gap_len < min_silence_frames {
                for flag in &mut bridged[gap_start..i] {
                    *flag = true;
                }
            }
        } else {
            i += 1;
        }
    }

    let speech_frames = bridged.iter().filter(|&&f| f).count();
    let speech_secs = (speech_frames * FRAME_MS) as f32 / 1000.0;
    let has_speech = speech_flags.iter().any(|&f| f);

    debug!(
        frames = speech_flags.len(),
        speech_frames,
        speech_secs,
        "voice activity scan"
    );

    VadResult {
        has_speech,
        speech_secs,
    }
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = frame.iter().map(|&s| s * s).sum();
    (sum_squares / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration_ms: usize, amplitude: f32) -> Vec<f32> {
        let samples = 16 * duration_ms;
        (0..samples)
            .map(|i| {
                let t = i as f32 / 16000.0;
                (2.0 * std::f32::consts::PI * 440.0 * t).sin() * amplitude
            })
            .collect()
    }

    #[test]
    fn test_silence_has_no_speech() {
        let silence = vec![0.0f32; 16000];
        let result = detect(&silence, 16000, MIN_SILENCE_MS);
        assert!(!result.has_speech);
        assert_eq!(result.speech_secs, 0.0);
    }

    #[test]
    fn test_empty_buffer() {
        let result = detect(&[], 16000, MIN_SILENCE_MS);
        assert!(!result.has_speech);
    }

    #[test]
    fn test_tone_is_speech() {
        let samples = tone(1000, 0.5);
        let result = detect(&samples, 16000, MIN_SILENCE_MS);
        assert!(result.has_speech);
        assert!(result.speech_secs > 0.9);
    }

    #[test]
    fn test_very_quiet_audio_is_silence() {
        let samples = tone(1000, 0.001);
        let result = detect(&samples, 16000, MIN_SILENCE_MS);
        assert!(!result.has_speech);
    }

    #[test]
    fn test_short_gap_is_bridged() {
        // speech, 200ms silence, speech: gap under 500ms counts as speech
        let mut samples = tone(400, 0.5);
        samples.extend(vec![0.0f32; 16 * 200]);
        samples.extend(tone(400, 0.5));

        let result = detect(&samples, 16000, MIN_SILENCE_MS);
        assert!(result.has_speech);
        assert!(result.speech_secs > 0.9);
    }

    #[test]
    fn test_long_gap_is_not_bridged() {
        // speech, 800ms silence, speech: gap is real silence
        let mut samples = tone(400, 0.5);
        samples.extend(vec![0.0f32; 16 * 800]);
        samples.extend(tone(400, 0.5));

        let result = detect(&samples, 16000, MIN_SILENCE_MS);
        assert!(result.has_speech);
        assert!(result.speech_secs < 0.95);
    }

    #[test]
    fn test_leading_silence_is_not_bridged() {
        let mut samples = vec![0.0f32; 16 * 300];
        samples.extend(tone(300, 0.5));

        let result = detect(&samples, 16000, MIN_SILENCE_MS);
        assert!(result.has_speech);
        // leading gap has no speech before it, so it stays silence
        assert!(result.speech_secs < 0.5);
    }
}
