//! Audible lifecycle cues.
//!
//! Short generated tones signal recording start/stop and transcription
//! success/failure. Playback is strictly best-effort: if no output device
//! is available the sink degrades to a no-op, and playback errors never
//! propagate.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use tracing::{debug, warn};

/// Lifecycle events that get an audible cue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Start,
    Stop,
    Success,
    Error,
}

/// Plays cue tones through the default output device
pub struct CueSink {
    // Dropping the stream kills playback; keep it alive with the handle
    output: Option<(OutputStream, OutputStreamHandle)>,
    tones: CueTones,
}

struct CueTones {
    start: Vec<u8>,
    stop: Vec<u8>,
    success: Vec<u8>,
    error: Vec<u8>,
}

impl CueSink {
    /// Open the default output device. Degrades to a silent sink if none
    /// is available.
    #[must_use]
    pub fn new() -> Self {
        let output = match OutputStream::try_default() {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!("no audio output for cues, continuing silently: {e}");
                None
            }
        };

        Self {
            output,
            tones: generate_tones(),
        }
    }

    /// A sink that never plays anything (used in tests and headless runs)
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            output: None,
            tones: generate_tones(),
        }
    }

    /// Play the cue for `event`. Never fails.
    pub fn play(&self, event: Cue) {
        let Some((_, handle)) = &self.output else {
            debug!(?event, "cue skipped, no output device");
            return;
        };

        let data = match event {
            Cue::Start => &self.tones.start,
            Cue::Stop => &self.tones.stop,
            Cue::Success => &self.tones.success,
            Cue::Error => &self.tones.error,
        };

        if let Err(e) = play_wav(handle, data) {
            warn!(?event, "failed to play cue: {e}");
        }
    }
}

impl Default for CueSink {
    fn default() -> Self {
        Self::new()
    }
}

fn play_wav(handle: &OutputStreamHandle, data: &[u8]) -> Result<(), String> {
    let source =
        Decoder::new(Cursor::new(data.to_vec())).map_err(|e| format!("decode failed: {e}"))?;
    let sink = Sink::try_new(handle).map_err(|e| format!("sink failed: {e}"))?;
    sink.append(source);
    sink.detach();
    Ok(())
}

fn generate_tones() -> CueTones {
    CueTones {
        // rising pair: recording begins
        start: two_tone(440.0, 880.0, 150, 20),
        // falling pair: capture handed off
        stop: two_tone(880.0, 440.0, 150, 20),
        // bright single tone
        success: tone(1040.0, 180, 25),
        // low warble
        error: two_tone(300.0, 200.0, 200, 30),
    }
}

fn tone(frequency: f32, duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    synth(duration_ms, fade_ms, |_, t| {
        (2.0 * std::f32::consts::PI * frequency * t).sin()
    })
}

fn two_tone(freq1: f32, freq2: f32, duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    synth(duration_ms, fade_ms, move |progress, t| {
        let freq = if progress < 0.5 { freq1 } else { freq2 };
        (2.0 * std::f32::consts::PI * freq * t).sin()
    })
}

fn synth(duration_ms: u32, fade_ms: u32, wave: impl Fn(f32, f32) -> f32) -> Vec<u8> {
    const SAMPLE_RATE: u32 = 44_100;
    let num_samples = (SAMPLE_RATE * duration_ms / 1000) as usize;
    let fade_samples = (SAMPLE_RATE * fade_ms / 1000) as usize;

    let mut samples: Vec<i16> = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = i as f32 / SAMPLE_RATE as f32;
        let progress = i as f32 / num_samples as f32;
        let mut amplitude = wave(progress, t);

        if i < fade_samples {
            amplitude *= i as f32 / fade_samples as f32;
        } else if i >= num_samples - fade_samples {
            amplitude *= (num_samples - i) as f32 / fade_samples as f32;
        }

        samples.push((amplitude * 16000.0) as i16);
    }

    encode_wav(&samples, SAMPLE_RATE)
}

fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let mut wav = Vec::new();

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + samples.len() * 2) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&((samples.len() * 2) as u32).to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tones_are_valid_wav() {
        let tones = generate_tones();
        for data in [&tones.start, &tones.stop, &tones.success, &tones.error] {
            assert_eq!(&data[0..4], b"RIFF");
            assert_eq!(&data[8..12], b"WAVE");
            assert!(data.len() > 44);
        }
    }

    #[test]
    fn test_disabled_sink_play_is_noop() {
        let sink = CueSink::disabled();
        // must not panic or block
        sink.play(Cue::Start);
        sink.play(Cue::Stop);
        sink.play(Cue::Success);
        sink.play(Cue::Error);
    }

    #[test]
    fn test_tone_duration_scales_with_ms() {
        let short = tone(440.0, 50, 10);
        let long = tone(440.0, 200, 10);
        assert!(long.len() > short.len());
    }
}
