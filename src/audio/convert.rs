//! Sample conversion from the fixed capture format to the model's input
//! format: i16 PCM at the capture rate to f32 mono at 16 kHz.

use tracing::debug;

/// Sample rate whisper models expect
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

/// Convert captured i16 mono samples to normalized f32 at 16 kHz.
#[must_use]
pub fn to_model_format(samples: &[i16], capture_rate: u32) -> Vec<f32> {
    let floats: Vec<f32> = samples
        .iter()
        .map(|&s| f32::from(s) / f32::from(i16::MAX))
        .collect();

    if capture_rate == MODEL_SAMPLE_RATE {
        return floats;
    }

    resample(&floats, capture_rate, MODEL_SAMPLE_RATE)
}

/// Linear-interpolation resampler.
///
/// Quality is sufficient for speech input; the model is robust to the
/// slight high-frequency aliasing this introduces.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    let mut resampled = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src_idx = (i as f64) * ratio;
        let floor = (src_idx.floor() as usize).min(samples.len() - 1);
        let ceil = (floor + 1).min(samples.len() - 1);
        let fract = (src_idx - src_idx.floor()) as f32;

        let interpolated = samples[floor] * (1.0 - fract) + samples[ceil] * fract;
        resampled.push(interpolated);
    }

    debug!(
        from_rate,
        to_rate,
        input_samples = samples.len(),
        output_samples = resampled.len(),
        "resampled capture buffer"
    );

    resampled
}
