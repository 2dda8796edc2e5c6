use std::f32::consts::PI;

/// Interleaved constant signal
pub fn dc(frames: usize, channels: usize, level: f32) -> Vec<f32> {
    vec![level; frames * channels]
}

/// Interleaved sine, identical on every channel
pub fn sine(
    frames: usize,
    channels: usize,
    sample_rate: u32,
    freq_hz: f32,
    amplitude: f32,
) -> Vec<f32> {
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let value = amplitude * (2.0 * PI * freq_hz * t).sin();
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

/// Increasing ramp `start, start + 1, ...`
pub fn ramp(len: usize, start: f32) -> Vec<f32> {
    (0..len).map(|i| start + i as f32).collect()
}

/// One channel out of an interleaved signal
pub fn channel(interleaved: &[f32], channels: usize, index: usize) -> Vec<f32> {
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame[index])
        .collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

pub fn mean(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}
