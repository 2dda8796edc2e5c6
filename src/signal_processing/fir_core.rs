use std::sync::Arc;

/// Immutable FIR tap coefficients shared by every channel of a session
///
/// Stored as 32-bit floats. Cloning shares the same allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    taps: Arc<[f32]>,
}

impl FilterCoefficients {
    pub fn new(taps: Vec<f32>) -> Self {
        Self { taps: taps.into() }
    }

    /// Narrow designer output to 32-bit taps
    pub fn from_f64(taps: &[f64]) -> Self {
        Self::new(taps.iter().map(|&t| t as f32).collect())
    }

    /// Get access to the tap coefficients
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Get the number of taps (filter length)
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Get the group delay in samples (half the filter length for linear phase)
    pub fn group_delay_samples(&self) -> usize {
        self.taps.len().saturating_sub(1) / 2
    }

    /// Sum of the taps, the gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        self.taps.iter().map(|&t| t as f64).sum()
    }
}

/// Valid-mode linear convolution: `out[n] = Σ taps[k] · input[n + N - 1 - k]`
///
/// `out` must hold exactly `input.len() - taps.len() + 1` samples.
pub fn convolve_valid_direct(input: &[f32], taps: &[f32], out: &mut [f32]) {
    let n_taps = taps.len();
    debug_assert!(input.len() >= n_taps);
    debug_assert_eq!(out.len(), input.len() - n_taps + 1);

    for (n, sample) in out.iter_mut().enumerate() {
        let window = &input[n..n + n_taps];
        // Taps run forward while the window runs backward
        let acc: f64 = taps
            .iter()
            .zip(window.iter().rev())
            .map(|(&t, &x)| t as f64 * x as f64)
            .sum();
        *sample = acc as f32;
    }
}
