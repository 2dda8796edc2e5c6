/// Integer-factor downsampler for filtered upsampled blocks
///
/// Keeps every Nth sample starting from the first. The filter ahead of it
/// has already band-limited the signal, so no further anti-aliasing happens
/// here.
#[derive(Debug, Clone, Copy)]
pub struct Decimator {
    factor: usize,
}

impl Decimator {
    /// # Arguments
    /// * `factor` - Decimation factor, clamped to at least 1
    pub fn new(factor: usize) -> Self {
        Self {
            factor: factor.max(1),
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Number of decimated samples `filtered_len` upsampled samples yield
    pub fn available(&self, filtered_len: usize) -> usize {
        filtered_len.div_ceil(self.factor)
    }

    /// Fill `out` with `filtered[i * factor]`
    ///
    /// Frames past the end of the decimated sequence hold its last value
    /// (zero when `filtered` is empty).
    ///
    /// # Returns
    /// Number of frames taken directly from `filtered`
    pub fn extract(&self, filtered: &[f32], out: &mut [f32]) -> usize {
        let taken = self.available(filtered.len()).min(out.len());

        for (dst, src) in out[..taken]
            .iter_mut()
            .zip(filtered.iter().step_by(self.factor))
        {
            *dst = *src;
        }

        let hold = if taken > 0 { out[taken - 1] } else { 0.0 };
        out[taken..].fill(hold);

        taken
    }
}
