use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Triangular};

use crate::config::DitherConfig;
use crate::error::{FirError, Result};

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// Triangular-PDF dither sized to a target bit depth
///
/// Each sample receives an independent draw on `[-1/2^bits, +1/2^bits]` with
/// its peak at zero. Every channel owns its generator so channels never
/// share a noise sequence.
pub struct Ditherer {
    distribution: Option<Triangular<f32>>,
    amplitude: f32,
    rng: ChaCha8Rng,
}

impl Ditherer {
    /// # Arguments
    /// * `bit_depth` - Target resolution; `None` disables dither
    /// * `seed` - Generator seed; `None` seeds from entropy
    pub fn new(bit_depth: Option<u32>, seed: Option<u64>) -> Result<Self> {
        let (distribution, amplitude) = match bit_depth {
            Some(bits) => {
                let lsb = (2.0f64).powi(-(bits as i32)) as f32;
                let tri = Triangular::new(-lsb, lsb, 0.0).map_err(|e| {
                    FirError::Config(format!("Invalid dither depth {}: {}", bits, e))
                })?;
                (Some(tri), lsb)
            }
            None => (None, 0.0),
        };

        Ok(Self {
            distribution,
            amplitude,
            rng: create_rng(seed),
        })
    }

    /// Ditherer for one channel, seeded at `base seed + channel`
    pub fn for_channel(config: &DitherConfig, channel: usize) -> Result<Self> {
        let seed = config.seed.map(|s| s.wrapping_add(channel as u64));
        Self::new(config.bit_depth, seed)
    }

    pub fn is_enabled(&self) -> bool {
        self.distribution.is_some()
    }

    /// Peak dither amplitude, zero when disabled
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Add dither to `samples` in place
    pub fn apply(&mut self, samples: &mut [f32]) {
        if let Some(distribution) = &self.distribution {
            for sample in samples.iter_mut() {
                *sample += distribution.sample(&mut self.rng);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dither_bounded_by_lsb() {
        let mut ditherer = Ditherer::new(Some(16), Some(7)).unwrap();
        let lsb = 1.0 / 65536.0;
        assert_eq!(ditherer.amplitude(), lsb);

        let mut samples = vec![0.0f32; 50_000];
        ditherer.apply(&mut samples);
        assert!(samples.iter().all(|s| s.abs() <= lsb));
        assert!(samples.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_dither_mean_near_zero() {
        let mut ditherer = Ditherer::new(Some(8), Some(42)).unwrap();
        let mut samples = vec![0.0f32; 100_000];
        ditherer.apply(&mut samples);

        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
        let lsb = 1.0 / 256.0;
        assert!(mean.abs() < lsb * 0.01, "mean {} too far from zero", mean);

        // TPDF on [-a, a] has variance a^2 / 6
        let var = samples.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>()
            / samples.len() as f64;
        let expected = lsb * lsb / 6.0;
        assert!((var - expected).abs() / expected < 0.05);
    }

    #[test]
    fn test_seeded_dither_is_deterministic() {
        let mut a = Ditherer::new(Some(12), Some(99)).unwrap();
        let mut b = Ditherer::new(Some(12), Some(99)).unwrap();
        let mut xa = vec![0.5f32; 256];
        let mut xb = vec![0.5f32; 256];
        a.apply(&mut xa);
        b.apply(&mut xb);
        assert_eq!(xa, xb);
    }

    #[test]
    fn test_channels_get_distinct_sequences() {
        let config = DitherConfig {
            bit_depth: Some(12),
            seed: Some(1000),
        };
        let mut left = Ditherer::for_channel(&config, 0).unwrap();
        let mut right = Ditherer::for_channel(&config, 1).unwrap();
        let mut same_as_right = Ditherer::new(Some(12), Some(1001)).unwrap();

        let mut l = vec![0.0f32; 64];
        let mut r = vec![0.0f32; 64];
        let mut r2 = vec![0.0f32; 64];
        left.apply(&mut l);
        right.apply(&mut r);
        same_as_right.apply(&mut r2);

        assert_ne!(l, r);
        assert_eq!(r, r2);
    }

    #[test]
    fn test_disabled_dither_is_transparent() {
        let mut ditherer = Ditherer::new(None, Some(1)).unwrap();
        assert!(!ditherer.is_enabled());
        assert_eq!(ditherer.amplitude(), 0.0);

        let mut samples = vec![0.25f32, -0.5, 1.0];
        ditherer.apply(&mut samples);
        assert_eq!(samples, vec![0.25, -0.5, 1.0]);
    }
}
