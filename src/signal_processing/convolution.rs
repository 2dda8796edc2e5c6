use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::config::ConvolutionMode;
use crate::constants::FFT_CONVOLUTION_MIN_TAPS;
use crate::error::{FirError, Result, StreamFault};
use crate::signal_processing::FilterCoefficients;
use crate::signal_processing::fir_core::convolve_valid_direct;

/// Direct-form valid-mode convolution
pub struct DirectConvolver {
    coefficients: FilterCoefficients,
}

impl DirectConvolver {
    pub fn new(coefficients: FilterCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn convolve_valid(&self, input: &[f32], out: &mut [f32]) {
        convolve_valid_direct(input, self.coefficients.taps(), out);
    }
}

/// FFT valid-mode convolution over a fixed input length
///
/// A circular convolution of at least `input_len` points is exact over the
/// valid region, so the transform only has to cover the input window.
pub struct FftConvolver {
    taps_len: usize,
    input_len: usize,
    fft_size: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    kernel: Vec<Complex32>,
    time: Vec<f32>,
    spectrum: Vec<Complex32>,
    forward_scratch: Vec<Complex32>,
    inverse_scratch: Vec<Complex32>,
}

impl FftConvolver {
    pub fn new(coefficients: &FilterCoefficients, input_len: usize) -> Result<Self> {
        let taps_len = coefficients.len();
        let fft_size = input_len.next_power_of_two();

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let mut padded = vec![0.0f32; fft_size];
        padded[..taps_len].copy_from_slice(coefficients.taps());
        let mut kernel = r2c.make_output_vec();
        r2c.process(&mut padded, &mut kernel)
            .map_err(|e| FirError::FilterDesign(format!("Kernel FFT: {}", e)))?;

        // Fold the inverse transform's 1/N scaling into the kernel
        let scale = 1.0 / fft_size as f32;
        for bin in kernel.iter_mut() {
            *bin *= scale;
        }

        Ok(Self {
            taps_len,
            input_len,
            fft_size,
            time: vec![0.0; fft_size],
            spectrum: r2c.make_output_vec(),
            forward_scratch: r2c.make_scratch_vec(),
            inverse_scratch: c2r.make_scratch_vec(),
            r2c,
            c2r,
            kernel,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn convolve_valid(&mut self, input: &[f32], out: &mut [f32]) -> Result<()> {
        debug_assert_eq!(input.len(), self.input_len);
        debug_assert_eq!(out.len(), self.input_len - self.taps_len + 1);

        self.time[..self.input_len].copy_from_slice(input);
        self.time[self.input_len..].fill(0.0);

        self.r2c
            .process_with_scratch(&mut self.time, &mut self.spectrum, &mut self.forward_scratch)
            .map_err(|_| FirError::StreamFault(StreamFault::Convolution))?;

        for (bin, k) in self.spectrum.iter_mut().zip(&self.kernel) {
            *bin *= *k;
        }
        // DC and Nyquist bins of a real signal carry no imaginary part
        if let Some(first) = self.spectrum.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.spectrum.last_mut() {
            last.im = 0.0;
        }

        self.c2r
            .process_with_scratch(&mut self.spectrum, &mut self.time, &mut self.inverse_scratch)
            .map_err(|_| FirError::StreamFault(StreamFault::Convolution))?;

        out.copy_from_slice(&self.time[self.taps_len - 1..self.input_len]);
        Ok(())
    }
}

/// Valid-mode block convolution, producing `input_len - taps + 1` samples
pub enum ConvolutionEngine {
    Direct(DirectConvolver),
    Fft(FftConvolver),
}

impl ConvolutionEngine {
    pub fn new(
        mode: ConvolutionMode,
        coefficients: &FilterCoefficients,
        input_len: usize,
    ) -> Result<Self> {
        if coefficients.is_empty() || input_len < coefficients.len() {
            return Err(FirError::Config(format!(
                "Convolution input of {} samples is shorter than {} taps",
                input_len,
                coefficients.len()
            )));
        }

        let use_fft = match mode {
            ConvolutionMode::Direct => false,
            ConvolutionMode::Fft => true,
            ConvolutionMode::Auto => coefficients.len() >= FFT_CONVOLUTION_MIN_TAPS,
        };

        if use_fft {
            Ok(Self::Fft(FftConvolver::new(coefficients, input_len)?))
        } else {
            Ok(Self::Direct(DirectConvolver::new(coefficients.clone())))
        }
    }

    pub fn convolve_valid(&mut self, input: &[f32], out: &mut [f32]) -> Result<()> {
        match self {
            Self::Direct(conv) => {
                conv.convolve_valid(input, out);
                Ok(())
            }
            Self::Fft(conv) => conv.convolve_valid(input, out),
        }
    }

    pub fn is_fft(&self) -> bool {
        matches!(self, Self::Fft(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowSpec;
    use crate::signal_processing::windowed_sinc::{WindowedSincRequest, firwin};

    fn lowpass_taps(num_taps: usize) -> FilterCoefficients {
        let taps = firwin(&WindowedSincRequest {
            num_taps,
            cutoffs: vec![8000.0],
            transition_hz: None,
            window: WindowSpec::kaiser(8.0),
            pass_zero: true,
            sample_rate: 48000.0,
        })
        .unwrap();
        FilterCoefficients::from_f64(&taps)
    }

    fn pseudo_random(len: usize) -> Vec<f32> {
        let mut state = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_fft_matches_direct() {
        for (num_taps, block) in [(65, 256), (101, 2048), (401, 2048), (301, 3072)] {
            let coeffs = lowpass_taps(num_taps);
            let input_len = num_taps + block - 1;
            let input = pseudo_random(input_len);

            let mut direct = ConvolutionEngine::new(ConvolutionMode::Direct, &coeffs, input_len)
                .unwrap();
            let mut fft =
                ConvolutionEngine::new(ConvolutionMode::Fft, &coeffs, input_len).unwrap();
            assert!(fft.is_fft());
            assert!(!direct.is_fft());

            let mut out_direct = vec![0.0f32; block];
            let mut out_fft = vec![0.0f32; block];
            direct.convolve_valid(&input, &mut out_direct).unwrap();
            fft.convolve_valid(&input, &mut out_fft).unwrap();

            for (a, b) in out_direct.iter().zip(&out_fft) {
                assert!((a - b).abs() < 1e-4, "direct {} vs fft {}", a, b);
            }
        }
    }

    #[test]
    fn test_fft_reusable_across_blocks() {
        let coeffs = lowpass_taps(65);
        let input_len = 65 + 512 - 1;
        let mut fft = ConvolutionEngine::new(ConvolutionMode::Fft, &coeffs, input_len).unwrap();
        let mut direct =
            ConvolutionEngine::new(ConvolutionMode::Direct, &coeffs, input_len).unwrap();

        for seed_block in 0..4 {
            let input: Vec<f32> = pseudo_random(input_len + seed_block)[seed_block..].to_vec();
            let mut a = vec![0.0f32; 512];
            let mut b = vec![0.0f32; 512];
            fft.convolve_valid(&input, &mut a).unwrap();
            direct.convolve_valid(&input, &mut b).unwrap();
            for (x, y) in a.iter().zip(&b) {
                assert!((x - y).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_auto_mode_selection() {
        let short = FilterCoefficients::new(vec![0.5; 31]);
        let engine = ConvolutionEngine::new(ConvolutionMode::Auto, &short, 1024).unwrap();
        assert!(!engine.is_fft());

        let long = lowpass_taps(65);
        let engine = ConvolutionEngine::new(ConvolutionMode::Auto, &long, 1024).unwrap();
        assert!(engine.is_fft());
    }

    #[test]
    fn test_input_shorter_than_taps_rejected() {
        let coeffs = lowpass_taps(101);
        assert!(ConvolutionEngine::new(ConvolutionMode::Direct, &coeffs, 50).is_err());
    }

    #[test]
    fn test_fft_size_covers_input() {
        let coeffs = lowpass_taps(401);
        let conv = FftConvolver::new(&coeffs, 2447).unwrap();
        assert_eq!(conv.fft_size(), 4096);
    }
}
