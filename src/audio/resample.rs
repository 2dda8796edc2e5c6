//! Upsampling ahead of the filter.
//!
//! Each channel owns one single-channel converter. Converters take exactly
//! one base-rate block per call and write into a caller-owned buffer, so the
//! real-time path never allocates.

use rubato::{
    FastFixedIn, FftFixedIn, PolynomialDegree, Resampler as RubatoResampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::config::ResamplerQuality;
use crate::error::{FirError, Result, StreamFault};

/// Block-oriented sample-rate converter for one channel
pub trait SampleRateConverter: Send {
    /// Convert one input block, returning the number of samples written
    fn process_into(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize>;

    /// Upper bound on the samples one call can produce
    fn max_output_len(&self) -> usize;

    /// Drop any buffered history
    fn reset(&mut self);
}

/// Factor-one converter: copies its input
pub struct Passthrough {
    block_size: usize,
}

impl Passthrough {
    pub fn new(block_size: usize) -> Self {
        Self { block_size }
    }
}

impl SampleRateConverter for Passthrough {
    fn process_into(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize> {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        Ok(n)
    }

    fn max_output_len(&self) -> usize {
        self.block_size
    }

    fn reset(&mut self) {}
}

/// The rubato resamplers a converter can hold, dispatched by hand
enum ResamplerKind {
    Poly(FastFixedIn<f32>),
    Sinc(SincFixedIn<f32>),
    Fft(FftFixedIn<f32>),
}

impl ResamplerKind {
    fn process_into_buffer(
        &mut self,
        input: &[f32],
        output: &mut [f32],
    ) -> std::result::Result<(usize, usize), rubato::ResampleError> {
        let wave_in = [input];
        let mut wave_out = [output];
        match self {
            Self::Poly(r) => r.process_into_buffer(&wave_in, &mut wave_out, None),
            Self::Sinc(r) => r.process_into_buffer(&wave_in, &mut wave_out, None),
            Self::Fft(r) => r.process_into_buffer(&wave_in, &mut wave_out, None),
        }
    }

    fn input_frames_next(&self) -> usize {
        match self {
            Self::Poly(r) => r.input_frames_next(),
            Self::Sinc(r) => r.input_frames_next(),
            Self::Fft(r) => r.input_frames_next(),
        }
    }

    fn output_frames_max(&self) -> usize {
        match self {
            Self::Poly(r) => r.output_frames_max(),
            Self::Sinc(r) => r.output_frames_max(),
            Self::Fft(r) => r.output_frames_max(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Poly(r) => r.reset(),
            Self::Sinc(r) => r.reset(),
            Self::Fft(r) => r.reset(),
        }
    }
}

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Single-channel rubato converter with a fixed input block
pub struct RubatoConverter {
    resampler: ResamplerKind,
    quality: ResamplerQuality,
    block_size: usize,
}

impl RubatoConverter {
    pub fn new(
        quality: ResamplerQuality,
        input_rate: u32,
        output_rate: u32,
        block_size: usize,
    ) -> Result<Self> {
        let ratio = output_rate as f64 / input_rate as f64;
        let construction = |e: rubato::ResamplerConstructionError| {
            FirError::Resampler(format!("{:?} converter: {}", quality, e))
        };

        let resampler = match quality {
            ResamplerQuality::Fast => ResamplerKind::Poly(
                FastFixedIn::new(ratio, 2.0, PolynomialDegree::Cubic, block_size, 1)
                    .map_err(construction)?,
            ),
            ResamplerQuality::High => ResamplerKind::Sinc(
                SincFixedIn::new(ratio, 2.0, sinc_params(), block_size, 1)
                    .map_err(construction)?,
            ),
            ResamplerQuality::Maximum => ResamplerKind::Fft(
                FftFixedIn::new(
                    input_rate as usize,
                    output_rate as usize,
                    block_size,
                    2,
                    1,
                )
                .map_err(construction)?,
            ),
        };

        let accepted = resampler.input_frames_next();
        if accepted != block_size {
            return Err(FirError::Resampler(format!(
                "{:?} converter takes {} frames per call, block size is {}",
                quality, accepted, block_size
            )));
        }

        log::debug!(
            "Rate converter {:?}: {} -> {} Hz, {} frames in, up to {} out",
            quality,
            input_rate,
            output_rate,
            block_size,
            resampler.output_frames_max()
        );

        Ok(Self {
            resampler,
            quality,
            block_size,
        })
    }

    pub fn quality(&self) -> ResamplerQuality {
        self.quality
    }
}

impl SampleRateConverter for RubatoConverter {
    fn process_into(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize> {
        if input.len() != self.block_size {
            return Err(FirError::StreamFault(StreamFault::InputBlockSize {
                expected: self.block_size,
                actual: input.len(),
            }));
        }
        let (_, written) = self
            .resampler
            .process_into_buffer(input, output)
            .map_err(|_| FirError::StreamFault(StreamFault::Resampler))?;
        Ok(written)
    }

    fn max_output_len(&self) -> usize {
        self.resampler.output_frames_max()
    }

    fn reset(&mut self) {
        self.resampler.reset();
    }
}

/// Converter from the base rate up by `factor`; passthrough when `factor` is 1
pub fn create_converter(
    quality: ResamplerQuality,
    sample_rate: u32,
    factor: usize,
    block_size: usize,
) -> Result<Box<dyn SampleRateConverter>> {
    if factor <= 1 {
        return Ok(Box::new(Passthrough::new(block_size)));
    }
    let converter = RubatoConverter::new(
        quality,
        sample_rate,
        sample_rate * factor as u32,
        block_size,
    )?;
    Ok(Box::new(converter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_copies() {
        let mut conv = Passthrough::new(4);
        let mut out = [0.0f32; 4];
        let n = conv.process_into(&[1.0, 2.0, 3.0, 4.0], &mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(conv.max_output_len(), 4);
    }

    #[test]
    fn test_factor_one_is_passthrough() {
        let conv = create_converter(ResamplerQuality::Maximum, 48000, 1, 256).unwrap();
        assert_eq!(conv.max_output_len(), 256);
    }

    #[test]
    fn test_fft_converter_doubles_block() {
        let mut conv = create_converter(ResamplerQuality::Maximum, 44100, 2, 1024).unwrap();
        assert!(conv.max_output_len() >= 2048);

        let input = vec![0.5f32; 1024];
        let mut output = vec![0.0f32; conv.max_output_len()];
        for _ in 0..4 {
            let n = conv.process_into(&input, &mut output).unwrap();
            assert_eq!(n, 2048);
        }
        // Settled DC level survives conversion
        let tail = &output[1024..2048];
        let mean = tail.iter().sum::<f32>() / tail.len() as f32;
        assert!((mean - 0.5).abs() < 0.01, "mean {}", mean);
    }

    #[test]
    fn test_all_qualities_construct() {
        for quality in [
            ResamplerQuality::Fast,
            ResamplerQuality::High,
            ResamplerQuality::Maximum,
        ] {
            let conv = create_converter(quality, 48000, 2, 512).unwrap();
            assert!(conv.max_output_len() >= 1024);
        }
    }

    #[test]
    fn test_reset_restarts_from_silence() {
        let mut fresh = create_converter(ResamplerQuality::High, 48000, 2, 256).unwrap();
        let mut used = create_converter(ResamplerQuality::High, 48000, 2, 256).unwrap();
        let mut out_fresh = vec![0.0f32; fresh.max_output_len()];
        let mut out_used = vec![0.0f32; used.max_output_len()];

        for _ in 0..3 {
            used.process_into(&[0.7; 256], &mut out_used).unwrap();
        }
        used.reset();

        let ramp: Vec<f32> = (0..256).map(|i| i as f32 / 256.0).collect();
        let n_fresh = fresh.process_into(&ramp, &mut out_fresh).unwrap();
        let n_used = used.process_into(&ramp, &mut out_used).unwrap();
        assert_eq!(n_fresh, n_used);
        assert_eq!(out_fresh[..n_fresh], out_used[..n_used]);
    }

    #[test]
    fn test_wrong_input_length_is_fault() {
        let mut conv = RubatoConverter::new(ResamplerQuality::Maximum, 48000, 96000, 256).unwrap();
        let mut output = vec![0.0f32; conv.max_output_len()];
        let err = conv.process_into(&[0.0; 100], &mut output).unwrap_err();
        assert!(matches!(
            err,
            FirError::StreamFault(StreamFault::InputBlockSize {
                expected: 256,
                actual: 100
            })
        ));
    }
}
