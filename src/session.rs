use crate::audio::buffer::{ChannelRingBuffer, UpdateOutcome};
use crate::audio::resample::{SampleRateConverter, create_converter};
use crate::config::FirStreamConfig;
use crate::constants::MAX_OUTPUT_BLOCK_FACTOR;
use crate::error::{FirError, Result, StreamFault};
use crate::signal_processing::{
    ConvolutionEngine, Decimator, DesignOutcome, Ditherer, FilterCoefficients, FilterDesigner,
    FilterSpec, FilterSpecBuilder,
};

/// Build the filter spec for `config` at the upsampled rate and design it
pub fn design_filter(config: &FirStreamConfig) -> Result<(FilterSpec, DesignOutcome)> {
    let rate = config.audio.upsampled_rate() as f64;
    let spec = FilterSpecBuilder::from_config(&config.filter, rate).build()?;
    let outcome = FilterDesigner::new().design(&spec)?;
    Ok((spec, outcome))
}

fn into_fault(err: FirError) -> StreamFault {
    match err {
        FirError::StreamFault(fault) => fault,
        _ => StreamFault::Resampler,
    }
}

/// Per-channel pipeline state and scratch
pub struct ChannelState {
    converter: Box<dyn SampleRateConverter>,
    ring: ChannelRingBuffer,
    engine: ConvolutionEngine,
    ditherer: Ditherer,
    input: Vec<f32>,
    upsampled: Vec<f32>,
    filtered: Vec<f32>,
    decimated: Vec<f32>,
}

impl ChannelState {
    fn new(
        config: &FirStreamConfig,
        coefficients: &FilterCoefficients,
        channel: usize,
        max_output_frames: usize,
    ) -> Result<Self> {
        let audio = &config.audio;
        let upsampled_block = audio.upsampled_block_size();
        let ring = ChannelRingBuffer::new(coefficients.len(), upsampled_block);
        let converter = create_converter(
            audio.resampler,
            audio.sample_rate,
            audio.upsample_factor,
            audio.block_size,
        )?;
        let engine = ConvolutionEngine::new(config.stream.convolution, coefficients, ring.len())?;

        Ok(Self {
            upsampled: vec![0.0; converter.max_output_len().max(upsampled_block)],
            converter,
            engine,
            ditherer: Ditherer::for_channel(&config.dither, channel)?,
            input: vec![0.0; audio.block_size],
            filtered: vec![0.0; upsampled_block],
            decimated: vec![0.0; max_output_frames],
            ring,
        })
    }

    /// Run one block through rate-up, window update, convolution, decimation
    /// and dither; the result lands in `decimated[..frames]`
    fn run(
        &mut self,
        decimator: &Decimator,
        frames: usize,
    ) -> std::result::Result<UpdateOutcome, StreamFault> {
        let produced = self
            .converter
            .process_into(&self.input, &mut self.upsampled)
            .map_err(into_fault)?;
        let outcome = self.ring.update(&self.upsampled[..produced]);
        self.engine
            .convolve_valid(self.ring.as_slice(), &mut self.filtered)
            .map_err(into_fault)?;
        decimator.extract(&self.filtered, &mut self.decimated[..frames]);
        self.ditherer.apply(&mut self.decimated[..frames]);
        Ok(outcome)
    }

    pub fn ring(&self) -> &ChannelRingBuffer {
        &self.ring
    }

    pub fn uses_fft(&self) -> bool {
        self.engine.is_fft()
    }
}

/// Everything the real-time step needs, allocated up front
pub struct StreamSession {
    channels: Vec<ChannelState>,
    coefficients: FilterCoefficients,
    decimator: Decimator,
    upsample_factor: usize,
    block_size: usize,
    sample_rate: u32,
    max_output_frames: usize,
    size_corrections: u64,
    mismatch_warned: bool,
}

impl StreamSession {
    pub fn new(config: &FirStreamConfig, coefficients: FilterCoefficients) -> Result<Self> {
        config.validate()?;
        if coefficients.is_empty() {
            return Err(FirError::Config("Filter has no taps".into()));
        }

        let audio = &config.audio;
        let max_output_frames = audio.block_size * MAX_OUTPUT_BLOCK_FACTOR;
        let channels = (0..audio.channels as usize)
            .map(|c| ChannelState::new(config, &coefficients, c, max_output_frames))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Session: {} ch, {} Hz x{}, block {} ({} upsampled), {} taps, ring {}, {} convolution",
            audio.channels,
            audio.sample_rate,
            audio.upsample_factor,
            audio.block_size,
            audio.upsampled_block_size(),
            coefficients.len(),
            coefficients.len() + audio.upsampled_block_size() - 1,
            if channels.first().is_some_and(|c| c.uses_fft()) {
                "FFT"
            } else {
                "direct"
            }
        );

        Ok(Self {
            channels,
            coefficients,
            decimator: Decimator::new(audio.upsample_factor),
            upsample_factor: audio.upsample_factor,
            block_size: audio.block_size,
            sample_rate: audio.sample_rate,
            max_output_frames,
            size_corrections: 0,
            mismatch_warned: false,
        })
    }

    /// Design the configured filter and build a session around it
    pub fn from_config(config: &FirStreamConfig) -> Result<(Self, DesignOutcome)> {
        let (_, outcome) = design_filter(config)?;
        let session = Self::new(config, outcome.coefficients.clone())?;
        Ok((session, outcome))
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coefficients
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn upsample_factor(&self) -> usize {
        self.upsample_factor
    }

    /// Largest output block, in frames, the session can fill
    pub fn max_output_frames(&self) -> usize {
        self.max_output_frames
    }

    /// Length of every channel's ring buffer
    pub fn ring_len(&self) -> usize {
        self.coefficients.len() + self.block_size * self.upsample_factor - 1
    }

    /// Filter delay in base-rate frames
    pub fn latency_frames(&self) -> f64 {
        self.coefficients.group_delay_samples() as f64 / self.upsample_factor as f64
    }

    /// Number of converter blocks whose length had to be corrected
    pub fn size_corrections(&self) -> u64 {
        self.size_corrections
    }

    /// Filter one interleaved block
    ///
    /// `input` must carry exactly `block_size` frames; `output` may ask for
    /// up to `max_output_frames` frames. Size checks run before any channel
    /// state changes. If a channel fails mid-block every channel is reset, so
    /// the channels never drift apart in time.
    pub fn process_block(
        &mut self,
        input: &[f32],
        output: &mut [f32],
    ) -> std::result::Result<(), StreamFault> {
        let num_channels = self.channels.len();
        if input.len() != self.block_size * num_channels {
            return Err(StreamFault::InputBlockSize {
                expected: self.block_size,
                actual: input.len() / num_channels,
            });
        }
        let frames = output.len() / num_channels;
        if frames > self.max_output_frames || output.len() % num_channels != 0 {
            return Err(StreamFault::OutputBlockSize {
                max: self.max_output_frames,
                actual: frames,
            });
        }

        let mut correction = None;
        let mut failure = None;
        for (c, state) in self.channels.iter_mut().enumerate() {
            for (dst, frame) in state.input.iter_mut().zip(input.chunks_exact(num_channels)) {
                *dst = frame[c];
            }

            let outcome = match state.run(&self.decimator, frames) {
                Ok(outcome) => outcome,
                Err(fault) => {
                    failure = Some((c, fault));
                    break;
                }
            };
            if !outcome.is_exact() {
                correction = Some(outcome);
            }

            for (frame, &sample) in output
                .chunks_exact_mut(num_channels)
                .zip(&state.decimated[..frames])
            {
                frame[c] = sample;
            }
        }

        if let Some((c, fault)) = failure {
            log::warn!("Channel {} failed ({}); resetting all channels", c, fault);
            self.reset();
            return Err(fault);
        }

        if let Some(outcome) = correction {
            self.size_corrections += 1;
            if !self.mismatch_warned {
                self.mismatch_warned = true;
                log::warn!(
                    "Rate converter block size drifted ({:?}); correcting at the oldest edge",
                    outcome
                );
            }
        }

        Ok(())
    }

    /// Clear every ring and converter so the next block starts from silence
    pub fn reset(&mut self) {
        for state in &mut self.channels {
            state.converter.reset();
            state.ring.reset();
        }
    }
}
