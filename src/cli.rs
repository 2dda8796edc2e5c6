//! Command-line overrides shared by the binaries.

use std::path::PathBuf;

use crate::config::{
    ConvolutionMode, Cutoff, DegradeMode, DesignMethod, FilterFamily, FirStreamConfig,
    ResamplerQuality, TransitionPolicy, WindowSpec,
};
use crate::error::Result;

/// Configuration file plus per-setting overrides
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Filter family
    #[arg(long, value_enum)]
    pub family: Option<FilterFamily>,

    /// Cutoff in Hz, or a pair "f1,f2" for bandpass/bandstop
    #[arg(long)]
    pub cutoff: Option<Cutoff>,

    /// Number of taps (odd)
    #[arg(short = 't', long)]
    pub num_taps: Option<usize>,

    /// Design method
    #[arg(short = 'm', long, value_enum)]
    pub method: Option<DesignMethod>,

    /// Window, e.g. "kaiser:10", "kaiser" or "hamming"
    #[arg(long)]
    pub window: Option<WindowSpec>,

    /// Transition policy: conservative, narrow
    #[arg(long)]
    pub transition: Option<TransitionPolicy>,

    /// Base sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Frames per block
    #[arg(short = 'b', long)]
    pub block_size: Option<usize>,

    /// Channel count
    #[arg(long)]
    pub channels: Option<u16>,

    /// Oversampling factor
    #[arg(short = 'u', long)]
    pub upsample: Option<usize>,

    /// Rate converter quality
    #[arg(long, value_enum)]
    pub resampler: Option<ResamplerQuality>,

    /// Convolution algorithm
    #[arg(long, value_enum)]
    pub convolution: Option<ConvolutionMode>,

    /// Degraded-block output
    #[arg(long, value_enum)]
    pub degrade: Option<DegradeMode>,

    /// Dither target bit depth
    #[arg(long)]
    pub dither_bits: Option<u32>,

    /// Disable dither
    #[arg(long, conflicts_with = "dither_bits")]
    pub no_dither: bool,

    /// Base seed for the dither generators
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ConfigArgs {
    /// Load the configuration file (or defaults) and apply the overrides
    pub fn load(&self) -> Result<FirStreamConfig> {
        let mut config = match &self.config {
            Some(path) => FirStreamConfig::from_file(path)?,
            None => FirStreamConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut FirStreamConfig) {
        if let Some(family) = self.family {
            config.filter.family = family;
        }
        if let Some(cutoff) = &self.cutoff {
            config.filter.cutoff = cutoff.clone();
        }
        if let Some(num_taps) = self.num_taps {
            config.filter.num_taps = num_taps;
        }
        if let Some(method) = self.method {
            config.filter.method = method;
        }
        if let Some(window) = self.window {
            config.filter.window = window;
        }
        if let Some(transition) = self.transition {
            config.filter.transition = transition;
        }
        if let Some(rate) = self.sample_rate {
            config.audio.sample_rate = rate;
        }
        if let Some(block_size) = self.block_size {
            config.audio.block_size = block_size;
        }
        if let Some(channels) = self.channels {
            config.audio.channels = channels;
        }
        if let Some(factor) = self.upsample {
            config.audio.upsample_factor = factor;
        }
        if let Some(quality) = self.resampler {
            config.audio.resampler = quality;
        }
        if let Some(mode) = self.convolution {
            config.stream.convolution = mode;
        }
        if let Some(mode) = self.degrade {
            config.stream.degrade = mode;
        }
        if self.no_dither {
            config.dither.bit_depth = None;
        } else if let Some(bits) = self.dither_bits {
            config.dither.bit_depth = Some(bits);
        }
        if let Some(seed) = self.seed {
            config.dither.seed = Some(seed);
        }
    }
}

/// Map `-v` counts to a default log filter
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
