//! Configuration for the firstream filter pipeline.
//!
//! Every setting has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! [audio]
//! sample_rate = 44100
//! upsample_factor = 2
//!
//! [filter]
//! family = "bandpass"
//! cutoff = [300.0, 3400.0]
//! num_taps = 401
//! window = { kind = "kaiser", shape = 10.0 }
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    CONSERVATIVE_MAX_TRANSITION_HZ, CONSERVATIVE_TRANSITION_FRACTION, DEFAULT_MAX_ITERATIONS,
    NARROW_MAX_TRANSITION_HZ, NARROW_TRANSITION_FRACTION,
};
use crate::error::{FirError, Result};

/// FIR filter family
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(try_from = "String")]
pub enum FilterFamily {
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
}

impl FilterFamily {
    /// Bandpass and bandstop take a cutoff pair
    pub fn is_banded(&self) -> bool {
        matches!(self, Self::Bandpass | Self::Bandstop)
    }

    /// Number of cutoff frequencies the family requires
    pub fn cutoff_count(&self) -> usize {
        if self.is_banded() { 2 } else { 1 }
    }

    /// Whether the response passes 0 Hz (lowpass and bandstop)
    pub fn passes_dc(&self) -> bool {
        matches!(self, Self::Lowpass | Self::Bandstop)
    }
}

impl fmt::Display for FilterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Bandstop => "bandstop",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterFamily {
    type Err = FirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowpass" => Ok(Self::Lowpass),
            "highpass" => Ok(Self::Highpass),
            "bandpass" => Ok(Self::Bandpass),
            "bandstop" => Ok(Self::Bandstop),
            other => Err(FirError::Config(format!("Invalid filter family '{}'", other))),
        }
    }
}

impl TryFrom<String> for FilterFamily {
    type Error = FirError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Coefficient design algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(try_from = "String")]
pub enum DesignMethod {
    /// Parks-McClellan equiripple design, falls back to windowed sinc
    Equiripple,
    /// Windowed-sinc design
    WindowedSinc,
}

impl fmt::Display for DesignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equiripple => f.write_str("equiripple"),
            Self::WindowedSinc => f.write_str("windowed-sinc"),
        }
    }
}

impl FromStr for DesignMethod {
    type Err = FirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equiripple" | "remez" => Ok(Self::Equiripple),
            "windowed-sinc" | "windowed_sinc" | "firwin" => Ok(Self::WindowedSinc),
            other => Err(FirError::Config(format!("Invalid design method '{}'", other))),
        }
    }
}

impl TryFrom<String> for DesignMethod {
    type Error = FirError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Taper applied to the ideal sinc response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    Kaiser,
}

/// Window descriptor: family name plus optional shape parameter
///
/// The shape parameter is the Kaiser β. A Kaiser window without a shape
/// parameter derives β from the transition width at design time.
///
/// # Parsing formats
/// - `kaiser:10` - Kaiser window with β = 10
/// - `kaiser` - Kaiser window, β from transition width
/// - `hamming`, `hann`, `blackman`, `rectangular`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WindowSpec {
    pub kind: WindowKind,
    #[serde(default)]
    pub shape: Option<f64>,
}

impl WindowSpec {
    pub fn kaiser(beta: f64) -> Self {
        Self {
            kind: WindowKind::Kaiser,
            shape: Some(beta),
        }
    }

    pub fn new(kind: WindowKind) -> Self {
        Self { kind, shape: None }
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::kaiser(10.0)
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            WindowKind::Rectangular => "rectangular",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
            WindowKind::Kaiser => "kaiser",
        };
        match self.shape {
            Some(shape) => write!(f, "{}({})", name, shape),
            None => f.write_str(name),
        }
    }
}

impl FromStr for WindowSpec {
    type Err = FirError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let (name, shape) = match s.split_once(':') {
            Some((name, shape)) => {
                let shape: f64 = shape
                    .trim()
                    .parse()
                    .map_err(|_| FirError::Config(format!("Invalid window shape '{}'", shape)))?;
                (name.trim().to_string(), Some(shape))
            }
            None => (s.clone(), None),
        };

        let kind = match name.as_str() {
            "rectangular" | "boxcar" => WindowKind::Rectangular,
            "hann" | "hanning" => WindowKind::Hann,
            "hamming" => WindowKind::Hamming,
            "blackman" => WindowKind::Blackman,
            "kaiser" => WindowKind::Kaiser,
            other => return Err(FirError::Config(format!("Invalid window '{}'", other))),
        };

        if shape.is_some() && kind != WindowKind::Kaiser {
            return Err(FirError::Config(format!(
                "Window '{}' takes no shape parameter",
                name
            )));
        }

        Ok(Self { kind, shape })
    }
}

/// Transition width policy: `min(max_hz, fraction × basis)`
///
/// The basis is the cutoff for lowpass/highpass and the bandwidth `f2 - f1`
/// for bandpass/bandstop.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TransitionPolicy {
    pub max_hz: f64,
    pub fraction: f64,
}

impl TransitionPolicy {
    /// 2500 Hz cap, 30% of the basis
    pub fn conservative() -> Self {
        Self {
            max_hz: CONSERVATIVE_MAX_TRANSITION_HZ,
            fraction: CONSERVATIVE_TRANSITION_FRACTION,
        }
    }

    /// 500 Hz cap, 10% of the basis
    pub fn narrow() -> Self {
        Self {
            max_hz: NARROW_MAX_TRANSITION_HZ,
            fraction: NARROW_TRANSITION_FRACTION,
        }
    }

    pub fn width_for(&self, basis_hz: f64) -> f64 {
        self.max_hz.min(self.fraction * basis_hz)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_hz.is_finite() && self.max_hz > 0.0) {
            return Err(FirError::Config(format!(
                "Transition cap must be positive, got {}",
                self.max_hz
            )));
        }
        if !(self.fraction.is_finite() && self.fraction > 0.0) {
            return Err(FirError::Config(format!(
                "Transition fraction must be positive, got {}",
                self.fraction
            )));
        }
        Ok(())
    }
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::conservative()
    }
}

impl FromStr for TransitionPolicy {
    type Err = FirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::conservative()),
            "narrow" => Ok(Self::narrow()),
            other => Err(FirError::Config(format!(
                "Invalid transition policy '{}'",
                other
            ))),
        }
    }
}

/// One cutoff frequency or a cutoff pair, in Hz
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cutoff {
    Single(f64),
    Multiple(Vec<f64>),
}

impl Cutoff {
    pub fn pair(f1: f64, f2: f64) -> Self {
        Self::Multiple(vec![f1, f2])
    }

    pub fn values(&self) -> &[f64] {
        match self {
            Self::Single(hz) => std::slice::from_ref(hz),
            Self::Multiple(hz) => hz,
        }
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values().iter().map(|hz| format!("{hz}")).collect();
        write!(f, "{} Hz", parts.join("-"))
    }
}

impl FromStr for Cutoff {
    type Err = FirError;

    /// Parses `10000` or `300,3400`
    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|_| FirError::Config(format!("Invalid cutoff '{}'", p.trim())))
            })
            .collect::<Result<Vec<_>>>()?;
        match values.as_slice() {
            [single] => Ok(Self::Single(*single)),
            _ => Ok(Self::Multiple(values)),
        }
    }
}

/// Rate converter quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResamplerQuality {
    /// Cubic polynomial interpolation
    Fast,
    /// 256-tap sinc interpolation
    High,
    /// FFT-based conversion, exact block lengths for integer ratios
    #[default]
    Maximum,
}

/// Convolution algorithm for the valid-mode block convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvolutionMode {
    Direct,
    Fft,
    /// FFT from `FFT_CONVOLUTION_MIN_TAPS` taps upward
    #[default]
    Auto,
}

/// What a degraded cycle emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradeMode {
    /// Repeat the last successfully processed block
    #[default]
    RepeatLast,
    Silence,
}

/// System-wide configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirStreamConfig {
    /// Audio boundary and rate conversion
    pub audio: AudioConfig,
    /// Filter design parameters
    pub filter: FilterConfig,
    /// Output dither
    pub dither: DitherConfig,
    /// Real-time processing behavior
    pub stream: StreamConfig,
}

/// Audio boundary configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Base sample rate of the device in Hz
    pub sample_rate: u32,
    /// Frames per channel delivered on each callback
    pub block_size: usize,
    /// Number of interleaved channels
    pub channels: u16,
    /// Integer oversampling factor applied before filtering
    pub upsample_factor: usize,
    /// Quality of the upsampling converter
    pub resampler: ResamplerQuality,
}

impl AudioConfig {
    /// Rate the filter runs at
    pub fn upsampled_rate(&self) -> u32 {
        self.sample_rate * self.upsample_factor as u32
    }

    pub fn upsampled_block_size(&self) -> usize {
        self.block_size * self.upsample_factor
    }

    /// Real-time budget for one block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(FirError::Config("Sample rate must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(FirError::Config("Block size must be positive".into()));
        }
        if self.channels == 0 {
            return Err(FirError::Config("Channel count must be positive".into()));
        }
        if self.upsample_factor == 0 {
            return Err(FirError::Config("Upsample factor must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 1024,
            channels: 2,
            upsample_factor: 2,
            resampler: ResamplerQuality::default(),
        }
    }
}

/// Filter design configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub method: DesignMethod,
    pub family: FilterFamily,
    pub cutoff: Cutoff,
    /// Number of taps (must be odd)
    pub num_taps: usize,
    pub window: WindowSpec,
    pub transition: TransitionPolicy,
    /// Replaces the policy weights, one entry per band
    pub weight_override: Option<Vec<f64>>,
    /// Iteration bound for the equiripple optimizer
    pub max_iterations: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            method: DesignMethod::Equiripple,
            family: FilterFamily::Lowpass,
            cutoff: Cutoff::Single(10000.0),
            num_taps: 401,
            window: WindowSpec::default(),
            transition: TransitionPolicy::default(),
            weight_override: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// TPDF dither configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DitherConfig {
    /// Target bit depth; `None` disables dither
    pub bit_depth: Option<u32>,
    /// Base seed for the per-channel generators; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for DitherConfig {
    fn default() -> Self {
        Self {
            bit_depth: Some(24),
            seed: None,
        }
    }
}

/// Real-time behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub convolution: ConvolutionMode,
    pub degrade: DegradeMode,
    /// Consecutive degraded blocks tolerated before the stream is faulted
    pub max_degraded_blocks: usize,
    /// Capacity of the capture-to-playback ring, in blocks
    pub input_ring_blocks: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            convolution: ConvolutionMode::default(),
            degrade: DegradeMode::default(),
            max_degraded_blocks: 8,
            input_ring_blocks: 4,
        }
    }
}

impl FirStreamConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FirError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check settings that are not covered by filter spec validation
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.filter.transition.validate()?;
        if let Some(bits) = self.dither.bit_depth
            && !(1..=32).contains(&bits)
        {
            return Err(FirError::Config(format!(
                "Dither bit depth must be within 1..=32, got {}",
                bits
            )));
        }
        if self.stream.max_degraded_blocks == 0 {
            return Err(FirError::Config(
                "max_degraded_blocks must be at least 1".into(),
            ));
        }
        if self.stream.input_ring_blocks < 2 {
            return Err(FirError::Config(
                "input_ring_blocks must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_family_parse() {
        assert_eq!("lowpass".parse::<FilterFamily>().unwrap(), FilterFamily::Lowpass);
        assert_eq!("BandStop".parse::<FilterFamily>().unwrap(), FilterFamily::Bandstop);
        let err = "notch".parse::<FilterFamily>().unwrap_err();
        assert!(matches!(err, FirError::Config(_)));
    }

    #[test]
    fn test_filter_family_properties() {
        assert!(FilterFamily::Lowpass.passes_dc());
        assert!(FilterFamily::Bandstop.passes_dc());
        assert!(!FilterFamily::Highpass.passes_dc());
        assert!(!FilterFamily::Bandpass.passes_dc());
        assert_eq!(FilterFamily::Bandpass.cutoff_count(), 2);
        assert_eq!(FilterFamily::Highpass.cutoff_count(), 1);
    }

    #[test]
    fn test_design_method_aliases() {
        assert_eq!("remez".parse::<DesignMethod>().unwrap(), DesignMethod::Equiripple);
        assert_eq!("firwin".parse::<DesignMethod>().unwrap(), DesignMethod::WindowedSinc);
        assert!("least-squares".parse::<DesignMethod>().is_err());
    }

    #[test]
    fn test_window_spec_parse() {
        assert_eq!("kaiser:10".parse::<WindowSpec>().unwrap(), WindowSpec::kaiser(10.0));
        let w: WindowSpec = "hamming".parse().unwrap();
        assert_eq!(w.kind, WindowKind::Hamming);
        assert_eq!(w.shape, None);
        assert!("hamming:3".parse::<WindowSpec>().is_err());
        assert!("triangle".parse::<WindowSpec>().is_err());
        assert_eq!(WindowSpec::kaiser(8.6).to_string(), "kaiser(8.6)");
    }

    #[test]
    fn test_cutoff_parse() {
        assert_eq!("10000".parse::<Cutoff>().unwrap(), Cutoff::Single(10000.0));
        assert_eq!(
            "300, 3400".parse::<Cutoff>().unwrap(),
            Cutoff::pair(300.0, 3400.0)
        );
        assert!("300,abc".parse::<Cutoff>().is_err());
    }

    #[test]
    fn test_transition_policy() {
        let policy = TransitionPolicy::conservative();
        assert_eq!(policy.width_for(1000.0), 300.0);
        assert_eq!(policy.width_for(20000.0), 2500.0);

        let policy = TransitionPolicy::narrow();
        assert_eq!(policy.width_for(1000.0), 100.0);
        assert_eq!(policy.width_for(20000.0), 500.0);

        let bad = TransitionPolicy {
            max_hz: 100.0,
            fraction: 0.0,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = FirStreamConfig::default();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.upsampled_rate(), 88200);
        assert_eq!(config.audio.upsampled_block_size(), 2048);
        assert_eq!(config.filter.num_taps, 401);
        assert_eq!(config.filter.method, DesignMethod::Equiripple);
        assert_eq!(config.dither.bit_depth, Some(24));
        assert!(config.validate().is_ok());

        let budget = config.audio.block_duration();
        assert!((budget.as_secs_f64() - 1024.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn test_toml_partial_config() {
        let config = FirStreamConfig::from_toml_str(
            r#"
            [audio]
            upsample_factor = 3

            [filter]
            family = "bandpass"
            method = "windowed-sinc"
            cutoff = [300.0, 3400.0]
            num_taps = 301
            window = { kind = "hamming" }
            transition = { max_hz = 500.0, fraction = 0.1 }

            [dither]
            bit_depth = 16
            seed = 7

            [stream]
            convolution = "direct"
            degrade = "silence"
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.upsample_factor, 3);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.filter.family, FilterFamily::Bandpass);
        assert_eq!(config.filter.method, DesignMethod::WindowedSinc);
        assert_eq!(config.filter.cutoff.values(), &[300.0, 3400.0]);
        assert_eq!(config.filter.window.kind, WindowKind::Hamming);
        assert_eq!(config.filter.transition, TransitionPolicy::narrow());
        assert_eq!(config.dither.seed, Some(7));
        assert_eq!(config.stream.convolution, ConvolutionMode::Direct);
        assert_eq!(config.stream.degrade, DegradeMode::Silence);
        assert_eq!(config.stream.max_degraded_blocks, 8);
    }

    #[test]
    fn test_toml_single_cutoff() {
        let config = FirStreamConfig::from_toml_str("[filter]\ncutoff = 12000.0\n").unwrap();
        assert_eq!(config.filter.cutoff, Cutoff::Single(12000.0));
    }

    #[test]
    fn test_toml_unknown_family_is_config_error() {
        let err = FirStreamConfig::from_toml_str("[filter]\nfamily = \"comb\"\n").unwrap_err();
        assert!(matches!(err, FirError::Config(_)));
        assert!(err.to_string().contains("comb"));
    }

    #[test]
    fn test_validate_rejects_bad_audio() {
        let mut config = FirStreamConfig::default();
        config.audio.upsample_factor = 0;
        assert!(config.validate().is_err());

        let mut config = FirStreamConfig::default();
        config.dither.bit_depth = Some(0);
        assert!(config.validate().is_err());
    }
}
