use crate::config::{Cutoff, DesignMethod, FilterConfig, FilterFamily, TransitionPolicy, WindowSpec};
use crate::constants::{DEFAULT_MAX_ITERATIONS, EMPHASIS_WEIGHT, UNIT_WEIGHT};
use crate::error::{FirError, Result};

/// One segment of the piecewise-constant target response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub start_hz: f64,
    pub end_hz: f64,
    pub gain: f64,
    pub weight: f64,
}

/// Validated description of the filter to design
///
/// Band edges come in pairs, one pair per band; the gaps between pairs are
/// the transition regions. Built only through [`FilterSpecBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    family: FilterFamily,
    method: DesignMethod,
    cutoffs: Vec<f64>,
    transition_hz: f64,
    num_taps: usize,
    sample_rate: f64,
    window: WindowSpec,
    edges: Vec<f64>,
    gains: Vec<f64>,
    weights: Vec<f64>,
    max_iterations: usize,
}

impl FilterSpec {
    pub fn family(&self) -> FilterFamily {
        self.family
    }

    pub fn method(&self) -> DesignMethod {
        self.method
    }

    pub fn cutoffs(&self) -> &[f64] {
        &self.cutoffs
    }

    pub fn transition_hz(&self) -> f64 {
        self.transition_hz
    }

    pub fn num_taps(&self) -> usize {
        self.num_taps
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn window(&self) -> WindowSpec {
        self.window
    }

    /// Band edges in Hz, strictly increasing from 0 to Nyquist
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Desired gain per band
    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    /// Relative error weight per band
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        self.edges
            .chunks_exact(2)
            .zip(self.gains.iter().zip(&self.weights))
            .map(|(edge, (&gain, &weight))| Band {
                start_hz: edge[0],
                end_hz: edge[1],
                gain,
                weight,
            })
    }

    /// Single cutoff used by the windowed-sinc fallback: the cutoff itself,
    /// or the midpoint of the pair for banded families
    pub fn effective_cutoff(&self) -> f64 {
        match self.cutoffs.as_slice() {
            [f1, f2] => (f1 + f2) / 2.0,
            [fc] => *fc,
            _ => unreachable!("cutoff arity is validated by the builder"),
        }
    }
}

/// Builds a [`FilterSpec`] from user parameters, applying the band-edge
/// policy table:
///
/// | family   | edges                     | gains   | weights  |
/// |----------|---------------------------|---------|----------|
/// | lowpass  | 0, fc, fc+t, nyq          | 1 0     | 1 10     |
/// | highpass | 0, fc-t, fc, nyq          | 0 1     | 10 1     |
/// | bandpass | 0, f1-t, f1, f2, f2+t, nyq | 0 1 0   | 1 10 1   |
/// | bandstop | 0, f1-t, f1, f2, f2+t, nyq | 1 0 1   | 10 1 10  |
#[derive(Debug, Clone)]
pub struct FilterSpecBuilder {
    family: FilterFamily,
    sample_rate: f64,
    cutoffs: Vec<f64>,
    num_taps: usize,
    window: WindowSpec,
    transition: TransitionPolicy,
    method: DesignMethod,
    weight_override: Option<Vec<f64>>,
    max_iterations: usize,
}

impl FilterSpecBuilder {
    pub fn new(family: FilterFamily, sample_rate: f64) -> Self {
        Self {
            family,
            sample_rate,
            cutoffs: Vec::new(),
            num_taps: 401,
            window: WindowSpec::default(),
            transition: TransitionPolicy::default(),
            method: DesignMethod::Equiripple,
            weight_override: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Builder pre-populated from a [`FilterConfig`]; `sample_rate` is the
    /// rate the filter runs at (the upsampled rate)
    pub fn from_config(config: &FilterConfig, sample_rate: f64) -> Self {
        Self::new(config.family, sample_rate)
            .cutoff(&config.cutoff)
            .num_taps(config.num_taps)
            .window(config.window)
            .transition(config.transition)
            .method(config.method)
            .weight_override(config.weight_override.clone())
            .max_iterations(config.max_iterations)
    }

    pub fn cutoff(mut self, cutoff: &Cutoff) -> Self {
        self.cutoffs = cutoff.values().to_vec();
        self
    }

    pub fn cutoff_hz(mut self, hz: &[f64]) -> Self {
        self.cutoffs = hz.to_vec();
        self
    }

    pub fn num_taps(mut self, num_taps: usize) -> Self {
        self.num_taps = num_taps;
        self
    }

    pub fn window(mut self, window: WindowSpec) -> Self {
        self.window = window;
        self
    }

    pub fn transition(mut self, transition: TransitionPolicy) -> Self {
        self.transition = transition;
        self
    }

    pub fn method(mut self, method: DesignMethod) -> Self {
        self.method = method;
        self
    }

    pub fn weight_override(mut self, weights: Option<Vec<f64>>) -> Self {
        self.weight_override = weights;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn build(self) -> Result<FilterSpec> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(FirError::Config(format!(
                "Sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.num_taps == 0 || self.num_taps.is_multiple_of(2) {
            return Err(FirError::Config(format!(
                "Tap count must be odd and positive, got {}",
                self.num_taps
            )));
        }
        if self.max_iterations == 0 {
            return Err(FirError::Config("max_iterations must be positive".into()));
        }
        self.transition.validate()?;
        if let WindowSpec {
            shape: Some(shape), ..
        } = self.window
            && !(shape.is_finite() && shape >= 0.0)
        {
            return Err(FirError::Config(format!(
                "Window shape must be non-negative, got {}",
                shape
            )));
        }

        let nyquist = self.sample_rate / 2.0;
        self.validate_cutoffs(nyquist)?;

        let transition_hz = self.transition_width(nyquist);
        let (edges, gains, weights) = self.policy(nyquist, transition_hz);

        if !edges.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(FirError::Config(format!(
                "Band edges are not strictly increasing: {:?}",
                edges
            )));
        }

        let weights = match self.weight_override {
            Some(custom) => {
                if custom.len() != gains.len() {
                    return Err(FirError::Config(format!(
                        "{} filter has {} bands, weight override has {} entries",
                        self.family,
                        gains.len(),
                        custom.len()
                    )));
                }
                if custom.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
                    return Err(FirError::Config(format!(
                        "Band weights must be positive, got {:?}",
                        custom
                    )));
                }
                custom
            }
            None => weights,
        };

        log::debug!(
            "{} spec: edges={:?} gains={:?} weights={:?} transition={:.1} Hz",
            self.family,
            edges,
            gains,
            weights,
            transition_hz
        );

        Ok(FilterSpec {
            family: self.family,
            method: self.method,
            cutoffs: self.cutoffs,
            transition_hz,
            num_taps: self.num_taps,
            sample_rate: self.sample_rate,
            window: self.window,
            edges,
            gains,
            weights,
            max_iterations: self.max_iterations,
        })
    }

    fn validate_cutoffs(&self, nyquist: f64) -> Result<()> {
        let expected = self.family.cutoff_count();
        if self.cutoffs.len() != expected {
            return Err(FirError::Config(format!(
                "{} filter requires exactly {} cutoff frequenc{}, got {}",
                self.family,
                expected,
                if expected == 1 { "y" } else { "ies" },
                self.cutoffs.len()
            )));
        }
        for &hz in &self.cutoffs {
            if !(hz.is_finite() && hz > 0.0 && hz < nyquist) {
                return Err(FirError::Config(format!(
                    "Cutoff {} Hz must lie strictly between 0 and Nyquist ({} Hz)",
                    hz, nyquist
                )));
            }
        }
        if let [f1, f2] = self.cutoffs.as_slice()
            && f1 >= f2
        {
            return Err(FirError::Config(format!(
                "Cutoff pair must be increasing, got {} >= {}",
                f1, f2
            )));
        }
        Ok(())
    }

    /// Policy width, unless it would reach 0 Hz, Nyquist or the other side
    /// of a cutoff; then half the headroom to the nearest boundary
    fn transition_width(&self, nyquist: f64) -> f64 {
        let (basis, headroom) = match (self.family, self.cutoffs.as_slice()) {
            (FilterFamily::Lowpass, [fc]) => (*fc, nyquist - fc),
            (FilterFamily::Highpass, [fc]) => (*fc, *fc),
            (_, [f1, f2]) => (f2 - f1, f1.min(nyquist - f2)),
            _ => unreachable!("cutoff arity is validated before the transition width"),
        };

        let width = self.transition.width_for(basis);
        if width >= headroom {
            let limit = headroom / 2.0;
            log::debug!(
                "Clamping transition width from {:.1} Hz to {:.1} Hz",
                width,
                limit
            );
            limit
        } else {
            width
        }
    }

    fn policy(&self, nyquist: f64, t: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        match (self.family, self.cutoffs.as_slice()) {
            (FilterFamily::Lowpass, [fc]) => (
                vec![0.0, *fc, fc + t, nyquist],
                vec![1.0, 0.0],
                vec![UNIT_WEIGHT, EMPHASIS_WEIGHT],
            ),
            (FilterFamily::Highpass, [fc]) => (
                vec![0.0, fc - t, *fc, nyquist],
                vec![0.0, 1.0],
                vec![EMPHASIS_WEIGHT, UNIT_WEIGHT],
            ),
            (FilterFamily::Bandpass, [f1, f2]) => (
                vec![0.0, f1 - t, *f1, *f2, f2 + t, nyquist],
                vec![0.0, 1.0, 0.0],
                vec![UNIT_WEIGHT, EMPHASIS_WEIGHT, UNIT_WEIGHT],
            ),
            (FilterFamily::Bandstop, [f1, f2]) => (
                vec![0.0, f1 - t, *f1, *f2, f2 + t, nyquist],
                vec![1.0, 0.0, 1.0],
                vec![EMPHASIS_WEIGHT, UNIT_WEIGHT, EMPHASIS_WEIGHT],
            ),
            _ => unreachable!("cutoff arity is validated before the policy table"),
        }
    }
}
