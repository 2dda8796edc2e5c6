use pm_remez::{BandSetting, ParametersBuilder, constant, pm_parameters, pm_remez};
use thiserror::Error;

use crate::config::DesignMethod;
use crate::error::{FirError, Result};
use crate::signal_processing::FilterCoefficients;
use crate::signal_processing::filter_spec::FilterSpec;
use crate::signal_processing::windowed_sinc::{WindowedSincRequest, firwin};

/// Recoverable failure of the equiripple optimizer
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct DesignFailure {
    pub reason: String,
}

impl DesignFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Input to an equiripple design: band edges in Hz (one pair per band),
/// per-band desired gain and weight
#[derive(Debug, Clone, PartialEq)]
pub struct EquirippleRequest {
    pub num_taps: usize,
    pub edges: Vec<f64>,
    pub gains: Vec<f64>,
    pub weights: Vec<f64>,
    pub sample_rate: f64,
    pub max_iterations: usize,
}

impl EquirippleRequest {
    pub fn from_spec(spec: &FilterSpec) -> Self {
        Self {
            num_taps: spec.num_taps(),
            edges: spec.edges().to_vec(),
            gains: spec.gains().to_vec(),
            weights: spec.weights().to_vec(),
            sample_rate: spec.sample_rate(),
            max_iterations: spec.max_iterations(),
        }
    }
}

/// Equiripple (minimax) coefficient design
pub trait EquirippleDesigner {
    fn design(&self, request: &EquirippleRequest) -> std::result::Result<Vec<f64>, DesignFailure>;
}

/// Windowed-sinc coefficient design
pub trait WindowedSincDesigner {
    fn design(&self, request: &WindowedSincRequest) -> Result<Vec<f64>>;
}

/// Parks-McClellan design through `pm-remez`
#[derive(Debug, Clone, Copy, Default)]
pub struct PmRemezDesigner;

impl EquirippleDesigner for PmRemezDesigner {
    fn design(&self, request: &EquirippleRequest) -> std::result::Result<Vec<f64>, DesignFailure> {
        let normalize = |hz: f64| hz / request.sample_rate;

        let bands = request
            .edges
            .chunks_exact(2)
            .zip(request.gains.iter().zip(&request.weights))
            .map(|(edge, (&gain, &weight))| {
                BandSetting::with_weight(
                    normalize(edge[0]),
                    normalize(edge[1]),
                    constant(gain),
                    constant(weight),
                )
                .map_err(|e| {
                    DesignFailure::new(format!(
                        "Band {:.1}-{:.1} Hz: {:?}",
                        edge[0], edge[1], e
                    ))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut params = pm_parameters(request.num_taps, bands.as_slice())
            .map_err(|e| DesignFailure::new(format!("PM parameters: {:?}", e)))?;
        params.set_max_iterations(request.max_iterations);

        let design =
            pm_remez(&params).map_err(|e| DesignFailure::new(format!("PM Remez: {:?}", e)))?;

        Ok(design.impulse_response)
    }
}

/// In-crate windowed-sinc design
#[derive(Debug, Clone, Copy, Default)]
pub struct FirwinDesigner;

impl WindowedSincDesigner for FirwinDesigner {
    fn design(&self, request: &WindowedSincRequest) -> Result<Vec<f64>> {
        firwin(request)
    }
}

/// Coefficients plus how they were obtained
#[derive(Debug, Clone)]
pub struct DesignOutcome {
    pub coefficients: FilterCoefficients,
    /// Method that produced the coefficients
    pub method: DesignMethod,
    /// Set when the equiripple design failed and the fallback ran
    pub fallback: Option<DesignFailure>,
}

impl DesignOutcome {
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Windowed-sinc request for a direct windowed-sinc design: all cutoffs
pub fn windowed_sinc_request(spec: &FilterSpec) -> WindowedSincRequest {
    WindowedSincRequest {
        num_taps: spec.num_taps(),
        cutoffs: spec.cutoffs().to_vec(),
        transition_hz: Some(spec.transition_hz()),
        window: spec.window(),
        pass_zero: spec.family().passes_dc(),
        sample_rate: spec.sample_rate(),
    }
}

/// Windowed-sinc request used after an equiripple failure: one effective cutoff
pub fn fallback_request(spec: &FilterSpec) -> WindowedSincRequest {
    WindowedSincRequest {
        cutoffs: vec![spec.effective_cutoff()],
        ..windowed_sinc_request(spec)
    }
}

/// Designs coefficients for a [`FilterSpec`], falling back from equiripple
/// to windowed sinc when the optimizer fails
pub struct FilterDesigner<E = PmRemezDesigner, W = FirwinDesigner> {
    equiripple: E,
    windowed_sinc: W,
}

impl FilterDesigner {
    pub fn new() -> Self {
        Self::with_backends(PmRemezDesigner, FirwinDesigner)
    }
}

impl Default for FilterDesigner {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EquirippleDesigner, W: WindowedSincDesigner> FilterDesigner<E, W> {
    pub fn with_backends(equiripple: E, windowed_sinc: W) -> Self {
        Self {
            equiripple,
            windowed_sinc,
        }
    }

    pub fn design(&self, spec: &FilterSpec) -> Result<DesignOutcome> {
        match spec.method() {
            DesignMethod::Equiripple => {
                let request = EquirippleRequest::from_spec(spec);
                let attempt = self
                    .equiripple
                    .design(&request)
                    .and_then(|taps| check_taps(taps, spec.num_taps()));

                match attempt {
                    Ok(taps) => {
                        log::info!(
                            "Designed {}-tap equiripple {} filter",
                            spec.num_taps(),
                            spec.family()
                        );
                        Ok(DesignOutcome {
                            coefficients: FilterCoefficients::from_f64(&taps),
                            method: DesignMethod::Equiripple,
                            fallback: None,
                        })
                    }
                    Err(failure) => {
                        log::warn!(
                            "Equiripple design failed ({}), falling back to windowed sinc at {:.1} Hz",
                            failure,
                            spec.effective_cutoff()
                        );
                        let taps = self.run_windowed_sinc(&fallback_request(spec), spec)?;
                        Ok(DesignOutcome {
                            coefficients: FilterCoefficients::from_f64(&taps),
                            method: DesignMethod::WindowedSinc,
                            fallback: Some(failure),
                        })
                    }
                }
            }
            DesignMethod::WindowedSinc => {
                let taps = self.run_windowed_sinc(&windowed_sinc_request(spec), spec)?;
                log::info!(
                    "Designed {}-tap windowed-sinc {} filter ({})",
                    spec.num_taps(),
                    spec.family(),
                    spec.window()
                );
                Ok(DesignOutcome {
                    coefficients: FilterCoefficients::from_f64(&taps),
                    method: DesignMethod::WindowedSinc,
                    fallback: None,
                })
            }
        }
    }

    fn run_windowed_sinc(
        &self,
        request: &WindowedSincRequest,
        spec: &FilterSpec,
    ) -> Result<Vec<f64>> {
        let taps = self.windowed_sinc.design(request)?;
        check_taps(taps, spec.num_taps()).map_err(|e| FirError::FilterDesign(e.reason))
    }
}

fn check_taps(taps: Vec<f64>, expected: usize) -> std::result::Result<Vec<f64>, DesignFailure> {
    if taps.len() != expected {
        return Err(DesignFailure::new(format!(
            "expected {} taps, got {}",
            expected,
            taps.len()
        )));
    }
    if taps.iter().any(|t| !t.is_finite()) {
        return Err(DesignFailure::new("non-finite coefficient"));
    }
    Ok(taps)
}
