use std::f64::consts::PI;

use num_complex::Complex64;
use serde::Serialize;

use crate::signal_processing::FilterCoefficients;
use crate::signal_processing::filter_spec::FilterSpec;

/// Magnitude floor used when converting to decibels
const MIN_MAGNITUDE: f64 = 1e-12;

pub fn linear_to_db(magnitude: f64) -> f64 {
    20.0 * magnitude.max(MIN_MAGNITUDE).log10()
}

/// Evaluate `H(e^jω) = Σ h[k] e^{-jωk}` at one frequency
pub fn response_at(taps: &[f32], freq_hz: f64, sample_rate: f64) -> Complex64 {
    let omega = 2.0 * PI * freq_hz / sample_rate;
    taps.iter()
        .enumerate()
        .map(|(k, &h)| Complex64::from_polar(h as f64, -omega * k as f64))
        .sum()
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResponsePoint {
    pub freq_hz: f64,
    pub magnitude: f64,
    pub magnitude_db: f64,
    pub phase_rad: f64,
}

/// Extremes of the response over one design band
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BandSummary {
    pub start_hz: f64,
    pub end_hz: f64,
    pub gain: f64,
    pub min_db: f64,
    pub max_db: f64,
}

impl BandSummary {
    pub fn is_passband(&self) -> bool {
        self.gain > 0.5
    }

    /// Peak-to-peak passband ripple in dB
    pub fn ripple_db(&self) -> f64 {
        self.max_db - self.min_db
    }

    /// Worst-case stopband attenuation in dB (positive)
    pub fn attenuation_db(&self) -> f64 {
        -self.max_db
    }
}

/// Frequency response of a set of taps on a uniform grid from 0 Hz to Nyquist
#[derive(Debug, Clone, Serialize)]
pub struct FrequencyResponse {
    pub sample_rate: f64,
    pub points: Vec<ResponsePoint>,
}

impl FrequencyResponse {
    pub fn evaluate(coefficients: &FilterCoefficients, sample_rate: f64, num_points: usize) -> Self {
        let nyquist = sample_rate / 2.0;
        let steps = (num_points.max(2) - 1) as f64;

        let points = (0..num_points.max(2))
            .map(|i| {
                let freq_hz = nyquist * i as f64 / steps;
                let h = response_at(coefficients.taps(), freq_hz, sample_rate);
                let magnitude = h.norm();
                ResponsePoint {
                    freq_hz,
                    magnitude,
                    magnitude_db: linear_to_db(magnitude),
                    phase_rad: h.arg(),
                }
            })
            .collect();

        Self {
            sample_rate,
            points,
        }
    }

    /// Linear magnitude at an arbitrary frequency
    pub fn magnitude_at(coefficients: &FilterCoefficients, freq_hz: f64, sample_rate: f64) -> f64 {
        response_at(coefficients.taps(), freq_hz, sample_rate).norm()
    }

    /// Summarise each band of `spec` over the grid points that fall inside it
    pub fn band_summaries(&self, spec: &FilterSpec) -> Vec<BandSummary> {
        spec.bands()
            .map(|band| {
                let (min_db, max_db) = self
                    .points
                    .iter()
                    .filter(|p| p.freq_hz >= band.start_hz && p.freq_hz <= band.end_hz)
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                        (lo.min(p.magnitude_db), hi.max(p.magnitude_db))
                    });
                BandSummary {
                    start_hz: band.start_hz,
                    end_hz: band.end_hz,
                    gain: band.gain,
                    min_db,
                    max_db,
                }
            })
            .collect()
    }
}
