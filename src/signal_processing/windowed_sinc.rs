//! Windowed-sinc FIR design.
//!
//! The ideal response is a sum of sinc passbands between consecutive band
//! edges, tapered by a symmetric window and scaled to unit gain at the
//! center of the first passband.

use std::f64::consts::PI;

use crate::config::{WindowKind, WindowSpec};
use crate::constants::BESSEL_EPSILON;
use crate::error::{FirError, Result};

/// Modified Bessel function of the first kind, order 0.
pub fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < BESSEL_EPSILON * sum {
            break;
        }
        k += 1.0;
    }
    sum
}

/// Stopband attenuation in dB a Kaiser design reaches for a given length
/// and transition width (width as a fraction of Nyquist)
pub fn kaiser_attenuation(num_taps: usize, width: f64) -> f64 {
    2.285 * (num_taps as f64 - 1.0) * PI * width + 7.95
}

/// Kaiser β for a target attenuation in dB
pub fn kaiser_beta(attenuation_db: f64) -> f64 {
    if attenuation_db > 50.0 {
        0.1102 * (attenuation_db - 8.7)
    } else if attenuation_db > 21.0 {
        0.5842 * (attenuation_db - 21.0).powf(0.4) + 0.07886 * (attenuation_db - 21.0)
    } else {
        0.0
    }
}

/// Symmetric window of length `len`
pub fn window(kind: WindowKind, beta: f64, len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let m = (len - 1) as f64;
    let i0_beta = bessel_i0(beta);
    (0..len)
        .map(|n| {
            let n = n as f64;
            match kind {
                WindowKind::Rectangular => 1.0,
                WindowKind::Hann => 0.5 - 0.5 * (2.0 * PI * n / m).cos(),
                WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * n / m).cos(),
                WindowKind::Blackman => {
                    0.42 - 0.5 * (2.0 * PI * n / m).cos() + 0.08 * (4.0 * PI * n / m).cos()
                }
                WindowKind::Kaiser => {
                    let x = 2.0 * n / m - 1.0;
                    bessel_i0(beta * (1.0 - x * x).max(0.0).sqrt()) / i0_beta
                }
            }
        })
        .collect()
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Parameters for one windowed-sinc design
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedSincRequest {
    pub num_taps: usize,
    /// One or more increasing cutoff frequencies in Hz
    pub cutoffs: Vec<f64>,
    /// Transition width in Hz; sets the Kaiser β when the window has no shape
    pub transition_hz: Option<f64>,
    pub window: WindowSpec,
    /// Whether the response passes 0 Hz
    pub pass_zero: bool,
    pub sample_rate: f64,
}

/// Design taps for a windowed-sinc request
pub fn firwin(request: &WindowedSincRequest) -> Result<Vec<f64>> {
    let num_taps = request.num_taps;
    if num_taps == 0 {
        return Err(FirError::FilterDesign("num_taps must be positive".into()));
    }
    let nyquist = request.sample_rate / 2.0;
    if request.cutoffs.is_empty() {
        return Err(FirError::FilterDesign("at least one cutoff is required".into()));
    }

    let mut normalized = Vec::with_capacity(request.cutoffs.len() + 2);
    for &hz in &request.cutoffs {
        let c = hz / nyquist;
        if !(c > 0.0 && c < 1.0) {
            return Err(FirError::FilterDesign(format!(
                "cutoff {} Hz outside (0, {}) Hz",
                hz, nyquist
            )));
        }
        if normalized.last().is_some_and(|&prev| prev >= c) {
            return Err(FirError::FilterDesign(
                "cutoffs must be strictly increasing".into(),
            ));
        }
        normalized.push(c);
    }

    let pass_nyquist = (request.cutoffs.len() % 2 == 1) ^ request.pass_zero;
    if pass_nyquist && num_taps.is_multiple_of(2) {
        return Err(FirError::FilterDesign(
            "a response passing Nyquist needs an odd tap count".into(),
        ));
    }

    let beta = match (request.window.kind, request.window.shape) {
        (WindowKind::Kaiser, Some(beta)) => beta,
        (WindowKind::Kaiser, None) => {
            let width = request.transition_hz.ok_or_else(|| {
                FirError::FilterDesign(
                    "Kaiser window without shape needs a transition width".into(),
                )
            })?;
            kaiser_beta(kaiser_attenuation(num_taps, width / nyquist))
        }
        _ => 0.0,
    };

    if request.pass_zero {
        normalized.insert(0, 0.0);
    }
    if pass_nyquist {
        normalized.push(1.0);
    }

    let alpha = 0.5 * (num_taps as f64 - 1.0);
    let offsets: Vec<f64> = (0..num_taps).map(|n| n as f64 - alpha).collect();

    let mut taps = vec![0.0f64; num_taps];
    for band in normalized.chunks_exact(2) {
        let (left, right) = (band[0], band[1]);
        for (tap, &m) in taps.iter_mut().zip(&offsets) {
            *tap += right * sinc(right * m) - left * sinc(left * m);
        }
    }

    let taper = window(request.window.kind, beta, num_taps);
    for (tap, w) in taps.iter_mut().zip(&taper) {
        *tap *= w;
    }

    // Unit gain at DC, at Nyquist, or at the center of the first passband
    let (left, right) = (normalized[0], normalized[1]);
    let scale_frequency = if left == 0.0 {
        0.0
    } else if right == 1.0 {
        1.0
    } else {
        0.5 * (left + right)
    };
    let gain: f64 = taps
        .iter()
        .zip(&offsets)
        .map(|(tap, &m)| tap * (PI * m * scale_frequency).cos())
        .sum();
    for tap in taps.iter_mut() {
        *tap /= gain;
    }

    Ok(taps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn request(cutoffs: Vec<f64>, pass_zero: bool) -> WindowedSincRequest {
        WindowedSincRequest {
            num_taps: 101,
            cutoffs,
            transition_hz: Some(2000.0),
            window: WindowSpec::kaiser(8.0),
            pass_zero,
            sample_rate: 48000.0,
        }
    }

    fn gain_at(taps: &[f64], freq: f64, sample_rate: f64) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (n, tap) in taps.iter().enumerate() {
            let phase = 2.0 * PI * freq * n as f64 / sample_rate;
            re += tap * phase.cos();
            im -= tap * phase.sin();
        }
        (re * re + im * im).sqrt()
    }

    #[test]
    fn test_bessel_i0_values() {
        assert_abs_diff_eq!(bessel_i0(0.0), 1.0);
        assert_abs_diff_eq!(bessel_i0(1.0), 1.2660658777520082, epsilon = 1e-12);
        assert_abs_diff_eq!(bessel_i0(5.0), 27.239871823604442, epsilon = 1e-9);
    }

    #[test]
    fn test_kaiser_beta_regions() {
        assert_eq!(kaiser_beta(10.0), 0.0);
        assert_abs_diff_eq!(kaiser_beta(60.0), 0.1102 * 51.3, epsilon = 1e-12);
        assert!(kaiser_beta(30.0) > 0.0);
    }

    #[test]
    fn test_windows_symmetric_and_peaked() {
        for kind in [
            WindowKind::Rectangular,
            WindowKind::Hann,
            WindowKind::Hamming,
            WindowKind::Blackman,
            WindowKind::Kaiser,
        ] {
            let w = window(kind, 10.0, 51);
            assert_eq!(w.len(), 51);
            for i in 0..25 {
                assert_abs_diff_eq!(w[i], w[50 - i], epsilon = 1e-12);
            }
            assert_abs_diff_eq!(w[25], 1.0, epsilon = 1e-12);
        }
        assert_eq!(window(WindowKind::Hann, 0.0, 1), vec![1.0]);
    }

    #[test]
    fn test_lowpass_unit_dc_gain() {
        let taps = firwin(&request(vec![6000.0], true)).unwrap();
        assert_eq!(taps.len(), 101);
        assert_abs_diff_eq!(taps.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(gain_at(&taps, 15000.0, 48000.0) < 1e-3);
    }

    #[test]
    fn test_highpass_unit_nyquist_gain() {
        let taps = firwin(&request(vec![6000.0], false)).unwrap();
        let nyquist_gain: f64 = taps
            .iter()
            .enumerate()
            .map(|(n, t)| if n % 2 == 0 { *t } else { -*t })
            .sum();
        assert_abs_diff_eq!(nyquist_gain.abs(), 1.0, epsilon = 1e-12);
        assert!(gain_at(&taps, 0.0, 48000.0) < 1e-3);
    }

    #[test]
    fn test_bandpass_pair() {
        let taps = firwin(&request(vec![4000.0, 10000.0], false)).unwrap();
        assert_abs_diff_eq!(gain_at(&taps, 7000.0, 48000.0), 1.0, epsilon = 1e-3);
        assert!(gain_at(&taps, 0.0, 48000.0) < 1e-3);
        assert!(gain_at(&taps, 20000.0, 48000.0) < 1e-3);
    }

    #[test]
    fn test_taps_are_symmetric() {
        let taps = firwin(&request(vec![4000.0, 10000.0], true)).unwrap();
        for i in 0..50 {
            assert_abs_diff_eq!(taps[i], taps[100 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_kaiser_beta_from_transition() {
        let mut req = request(vec![6000.0], true);
        req.window = WindowSpec::new(WindowKind::Kaiser);
        let derived = firwin(&req).unwrap();

        let atten = kaiser_attenuation(101, 2000.0 / 24000.0);
        req.window = WindowSpec::kaiser(kaiser_beta(atten));
        let explicit = firwin(&req).unwrap();
        assert_eq!(derived, explicit);

        req.window = WindowSpec::new(WindowKind::Kaiser);
        req.transition_hz = None;
        assert!(firwin(&req).is_err());
    }

    #[test]
    fn test_invalid_requests() {
        assert!(firwin(&request(vec![30000.0], true)).is_err());
        assert!(firwin(&request(vec![], true)).is_err());
        assert!(firwin(&request(vec![8000.0, 4000.0], false)).is_err());

        let mut even = request(vec![6000.0], false);
        even.num_taps = 100;
        assert!(firwin(&even).is_err());
    }
}
