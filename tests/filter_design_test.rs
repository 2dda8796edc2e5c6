use approx::assert_abs_diff_eq;

use firstream::config::{DesignMethod, FilterFamily, WindowKind, WindowSpec};
use firstream::signal_processing::fir_design::{
    EquirippleDesigner, EquirippleRequest, FirwinDesigner, fallback_request,
};
use firstream::signal_processing::windowed_sinc::firwin;
use firstream::signal_processing::{
    DesignFailure, FilterDesigner, FilterSpec, FilterSpecBuilder, FrequencyResponse,
};

const RATE: f64 = 88200.0;

/// Optimizer that never converges
struct NonConverging;

impl EquirippleDesigner for NonConverging {
    fn design(&self, request: &EquirippleRequest) -> Result<Vec<f64>, DesignFailure> {
        Err(DesignFailure::new(format!(
            "no convergence after {} iterations",
            request.max_iterations
        )))
    }
}

fn spec(family: FilterFamily, cutoffs: &[f64], num_taps: usize) -> FilterSpec {
    FilterSpecBuilder::new(family, RATE)
        .cutoff_hz(cutoffs)
        .num_taps(num_taps)
        .build()
        .unwrap()
}

fn assert_symmetric(taps: &[f32]) {
    let n = taps.len();
    for i in 0..n / 2 {
        assert_abs_diff_eq!(taps[i], taps[n - 1 - i], epsilon = 1e-6);
    }
}

#[test]
fn test_lowpass_design_length() {
    let spec = spec(FilterFamily::Lowpass, &[12000.0], 301);
    let outcome = FilterDesigner::new().design(&spec).unwrap();
    assert_eq!(outcome.coefficients.len(), 301);
    assert!(outcome.coefficients.taps().iter().all(|t| t.is_finite()));
    assert_symmetric(outcome.coefficients.taps());
}

#[test]
fn test_every_family_yields_requested_length() {
    let cases: [(FilterFamily, &[f64]); 4] = [
        (FilterFamily::Lowpass, &[10000.0]),
        (FilterFamily::Highpass, &[3000.0]),
        (FilterFamily::Bandpass, &[2000.0, 8000.0]),
        (FilterFamily::Bandstop, &[2000.0, 8000.0]),
    ];

    for method in [DesignMethod::Equiripple, DesignMethod::WindowedSinc] {
        for (family, cutoffs) in cases {
            let spec = FilterSpecBuilder::new(family, RATE)
                .cutoff_hz(cutoffs)
                .num_taps(201)
                .method(method)
                .build()
                .unwrap();
            let outcome = FilterDesigner::new().design(&spec).unwrap();
            assert_eq!(
                outcome.coefficients.len(),
                201,
                "{} via {}",
                family,
                method
            );
        }
    }
}

#[test]
fn test_even_tap_count_rejected() {
    let result = FilterSpecBuilder::new(FilterFamily::Lowpass, RATE)
        .cutoff_hz(&[12000.0])
        .num_taps(300)
        .build();
    assert!(result.is_err());
}

#[test]
fn test_cutoff_outside_nyquist_rejected() {
    let result = FilterSpecBuilder::new(FilterFamily::Lowpass, RATE)
        .cutoff_hz(&[RATE / 2.0])
        .build();
    assert!(result.is_err());

    let result = FilterSpecBuilder::new(FilterFamily::Bandpass, RATE)
        .cutoff_hz(&[8000.0, 2000.0])
        .build();
    assert!(result.is_err());
}

#[test]
fn test_equiripple_failure_falls_back_to_windowed_sinc() {
    let spec = spec(FilterFamily::Bandpass, &[2000.0, 8000.0], 301);
    let outcome = FilterDesigner::with_backends(NonConverging, FirwinDesigner)
        .design(&spec)
        .unwrap();

    assert!(outcome.used_fallback());
    assert_eq!(outcome.method, DesignMethod::WindowedSinc);
    assert!(outcome.fallback.unwrap().reason.contains("no convergence"));

    // Fallback uses a single cutoff at the band midpoint
    let expected: Vec<f32> = firwin(&fallback_request(&spec))
        .unwrap()
        .into_iter()
        .map(|t| t as f32)
        .collect();
    assert_eq!(outcome.coefficients.taps(), expected.as_slice());
    assert_eq!(fallback_request(&spec).cutoffs, vec![5000.0]);
}

#[test]
fn test_windowed_sinc_stopband_attenuation() {
    // Kaiser β derived from the transition width
    let spec = FilterSpecBuilder::new(FilterFamily::Lowpass, RATE)
        .cutoff_hz(&[10000.0])
        .num_taps(301)
        .method(DesignMethod::WindowedSinc)
        .window(WindowSpec::new(WindowKind::Kaiser))
        .build()
        .unwrap();
    let outcome = FilterDesigner::new().design(&spec).unwrap();
    assert_abs_diff_eq!(outcome.coefficients.dc_gain(), 1.0, epsilon = 1e-3);

    let response = FrequencyResponse::evaluate(&outcome.coefficients, RATE, 2048);
    let bands = response.band_summaries(&spec);
    let stop = bands.iter().find(|b| !b.is_passband()).unwrap();
    assert!(
        stop.attenuation_db() > 80.0,
        "stopband attenuation {:.1} dB",
        stop.attenuation_db()
    );
}

#[test]
fn test_highpass_blocks_dc() {
    let spec = FilterSpecBuilder::new(FilterFamily::Highpass, RATE)
        .cutoff_hz(&[3000.0])
        .num_taps(301)
        .method(DesignMethod::WindowedSinc)
        .window(WindowSpec::new(WindowKind::Hamming))
        .build()
        .unwrap();
    let outcome = FilterDesigner::new().design(&spec).unwrap();

    assert!(outcome.coefficients.dc_gain().abs() < 1e-2);
    let nyquist_gain = FrequencyResponse::magnitude_at(&outcome.coefficients, RATE / 2.0, RATE);
    assert_abs_diff_eq!(nyquist_gain, 1.0, epsilon = 1e-2);
}
