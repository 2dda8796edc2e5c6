//! Numeric constants for filter design and streaming
//!
//! These constants define the fixed parts of the band-edge policy and the
//! sizing rules used when preallocating real-time buffers.

/// Relative weight of the band the policy table emphasizes.
pub const EMPHASIS_WEIGHT: f64 = 10.0;

/// Relative weight of the band the policy table does not emphasize.
pub const UNIT_WEIGHT: f64 = 1.0;

/// Default iteration bound handed to the equiripple optimizer.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Tap count from which `ConvolutionMode::Auto` switches to FFT convolution.
pub const FFT_CONVOLUTION_MIN_TAPS: usize = 64;

/// Largest output block, as a multiple of the base block size, the session
/// preallocates for. Larger device requests are reported as faults.
pub const MAX_OUTPUT_BLOCK_FACTOR: usize = 2;

/// Transition width cap of the conservative policy in Hz.
pub const CONSERVATIVE_MAX_TRANSITION_HZ: f64 = 2500.0;

/// Transition width fraction of the conservative policy.
pub const CONSERVATIVE_TRANSITION_FRACTION: f64 = 0.3;

/// Transition width cap of the narrow policy in Hz.
pub const NARROW_MAX_TRANSITION_HZ: f64 = 500.0;

/// Transition width fraction of the narrow policy.
pub const NARROW_TRANSITION_FRACTION: f64 = 0.1;

/// Series truncation threshold for the modified Bessel function I0.
pub const BESSEL_EPSILON: f64 = 1e-21;
