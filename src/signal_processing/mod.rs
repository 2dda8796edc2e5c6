pub mod convolution;
pub mod decimator;
pub mod dither;
pub mod filter_spec;
pub mod fir_core;
pub mod fir_design;
pub mod response;
pub mod windowed_sinc;

pub use convolution::ConvolutionEngine;
pub use decimator::Decimator;
pub use dither::Ditherer;
pub use filter_spec::{Band, FilterSpec, FilterSpecBuilder};
pub use fir_core::FilterCoefficients;
pub use fir_design::{DesignFailure, DesignOutcome, FilterDesigner};
pub use response::FrequencyResponse;
