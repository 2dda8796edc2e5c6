#![allow(dead_code)]

pub mod generate;

pub use generate::{channel, dc, mean, ramp, rms, sine};
