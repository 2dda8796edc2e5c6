pub mod buffer;
pub mod duplex;
pub mod resample;
pub mod source;

pub use buffer::{ChannelRingBuffer, UpdateOutcome};
pub use duplex::{DuplexStream, StatusSnapshot, StreamEvent};
pub use resample::{Passthrough, RubatoConverter, SampleRateConverter, create_converter};
pub use source::WavFileSource;
