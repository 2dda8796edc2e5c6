pub mod audio;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod processing;
pub mod session;
pub mod signal_processing;
pub mod wav;

pub use config::FirStreamConfig;
pub use error::{FirError, Result, StreamFault};
pub use processing::{BlockStatus, StreamOrchestrator, StreamState};
pub use session::{StreamSession, design_filter};
pub use wav::save_wav;
