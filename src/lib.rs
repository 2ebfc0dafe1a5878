//! o2locktop-verify library - validation and load testing for o2locktop output.
//!
//! This library reads the screen o2locktop prints, checks every frame it
//! draws, and correlates the reported lock acquisitions with load generated
//! on the monitored OCFS2 volume.
//!
//! # Modules
//!
//! - [`classify`] - Line classification
//! - [`stream`] - Line sources over o2locktop's output
//! - [`frame`] - Frame assembly state machine
//! - [`validation`] - Row checks and diagnostics
//! - [`checks`] - Static and dynamic TOTAL checks
//! - [`load`] - Local and remote filesystem load
//! - [`orchestrator`] - The test loop
//!
//! # Example
//!
//! ```no_run
//! use o2locktop_verify::frame::FrameAssembler;
//! use o2locktop_verify::stream::ReaderSource;
//! use o2locktop_verify::validation::ValidationConfig;
//!
//! let assembler = FrameAssembler::new(ValidationConfig::new(10), "7F3A9C5E21B04D6C", 26214400);
//! let mut source = ReaderSource::stdin();
//! let outcome = assembler.capture(&mut source);
//! println!("TOTAL = {:?}", outcome.total());
//! ```

pub mod checks;
pub mod classify;
pub mod config;
pub mod frame;
pub mod load;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod remote;
pub mod stream;
pub mod utils;
pub mod validation;
pub mod volume;

// Re-export for convenience
pub use config::RunConfig;
pub use frame::{Frame, FrameAssembler, FrameOutcome};
pub use orchestrator::{Orchestrator, RunOutcome, RunSummary};
pub use validation::{ValidationConfig, ValidationError, ValidationResult, ValidationWarning};
pub use volume::{SetupError, VolumeInfo};
