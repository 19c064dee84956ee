//! Library interface for the bottler.
//!
//! The binary is a thin wrapper around [`pipeline::run`]; the modules are
//! exposed for testing and for embedding the individual steps.

pub mod bottle_block;
pub mod brew;
pub mod build;
pub mod checksums;
pub mod config;
pub mod error;
pub mod formula;
pub mod naming;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod upload;

// Re-export commonly used items
pub use bottle_block::replace_bottle_block;
pub use error::{BottleError, Result};
pub use report::{BottleReport, Status};
