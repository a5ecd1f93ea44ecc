//! Configuration and dependency initialization for the log storage pipeline.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, Settings};
