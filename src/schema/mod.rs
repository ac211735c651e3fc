//! Schema module - Genome, configuration and result types.

mod circuit;
mod config;
mod evolution;

pub use circuit::*;
pub use config::*;
pub use evolution::*;
