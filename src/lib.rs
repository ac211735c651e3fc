//! Circuit Evolution - Evolutionary synthesis of depth-bounded gate circuits.
//!
//! This crate evolves populations of layered gate circuits towards a fitness
//! objective supplied by the caller. Genomes are columns of non-overlapping
//! gates; structural similarity is measured on gene fingerprints.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Genome, configuration and result types
//! - `evolution`: Operators, the generational optimizer and the experiment runner
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use circuit_evolution::{
//!     evolution::{ExperimentRunner, StructuralTargetEvaluator, target_circuit},
//!     schema::{EvolutionConfig, TargetConfig},
//! };
//!
//! let config = EvolutionConfig::default();
//! let target = target_circuit(&TargetConfig::default(), &config.circuit).unwrap();
//! let evaluator = Arc::new(StructuralTargetEvaluator::new(&target));
//!
//! let runner = ExperimentRunner::new(config, evaluator).unwrap();
//! let result = runner.run().unwrap();
//!
//! println!("Best fidelity: {:.4}", result.best_fidelity());
//! ```

pub mod evolution;
pub mod schema;

// Re-export commonly used types
pub use evolution::{EvolutionError, ExperimentRunner, FitnessEvaluator, Population};
pub use schema::{Circuit, EvolutionConfig, ExperimentResult};
