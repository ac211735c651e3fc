//! Evolutionary engine for depth-bounded gate circuits.
//!
//! # Overview
//!
//! An experiment runs one or more phases over a population of circuits.
//! Each generation of a phase:
//!
//! - selects parents (`selection`)
//! - recombines them (`crossover`)
//! - mutates offspring with one applicable strategy each (`mutation`, `bandit`)
//! - evaluates new individuals (`fitness`)
//! - shapes fitness for niching (`shaping`)
//! - selects survivors, optionally by Pareto rank (`selection`, `nsga2`)
//!
//! Low structural diversity triggers injection of fresh random circuits.
//! Phase results can be checkpointed to disk and reused (`checkpoint`).
//!
//! # Example
//!
//! ```rust,no_run
//! use circuit_evolution::evolution::ExperimentRunner;
//! use circuit_evolution::schema::ExperimentFile;
//!
//! let mut file = ExperimentFile::default();
//! file.evolution.random_seed = Some(42);
//!
//! let runner = ExperimentRunner::from_file(file).unwrap();
//! let result = runner.run().unwrap();
//! println!("Best fitness: {:.3}", result.best_fitness());
//! ```

mod bandit;
mod checkpoint;
mod crossover;
mod error;
mod factory;
mod fitness;
mod mutation;
mod nsga2;
mod observer;
mod optimizer;
mod population;
mod rates;
mod rng;
mod runner;
mod selection;
mod shaping;

pub use bandit::*;
pub use checkpoint::*;
pub use crossover::*;
pub use error::*;
pub use factory::*;
pub use fitness::*;
pub use mutation::*;
pub use nsga2::*;
pub use observer::*;
pub use optimizer::*;
pub use population::*;
pub use rates::*;
pub use rng::*;
pub use runner::*;
pub use selection::*;
pub use shaping::*;
