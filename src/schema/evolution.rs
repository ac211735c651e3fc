//! Progress and result types produced by an evolutionary run.

use serde::{Deserialize, Serialize};

use super::Circuit;

/// Summary statistics of one generation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationStats {
    /// Generation index within the phase.
    pub generation: usize,
    /// Highest fitness in the population.
    pub best_fitness: f64,
    /// Fidelity of the fittest individual.
    pub best_fidelity: f64,
    /// Mean fitness.
    pub avg_fitness: f64,
    /// Population standard deviation of fitness.
    pub fitness_std: f64,
    /// Mean pairwise structural distance.
    pub diversity: f64,
    /// Mean circuit depth.
    pub avg_depth: f64,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Fitness of every individual per generation, sorted descending.
    pub fitness_per_generation: Vec<Vec<f64>>,
    /// Average fitness per generation.
    pub average_fitness_per_generation: Vec<f64>,
    /// Standard deviation per generation.
    pub std_dev_fitness_per_generation: Vec<f64>,
    /// Structural diversity per generation.
    pub structural_diversity_per_generation: Vec<f64>,
}

/// Reason a phase stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Ran the configured number of generations.
    MaxGenerations,
    /// The fittest individual reached the fidelity threshold.
    TargetReached,
    /// The phase's final population was loaded from a checkpoint.
    CheckpointReused,
    /// Stopped through the cancel handle.
    Cancelled,
}

/// Outcome of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Phase index.
    pub phase: usize,
    /// Generations actually run.
    pub generations: usize,
    /// Fitness evaluations performed.
    pub evaluations: u64,
    /// Best fitness at phase end.
    pub best_fitness: f64,
    /// Fidelity of the best individual at phase end.
    pub best_fidelity: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Final result of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Seed the run was started with.
    pub seed: u64,
    /// Hash of the run configuration.
    pub config_hash: String,
    /// Fittest circuit of the final population.
    pub best: Circuit,
    /// Per-phase outcomes.
    pub phases: Vec<PhaseSummary>,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
}

impl ExperimentResult {
    pub fn best_fitness(&self) -> f64 {
        self.best.fitness
    }

    pub fn best_fidelity(&self) -> f64 {
        self.best.fidelity
    }
}
