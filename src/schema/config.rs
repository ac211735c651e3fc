//! Configuration types for evolutionary circuit synthesis.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Top-level configuration for one experiment (one seed, one or more phases).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Circuit shape constraints.
    pub circuit: CircuitConfig,
    /// Population and selection settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Crossover and mutation probabilities.
    #[serde(default)]
    pub rates: RateConfig,
    /// Niching (fitness sharing) parameters.
    #[serde(default)]
    pub sharing: SharingConfig,
    /// Initial state for self-adaptive parameter mutation.
    #[serde(default)]
    pub step_size: StepSizeConfig,
    /// Phases run sequentially.
    pub phases: Vec<PhaseConfig>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Evaluate unevaluated individuals on the rayon pool.
    #[serde(default)]
    pub parallel_evaluation: bool,
    /// Directory for phase checkpoints. No checkpoints when unset.
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
    /// Directory for per-phase progress files. Nothing written when unset.
    #[serde(default)]
    pub results_dir: Option<PathBuf>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitConfig::default(),
            population: PopulationConfig::default(),
            rates: RateConfig::default(),
            sharing: SharingConfig::default(),
            step_size: StepSizeConfig::default(),
            phases: vec![PhaseConfig::default()],
            random_seed: None,
            parallel_evaluation: false,
            checkpoint_dir: None,
            results_dir: None,
        }
    }
}

/// Circuit shape constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Number of qubits.
    pub qubit_count: usize,
    /// Minimum depth of randomly generated circuits.
    #[serde(default = "default_min_depth")]
    pub min_depth: usize,
    /// Maximum depth of any circuit.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Restrict the gate catalog to these operations.
    #[serde(default)]
    pub allowed_gates: Option<Vec<String>>,
    /// Fill qubits left free in a new column with identity gates.
    #[serde(default)]
    pub pad_with_identity: bool,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            qubit_count: 4,
            min_depth: default_min_depth(),
            max_depth: default_max_depth(),
            allowed_gates: None,
            pad_with_identity: false,
        }
    }
}

fn default_min_depth() -> usize {
    2
}
fn default_max_depth() -> usize {
    15
}

/// Population and selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals kept after survivor selection.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Individuals kept unconditionally (by fidelity) each generation.
    #[serde(default = "default_elitism")]
    pub elitism_count: usize,
    /// Contestants per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Diversity below which fresh individuals are injected.
    #[serde(default = "default_diversity_threshold")]
    pub diversity_threshold: f64,
    /// Fraction of the population replaced on injection.
    #[serde(default = "default_injection_rate")]
    pub injection_rate: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            elitism_count: default_elitism(),
            tournament_size: default_tournament_size(),
            diversity_threshold: default_diversity_threshold(),
            injection_rate: default_injection_rate(),
        }
    }
}

fn default_population_size() -> usize {
    100
}
fn default_elitism() -> usize {
    5
}
fn default_tournament_size() -> usize {
    3
}
fn default_diversity_threshold() -> f64 {
    0.1
}
fn default_injection_rate() -> f64 {
    0.5
}

/// Variation probabilities.
///
/// `crossover_rate`/`mutation_rate` are used by fixed-rate phases; the bounds
/// by diversity-adaptive phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_min_mutation_rate")]
    pub min_mutation_rate: f64,
    #[serde(default = "default_max_mutation_rate")]
    pub max_mutation_rate: f64,
    #[serde(default = "default_min_crossover_rate")]
    pub min_crossover_rate: f64,
    #[serde(default = "default_max_crossover_rate")]
    pub max_crossover_rate: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            min_mutation_rate: default_min_mutation_rate(),
            max_mutation_rate: default_max_mutation_rate(),
            min_crossover_rate: default_min_crossover_rate(),
            max_crossover_rate: default_max_crossover_rate(),
        }
    }
}

fn default_crossover_rate() -> f64 {
    0.6
}
fn default_mutation_rate() -> f64 {
    0.3
}
fn default_min_mutation_rate() -> f64 {
    0.05
}
fn default_max_mutation_rate() -> f64 {
    0.5
}
fn default_min_crossover_rate() -> f64 {
    0.5
}
fn default_max_crossover_rate() -> f64 {
    0.9
}

/// Fitness sharing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Niche radius: distances below it share fitness.
    #[serde(default = "default_sharing_radius")]
    pub radius: f64,
    /// Shape exponent of the sharing function.
    #[serde(default = "default_sharing_alpha")]
    pub alpha: f64,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            radius: default_sharing_radius(),
            alpha: default_sharing_alpha(),
        }
    }
}

fn default_sharing_radius() -> f64 {
    0.3
}
fn default_sharing_alpha() -> f64 {
    1.0
}

/// Initial state of every new [`StepSize`](super::StepSize).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSizeConfig {
    #[serde(default = "default_initial_sigma")]
    pub initial_sigma: f64,
    #[serde(default = "default_c_factor")]
    pub c: f64,
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for StepSizeConfig {
    fn default() -> Self {
        Self {
            initial_sigma: default_initial_sigma(),
            c: default_c_factor(),
            window: default_window(),
        }
    }
}

fn default_initial_sigma() -> f64 {
    0.5
}
fn default_c_factor() -> f64 {
    0.9
}
fn default_window() -> usize {
    5
}

/// Parent selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSelectionKind {
    #[default]
    Tournament,
    Random,
    Roulette,
}

/// Survivor selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorSelectionKind {
    #[default]
    Tournament,
    Nsga2,
    Random,
    Roulette,
}

/// Crossover operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverKind {
    #[default]
    MultiPoint,
    SinglePoint,
    Blockwise,
}

/// Settings for one phase of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Generations to run.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Stop early once the fittest individual reaches this fidelity.
    #[serde(default)]
    pub fidelity_threshold_stop: Option<f64>,
    /// Give new gates self-adaptive step sizes.
    #[serde(default)]
    pub use_step_size: bool,
    /// Derive rates from diversity instead of using fixed rates.
    #[serde(default)]
    pub use_adaptive_rates: bool,
    /// Pick mutation operators with UCB1 instead of uniformly.
    #[serde(default)]
    pub use_bandit_mutation: bool,
    /// Apply niching to fitness after evaluation.
    #[serde(default)]
    pub use_fitness_sharing: bool,
    #[serde(default)]
    pub parent_selection: ParentSelectionKind,
    #[serde(default)]
    pub survivor_selection: SurvivorSelectionKind,
    #[serde(default)]
    pub crossover_strategy: CrossoverKind,
    /// Start from the previous phase's final population.
    #[serde(default)]
    pub resume_from_checkpoint: bool,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            generations: default_generations(),
            fidelity_threshold_stop: None,
            use_step_size: false,
            use_adaptive_rates: false,
            use_bandit_mutation: false,
            use_fitness_sharing: false,
            parent_selection: ParentSelectionKind::default(),
            survivor_selection: SurvivorSelectionKind::default(),
            crossover_strategy: CrossoverKind::default(),
            resume_from_checkpoint: false,
        }
    }
}

fn default_generations() -> usize {
    100
}

/// Target circuit for the built-in structural evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Seed used to generate the target circuit.
    pub seed: u64,
    /// Depth of the generated target.
    pub depth: usize,
    /// Weight of the depth penalty in the shaped fitness.
    #[serde(default)]
    pub depth_weight: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            seed: 10_000,
            depth: 8,
            depth_weight: 0.0,
        }
    }
}

/// Experiment file read by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentFile {
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub target: TargetConfig,
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Qubit count must be non-zero")]
    NoQubits,
    #[error("Invalid depth bounds: min {min}, max {max}")]
    InvalidDepth { min: usize, max: usize },
    #[error("Elitism count {elitism} exceeds population size {size}")]
    ElitismTooLarge { elitism: usize, size: usize },
    #[error("Tournament size must be non-zero")]
    EmptyTournament,
    #[error("{name} must lie in [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
    #[error("Invalid rate bounds for {name}: min {min} > max {max}")]
    InvalidRateBounds {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("Step size factor c must lie in (0, 1), got {0}")]
    InvalidStepFactor(f64),
    #[error("Step size window must be non-zero")]
    EmptyWindow,
    #[error("Sharing radius must be positive, got {0}")]
    InvalidSharingRadius(f64),
    #[error("At least one phase is required")]
    NoPhases,
}

impl EvolutionConfig {
    /// Validate configuration. Nothing is clamped silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.circuit.qubit_count == 0 {
            return Err(ConfigError::NoQubits);
        }
        if self.circuit.min_depth == 0 || self.circuit.min_depth > self.circuit.max_depth {
            return Err(ConfigError::InvalidDepth {
                min: self.circuit.min_depth,
                max: self.circuit.max_depth,
            });
        }
        if self.population.elitism_count > self.population.size {
            return Err(ConfigError::ElitismTooLarge {
                elitism: self.population.elitism_count,
                size: self.population.size,
            });
        }
        if self.population.tournament_size == 0 {
            return Err(ConfigError::EmptyTournament);
        }

        let check_unit = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::RateOutOfRange { name, value })
            }
        };
        check_unit(self.rates.crossover_rate, "crossover_rate")?;
        check_unit(self.rates.mutation_rate, "mutation_rate")?;
        check_unit(self.rates.min_mutation_rate, "min_mutation_rate")?;
        check_unit(self.rates.max_mutation_rate, "max_mutation_rate")?;
        check_unit(self.rates.min_crossover_rate, "min_crossover_rate")?;
        check_unit(self.rates.max_crossover_rate, "max_crossover_rate")?;
        check_unit(self.population.injection_rate, "injection_rate")?;

        let check_bounds = |min: f64, max: f64, name: &'static str| {
            if min > max {
                Err(ConfigError::InvalidRateBounds { name, min, max })
            } else {
                Ok(())
            }
        };
        check_bounds(
            self.rates.min_mutation_rate,
            self.rates.max_mutation_rate,
            "mutation_rate",
        )?;
        check_bounds(
            self.rates.min_crossover_rate,
            self.rates.max_crossover_rate,
            "crossover_rate",
        )?;

        if !(self.step_size.c > 0.0 && self.step_size.c < 1.0) {
            return Err(ConfigError::InvalidStepFactor(self.step_size.c));
        }
        if self.step_size.window == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.sharing.radius <= 0.0 {
            return Err(ConfigError::InvalidSharingRadius(self.sharing.radius));
        }
        if self.phases.is_empty() {
            return Err(ConfigError::NoPhases);
        }

        Ok(())
    }

    /// SHA-256 (hex) of the canonical JSON form of the run-defining settings.
    ///
    /// Output directories do not take part in the hash.
    pub fn config_hash(&self) -> String {
        let mut canonical = self.clone();
        canonical.checkpoint_dir = None;
        canonical.results_dir = None;
        hash_json(&canonical)
    }

    /// Key of the checkpoint written at the end of phase `phase`.
    ///
    /// Only phases up to and including `phase` contribute, so editing a later
    /// phase keeps earlier checkpoints reusable.
    pub fn checkpoint_key(&self, phase: usize) -> String {
        let mut prefix = self.clone();
        prefix.phases.truncate(phase + 1);
        prefix.config_hash()
    }
}

fn hash_json<T: Serialize>(value: &T) -> String {
    // Serializing plain data structs cannot fail.
    let json = serde_json::to_vec(value).unwrap_or_default();
    format!("{:x}", Sha256::digest(&json))
}
