//! Experiment orchestration: phases, checkpoints and results.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::schema::{
    Circuit, CircuitConfig, EvolutionConfig, ExperimentFile, ExperimentResult, PhaseConfig,
    PhaseSummary, StopReason, TargetConfig,
};

use super::checkpoint::CheckpointStore;
use super::crossover::{CrossoverRunner, crossover_strategy};
use super::error::{EvolutionError, Result};
use super::factory::{CatalogGateFactory, CircuitFactory, GateFactory, RandomCircuitFactory};
use super::fitness::{CountingEvaluator, FitnessEvaluator, StructuralTargetEvaluator};
use super::mutation::{BanditMutation, MutationOperator, RandomMutation, default_strategies};
use super::observer::{JsonProgressObserver, LogObserver, ObserverSet};
use super::optimizer::{Optimizer, OptimizerParts, OptimizerSettings};
use super::population::Population;
use super::rates::rate_adapter;
use super::rng::EvolutionRng;
use super::selection::{parent_selection, survivor_selection};
use super::shaping::{FitnessShaper, NullShaper, SharingShaper};

/// Generate the reference circuit described by `target`.
pub fn target_circuit(target: &TargetConfig, circuit: &CircuitConfig) -> Result<Circuit> {
    let gates = CatalogGateFactory::from_config(circuit, Default::default())?;
    let factory = RandomCircuitFactory::new(Arc::new(gates), false)
        .with_identity_padding(circuit.pad_with_identity);
    let mut rng = EvolutionRng::new(target.seed);
    factory.create_random(circuit.qubit_count, target.depth, target.depth, &mut rng)
}

/// Runs every phase of one configuration with one seed.
pub struct ExperimentRunner {
    config: EvolutionConfig,
    evaluator: Arc<dyn FitnessEvaluator>,
    gate_factory: Arc<dyn GateFactory>,
}

impl ExperimentRunner {
    /// Validates the configuration and builds the catalog gate factory.
    pub fn new(config: EvolutionConfig, evaluator: Arc<dyn FitnessEvaluator>) -> Result<Self> {
        config.validate()?;
        let gate_factory = CatalogGateFactory::from_config(&config.circuit, config.step_size.clone())?;
        Ok(Self {
            config,
            evaluator,
            gate_factory: Arc::new(gate_factory),
        })
    }

    /// Runner scoring against the target described in an experiment file.
    pub fn from_file(file: ExperimentFile) -> Result<Self> {
        let target = target_circuit(&file.target, &file.evolution.circuit)?;
        let evaluator = StructuralTargetEvaluator::new(&target).with_depth_weight(file.target.depth_weight);
        Self::new(file.evolution, Arc::new(evaluator))
    }

    fn circuit_factory(&self, phase: &PhaseConfig) -> Arc<dyn CircuitFactory> {
        Arc::new(
            RandomCircuitFactory::new(self.gate_factory.clone(), phase.use_step_size)
                .with_identity_padding(self.config.circuit.pad_with_identity),
        )
    }

    fn initial_population(
        &self,
        factory: &dyn CircuitFactory,
        rng: &mut EvolutionRng,
    ) -> Result<Population> {
        let circuit = &self.config.circuit;
        (0..self.config.population.size)
            .map(|_| factory.create_random(circuit.qubit_count, circuit.max_depth, circuit.min_depth, rng))
            .collect()
    }

    fn build_optimizer(
        &self,
        index: usize,
        phase: &PhaseConfig,
        seed: u64,
        evaluator: Arc<dyn FitnessEvaluator>,
        circuit_factory: Arc<dyn CircuitFactory>,
    ) -> Optimizer {
        let config = &self.config;

        let strategies = default_strategies(
            self.gate_factory.clone(),
            evaluator.clone(),
            config.circuit.max_depth,
            phase.use_step_size,
            config.circuit.pad_with_identity,
        );
        let mutation: Box<dyn MutationOperator> = if phase.use_bandit_mutation {
            Box::new(BanditMutation::new(strategies, evaluator.clone()))
        } else {
            Box::new(RandomMutation::new(strategies))
        };

        let shaper: Box<dyn FitnessShaper> = if phase.use_fitness_sharing {
            Box::new(SharingShaper::from_config(&config.sharing))
        } else {
            Box::new(NullShaper)
        };

        let mut observer = ObserverSet::new().with(Box::new(LogObserver::default()));
        if let Some(dir) = &config.results_dir {
            let path = dir.join(format!("progress_seed{}_phase{}.json", seed, index));
            observer = observer.with(Box::new(JsonProgressObserver::new(path)));
        }

        let parts = OptimizerParts {
            evaluator,
            circuit_factory,
            parent_selection: parent_selection(phase.parent_selection, &config.population),
            survivor_selection: survivor_selection(phase.survivor_selection, &config.population),
            crossover: CrossoverRunner::new(crossover_strategy(phase.crossover_strategy)),
            mutation,
            shaper,
            rates: rate_adapter(phase.use_adaptive_rates, &config.rates),
            observer: Box::new(observer),
        };

        Optimizer::new(
            OptimizerSettings::new(phase, &config.population, config.parallel_evaluation),
            parts,
        )
    }

    /// Run all phases and report the fittest circuit of the final population.
    pub fn run(&self) -> Result<ExperimentResult> {
        let start = Instant::now();
        let seed = self.config.random_seed.unwrap_or_else(rand::random);
        let config_hash = self.config.config_hash();
        info!("Starting experiment with seed {} (config {})", seed, &config_hash[..12]);

        let mut rng = EvolutionRng::new(seed);
        let counter = Arc::new(CountingEvaluator::new(self.evaluator.clone()));
        let evaluator: Arc<dyn FitnessEvaluator> = counter.clone();
        let store = self.config.checkpoint_dir.as_ref().map(CheckpointStore::new);

        let mut population: Option<Population> = None;
        let mut summaries = Vec::with_capacity(self.config.phases.len());

        for (index, phase) in self.config.phases.iter().enumerate() {
            let key = self.config.checkpoint_key(index);

            if let Some(store) = &store {
                match store.load(&key, index) {
                    Ok(Some(saved)) if !saved.is_empty() => {
                        info!("Phase {}: reusing checkpoint", index);
                        summaries.push(summary(index, 0, 0, &saved, StopReason::CheckpointReused));
                        population = Some(saved);
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(
                        "Ignoring checkpoint {}: {}",
                        store.path_for(&key, index).display(),
                        e
                    ),
                }
            }

            let circuit_factory = self.circuit_factory(phase);
            let start_population = match population.take() {
                Some(previous) if phase.resume_from_checkpoint => {
                    info!("Phase {}: resuming from previous phase ({} individuals)", index, previous.len());
                    previous
                }
                _ => self.initial_population(circuit_factory.as_ref(), &mut rng)?,
            };

            info!("Phase {}: {} generations", index, phase.generations);
            let calls_before = counter.calls();
            let mut optimizer =
                self.build_optimizer(index, phase, seed, evaluator.clone(), circuit_factory);
            let outcome = optimizer.run(start_population, &mut rng)?;

            let evaluations = counter.calls() - calls_before;
            let phase_summary = summary(
                index,
                outcome.generations,
                evaluations,
                &outcome.population,
                outcome.stop_reason,
            );
            info!(
                "Phase {} finished ({:?}): best fitness {:.4}, fidelity {:.4}, {} evaluations",
                index,
                phase_summary.stop_reason,
                phase_summary.best_fitness,
                phase_summary.best_fidelity,
                evaluations
            );
            summaries.push(phase_summary);

            if let Some(store) = &store {
                store.save(&key, index, &outcome.population)?;
            }
            population = Some(outcome.population);
        }

        let best = population
            .as_ref()
            .and_then(Population::fittest)
            .cloned()
            .ok_or(EvolutionError::EmptyPopulation)?;

        let elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "Experiment finished in {:.2}s: best fitness {:.4}, fidelity {:.4}",
            elapsed_seconds, best.fitness, best.fidelity
        );

        Ok(ExperimentResult {
            seed,
            config_hash,
            best,
            phases: summaries,
            elapsed_seconds,
        })
    }
}

fn summary(
    phase: usize,
    generations: usize,
    evaluations: u64,
    population: &Population,
    stop_reason: StopReason,
) -> PhaseSummary {
    let (best_fitness, best_fidelity) = population
        .fittest()
        .map(|c| (c.fitness, c.fidelity))
        .unwrap_or_default();
    PhaseSummary {
        phase,
        generations,
        evaluations,
        best_fitness,
        best_fidelity,
        stop_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::error::EvaluationError;
    use crate::evolution::fitness::Evaluation;
    use crate::schema::{Fingerprint, PopulationConfig, SurvivorSelectionKind};

    fn small_file(seed: u64) -> ExperimentFile {
        let mut file = ExperimentFile::default();
        file.evolution.circuit.qubit_count = 3;
        file.evolution.circuit.max_depth = 6;
        file.evolution.population = PopulationConfig {
            size: 10,
            elitism_count: 2,
            ..PopulationConfig::default()
        };
        file.evolution.random_seed = Some(seed);
        file.evolution.phases = vec![
            PhaseConfig {
                generations: 3,
                ..PhaseConfig::default()
            },
            PhaseConfig {
                generations: 3,
                use_step_size: true,
                use_adaptive_rates: true,
                use_bandit_mutation: true,
                use_fitness_sharing: true,
                survivor_selection: SurvivorSelectionKind::Nsga2,
                resume_from_checkpoint: true,
                ..PhaseConfig::default()
            },
        ];
        file.target.depth = 4;
        file
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = ExperimentRunner::from_file(small_file(17)).unwrap().run().unwrap();
        let b = ExperimentRunner::from_file(small_file(17)).unwrap().run().unwrap();

        assert_eq!(a.seed, 17);
        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.best.structural_representation(), b.best.structural_representation());
        assert_eq!(a.best_fitness(), b.best_fitness());
        assert_eq!(a.phases.len(), 2);
        assert_eq!(a.phases[1].generations, 3);
        assert!(a.phases[1].evaluations > 0);
    }

    #[test]
    fn test_checkpoints_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = small_file(5);
        file.evolution.checkpoint_dir = Some(dir.path().to_path_buf());

        let first = ExperimentRunner::from_file(file.clone()).unwrap().run().unwrap();
        assert!(first
            .phases
            .iter()
            .all(|p| p.stop_reason == StopReason::MaxGenerations));

        let second = ExperimentRunner::from_file(file).unwrap().run().unwrap();
        assert!(second
            .phases
            .iter()
            .all(|p| p.stop_reason == StopReason::CheckpointReused));
        assert_eq!(
            first.best.structural_representation(),
            second.best.structural_representation()
        );
    }

    #[test]
    fn test_results_dir_receives_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = small_file(9);
        file.evolution.results_dir = Some(dir.path().to_path_buf());
        ExperimentRunner::from_file(file).unwrap().run().unwrap();

        assert!(dir.path().join("progress_seed9_phase0.json").is_file());
        assert!(dir.path().join("progress_seed9_phase1.json").is_file());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = small_file(1);
        file.evolution.population.size = 0;
        assert!(matches!(
            ExperimentRunner::from_file(file),
            Err(EvolutionError::Config(_))
        ));
    }

    #[test]
    fn test_target_circuit_is_reproducible() {
        let target = TargetConfig::default();
        let circuit = CircuitConfig::default();
        let a = target_circuit(&target, &circuit).unwrap();
        let b = target_circuit(&target, &circuit).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.depth(), target.depth);
    }

    fn handoff_file(seed: u64, resume: bool, dir: &std::path::Path) -> ExperimentFile {
        let mut file = small_file(seed);
        file.evolution.checkpoint_dir = Some(dir.to_path_buf());
        file.evolution.phases[1] = PhaseConfig {
            generations: 0,
            resume_from_checkpoint: resume,
            ..PhaseConfig::default()
        };
        file
    }

    fn fingerprints(population: &Population) -> Vec<Fingerprint> {
        population
            .iter()
            .map(|c| c.structural_representation().clone())
            .collect()
    }

    #[test]
    fn test_resume_starts_from_previous_phase() {
        let dir = tempfile::tempdir().unwrap();
        let file = handoff_file(21, true, dir.path());
        let result = ExperimentRunner::from_file(file.clone()).unwrap().run().unwrap();

        let store = CheckpointStore::new(dir.path());
        let phase0 = store.load(&file.evolution.checkpoint_key(0), 0).unwrap().unwrap();
        let phase1 = store.load(&file.evolution.checkpoint_key(1), 1).unwrap().unwrap();

        assert_eq!(fingerprints(&phase0), fingerprints(&phase1));
        // Handed-over individuals are already scored.
        assert_eq!(result.phases[1].evaluations, 0);
    }

    #[test]
    fn test_without_resume_phase_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let file = handoff_file(21, false, dir.path());
        let result = ExperimentRunner::from_file(file.clone()).unwrap().run().unwrap();

        let store = CheckpointStore::new(dir.path());
        let phase0 = store.load(&file.evolution.checkpoint_key(0), 0).unwrap().unwrap();
        let phase1 = store.load(&file.evolution.checkpoint_key(1), 1).unwrap().unwrap();

        assert_ne!(fingerprints(&phase0), fingerprints(&phase1));
        assert_eq!(result.phases[1].evaluations, 10);
    }

    struct FailingEvaluator;

    impl FitnessEvaluator for FailingEvaluator {
        fn evaluate(&self, _circuit: &Circuit) -> std::result::Result<Evaluation, EvaluationError> {
            Err(EvaluationError("simulator crashed".to_string()))
        }
    }

    #[test]
    fn test_evaluator_failure_aborts_experiment() {
        let runner =
            ExperimentRunner::new(small_file(3).evolution, Arc::new(FailingEvaluator)).unwrap();
        assert!(matches!(runner.run(), Err(EvolutionError::Evaluation(_))));
    }
}
