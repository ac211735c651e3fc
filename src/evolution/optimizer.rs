//! The generational loop of one phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rayon::prelude::*;

use crate::schema::{Circuit, PhaseConfig, PopulationConfig, StopReason};

use super::crossover::CrossoverRunner;
use super::error::{EvaluationError, Result};
use super::factory::CircuitFactory;
use super::fitness::FitnessEvaluator;
use super::mutation::MutationOperator;
use super::observer::ProgressObserver;
use super::population::Population;
use super::rates::RateAdapter;
use super::rng::EvolutionRng;
use super::selection::SelectionStrategy;
use super::shaping::FitnessShaper;

/// Scalar settings of one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizerSettings {
    pub generations: usize,
    pub fidelity_threshold_stop: Option<f64>,
    pub diversity_threshold: f64,
    pub injection_rate: f64,
    pub parallel_evaluation: bool,
}

impl OptimizerSettings {
    pub fn new(phase: &PhaseConfig, population: &PopulationConfig, parallel: bool) -> Self {
        Self {
            generations: phase.generations,
            fidelity_threshold_stop: phase.fidelity_threshold_stop,
            diversity_threshold: population.diversity_threshold,
            injection_rate: population.injection_rate,
            parallel_evaluation: parallel,
        }
    }
}

/// Components the loop is assembled from.
pub struct OptimizerParts {
    pub evaluator: Arc<dyn FitnessEvaluator>,
    pub circuit_factory: Arc<dyn CircuitFactory>,
    pub parent_selection: Box<dyn SelectionStrategy>,
    pub survivor_selection: Box<dyn SelectionStrategy>,
    pub crossover: CrossoverRunner,
    pub mutation: Box<dyn MutationOperator>,
    pub shaper: Box<dyn FitnessShaper>,
    pub rates: Box<dyn RateAdapter>,
    pub observer: Box<dyn ProgressObserver>,
}

/// Result of [`Optimizer::run`].
#[derive(Debug)]
pub struct PhaseOutcome {
    /// Final population after the last survivor selection.
    pub population: Population,
    /// Generations completed.
    pub generations: usize,
    pub stop_reason: StopReason,
}

/// Runs selection, variation, evaluation and replacement for a number of
/// generations.
pub struct Optimizer {
    settings: OptimizerSettings,
    parts: OptimizerParts,
    cancelled: Arc<AtomicBool>,
}

impl Optimizer {
    pub fn new(settings: OptimizerSettings, parts: OptimizerParts) -> Self {
        Self {
            settings,
            parts,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Evaluate every individual whose fitness is still zero.
    ///
    /// Parallel evaluation writes each result into its own slot, so the
    /// outcome does not depend on completion order.
    pub fn evaluate_population(&self, population: &mut Population) -> Result<()> {
        let evaluator = self.parts.evaluator.as_ref();
        let evaluate = |circuit: &mut Circuit| -> std::result::Result<(), EvaluationError> {
            if !circuit.is_evaluated() {
                let eval = evaluator.evaluate(circuit)?;
                circuit.record_evaluation(eval.fitness, eval.fidelity);
            }
            Ok(())
        };

        if self.settings.parallel_evaluation {
            population
                .individuals_mut()
                .par_iter_mut()
                .try_for_each(evaluate)?;
        } else {
            population.iter_mut().try_for_each(evaluate)?;
        }
        Ok(())
    }

    /// Replace the worst individuals by fresh, evaluated random circuits.
    fn inject(&self, population: &mut Population, rng: &mut EvolutionRng) -> Result<()> {
        let count = (population.len() as f64 * self.settings.injection_rate).floor() as usize;
        let Some(sample) = population.individuals().first() else {
            return Ok(());
        };
        if count == 0 {
            return Ok(());
        }

        let qubits = sample.qubit_count;
        let max_depth = sample.depth();
        let min_depth = (max_depth / 2).max(1);

        let mut fresh = (0..count)
            .map(|_| {
                self.parts
                    .circuit_factory
                    .create_random(qubits, max_depth, min_depth, rng)
            })
            .collect::<Result<Population>>()?;
        self.evaluate_population(&mut fresh)?;

        let individuals = population.individuals_mut();
        individuals.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        for (slot, circuit) in individuals.iter_mut().zip(fresh) {
            *slot = circuit;
        }
        Ok(())
    }

    fn reached_target(&self, population: &Population) -> bool {
        match (self.settings.fidelity_threshold_stop, population.fittest()) {
            (Some(threshold), Some(best)) => best.fidelity >= threshold,
            _ => false,
        }
    }

    /// One generation: everything after the observer update.
    fn step(
        &mut self,
        mut population: Population,
        rng: &mut EvolutionRng,
    ) -> Result<Population> {
        let mut diversity = population.diversity();
        if diversity < self.settings.diversity_threshold {
            debug!(
                "Low diversity ({:.4}), injecting fresh individuals",
                diversity
            );
            self.inject(&mut population, rng)?;
            diversity = population.diversity();
        }

        let rates = self.parts.rates.rates(diversity);
        debug!(
            "Rates: crossover={:.3} mutation={:.3}",
            rates.crossover_rate, rates.mutation_rate
        );

        let parents = self.parts.parent_selection.select(&population, rng);
        let mut offspring = self.parts.crossover.run(parents, rates.crossover_rate, rng);
        offspring.extend(population);
        offspring.remove_duplicates();

        let mut mutated = self
            .parts
            .mutation
            .mutate(offspring, rates.mutation_rate, rng)?;
        self.evaluate_population(&mut mutated)?;
        self.parts.shaper.shape(&mut mutated);

        Ok(self.parts.survivor_selection.select(&mutated, rng))
    }

    /// Run the phase starting from `population`.
    ///
    /// The initial population is evaluated first. The observer is saved when
    /// the loop ends, whatever the stop reason.
    pub fn run(&mut self, population: Population, rng: &mut EvolutionRng) -> Result<PhaseOutcome> {
        let mut population = population;
        self.evaluate_population(&mut population)?;

        let mut generations = 0;
        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }
            if self.reached_target(&population) {
                info!("Fidelity threshold reached at generation {}", generations);
                break StopReason::TargetReached;
            }
            if generations >= self.settings.generations {
                break StopReason::MaxGenerations;
            }

            self.parts.observer.update(generations, &population);
            population = self.step(population, rng)?;
            generations += 1;
        };

        self.parts.observer.save()?;

        Ok(PhaseOutcome {
            population,
            generations,
            stop_reason,
        })
    }
}
