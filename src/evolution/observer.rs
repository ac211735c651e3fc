//! Progress observers notified once per generation.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::schema::EvolutionHistory;

use super::error::Result;
use super::population::Population;

/// Receives the population at the start of every generation.
pub trait ProgressObserver: Send {
    fn update(&mut self, generation: usize, population: &Population);

    /// Persist whatever was collected. Called once at the end of a phase.
    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects per-generation statistics and writes them to a JSON file.
pub struct JsonProgressObserver {
    path: PathBuf,
    history: EvolutionHistory,
}

impl JsonProgressObserver {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            history: EvolutionHistory::default(),
        }
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }
}

impl ProgressObserver for JsonProgressObserver {
    fn update(&mut self, _generation: usize, population: &Population) {
        self.history
            .fitness_per_generation
            .push(population.sorted_fitness());
        self.history
            .average_fitness_per_generation
            .push(population.average_fitness());
        self.history
            .std_dev_fitness_per_generation
            .push(population.fitness_std());
        self.history
            .structural_diversity_per_generation
            .push(population.diversity());
    }

    fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.history)?;
        fs::write(&self.path, json)?;
        info!("Saved progress to {}", self.path.display());
        Ok(())
    }
}

/// Logs a summary line every `interval` generations.
pub struct LogObserver {
    interval: usize,
}

impl LogObserver {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(25)
    }
}

impl ProgressObserver for LogObserver {
    fn update(&mut self, generation: usize, population: &Population) {
        if generation % self.interval != 0 {
            return;
        }
        let stats = population.stats(generation);
        info!(
            "Gen {}: best={:.4} fidelity={:.4} avg={:.4} diversity={:.4} depth={:.1}",
            generation,
            stats.best_fitness,
            stats.best_fidelity,
            stats.avg_fitness,
            stats.diversity,
            stats.avg_depth
        );
    }
}

/// Forwards to several observers in order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl ProgressObserver for ObserverSet {
    fn update(&mut self, generation: usize, population: &Population) {
        for observer in &mut self.observers {
            observer.update(generation, population);
        }
    }

    fn save(&mut self) -> Result<()> {
        for observer in &mut self.observers {
            observer.save()?;
        }
        Ok(())
    }
}
