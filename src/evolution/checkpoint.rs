//! Phase checkpoints on disk.
//!
//! One JSON file per (configuration key, phase) holding the final population
//! of that phase.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::schema::Circuit;

use super::error::{EvolutionError, Result};
use super::population::Population;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    key: String,
    phase: usize,
    population: Vec<Circuit>,
}

/// Directory of phase checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str, phase: usize) -> PathBuf {
        self.dir.join(format!("checkpoint_{}_phase{}.json", key, phase))
    }

    pub fn save(&self, key: &str, phase: usize, population: &Population) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key, phase);
        let file = CheckpointFile {
            key: key.to_string(),
            phase,
            population: population.individuals().to_vec(),
        };
        fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        info!(
            "Saved checkpoint for phase {} ({} individuals) to {}",
            phase,
            population.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load a checkpoint. `Ok(None)` when no file exists.
    pub fn load(&self, key: &str, phase: usize) -> Result<Option<Population>> {
        let path = self.path_for(key, phase);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let file: CheckpointFile = serde_json::from_str(&content)?;

        let mut individuals = file.population;
        for (i, circuit) in individuals.iter_mut().enumerate() {
            if !circuit.is_well_formed() {
                return Err(EvolutionError::MalformedCheckpoint(i));
            }
            if circuit.raw_fitness == 0.0 {
                circuit.raw_fitness = circuit.fitness;
            }
        }

        info!(
            "Loaded checkpoint for phase {} ({} individuals) from {}",
            phase,
            individuals.len(),
            path.display()
        );
        Ok(Some(Population::new(individuals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Gate, StepSize};

    fn population() -> Population {
        let circuit = Circuit::new(
            3,
            vec![
                Column::new(vec![
                    Gate::new("rx", vec![0])
                        .with_parameters(vec![0.75])
                        .with_step_sizes(vec![StepSize::with_history(0.2, 0.9, 5, &[true])]),
                    Gate::new("swap", vec![2, 1]).with_extra_controls(0),
                ]),
                Column::new(vec![Gate::new("s", vec![1]).inverted(true)]),
            ],
        )
        .with_scores(0.61, 0.58);
        Population::new(vec![circuit])
    }

    #[test]
    fn test_roundtrip_preserves_fingerprint_and_scores() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let original = population();

        assert!(!store.path_for("abc", 0).is_file());
        let path = store.save("abc", 0, &original).unwrap();
        assert_eq!(path, dir.path().join("checkpoint_abc_phase0.json"));

        let restored = store.load("abc", 0).unwrap().unwrap();
        let (a, b) = (&original.individuals()[0], &restored.individuals()[0]);
        assert_eq!(a.structural_representation(), b.structural_representation());
        assert_eq!(a.fitness, b.fitness);
        assert_eq!(a.fidelity, b.fidelity);
        assert_eq!(a, b);
        assert_eq!(b.columns()[0].gates[0].step_sizes[0].sigma, 0.2);
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("nothing", 3).unwrap().is_none());
    }

    #[test]
    fn test_malformed_checkpoint_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let bad = Population::new(vec![Circuit::new(
            1,
            vec![Column::new(vec![Gate::new("x", vec![5])])],
        )]);
        store.save("bad", 0, &bad).unwrap();
        assert!(matches!(
            store.load("bad", 0),
            Err(EvolutionError::MalformedCheckpoint(0))
        ));
    }

    #[test]
    fn test_corrupt_checkpoint_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(store.path_for("k", 1), "{ not json").unwrap();
        assert!(matches!(store.load("k", 1), Err(EvolutionError::Serde(_))));
    }
}
