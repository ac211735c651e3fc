//! Fitness shaping applied after evaluation.

use crate::schema::{SharingConfig, jaccard_distance};

use super::population::Population;

/// Adjusts fitness in place before survivor selection.
pub trait FitnessShaper: Send + Sync {
    fn shape(&self, population: &mut Population);
}

/// Leaves fitness untouched.
pub struct NullShaper;

impl FitnessShaper for NullShaper {
    fn shape(&self, _population: &mut Population) {}
}

/// Fitness sharing (niching).
///
/// Each fitness becomes `raw_fitness / niche_count`, where the niche count
/// sums `1 - (d / radius)^alpha` over every individual (itself included)
/// closer than `radius`. Shaping always starts from the evaluator's raw
/// fitness, so repeated application does not compound.
pub struct SharingShaper {
    radius: f64,
    alpha: f64,
}

impl SharingShaper {
    pub fn new(radius: f64, alpha: f64) -> Self {
        Self { radius, alpha }
    }

    pub fn from_config(config: &SharingConfig) -> Self {
        Self::new(config.radius, config.alpha)
    }

    fn sharing(&self, distance: f64) -> f64 {
        if distance < self.radius {
            1.0 - (distance / self.radius).powf(self.alpha)
        } else {
            0.0
        }
    }
}

impl FitnessShaper for SharingShaper {
    fn shape(&self, population: &mut Population) {
        let niche_counts: Vec<f64> = {
            let fingerprints: Vec<_> = population
                .iter()
                .map(|c| c.structural_representation())
                .collect();
            fingerprints
                .iter()
                .map(|a| {
                    fingerprints
                        .iter()
                        .map(|b| self.sharing(jaccard_distance(a, b)))
                        .sum()
                })
                .collect()
        };

        for (circuit, niche) in population.iter_mut().zip(niche_counts) {
            if niche > 0.0 {
                circuit.fitness = circuit.raw_fitness / niche;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Circuit, Column, Gate};

    fn circuit(op: &str, fitness: f64) -> Circuit {
        Circuit::new(1, vec![Column::new(vec![Gate::new(op, vec![0])])]).with_scores(fitness, fitness)
    }

    #[test]
    fn test_null_shaper_is_identity() {
        let mut population = Population::new(vec![circuit("h", 0.4)]);
        NullShaper.shape(&mut population);
        assert_eq!(population.individuals()[0].fitness, 0.4);
    }

    #[test]
    fn test_sharing_divides_clones() {
        let mut population =
            Population::new(vec![circuit("h", 0.8), circuit("h", 0.8), circuit("x", 0.6)]);
        let shaper = SharingShaper::new(0.3, 1.0);
        shaper.shape(&mut population);

        let fitness: Vec<f64> = population.iter().map(|c| c.fitness).collect();
        assert!((fitness[0] - 0.4).abs() < 1e-12);
        assert!((fitness[1] - 0.4).abs() < 1e-12);
        assert!((fitness[2] - 0.6).abs() < 1e-12);
        assert_eq!(population.individuals()[0].fidelity, 0.8);
    }

    #[test]
    fn test_sharing_does_not_compound() {
        let mut population = Population::new(vec![circuit("h", 0.8), circuit("h", 0.8)]);
        let shaper = SharingShaper::new(0.3, 1.0);
        shaper.shape(&mut population);
        shaper.shape(&mut population);
        assert!((population.individuals()[0].fitness - 0.4).abs() < 1e-12);
    }
}
