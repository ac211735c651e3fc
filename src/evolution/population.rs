//! Population container and aggregate statistics.

use std::collections::HashSet;

use crate::schema::{Circuit, GenerationStats, jaccard_distance};

/// Ordered collection of circuits.
#[derive(Debug, Clone, Default)]
pub struct Population {
    individuals: Vec<Circuit>,
}

impl Population {
    pub fn new(individuals: Vec<Circuit>) -> Self {
        Self { individuals }
    }

    pub fn push(&mut self, circuit: Circuit) {
        self.individuals.push(circuit);
    }

    pub fn extend(&mut self, other: Population) {
        self.individuals.extend(other.individuals);
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Circuit> {
        self.individuals.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Circuit> {
        self.individuals.iter_mut()
    }

    pub fn individuals(&self) -> &[Circuit] {
        &self.individuals
    }

    pub fn individuals_mut(&mut self) -> &mut Vec<Circuit> {
        &mut self.individuals
    }

    pub fn into_individuals(self) -> Vec<Circuit> {
        self.individuals
    }

    /// Individual with the highest fitness; the first one on ties.
    pub fn fittest(&self) -> Option<&Circuit> {
        self.individuals.iter().fold(None, |best: Option<&Circuit>, c| match best {
            Some(b) if b.fitness >= c.fitness => Some(b),
            _ => Some(c),
        })
    }

    /// Mean fitness (0.0 when empty).
    pub fn average_fitness(&self) -> f64 {
        if self.individuals.is_empty() {
            return 0.0;
        }
        self.individuals.iter().map(|c| c.fitness).sum::<f64>() / self.len() as f64
    }

    /// Population standard deviation of fitness.
    pub fn fitness_std(&self) -> f64 {
        if self.individuals.is_empty() {
            return 0.0;
        }
        let mean = self.average_fitness();
        let variance = self
            .individuals
            .iter()
            .map(|c| (c.fitness - mean).powi(2))
            .sum::<f64>()
            / self.len() as f64;
        variance.sqrt()
    }

    /// Mean Jaccard distance over unordered pairs (0.0 below two individuals).
    pub fn diversity(&self) -> f64 {
        let n = self.individuals.len();
        if n < 2 {
            return 0.0;
        }

        let fingerprints: Vec<_> = self
            .individuals
            .iter()
            .map(|c| c.structural_representation())
            .collect();

        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                total += jaccard_distance(fingerprints[i], fingerprints[j]);
            }
        }
        let pairs = n * (n - 1) / 2;
        total / pairs as f64
    }

    /// Keep the first individual per fingerprint, in order.
    pub fn remove_duplicates(&mut self) {
        let mut seen = HashSet::with_capacity(self.individuals.len());
        self.individuals
            .retain(|c| seen.insert(c.structural_representation().clone()));
    }

    /// Fitness values sorted descending.
    pub fn sorted_fitness(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.individuals.iter().map(|c| c.fitness).collect();
        values.sort_by(|a, b| b.total_cmp(a));
        values
    }

    pub fn stats(&self, generation: usize) -> GenerationStats {
        let (best_fitness, best_fidelity) = self
            .fittest()
            .map(|c| (c.fitness, c.fidelity))
            .unwrap_or_default();
        let avg_depth = if self.is_empty() {
            0.0
        } else {
            self.individuals.iter().map(|c| c.depth() as f64).sum::<f64>() / self.len() as f64
        };

        GenerationStats {
            generation,
            best_fitness,
            best_fidelity,
            avg_fitness: self.average_fitness(),
            fitness_std: self.fitness_std(),
            diversity: self.diversity(),
            avg_depth,
        }
    }
}

impl FromIterator<Circuit> for Population {
    fn from_iter<I: IntoIterator<Item = Circuit>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Population {
    type Item = Circuit;
    type IntoIter = std::vec::IntoIter<Circuit>;

    fn into_iter(self) -> Self::IntoIter {
        self.individuals.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Gate};

    fn circuit(op: &str, fitness: f64) -> Circuit {
        Circuit::new(2, vec![Column::new(vec![Gate::new(op, vec![0])])]).with_scores(fitness, 0.0)
    }

    #[test]
    fn test_clone_population_has_zero_diversity() {
        let base = circuit("h", 0.5);
        let population: Population = (0..5).map(|_| base.clone()).collect();
        assert_eq!(population.diversity(), 0.0);
    }

    #[test]
    fn test_diversity_of_disjoint_circuits() {
        let population = Population::new(vec![circuit("h", 0.1), circuit("x", 0.2)]);
        assert_eq!(population.diversity(), 1.0);
        assert_eq!(Population::default().diversity(), 0.0);
    }

    #[test]
    fn test_fittest_first_on_ties() {
        let mut a = circuit("h", 0.8);
        a.fidelity = 1.0;
        let b = circuit("x", 0.8);
        let population = Population::new(vec![circuit("y", 0.2), a, b]);
        assert_eq!(population.fittest().unwrap().fidelity, 1.0);
        assert!(Population::default().fittest().is_none());
    }

    #[test]
    fn test_remove_duplicates_keeps_first() {
        let mut population = Population::new(vec![
            circuit("h", 0.1),
            circuit("x", 0.2),
            circuit("h", 0.3),
        ]);
        population.remove_duplicates();
        assert_eq!(population.len(), 2);
        assert_eq!(population.individuals()[0].fitness, 0.1);
        assert_eq!(population.individuals()[1].fitness, 0.2);
    }

    #[test]
    fn test_fitness_statistics() {
        let population = Population::new(vec![circuit("h", 0.2), circuit("x", 0.4)]);
        assert!((population.average_fitness() - 0.3).abs() < 1e-12);
        assert!((population.fitness_std() - 0.1).abs() < 1e-12);
        assert_eq!(population.sorted_fitness(), vec![0.4, 0.2]);

        let stats = population.stats(3);
        assert_eq!(stats.generation, 3);
        assert_eq!(stats.best_fitness, 0.4);
        assert_eq!(stats.avg_depth, 1.0);
    }
}
