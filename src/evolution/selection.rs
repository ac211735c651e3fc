//! Parent and survivor selection.
//!
//! Parent strategies draw `population_size` individuals (with repetition)
//! to feed crossover. Survivor strategies keep the `elitism_count` best
//! individuals by fidelity and fill the remaining slots with their own rule.

use rand::distributions::{Distribution, WeightedIndex};

use crate::schema::{Circuit, ParentSelectionKind, PopulationConfig, SurvivorSelectionKind};

use super::nsga2::{self, Objectives};
use super::population::Population;
use super::rng::EvolutionRng;

/// Picks a new population from an existing one.
pub trait SelectionStrategy: Send + Sync {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population;
}

/// Build the parent selection strategy for a phase.
pub fn parent_selection(
    kind: ParentSelectionKind,
    config: &PopulationConfig,
) -> Box<dyn SelectionStrategy> {
    match kind {
        ParentSelectionKind::Tournament => Box::new(TournamentParentSelection {
            population_size: config.size,
            tournament_size: config.tournament_size,
        }),
        ParentSelectionKind::Random => Box::new(RandomParentSelection {
            population_size: config.size,
        }),
        ParentSelectionKind::Roulette => Box::new(RouletteParentSelection {
            population_size: config.size,
        }),
    }
}

/// Build the survivor selection strategy for a phase.
pub fn survivor_selection(
    kind: SurvivorSelectionKind,
    config: &PopulationConfig,
) -> Box<dyn SelectionStrategy> {
    match kind {
        SurvivorSelectionKind::Tournament => Box::new(TournamentSurvivorSelection {
            population_size: config.size,
            tournament_size: config.tournament_size,
            elitism_count: config.elitism_count,
        }),
        SurvivorSelectionKind::Nsga2 => Box::new(Nsga2SurvivorSelection::new(
            config.size,
            config.elitism_count,
        )),
        SurvivorSelectionKind::Random => Box::new(RandomSurvivorSelection {
            population_size: config.size,
            elitism_count: config.elitism_count,
        }),
        SurvivorSelectionKind::Roulette => Box::new(RouletteSurvivorSelection {
            population_size: config.size,
            elitism_count: config.elitism_count,
        }),
    }
}

/// Indices sorted by fidelity descending; ties keep population order.
fn by_fidelity(individuals: &[Circuit]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..individuals.len()).collect();
    order.sort_by(|&a, &b| individuals[b].fidelity.total_cmp(&individuals[a].fidelity));
    order
}

/// Position in `candidates` of the fittest of a random group of `size`.
///
/// Contestants are sampled without replacement; the first one seen wins ties.
fn tournament(
    individuals: &[Circuit],
    candidates: &[usize],
    size: usize,
    rng: &mut EvolutionRng,
) -> usize {
    let group = rng.sample_indices(candidates.len(), size.min(candidates.len()));
    let mut champion = group[0];
    for &pos in &group[1..] {
        if individuals[candidates[pos]].fitness > individuals[candidates[champion]].fitness {
            champion = pos;
        }
    }
    champion
}

/// Roulette wheel over fitness. Falls back to uniform draws when the
/// weights are unusable (all zero, negative or empty).
fn spin(
    individuals: &[Circuit],
    candidates: &[usize],
    count: usize,
    rng: &mut EvolutionRng,
) -> Vec<usize> {
    if candidates.is_empty() {
        return Vec::new();
    }
    match WeightedIndex::new(candidates.iter().map(|&i| individuals[i].fitness.max(0.0))) {
        Ok(wheel) => (0..count).map(|_| candidates[wheel.sample(rng)]).collect(),
        Err(_) => (0..count)
            .map(|_| candidates[rng.index(candidates.len())])
            .collect(),
    }
}

fn collect(individuals: &[Circuit], picked: impl IntoIterator<Item = usize>) -> Population {
    picked.into_iter().map(|i| individuals[i].clone()).collect()
}

// ============================================================================
// Parent selection
// ============================================================================

/// k-way tournament, repeated `population_size` times.
pub struct TournamentParentSelection {
    pub population_size: usize,
    pub tournament_size: usize,
}

impl SelectionStrategy for TournamentParentSelection {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        if individuals.is_empty() {
            return Population::default();
        }
        let all: Vec<usize> = (0..individuals.len()).collect();
        let picked: Vec<usize> = (0..self.population_size)
            .map(|_| tournament(individuals, &all, self.tournament_size, rng))
            .collect();
        collect(individuals, picked)
    }
}

/// Uniform draws with replacement.
pub struct RandomParentSelection {
    pub population_size: usize,
}

impl SelectionStrategy for RandomParentSelection {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        if individuals.is_empty() {
            return Population::default();
        }
        let picked: Vec<usize> = (0..self.population_size)
            .map(|_| rng.index(individuals.len()))
            .collect();
        collect(individuals, picked)
    }
}

/// Fitness-proportional draws with replacement.
pub struct RouletteParentSelection {
    pub population_size: usize,
}

impl SelectionStrategy for RouletteParentSelection {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        let all: Vec<usize> = (0..individuals.len()).collect();
        collect(individuals, spin(individuals, &all, self.population_size, rng))
    }
}

// ============================================================================
// Survivor selection
// ============================================================================

/// Elitism by fidelity, then tournaments over the rest without replacement.
pub struct TournamentSurvivorSelection {
    pub population_size: usize,
    pub tournament_size: usize,
    pub elitism_count: usize,
}

impl SelectionStrategy for TournamentSurvivorSelection {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        if individuals.is_empty() {
            return Population::default();
        }

        let order = by_fidelity(individuals);
        let elites = self.elitism_count.min(order.len());
        let mut survivors: Vec<usize> = order[..elites].to_vec();
        let mut competitors: Vec<usize> = order[elites..].to_vec();

        while survivors.len() < self.population_size && !competitors.is_empty() {
            let winner = tournament(individuals, &competitors, self.tournament_size, rng);
            survivors.push(competitors.remove(winner));
        }

        collect(individuals, survivors)
    }
}

/// Elitism, then Pareto fronts on (fidelity, -depth) with crowding
/// distance to break the overflowing front.
pub struct Nsga2SurvivorSelection {
    population_size: usize,
    elitism_count: usize,
}

impl Nsga2SurvivorSelection {
    /// At least one elite is always kept.
    pub fn new(population_size: usize, elitism_count: usize) -> Self {
        Self {
            population_size,
            elitism_count: elitism_count.max(1),
        }
    }
}

impl SelectionStrategy for Nsga2SurvivorSelection {
    fn select(&self, population: &Population, _rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        if individuals.is_empty() {
            return Population::default();
        }

        let order = by_fidelity(individuals);
        let elites = self.elitism_count.min(order.len());
        let remaining = &order[elites..];

        let objectives: Vec<Objectives> =
            remaining.iter().map(|&i| individuals[i].objectives()).collect();
        let fronts = nsga2::non_dominated_sort(&objectives);

        let mut survivors: Vec<Circuit> = order[..elites]
            .iter()
            .map(|&i| individuals[i].clone())
            .collect();

        for (rank, mut front) in fronts.into_iter().enumerate() {
            if survivors.len() + front.len() <= self.population_size {
                survivors.extend(front.into_iter().map(|k| {
                    let mut c = individuals[remaining[k]].clone();
                    c.rank = Some(rank);
                    c
                }));
                continue;
            }

            let distances = nsga2::crowding_distance_assignment(&objectives, &mut front);
            let mut ranked: Vec<(usize, f64)> = front.into_iter().zip(distances).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

            let needed = self.population_size.saturating_sub(survivors.len());
            survivors.extend(ranked.into_iter().take(needed).map(|(k, distance)| {
                let mut c = individuals[remaining[k]].clone();
                c.rank = Some(rank);
                c.crowding_distance = distance;
                c
            }));
            break;
        }

        Population::new(survivors)
    }
}

/// Elitism, then uniform sampling without replacement from the rest.
pub struct RandomSurvivorSelection {
    pub population_size: usize,
    pub elitism_count: usize,
}

impl SelectionStrategy for RandomSurvivorSelection {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        if individuals.is_empty() {
            return Population::default();
        }

        let order = by_fidelity(individuals);
        let elites = self.elitism_count.min(order.len());
        let rest = &order[elites..];
        let slots = self.population_size.saturating_sub(elites);

        let mut survivors: Vec<usize> = order[..elites].to_vec();
        survivors.extend(rng.sample_indices(rest.len(), slots).into_iter().map(|p| rest[p]));
        collect(individuals, survivors)
    }
}

/// Elitism, then fitness-proportional draws (with replacement) from the rest.
pub struct RouletteSurvivorSelection {
    pub population_size: usize,
    pub elitism_count: usize,
}

impl SelectionStrategy for RouletteSurvivorSelection {
    fn select(&self, population: &Population, rng: &mut EvolutionRng) -> Population {
        let individuals = population.individuals();
        if individuals.is_empty() {
            return Population::default();
        }

        let order = by_fidelity(individuals);
        let elites = self.elitism_count.min(order.len());
        let slots = self.population_size.saturating_sub(elites);

        let mut survivors: Vec<usize> = order[..elites].to_vec();
        survivors.extend(spin(individuals, &order[elites..], slots, rng));
        collect(individuals, survivors)
    }
}
