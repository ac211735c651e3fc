//! Crossover and mutation probabilities per generation.

use serde::{Deserialize, Serialize};

use crate::schema::RateConfig;

/// Variation probabilities in effect for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRates {
    pub crossover_rate: f64,
    pub mutation_rate: f64,
}

/// Derives rates from the current population diversity.
pub trait RateAdapter: Send + Sync {
    fn rates(&self, diversity: f64) -> EvolutionRates;
}

/// Build the rate adapter for a phase.
pub fn rate_adapter(adaptive: bool, config: &RateConfig) -> Box<dyn RateAdapter> {
    if adaptive {
        Box::new(DiversityAdaptiveRates::from_config(config))
    } else {
        Box::new(FixedRates(EvolutionRates {
            crossover_rate: config.crossover_rate,
            mutation_rate: config.mutation_rate,
        }))
    }
}

/// Constant rates.
pub struct FixedRates(pub EvolutionRates);

impl RateAdapter for FixedRates {
    fn rates(&self, _diversity: f64) -> EvolutionRates {
        self.0
    }
}

/// Low diversity favours mutation, high diversity favours crossover.
pub struct DiversityAdaptiveRates {
    min_mutation: f64,
    max_mutation: f64,
    min_crossover: f64,
    max_crossover: f64,
}

impl DiversityAdaptiveRates {
    pub fn from_config(config: &RateConfig) -> Self {
        Self {
            min_mutation: config.min_mutation_rate,
            max_mutation: config.max_mutation_rate,
            min_crossover: config.min_crossover_rate,
            max_crossover: config.max_crossover_rate,
        }
    }
}

impl RateAdapter for DiversityAdaptiveRates {
    fn rates(&self, diversity: f64) -> EvolutionRates {
        let d = diversity.clamp(0.0, 1.0);
        EvolutionRates {
            mutation_rate: self.max_mutation - d * (self.max_mutation - self.min_mutation),
            crossover_rate: self.min_crossover + d * (self.max_crossover - self.min_crossover),
        }
    }
}
