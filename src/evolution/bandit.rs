//! UCB1 statistics for adaptive operator choice.

use log::trace;

use super::error::{EvolutionError, Result};

/// Reward and pull bookkeeping per arm.
///
/// Arms are addressed by registration index. Statistics are meant to live
/// for one optimizer run.
#[derive(Debug, Clone, Default)]
pub struct BanditStats {
    rewards: Vec<f64>,
    pulls: Vec<u64>,
    total: u64,
}

impl BanditStats {
    pub fn new(arms: usize) -> Self {
        Self {
            rewards: vec![0.0; arms],
            pulls: vec![0; arms],
            total: 0,
        }
    }

    pub fn pulls(&self, arm: usize) -> u64 {
        self.pulls[arm]
    }

    pub fn total_pulls(&self) -> u64 {
        self.total
    }

    /// Mean reward of an arm (0.0 before its first pull).
    pub fn average_reward(&self, arm: usize) -> f64 {
        if self.pulls[arm] == 0 {
            return 0.0;
        }
        self.rewards[arm] / self.pulls[arm] as f64
    }

    /// Choose among `applicable` arms (registration order).
    ///
    /// The first never-pulled arm wins; otherwise the arm maximizing
    /// `avg + sqrt(2 ln total / pulls)`, first on ties.
    pub fn select(&self, applicable: &[usize]) -> Result<usize> {
        if applicable.is_empty() {
            return Err(EvolutionError::NoApplicableMutation);
        }
        if let Some(&fresh) = applicable.iter().find(|&&arm| self.pulls[arm] == 0) {
            return Ok(fresh);
        }

        let ln_total = (self.total as f64).ln();
        let mut best = applicable[0];
        let mut best_score = f64::NEG_INFINITY;
        for &arm in applicable {
            let score =
                self.average_reward(arm) + (2.0 * ln_total / self.pulls[arm] as f64).sqrt();
            trace!("arm {} ucb score {:.6}", arm, score);
            if score > best_score {
                best = arm;
                best_score = score;
            }
        }
        Ok(best)
    }

    pub fn record(&mut self, arm: usize, reward: f64) {
        self.rewards[arm] += reward;
        self.pulls[arm] += 1;
        self.total += 1;
    }
}
