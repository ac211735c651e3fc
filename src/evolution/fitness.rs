//! Fitness evaluation interface and a structural reference evaluator.
//!
//! The engine treats evaluation as a black box: anything implementing
//! [`FitnessEvaluator`] can drive a run. [`StructuralTargetEvaluator`] scores
//! how closely a candidate reproduces a known target circuit, which makes the
//! engine runnable without a simulator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::schema::Circuit;

use super::error::EvaluationError;

/// Scores returned by an evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evaluation {
    /// Selection objective. Must be positive for an evaluated circuit.
    pub fitness: f64,
    /// Unshaped quality in `[0, 1]`.
    pub fidelity: f64,
}

/// Pure, deterministic scoring of a circuit.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, circuit: &Circuit) -> Result<Evaluation, EvaluationError>;
}

/// Fitness of `circuit`, evaluating and recording it first if needed.
///
/// Returns the evaluator's unshaped fitness.
pub fn ensure_evaluated(
    evaluator: &dyn FitnessEvaluator,
    circuit: &mut Circuit,
) -> Result<f64, EvaluationError> {
    if circuit.is_evaluated() {
        return Ok(circuit.raw_fitness);
    }
    let eval = evaluator.evaluate(circuit)?;
    circuit.record_evaluation(eval.fitness, eval.fidelity);
    Ok(eval.fitness)
}

/// Evaluator wrapper counting calls across threads.
pub struct CountingEvaluator {
    inner: Arc<dyn FitnessEvaluator>,
    calls: AtomicU64,
}

impl CountingEvaluator {
    pub fn new(inner: Arc<dyn FitnessEvaluator>) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl FitnessEvaluator for CountingEvaluator {
    fn evaluate(&self, circuit: &Circuit) -> Result<Evaluation, EvaluationError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(circuit)
    }
}

/// Lowest fitness [`StructuralTargetEvaluator`] reports. Zero is reserved
/// for unevaluated circuits.
pub const MIN_FITNESS: f64 = 1e-9;

/// Gate position ignoring parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Placement {
    op: String,
    qubits: Vec<usize>,
    extra_controls: usize,
    inverted: bool,
    column: usize,
}

fn placements(circuit: &Circuit) -> BTreeMap<Placement, Vec<f64>> {
    circuit
        .gates()
        .map(|(column, gate)| {
            let mut qubits = gate.qubits.clone();
            qubits.sort_unstable();
            (
                Placement {
                    op: gate.op.clone(),
                    qubits,
                    extra_controls: gate.extra_controls,
                    inverted: gate.inverted,
                    column,
                },
                gate.parameters.clone(),
            )
        })
        .collect()
}

/// Gate counts per operation and qubit set, ignoring columns.
fn usage(circuit: &Circuit) -> BTreeMap<(String, Vec<usize>), usize> {
    let mut counts = BTreeMap::new();
    for (_, gate) in circuit.gates() {
        let mut qubits = gate.qubits.clone();
        qubits.sort_unstable();
        *counts.entry((gate.op.clone(), qubits)).or_insert(0) += 1;
    }
    counts
}

/// Weighted Jaccard similarity `Σmin / Σmax` of two count maps; 1 when both are empty.
fn weighted_jaccard<K: Ord>(a: &BTreeMap<K, usize>, b: &BTreeMap<K, usize>) -> f64 {
    let mut shared = 0;
    let mut total = 0;
    for (key, &x) in a {
        let y = b.get(key).copied().unwrap_or(0);
        shared += x.min(y);
        total += x.max(y);
    }
    total += b.iter().filter(|(key, _)| !a.contains_key(*key)).map(|(_, &y)| y).sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    shared as f64 / total as f64
}

/// Scores a candidate against a fixed target circuit.
///
/// Fidelity averages two terms. The placement term is the Jaccard similarity
/// of gate placements (parameters ignored) scaled by the mean angular
/// agreement `(1 + cos Δ) / 2` of the parameters of matching placements. The
/// usage term compares gate counts per operation and qubit set regardless of
/// column, so candidates that use the right gates in the wrong layers still
/// score above zero.
///
/// Fitness divides fidelity by `1 + depth_weight * excess`, where `excess` is
/// the depth beyond the target's. It never drops below [`MIN_FITNESS`].
pub struct StructuralTargetEvaluator {
    target: BTreeMap<Placement, Vec<f64>>,
    target_usage: BTreeMap<(String, Vec<usize>), usize>,
    target_depth: usize,
    depth_weight: f64,
}

impl StructuralTargetEvaluator {
    pub fn new(target: &Circuit) -> Self {
        Self {
            target: placements(target),
            target_usage: usage(target),
            target_depth: target.depth(),
            depth_weight: 0.0,
        }
    }

    pub fn with_depth_weight(mut self, depth_weight: f64) -> Self {
        self.depth_weight = depth_weight.max(0.0);
        self
    }

    fn placement_score(&self, candidate: &BTreeMap<Placement, Vec<f64>>) -> f64 {
        let target_keys: BTreeSet<&Placement> = self.target.keys().collect();
        let candidate_keys: BTreeSet<&Placement> = candidate.keys().collect();

        let union = target_keys.union(&candidate_keys).count();
        if union == 0 {
            return 1.0;
        }
        let shared: Vec<&Placement> = target_keys.intersection(&candidate_keys).copied().collect();
        let similarity = shared.len() as f64 / union as f64;

        let mut agreement = 0.0;
        let mut compared = 0usize;
        for key in shared {
            let (Some(want), Some(got)) = (self.target.get(key), candidate.get(key)) else {
                continue;
            };
            for (w, g) in want.iter().zip(got) {
                agreement += (1.0 + (w - g).cos()) / 2.0;
                compared += 1;
            }
        }
        let agreement = if compared == 0 {
            1.0
        } else {
            agreement / compared as f64
        };

        similarity * agreement
    }
}

impl FitnessEvaluator for StructuralTargetEvaluator {
    fn evaluate(&self, circuit: &Circuit) -> Result<Evaluation, EvaluationError> {
        if !circuit.is_well_formed() {
            return Err(EvaluationError(format!(
                "circuit of depth {} is not well formed",
                circuit.depth()
            )));
        }

        let placement = self.placement_score(&placements(circuit));
        let overlap = weighted_jaccard(&self.target_usage, &usage(circuit));
        let fidelity = ((placement + overlap) / 2.0).clamp(0.0, 1.0);

        let excess = circuit.depth().saturating_sub(self.target_depth) as f64;
        let fitness = (fidelity / (1.0 + self.depth_weight * excess)).max(MIN_FITNESS);

        Ok(Evaluation { fitness, fidelity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Gate};

    fn target() -> Circuit {
        Circuit::new(
            2,
            vec![
                Column::new(vec![Gate::new("h", vec![0]), Gate::new("x", vec![1])]),
                Column::new(vec![Gate::new("rzz", vec![0, 1]).with_parameters(vec![1.0])]),
            ],
        )
    }

    #[test]
    fn test_identical_circuit_scores_one() {
        let evaluator = StructuralTargetEvaluator::new(&target());
        let eval = evaluator.evaluate(&target()).unwrap();
        assert!((eval.fidelity - 1.0).abs() < 1e-12);
        assert!((eval.fitness - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_error_lowers_fidelity() {
        let evaluator = StructuralTargetEvaluator::new(&target());
        let mut candidate = target();
        candidate.columns_mut()[1].gates[0].parameters[0] = 1.0 + std::f64::consts::PI;
        let eval = evaluator.evaluate(&candidate).unwrap();
        // Placements and usage match, the only parameter is maximally off.
        assert!((eval.fidelity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_partial_overlap() {
        let evaluator = StructuralTargetEvaluator::new(&target());
        let candidate = Circuit::new(2, vec![Column::new(vec![Gate::new("h", vec![0])])]);
        let eval = evaluator.evaluate(&candidate).unwrap();
        assert!((eval.fidelity - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_penalty() {
        let evaluator = StructuralTargetEvaluator::new(&target()).with_depth_weight(0.5);
        let mut candidate = target();
        candidate.columns_mut().push(Column::new(vec![Gate::new("h", vec![0])]));
        candidate.columns_mut().push(Column::new(vec![Gate::new("h", vec![1])]));
        let eval = evaluator.evaluate(&candidate).unwrap();
        assert!((eval.fidelity - 0.6).abs() < 1e-12);
        assert!((eval.fitness - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_ensure_evaluated_counts_once() {
        let evaluator = CountingEvaluator::new(Arc::new(StructuralTargetEvaluator::new(&target())));
        let mut circuit = target();

        assert_eq!(ensure_evaluated(&evaluator, &mut circuit).unwrap(), 1.0);
        assert_eq!(ensure_evaluated(&evaluator, &mut circuit).unwrap(), 1.0);
        assert_eq!(evaluator.calls(), 1);
        assert!(circuit.is_evaluated());
    }

    #[test]
    fn test_wrong_layer_still_scores() {
        let evaluator = StructuralTargetEvaluator::new(&target());
        let mut shifted = target();
        shifted.columns_mut().reverse();
        let eval = evaluator.evaluate(&shifted).unwrap();
        assert!((eval.fidelity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_random_population_is_fully_evaluated() {
        use crate::evolution::factory::{CatalogGateFactory, CircuitFactory, RandomCircuitFactory};
        use crate::schema::StepSizeConfig;

        let circuits = RandomCircuitFactory::new(
            Arc::new(CatalogGateFactory::new(StepSizeConfig::default())),
            false,
        );
        let mut rng = crate::evolution::rng::EvolutionRng::new(999);
        let random_target = circuits.create_random(3, 4, 4, &mut rng).unwrap();
        let evaluator = CountingEvaluator::new(Arc::new(StructuralTargetEvaluator::new(&random_target)));

        let mut population: Vec<Circuit> = (0..12)
            .map(|_| circuits.create_random(3, 6, 2, &mut rng).unwrap())
            .collect();
        for circuit in &mut population {
            assert!(ensure_evaluated(&evaluator, circuit).unwrap() > 0.0);
        }
        assert!(population.iter().all(Circuit::is_evaluated));

        for circuit in &mut population {
            ensure_evaluated(&evaluator, circuit).unwrap();
        }
        assert_eq!(evaluator.calls(), 12);
    }

    #[test]
    fn test_malformed_circuit_is_an_error() {
        let evaluator = StructuralTargetEvaluator::new(&target());
        let bad = Circuit::new(1, vec![Column::new(vec![Gate::new("x", vec![4])])]);
        assert!(evaluator.evaluate(&bad).is_err());
    }
}
