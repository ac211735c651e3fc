//! Mutation strategies and population-level mutation operators.
//!
//! A [`MutationStrategy`] edits one circuit in place and always goes through
//! [`Circuit::columns_mut`], so the fingerprint and the scores are reset on
//! every edit. A [`MutationOperator`] decides per individual whether to
//! mutate and which applicable strategy to use.

use std::f64::consts::TAU;
use std::sync::Arc;

use log::trace;

use crate::schema::Circuit;

use super::bandit::BanditStats;
use super::error::{GateFactoryError, Result};
use super::factory::{GateFactory, fill_column};
use super::fitness::{FitnessEvaluator, ensure_evaluated};
use super::population::Population;
use super::rng::EvolutionRng;

/// Spread used for parameters without adaptive state.
pub const FALLBACK_SIGMA: f64 = 0.1;

/// One way of editing a circuit.
pub trait MutationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether [`mutate`](Self::mutate) has something to act on.
    fn can_apply(&self, circuit: &Circuit) -> bool;

    /// Edit `circuit` in place. Only called when `can_apply` holds.
    fn mutate(&self, circuit: &mut Circuit, rng: &mut EvolutionRng) -> Result<()>;
}

// ============================================================================
// Strategies
// ============================================================================

/// Swap two distinct columns.
pub struct SwapColumns;

impl MutationStrategy for SwapColumns {
    fn name(&self) -> &'static str {
        "swap_columns"
    }

    fn can_apply(&self, circuit: &Circuit) -> bool {
        circuit.depth() > 1
    }

    fn mutate(&self, circuit: &mut Circuit, rng: &mut EvolutionRng) -> Result<()> {
        let picked = rng.sample_indices(circuit.depth(), 2);
        circuit.columns_mut().swap(picked[0], picked[1]);
        Ok(())
    }
}

/// Replace one gate by a fresh one on the same qubits.
pub struct SingleGateFlip {
    factory: Arc<dyn GateFactory>,
    adaptive: bool,
}

impl SingleGateFlip {
    pub fn new(factory: Arc<dyn GateFactory>, adaptive: bool) -> Self {
        Self { factory, adaptive }
    }
}

impl MutationStrategy for SingleGateFlip {
    fn name(&self) -> &'static str {
        "single_gate_flip"
    }

    fn can_apply(&self, circuit: &Circuit) -> bool {
        circuit.columns().iter().any(|col| !col.is_empty())
    }

    fn mutate(&self, circuit: &mut Circuit, rng: &mut EvolutionRng) -> Result<()> {
        let non_empty: Vec<usize> = circuit
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, col)| !col.is_empty())
            .map(|(i, _)| i)
            .collect();
        let column = non_empty[rng.index(non_empty.len())];
        let gate_idx = rng.index(circuit.columns()[column].len());

        let gates = &mut circuit.columns_mut()[column].gates;
        let removed = gates.remove(gate_idx);
        match self.factory.build_gate(&removed.qubits, self.adaptive, rng) {
            Ok(gate) => gates.push(gate),
            // Nothing else fits here; keep the original gate.
            Err(GateFactoryError::Exhausted { .. }) => gates.push(removed),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Add or remove columns by a rounded standard-normal amount.
pub struct ChangeDepth {
    factory: Arc<dyn GateFactory>,
    max_depth: usize,
    adaptive: bool,
    pad_with_identity: bool,
}

impl ChangeDepth {
    pub fn new(factory: Arc<dyn GateFactory>, max_depth: usize, adaptive: bool) -> Self {
        Self {
            factory,
            max_depth,
            adaptive,
            pad_with_identity: false,
        }
    }

    pub fn with_identity_padding(mut self, pad: bool) -> Self {
        self.pad_with_identity = pad;
        self
    }

    /// Signed depth change: ceil or floor of a normal draw, never zero.
    fn draw_change(rng: &mut EvolutionRng) -> i64 {
        let draw = rng.standard_normal();
        let change = if rng.coin() { draw.ceil() } else { draw.floor() } as i64;
        if change != 0 {
            change
        } else if rng.coin() {
            1
        } else {
            -1
        }
    }
}

impl MutationStrategy for ChangeDepth {
    fn name(&self) -> &'static str {
        "change_depth"
    }

    fn can_apply(&self, _circuit: &Circuit) -> bool {
        true
    }

    fn mutate(&self, circuit: &mut Circuit, rng: &mut EvolutionRng) -> Result<()> {
        let depth = circuit.depth() as i64;
        let target = (depth + Self::draw_change(rng)).clamp(1, self.max_depth.max(1) as i64);

        if target < depth {
            for _ in 0..(depth - target) {
                let len = circuit.depth();
                let victim = rng.index(len);
                circuit.columns_mut().remove(victim);
            }
        } else if target > depth {
            for _ in 0..(target - depth) {
                let column = fill_column(
                    self.factory.as_ref(),
                    circuit.qubit_count,
                    self.adaptive,
                    self.pad_with_identity,
                    rng,
                )?;
                circuit.columns_mut().push(column);
            }
        }
        Ok(())
    }
}

/// Gaussian perturbation of one gate parameter.
///
/// Parameters carrying a [`StepSize`](crate::schema::StepSize) use its sigma
/// and feed back whether the perturbation improved fitness. This needs an
/// evaluation before and after the edit; the post-edit scores stay recorded
/// on the circuit.
pub struct GateParameter {
    evaluator: Arc<dyn FitnessEvaluator>,
}

impl GateParameter {
    pub fn new(evaluator: Arc<dyn FitnessEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl MutationStrategy for GateParameter {
    fn name(&self) -> &'static str {
        "gate_parameter"
    }

    fn can_apply(&self, circuit: &Circuit) -> bool {
        circuit.gates().any(|(_, g)| !g.parameters.is_empty())
    }

    fn mutate(&self, circuit: &mut Circuit, rng: &mut EvolutionRng) -> Result<()> {
        let slots: Vec<(usize, usize, usize)> = circuit
            .columns()
            .iter()
            .enumerate()
            .flat_map(|(c, col)| {
                col.gates.iter().enumerate().flat_map(move |(g, gate)| {
                    (0..gate.parameters.len()).map(move |p| (c, g, p))
                })
            })
            .collect();
        let (c, g, p) = slots[rng.index(slots.len())];

        let gate = &circuit.columns()[c].gates[g];
        let adaptive = p < gate.step_sizes.len();
        let sigma = gate
            .step_sizes
            .get(p)
            .map_or(FALLBACK_SIGMA, |step| step.sigma);

        let before = if adaptive {
            Some(ensure_evaluated(self.evaluator.as_ref(), circuit)?)
        } else {
            None
        };

        let change = rng.gaussian(sigma);
        let param = &mut circuit.columns_mut()[c].gates[g].parameters[p];
        *param = (*param + change).rem_euclid(TAU);

        if let Some(before) = before {
            let after = ensure_evaluated(self.evaluator.as_ref(), circuit)?;
            let success = after > before;
            if let Some(step) = circuit.step_size_mut(c, g, p) {
                step.record(success);
                trace!("step size now {:.6} (success: {})", step.sigma, success);
            }
        }
        Ok(())
    }
}

/// Exchange one control qubit with one target qubit of a controlled gate.
pub struct SwapControlTarget;

impl MutationStrategy for SwapControlTarget {
    fn name(&self) -> &'static str {
        "swap_control_target"
    }

    fn can_apply(&self, circuit: &Circuit) -> bool {
        circuit
            .gates()
            .any(|(_, g)| g.extra_controls > 0 && g.qubits.len() > g.extra_controls)
    }

    fn mutate(&self, circuit: &mut Circuit, rng: &mut EvolutionRng) -> Result<()> {
        let candidates: Vec<(usize, usize)> = circuit
            .columns()
            .iter()
            .enumerate()
            .flat_map(|(c, col)| {
                col.gates
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| g.extra_controls > 0 && g.qubits.len() > g.extra_controls)
                    .map(move |(g, _)| (c, g))
            })
            .collect();
        let (c, g) = candidates[rng.index(candidates.len())];

        let gate = &mut circuit.columns_mut()[c].gates[g];
        let control = rng.index(gate.extra_controls);
        let target = gate.extra_controls + rng.index(gate.qubits.len() - gate.extra_controls);
        gate.qubits.swap(control, target);
        Ok(())
    }
}

/// The five built-in strategies in registration order.
pub fn default_strategies(
    factory: Arc<dyn GateFactory>,
    evaluator: Arc<dyn FitnessEvaluator>,
    max_depth: usize,
    adaptive: bool,
    pad_with_identity: bool,
) -> Vec<Box<dyn MutationStrategy>> {
    vec![
        Box::new(SwapColumns),
        Box::new(SingleGateFlip::new(factory.clone(), adaptive)),
        Box::new(
            ChangeDepth::new(factory, max_depth, adaptive).with_identity_padding(pad_with_identity),
        ),
        Box::new(GateParameter::new(evaluator)),
        Box::new(SwapControlTarget),
    ]
}

fn applicable(strategies: &[Box<dyn MutationStrategy>], circuit: &Circuit) -> Vec<usize> {
    strategies
        .iter()
        .enumerate()
        .filter(|(_, s)| s.can_apply(circuit))
        .map(|(i, _)| i)
        .collect()
}

// ============================================================================
// Operators
// ============================================================================

/// Applies mutation to a whole population.
pub trait MutationOperator: Send {
    /// Mutate each individual with probability `rate`, using exactly one
    /// applicable strategy.
    fn mutate(
        &mut self,
        population: Population,
        rate: f64,
        rng: &mut EvolutionRng,
    ) -> Result<Population>;
}

/// Uniform choice among applicable strategies.
pub struct RandomMutation {
    strategies: Vec<Box<dyn MutationStrategy>>,
}

impl RandomMutation {
    pub fn new(strategies: Vec<Box<dyn MutationStrategy>>) -> Self {
        Self { strategies }
    }
}

impl MutationOperator for RandomMutation {
    fn mutate(
        &mut self,
        population: Population,
        rate: f64,
        rng: &mut EvolutionRng,
    ) -> Result<Population> {
        let mut mutated = Vec::with_capacity(population.len());
        for mut circuit in population {
            if rng.chance(rate) {
                let options = applicable(&self.strategies, &circuit);
                if !options.is_empty() {
                    let strategy = &self.strategies[options[rng.index(options.len())]];
                    strategy.mutate(&mut circuit, rng)?;
                }
            }
            mutated.push(circuit);
        }
        Ok(Population::new(mutated))
    }
}

/// UCB1 choice among applicable strategies, rewarded by fitness gain.
pub struct BanditMutation {
    strategies: Vec<Box<dyn MutationStrategy>>,
    evaluator: Arc<dyn FitnessEvaluator>,
    stats: BanditStats,
}

impl BanditMutation {
    pub fn new(
        strategies: Vec<Box<dyn MutationStrategy>>,
        evaluator: Arc<dyn FitnessEvaluator>,
    ) -> Self {
        let stats = BanditStats::new(strategies.len());
        Self {
            strategies,
            evaluator,
            stats,
        }
    }

    pub fn stats(&self) -> &BanditStats {
        &self.stats
    }
}

impl MutationOperator for BanditMutation {
    fn mutate(
        &mut self,
        population: Population,
        rate: f64,
        rng: &mut EvolutionRng,
    ) -> Result<Population> {
        let mut mutated = Vec::with_capacity(population.len());
        for mut circuit in population {
            if rng.chance(rate) {
                let arm = self.stats.select(&applicable(&self.strategies, &circuit))?;
                let strategy = &self.strategies[arm];

                let before = ensure_evaluated(self.evaluator.as_ref(), &mut circuit)?;
                strategy.mutate(&mut circuit, rng)?;
                let after = ensure_evaluated(self.evaluator.as_ref(), &mut circuit)?;

                trace!("{} reward {:.6}", strategy.name(), after - before);
                self.stats.record(arm, after - before);
            }
            mutated.push(circuit);
        }
        Ok(Population::new(mutated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::factory::CatalogGateFactory;
    use crate::evolution::fitness::{CountingEvaluator, StructuralTargetEvaluator};
    use crate::schema::{Column, Gate, StepSize, StepSizeConfig};

    fn gate_factory() -> Arc<dyn GateFactory> {
        Arc::new(CatalogGateFactory::new(StepSizeConfig::default()))
    }

    fn sample() -> Circuit {
        Circuit::new(
            4,
            vec![
                Column::new(vec![
                    Gate::new("rx", vec![0]).with_parameters(vec![0.5]),
                    Gate::new("swap", vec![3, 1, 2]).with_extra_controls(1),
                ]),
                Column::new(vec![Gate::new("h", vec![1])]),
                Column::new(vec![]),
            ],
        )
    }

    #[test]
    fn test_sample_is_well_formed() {
        assert!(sample().is_well_formed());
    }

    #[test]
    fn test_swap_columns() {
        let mut circuit = sample();
        let before = circuit.columns().to_vec();
        let mut rng = EvolutionRng::new(0);
        SwapColumns.mutate(&mut circuit, &mut rng).unwrap();

        assert_ne!(circuit.columns(), &before[..]);
        let mut after = circuit.columns().to_vec();
        after.sort_by_key(|c| c.len());
        let mut expected = before;
        expected.sort_by_key(|c| c.len());
        assert_eq!(after, expected);
        assert!(!SwapColumns.can_apply(&Circuit::new(1, vec![Column::default()])));
    }

    #[test]
    fn test_single_gate_flip_keeps_qubits() {
        let strategy = SingleGateFlip::new(gate_factory(), false);
        let mut rng = EvolutionRng::new(3);
        for _ in 0..20 {
            let mut circuit = sample();
            circuit.record_evaluation(0.5, 0.5);
            strategy.mutate(&mut circuit, &mut rng).unwrap();
            assert!(circuit.is_well_formed());
            assert!(!circuit.is_evaluated());
            assert_eq!(circuit.columns()[2].len(), 0);
        }
        assert!(!strategy.can_apply(&Circuit::new(2, vec![Column::default()])));
    }

    #[test]
    fn test_change_depth_stays_in_bounds() {
        let strategy = ChangeDepth::new(gate_factory(), 4, false);
        let mut rng = EvolutionRng::new(5);
        let mut circuit = sample();
        for _ in 0..50 {
            let depth = circuit.depth();
            strategy.mutate(&mut circuit, &mut rng).unwrap();
            assert!((1..=4).contains(&circuit.depth()));
            assert!(circuit.is_well_formed());
            // Only a clamped change can leave the depth unchanged.
            if circuit.depth() == depth {
                assert!(depth == 1 || depth == 4);
            }
        }
    }

    #[test]
    fn test_gate_parameter_wraps_and_adapts() {
        let target = sample();
        let evaluator = Arc::new(CountingEvaluator::new(Arc::new(
            StructuralTargetEvaluator::new(&target),
        )));
        let strategy = GateParameter::new(evaluator.clone());
        let mut rng = EvolutionRng::new(7);

        let mut circuit = sample();
        circuit.columns_mut()[0].gates[0].step_sizes = vec![StepSize::new(3.0, 0.5, 5)];
        strategy.mutate(&mut circuit, &mut rng).unwrap();

        let gate = &circuit.columns()[0].gates[0];
        assert!((0.0..TAU).contains(&gate.parameters[0]));
        // Moving away from a perfect match is never a success.
        assert_eq!(gate.step_sizes[0].history().collect::<Vec<_>>(), vec![false]);
        assert!((gate.step_sizes[0].sigma - 1.5).abs() < 1e-12);
        assert!(circuit.is_evaluated());
        assert_eq!(evaluator.calls(), 2);
    }

    #[test]
    fn test_gate_parameter_without_state() {
        let evaluator = Arc::new(CountingEvaluator::new(Arc::new(
            StructuralTargetEvaluator::new(&sample()),
        )));
        let strategy = GateParameter::new(evaluator.clone());
        let mut rng = EvolutionRng::new(8);
        let mut circuit = sample();
        strategy.mutate(&mut circuit, &mut rng).unwrap();
        assert_eq!(evaluator.calls(), 0);
        assert!(!circuit.is_evaluated());
        assert!(!strategy.can_apply(&Circuit::new(1, vec![Column::new(vec![Gate::new("h", vec![0])])])));
    }

    #[test]
    fn test_swap_control_target() {
        let mut circuit = sample();
        let mut rng = EvolutionRng::new(2);
        SwapControlTarget.mutate(&mut circuit, &mut rng).unwrap();
        let qubits = &circuit.columns()[0].gates[1].qubits;
        assert_ne!(qubits[0], 3);
        let mut sorted = qubits.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3]);
        assert!(circuit.is_well_formed());
    }

    #[test]
    fn test_random_mutation_rate_zero_is_identity() {
        let evaluator: Arc<dyn FitnessEvaluator> =
            Arc::new(StructuralTargetEvaluator::new(&sample()));
        let mut operator =
            RandomMutation::new(default_strategies(gate_factory(), evaluator, 5, false, false));
        let mut rng = EvolutionRng::new(1);
        let population = Population::new(vec![sample(), sample()]);
        let out = operator.mutate(population, 0.0, &mut rng).unwrap();
        assert!(out.iter().all(|c| *c == sample()));
    }

    #[test]
    fn test_bandit_mutation_records_every_pull() {
        let evaluator: Arc<dyn FitnessEvaluator> =
            Arc::new(StructuralTargetEvaluator::new(&sample()));
        let mut operator = BanditMutation::new(
            default_strategies(gate_factory(), evaluator.clone(), 5, false, false),
            evaluator,
        );
        let mut rng = EvolutionRng::new(4);
        let population: Population = (0..8).map(|_| sample()).collect();
        let out = operator.mutate(population, 1.0, &mut rng).unwrap();

        assert_eq!(out.len(), 8);
        assert_eq!(operator.stats().total_pulls(), 8);
        // Every arm applies to the sample, so the first five pulls explore.
        for arm in 0..5 {
            assert!(operator.stats().pulls(arm) >= 1);
        }
    }

    #[test]
    fn test_bandit_without_strategies_fails() {
        let evaluator: Arc<dyn FitnessEvaluator> =
            Arc::new(StructuralTargetEvaluator::new(&sample()));
        let mut operator = BanditMutation::new(Vec::new(), evaluator);
        let mut rng = EvolutionRng::new(4);
        let result = operator.mutate(Population::new(vec![sample()]), 1.0, &mut rng);
        assert!(matches!(
            result,
            Err(crate::evolution::error::EvolutionError::NoApplicableMutation)
        ));
    }
}
