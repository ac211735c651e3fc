//! Crossover operators and the pairing runner.

use rand::seq::SliceRandom;

use crate::schema::{Circuit, Column, CrossoverKind};

use super::population::Population;
use super::rng::EvolutionRng;

/// Recombines two parents into two children.
pub trait CrossoverStrategy: Send + Sync {
    fn cross(&self, p1: &Circuit, p2: &Circuit, rng: &mut EvolutionRng) -> (Circuit, Circuit);
}

/// Build the crossover strategy for a phase.
pub fn crossover_strategy(kind: CrossoverKind) -> Box<dyn CrossoverStrategy> {
    match kind {
        CrossoverKind::MultiPoint => Box::new(MultiPointCrossover),
        CrossoverKind::SinglePoint => Box::new(SinglePointCrossover),
        CrossoverKind::Blockwise => Box::new(BlockwiseCrossover),
    }
}

fn child(p1: &Circuit, p2: &Circuit, columns: Vec<Column>) -> Circuit {
    Circuit::new(p1.qubit_count.max(p2.qubit_count), columns)
}

fn copies(p1: &Circuit, p2: &Circuit) -> (Circuit, Circuit) {
    (
        child(p1, p2, p1.columns().to_vec()),
        child(p1, p2, p2.columns().to_vec()),
    )
}

/// Columns of the deeper parent past the shallower parent's depth.
fn tail<'a>(p1: &'a Circuit, p2: &'a Circuit) -> &'a [Column] {
    let shared = p1.depth().min(p2.depth());
    if p1.depth() > shared {
        &p1.columns()[shared..]
    } else {
        &p2.columns()[shared..]
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Per-column uniform exchange.
///
/// For every shared column a coin decides whether the children keep their
/// own parent's column (`false`) or swap (`true`). The deeper parent's extra
/// columns are appended to both children.
pub struct MultiPointCrossover;

impl MultiPointCrossover {
    /// Crossover driven by an explicit coin source.
    pub fn cross_with_coins(
        &self,
        p1: &Circuit,
        p2: &Circuit,
        mut coin: impl FnMut() -> bool,
    ) -> (Circuit, Circuit) {
        let shared = p1.depth().min(p2.depth());
        let mut c1 = Vec::with_capacity(p1.depth().max(p2.depth()));
        let mut c2 = Vec::with_capacity(c1.capacity());

        for (a, b) in p1.columns()[..shared].iter().zip(&p2.columns()[..shared]) {
            if coin() {
                c1.push(b.clone());
                c2.push(a.clone());
            } else {
                c1.push(a.clone());
                c2.push(b.clone());
            }
        }

        let rest = tail(p1, p2);
        c1.extend_from_slice(rest);
        c2.extend_from_slice(rest);

        (child(p1, p2, c1), child(p1, p2, c2))
    }
}

impl CrossoverStrategy for MultiPointCrossover {
    fn cross(&self, p1: &Circuit, p2: &Circuit, rng: &mut EvolutionRng) -> (Circuit, Circuit) {
        self.cross_with_coins(p1, p2, || rng.coin())
    }
}

/// Exchange of tails after one cut point.
pub struct SinglePointCrossover;

impl CrossoverStrategy for SinglePointCrossover {
    fn cross(&self, p1: &Circuit, p2: &Circuit, rng: &mut EvolutionRng) -> (Circuit, Circuit) {
        let shared = p1.depth().min(p2.depth());
        if shared <= 2 {
            return copies(p1, p2);
        }
        let point = 1 + rng.index(shared - 2);

        let mut c1 = p1.columns()[..point].to_vec();
        c1.extend_from_slice(&p2.columns()[point..]);
        let mut c2 = p2.columns()[..point].to_vec();
        c2.extend_from_slice(&p1.columns()[point..]);

        (child(p1, p2, c1), child(p1, p2, c2))
    }
}

/// Two-dimensional exchange over a column cut and a qubit cut.
///
/// Columns before the column cut come from the respective parent. From the
/// cut on, child 1 takes the gates of p1 lying entirely below the qubit cut
/// and the gates of p2 lying entirely at or above it; child 2 the mirror.
/// Gates straddling the qubit cut are dropped.
pub struct BlockwiseCrossover;

impl BlockwiseCrossover {
    fn blend(low: &Column, high: &Column, cut: usize) -> Column {
        let below = low
            .gates
            .iter()
            .filter(|g| g.qubits.iter().all(|&q| q < cut));
        let above = high
            .gates
            .iter()
            .filter(|g| g.qubits.iter().all(|&q| q >= cut));
        Column::new(below.chain(above).cloned().collect())
    }
}

impl CrossoverStrategy for BlockwiseCrossover {
    fn cross(&self, p1: &Circuit, p2: &Circuit, rng: &mut EvolutionRng) -> (Circuit, Circuit) {
        let shared = p1.depth().min(p2.depth());
        let qubits = p1.qubit_count.max(p2.qubit_count);
        if shared < 2 || qubits < 2 {
            return copies(p1, p2);
        }
        let column_cut = 1 + rng.index(shared - 1);
        let qubit_cut = 1 + rng.index(qubits - 1);

        let mut c1 = p1.columns()[..column_cut].to_vec();
        let mut c2 = p2.columns()[..column_cut].to_vec();
        for i in column_cut..shared {
            let (a, b) = (&p1.columns()[i], &p2.columns()[i]);
            c1.push(Self::blend(a, b, qubit_cut));
            c2.push(Self::blend(b, a, qubit_cut));
        }
        c1.extend_from_slice(&p1.columns()[shared..]);
        c2.extend_from_slice(&p2.columns()[shared..]);

        (child(p1, p2, c1), child(p1, p2, c2))
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Shuffles parents, pairs neighbours and recombines each pair with
/// probability `rate`. Failed pairs and an odd trailing parent pass through
/// as clones.
pub struct CrossoverRunner {
    strategy: Box<dyn CrossoverStrategy>,
}

impl CrossoverRunner {
    pub fn new(strategy: Box<dyn CrossoverStrategy>) -> Self {
        Self { strategy }
    }

    pub fn run(&self, parents: Population, rate: f64, rng: &mut EvolutionRng) -> Population {
        let mut parents = parents.into_individuals();
        parents.shuffle(rng);

        let mut offspring = Vec::with_capacity(parents.len());
        let mut pairs = parents.chunks_exact(2);
        for pair in &mut pairs {
            if rng.chance(rate) {
                let (c1, c2) = self.strategy.cross(&pair[0], &pair[1], rng);
                offspring.push(c1);
                offspring.push(c2);
            } else {
                offspring.extend_from_slice(pair);
            }
        }
        offspring.extend_from_slice(pairs.remainder());

        Population::new(offspring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Gate;

    fn layered(op: &str, qubits: usize, depth: usize) -> Circuit {
        let columns = (0..depth)
            .map(|c| {
                Column::new(
                    (0..qubits)
                        .map(|q| Gate::new(op, vec![q]).with_parameters(vec![c as f64]))
                        .collect(),
                )
            })
            .collect();
        Circuit::new(qubits, columns)
    }

    #[test]
    fn test_multi_point_all_zero_coins() {
        let p1 = layered("rx", 2, 3);
        let p2 = layered("ry", 2, 5);

        let (c1, c2) = MultiPointCrossover.cross_with_coins(&p1, &p2, || false);

        assert_eq!(c1.depth(), 5);
        assert_eq!(c2.depth(), 5);
        assert_eq!(&c1.columns()[..3], p1.columns());
        assert_eq!(&c2.columns()[..3], &p2.columns()[..3]);
        assert_eq!(&c1.columns()[3..], &p2.columns()[3..]);
        assert_eq!(&c2.columns()[3..], &p2.columns()[3..]);
        assert!(!c1.is_evaluated());
    }

    #[test]
    fn test_multi_point_all_one_coins_swaps() {
        let p1 = layered("rx", 2, 2);
        let p2 = layered("ry", 2, 2);
        let (c1, c2) = MultiPointCrossover.cross_with_coins(&p1, &p2, || true);
        assert_eq!(c1, p2);
        assert_eq!(c2, p1);
    }

    #[test]
    fn test_single_point_shallow_parents_copy() {
        let p1 = layered("rx", 2, 2);
        let p2 = layered("ry", 2, 4);
        let mut rng = EvolutionRng::new(0);
        let (c1, c2) = SinglePointCrossover.cross(&p1, &p2, &mut rng);
        assert_eq!(c1, p1);
        assert_eq!(c2, p2);
    }

    #[test]
    fn test_single_point_exchanges_tails() {
        let p1 = layered("rx", 1, 6);
        let p2 = layered("ry", 1, 6);
        let mut rng = EvolutionRng::new(4);
        for _ in 0..20 {
            let (c1, c2) = SinglePointCrossover.cross(&p1, &p2, &mut rng);
            let cut = c1
                .columns()
                .iter()
                .position(|col| col.gates[0].op == "ry")
                .unwrap();
            assert!((1..5).contains(&cut));
            assert!(c1.columns()[cut..].iter().all(|col| col.gates[0].op == "ry"));
            assert!(c2.columns()[..cut].iter().all(|col| col.gates[0].op == "ry"));
        }
    }

    #[test]
    fn test_blockwise_children_well_formed() {
        let mut p1 = layered("rx", 4, 4);
        p1.columns_mut()[3] = Column::new(vec![Gate::new("swap", vec![0, 3])]);
        let p2 = layered("ry", 4, 6);
        let mut rng = EvolutionRng::new(8);

        for _ in 0..30 {
            let (c1, c2) = BlockwiseCrossover.cross(&p1, &p2, &mut rng);
            assert!(c1.is_well_formed());
            assert!(c2.is_well_formed());
            assert_eq!(c1.depth(), 4);
            assert_eq!(c2.depth(), 6);
            assert_eq!(c1.columns()[0], p1.columns()[0]);
            // The straddling swap never survives.
            assert!(c1.gates().all(|(_, g)| g.op != "swap"));
        }
    }

    #[test]
    fn test_runner_passes_through_at_zero_rate() {
        let parents = Population::new(vec![
            layered("rx", 1, 1),
            layered("ry", 1, 1),
            layered("rz", 1, 1),
        ]);
        let runner = CrossoverRunner::new(crossover_strategy(CrossoverKind::MultiPoint));
        let mut rng = EvolutionRng::new(5);
        let offspring = runner.run(parents, 0.0, &mut rng);

        let mut ops: Vec<String> = offspring
            .iter()
            .map(|c| c.columns()[0].gates[0].op.clone())
            .collect();
        ops.sort();
        assert_eq!(ops, vec!["rx", "ry", "rz"]);
    }

    #[test]
    fn test_runner_keeps_size() {
        let parents: Population = (0..9).map(|d| layered("rx", 2, d + 1)).collect();
        let runner = CrossoverRunner::new(crossover_strategy(CrossoverKind::Blockwise));
        let mut rng = EvolutionRng::new(6);
        assert_eq!(runner.run(parents, 1.0, &mut rng).len(), 9);
    }
}
