//! Property-based tests for genomes and operators

use std::sync::Arc;

use circuit_evolution::evolution::{
    CatalogGateFactory, CircuitFactory, EvolutionRng, GateFactory, RandomCircuitFactory,
    StructuralTargetEvaluator, default_strategies, dominates, non_dominated_sort,
};
use circuit_evolution::schema::{Circuit, StepSizeConfig, jaccard_distance};
use proptest::prelude::*;

const MAX_DEPTH: usize = 8;

fn gate_factory() -> Arc<dyn GateFactory> {
    Arc::new(CatalogGateFactory::new(StepSizeConfig::default()))
}

fn random_circuit(seed: u64, qubits: usize, depth: usize, adaptive: bool) -> Circuit {
    let factory = RandomCircuitFactory::new(gate_factory(), adaptive);
    let mut rng = EvolutionRng::new(seed);
    factory
        .create_random(qubits, depth, 1, &mut rng)
        .expect("catalog factory fills every column")
}

// Generate arbitrary well-formed circuits
prop_compose! {
    fn arb_circuit()(
        seed in any::<u64>(),
        qubits in 1..=5usize,
        depth in 1..=MAX_DEPTH,
        adaptive in any::<bool>()
    ) -> Circuit {
        random_circuit(seed, qubits, depth, adaptive)
    }
}

// Generate arbitrary objective vectors
prop_compose! {
    fn arb_objectives()(
        points in prop::collection::vec((0.0..1.0f64, -20.0..0.0f64), 1..40)
    ) -> Vec<[f64; 2]> {
        points.into_iter().map(|(a, b)| [a, b]).collect()
    }
}

proptest! {
    #[test]
    fn prop_generated_circuits_are_well_formed(circuit in arb_circuit()) {
        prop_assert!(circuit.is_well_formed());
        prop_assert!(circuit.depth() >= 1 && circuit.depth() <= MAX_DEPTH);
    }

    #[test]
    fn prop_fingerprint_is_stable(circuit in arb_circuit()) {
        let first = circuit.structural_representation().clone();
        prop_assert_eq!(&first, circuit.structural_representation());
        let copy = circuit.clone();
        prop_assert_eq!(&first, copy.structural_representation());
    }

    #[test]
    fn prop_jaccard_is_a_bounded_symmetric_distance(a in arb_circuit(), b in arb_circuit()) {
        let (fa, fb) = (a.structural_representation(), b.structural_representation());
        let d = jaccard_distance(fa, fb);
        prop_assert!((0.0..=1.0).contains(&d));
        prop_assert_eq!(d, jaccard_distance(fb, fa));
        prop_assert_eq!(jaccard_distance(fa, fa), 0.0);
    }

    #[test]
    fn prop_mutations_keep_circuits_well_formed(
        circuit in arb_circuit(),
        target in arb_circuit(),
        seed in any::<u64>()
    ) {
        let evaluator = Arc::new(StructuralTargetEvaluator::new(&target));
        let strategies = default_strategies(gate_factory(), evaluator, MAX_DEPTH, true, false);
        let mut rng = EvolutionRng::new(seed);

        for strategy in &strategies {
            let mut mutant = circuit.clone();
            if !strategy.can_apply(&mutant) {
                continue;
            }
            strategy.mutate(&mut mutant, &mut rng).unwrap();
            prop_assert!(mutant.is_well_formed(), "{} broke the circuit", strategy.name());
            prop_assert!(mutant.depth() >= 1 && mutant.depth() <= MAX_DEPTH);
        }
    }

    #[test]
    fn prop_fronts_partition_and_respect_dominance(objectives in arb_objectives()) {
        let fronts = non_dominated_sort(&objectives);

        let mut seen: Vec<usize> = fronts.iter().flatten().copied().collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..objectives.len()).collect::<Vec<_>>());

        for (rank, front) in fronts.iter().enumerate() {
            for &p in front {
                for later in &fronts[..rank] {
                    let dominated_by_earlier = later.iter().any(|&q| dominates(&objectives[q], &objectives[p]));
                    prop_assert!(rank == 0 || dominated_by_earlier);
                }
                for &q in front {
                    prop_assert!(!dominates(&objectives[q], &objectives[p]));
                }
            }
        }
    }
}
