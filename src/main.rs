//! Circuit Evolution CLI - Run experiments from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use circuit_evolution::{
    evolution::ExperimentRunner,
    schema::{ExperimentFile, PhaseConfig, SurvivorSelectionKind},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <experiment.json> [seed]", args[0]);
        eprintln!();
        eprintln!("Evolve circuits towards a generated target circuit.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  experiment.json  Path to experiment configuration file");
        eprintln!("  seed             Overrides the configured random seed");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut file: ExperimentFile = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(seed) = args.get(2) {
        let seed: u64 = seed.parse().unwrap_or_else(|e| {
            eprintln!("Invalid seed '{}': {}", seed, e);
            std::process::exit(1);
        });
        file.evolution.random_seed = Some(seed);
    }

    println!("Circuit Evolution");
    println!("=================");
    println!(
        "Qubits: {}, depth {}..={}",
        file.evolution.circuit.qubit_count,
        file.evolution.circuit.min_depth,
        file.evolution.circuit.max_depth
    );
    println!("Population: {}", file.evolution.population.size);
    println!("Phases: {}", file.evolution.phases.len());
    println!(
        "Target: depth {} (seed {})",
        file.target.depth, file.target.seed
    );
    println!();

    let runner = ExperimentRunner::from_file(file).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let result = runner.run().unwrap_or_else(|e| {
        eprintln!("Experiment failed: {}", e);
        std::process::exit(1);
    });

    for phase in &result.phases {
        println!(
            "  Phase {}: {:?} after {} generations, {} evaluations, best={:.4} fidelity={:.4}",
            phase.phase,
            phase.stop_reason,
            phase.generations,
            phase.evaluations,
            phase.best_fitness,
            phase.best_fidelity
        );
    }
    println!();
    println!("Seed: {}", result.seed);
    println!(
        "Best: fitness={:.4} fidelity={:.4} depth={}",
        result.best_fitness(),
        result.best_fidelity(),
        result.best.depth()
    );
    println!("Time: {:.2}s", result.elapsed_seconds);

    let result_path = config_path.with_extension("result.json");
    let json = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
        eprintln!("Error serializing result: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = fs::write(&result_path, json) {
        eprintln!("Error writing {}: {}", result_path.display(), e);
        std::process::exit(1);
    }
    println!("Result written to {}", result_path.display());
}

fn print_example_config() {
    let mut file = ExperimentFile::default();
    file.evolution.random_seed = Some(42);
    file.evolution.phases = vec![
        PhaseConfig {
            generations: 50,
            ..PhaseConfig::default()
        },
        PhaseConfig {
            generations: 50,
            use_step_size: true,
            use_adaptive_rates: true,
            use_bandit_mutation: true,
            use_fitness_sharing: true,
            survivor_selection: SurvivorSelectionKind::Nsga2,
            resume_from_checkpoint: true,
            fidelity_threshold_stop: Some(0.99),
            ..PhaseConfig::default()
        },
    ];
    println!(
        "{}",
        serde_json::to_string_pretty(&file).unwrap_or_else(|e| {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        })
    );
}
