//! Genome types: gates, columns and circuits, plus structural fingerprints.
//!
//! A [`Circuit`] is a sequence of [`Column`]s; each column holds gates acting
//! concurrently on disjoint qubits. The circuit owns a lazily built
//! [`Fingerprint`] that every mutation path invalidates through
//! [`Circuit::columns_mut`].

use std::cell::OnceCell;
use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Decimal digits kept when parameters enter a fingerprint.
pub const FINGERPRINT_PRECISION: i32 = 6;

// ============================================================================
// Step size
// ============================================================================

/// Self-adaptive mutation spread for one continuous gate parameter.
///
/// Keeps a bounded window of 0/1 outcomes and rescales `sigma` with the
/// generalized 1-in-N success rule after every recorded outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSize {
    /// Current spread of the Gaussian perturbation.
    pub sigma: f64,
    /// Shrink/grow factor in (0, 1).
    pub c: f64,
    /// Length of the success window.
    pub window: usize,
    #[serde(default)]
    history: VecDeque<u8>,
}

impl StepSize {
    pub fn new(sigma: f64, c: f64, window: usize) -> Self {
        Self {
            sigma,
            c,
            window: window.max(1),
            history: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Build a step size with a pre-filled history (oldest first).
    pub fn with_history(sigma: f64, c: f64, window: usize, history: &[bool]) -> Self {
        let mut step = Self::new(sigma, c, window);
        for &hit in history {
            step.push_outcome(hit);
        }
        step
    }

    /// Recorded outcomes, oldest first.
    pub fn history(&self) -> impl Iterator<Item = bool> + '_ {
        self.history.iter().map(|&h| h == 1)
    }

    /// Fraction of successes in the window (0.0 when empty).
    pub fn success_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let hits: u32 = self.history.iter().map(|&h| h as u32).sum();
        hits as f64 / self.history.len() as f64
    }

    /// Record an outcome and rescale sigma.
    pub fn record(&mut self, success: bool) {
        self.push_outcome(success);

        let threshold = 1.0 / self.window as f64;
        let rate = self.success_rate();
        if rate > threshold {
            self.sigma /= self.c;
        } else if rate < threshold {
            self.sigma *= self.c;
        }
    }

    fn push_outcome(&mut self, success: bool) {
        self.history.push_back(success as u8);
        while self.history.len() > self.window {
            self.history.pop_front();
        }
    }
}

// ============================================================================
// Gates and columns
// ============================================================================

/// One operation of a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// Operation kind, resolved by the evaluator (e.g. `"rx"`, `"swap"`).
    pub op: String,
    /// Affected qubits. The first `extra_controls` entries are controls.
    pub qubits: Vec<usize>,
    /// Continuous parameters (angles).
    #[serde(default)]
    pub parameters: Vec<f64>,
    /// Adaptive spread per parameter; empty when adaptation is disabled.
    #[serde(default)]
    pub step_sizes: Vec<StepSize>,
    /// Controls appended beyond the operation's minimal arity.
    #[serde(default)]
    pub extra_controls: usize,
    /// Whether the inverse of the operation is applied.
    #[serde(default)]
    pub inverted: bool,
}

impl Gate {
    /// A parameterless gate on the given qubits.
    pub fn new(op: impl Into<String>, qubits: Vec<usize>) -> Self {
        Self {
            op: op.into(),
            qubits,
            parameters: Vec::new(),
            step_sizes: Vec::new(),
            extra_controls: 0,
            inverted: false,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<f64>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_step_sizes(mut self, step_sizes: Vec<StepSize>) -> Self {
        self.step_sizes = step_sizes;
        self
    }

    pub fn with_extra_controls(mut self, extra_controls: usize) -> Self {
        self.extra_controls = extra_controls;
        self
    }

    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Whether the gate touches any qubit in `qubits`.
    pub fn overlaps(&self, qubits: &[usize]) -> bool {
        self.qubits.iter().any(|q| qubits.contains(q))
    }

    /// Canonical fingerprint element for this gate at `column`.
    pub fn gene_key(&self, column: usize) -> GeneKey {
        let mut qubits = self.qubits.clone();
        qubits.sort_unstable();
        let scale = 10f64.powi(FINGERPRINT_PRECISION);
        GeneKey {
            op: self.op.clone(),
            qubits,
            parameters: self
                .parameters
                .iter()
                .map(|p| (p * scale).round() as i64)
                .collect(),
            extra_controls: self.extra_controls,
            inverted: self.inverted,
            column,
        }
    }
}

/// Gates applied concurrently. No two gates share a qubit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub gates: Vec<Gate>,
}

impl Column {
    pub fn new(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    pub fn push(&mut self, gate: Gate) {
        self.gates.push(gate);
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Qubits occupied by any gate in the column.
    pub fn occupied(&self) -> Vec<usize> {
        self.gates.iter().flat_map(|g| g.qubits.iter().copied()).collect()
    }

    /// Whether `gate` can join the column without overlapping.
    pub fn fits(&self, gate: &Gate) -> bool {
        !gate.overlaps(&self.occupied())
    }
}

// ============================================================================
// Fingerprints
// ============================================================================

/// One canonical gene: (op, sorted qubits, rounded parameters, extra
/// controls, inversion, column index). Step sizes are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneKey {
    pub op: String,
    pub qubits: Vec<usize>,
    pub parameters: Vec<i64>,
    pub extra_controls: usize,
    pub inverted: bool,
    pub column: usize,
}

/// Structural fingerprint of a circuit.
pub type Fingerprint = BTreeSet<GeneKey>;

/// Jaccard distance `1 - |A∩B| / |A∪B|`; zero when both sets are empty.
pub fn jaccard_distance(a: &Fingerprint, b: &Fingerprint) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    1.0 - intersection as f64 / union as f64
}

// ============================================================================
// Circuit
// ============================================================================

/// A candidate solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    /// Number of qubits the circuit acts on.
    pub qubit_count: usize,
    columns: Vec<Column>,
    /// Selection objective, possibly shaped. Zero means unevaluated.
    #[serde(default)]
    pub fitness: f64,
    /// Unshaped quality signal.
    #[serde(default)]
    pub fidelity: f64,
    /// Evaluator output before niching.
    #[serde(default)]
    pub raw_fitness: f64,
    /// Pareto front index, set during NSGA-II survivor selection.
    #[serde(skip)]
    pub rank: Option<usize>,
    /// Crowding distance, set during NSGA-II survivor selection.
    #[serde(skip)]
    pub crowding_distance: f64,
    #[serde(skip)]
    fingerprint: OnceCell<Fingerprint>,
}

impl Circuit {
    pub fn new(qubit_count: usize, columns: Vec<Column>) -> Self {
        Self {
            qubit_count,
            columns,
            fitness: 0.0,
            fidelity: 0.0,
            raw_fitness: 0.0,
            rank: None,
            crowding_distance: 0.0,
            fingerprint: OnceCell::new(),
        }
    }

    /// Circuit with scores already known (e.g. restored from a checkpoint).
    pub fn with_scores(mut self, fitness: f64, fidelity: f64) -> Self {
        self.record_evaluation(fitness, fidelity);
        self
    }

    /// Number of columns.
    pub fn depth(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Mutable access to the columns.
    ///
    /// Any caller may change content, so the fingerprint is dropped and the
    /// scores are reset to unevaluated.
    pub fn columns_mut(&mut self) -> &mut Vec<Column> {
        self.invalidate();
        &mut self.columns
    }

    /// Adaptive state of one parameter.
    ///
    /// Step sizes are not part of the fingerprint, so nothing is invalidated.
    pub fn step_size_mut(
        &mut self,
        column: usize,
        gate: usize,
        parameter: usize,
    ) -> Option<&mut StepSize> {
        self.columns
            .get_mut(column)?
            .gates
            .get_mut(gate)?
            .step_sizes
            .get_mut(parameter)
    }

    /// Iterate over all gates with their column index.
    pub fn gates(&self) -> impl Iterator<Item = (usize, &Gate)> {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(i, col)| col.gates.iter().map(move |g| (i, g)))
    }

    /// Drop cached structure and scores.
    pub fn invalidate(&mut self) {
        self.fingerprint = OnceCell::new();
        self.fitness = 0.0;
        self.fidelity = 0.0;
        self.raw_fitness = 0.0;
        self.rank = None;
        self.crowding_distance = 0.0;
    }

    /// Store an evaluator result.
    pub fn record_evaluation(&mut self, fitness: f64, fidelity: f64) {
        self.fitness = fitness;
        self.raw_fitness = fitness;
        self.fidelity = fidelity;
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness != 0.0
    }

    /// Structural fingerprint, built on first access and cached.
    pub fn structural_representation(&self) -> &Fingerprint {
        self.fingerprint.get_or_init(|| {
            self.gates()
                .map(|(column, gate)| gate.gene_key(column))
                .collect()
        })
    }

    /// Objective vector for Pareto ranking: (fidelity, -depth), both maximized.
    pub fn objectives(&self) -> [f64; 2] {
        [self.fidelity, -(self.depth() as f64)]
    }

    /// Check qubit bounds and per-column disjointness.
    pub fn is_well_formed(&self) -> bool {
        self.columns.iter().all(|col| {
            let mut seen = vec![false; self.qubit_count];
            col.gates.iter().all(|gate| {
                gate.extra_controls <= gate.qubits.len()
                    && gate.qubits.iter().all(|&q| {
                        if q >= self.qubit_count || seen[q] {
                            return false;
                        }
                        seen[q] = true;
                        true
                    })
            })
        })
    }
}

impl PartialEq for Circuit {
    fn eq(&self, other: &Self) -> bool {
        self.qubit_count == other.qubit_count && self.columns == other.columns
    }
}
