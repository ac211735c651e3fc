//! Random gate and circuit generation.
//!
//! The engine only depends on the [`GateFactory`] and [`CircuitFactory`]
//! traits. [`CatalogGateFactory`] and [`RandomCircuitFactory`] are the
//! built-in implementations.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use crate::schema::{Circuit, CircuitConfig, Column, Gate, StepSize, StepSizeConfig};

use super::error::{EvolutionError, GateFactoryError};
use super::rng::EvolutionRng;

/// Synthesizes single gates.
pub trait GateFactory: Send + Sync {
    /// Build a random gate using a subset of `available` qubits.
    ///
    /// Returns [`GateFactoryError::Exhausted`] when nothing fits.
    fn build_gate(
        &self,
        available: &[usize],
        adaptive: bool,
        rng: &mut EvolutionRng,
    ) -> Result<Gate, GateFactoryError>;

    /// Identity filler on one qubit.
    fn build_identity(&self, qubit: usize) -> Gate;
}

/// Synthesizes whole circuits.
pub trait CircuitFactory: Send + Sync {
    fn create_random(
        &self,
        qubit_count: usize,
        max_depth: usize,
        min_depth: usize,
        rng: &mut EvolutionRng,
    ) -> Result<Circuit, EvolutionError>;
}

// ============================================================================
// Gate catalog
// ============================================================================

/// Range an angle is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleKind {
    /// `[0, π)`, for theta-style parameters.
    Polar,
    /// `[0, 2π)`.
    Azimuthal,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct GateSpec {
    pub op: &'static str,
    /// Minimal number of qubits.
    pub arity: usize,
    pub parameters: &'static [AngleKind],
    /// Whether extra controls may be attached.
    pub controllable: bool,
    /// Whether the inverse may be chosen.
    pub invertible: bool,
}

const fn spec(
    op: &'static str,
    arity: usize,
    parameters: &'static [AngleKind],
    controllable: bool,
    invertible: bool,
) -> GateSpec {
    GateSpec {
        op,
        arity,
        parameters,
        controllable,
        invertible,
    }
}

use AngleKind::{Azimuthal, Polar};

/// Operations known to the built-in factory.
pub const GATE_CATALOG: &[GateSpec] = &[
    spec("x", 1, &[], true, false),
    spec("y", 1, &[], true, false),
    spec("z", 1, &[], true, false),
    spec("h", 1, &[], true, false),
    spec("s", 1, &[], true, true),
    spec("t", 1, &[], true, true),
    spec("id", 1, &[], false, false),
    spec("sx", 1, &[], true, true),
    spec("u", 1, &[Polar, Azimuthal, Azimuthal], true, false),
    spec("p", 1, &[Polar], true, false),
    spec("r", 1, &[Polar, Azimuthal], true, false),
    spec("rx", 1, &[Polar], true, false),
    spec("ry", 1, &[Polar], true, false),
    spec("rz", 1, &[Azimuthal], true, false),
    spec("swap", 2, &[], true, false),
    spec("rxx", 2, &[Polar], true, false),
    spec("ryy", 2, &[Polar], true, false),
    spec("rzz", 2, &[Polar], true, false),
    spec("rzx", 2, &[Polar], true, false),
    spec("dcx", 2, &[], true, true),
    spec("ecr", 2, &[], true, false),
    spec("xx_minus_yy", 2, &[Polar], true, false),
    spec("xx_plus_yy", 2, &[Polar], true, false),
    spec("rccx", 3, &[], true, false),
    spec("rc3x", 4, &[], true, false),
];

/// Look up a catalog entry by operation name.
pub fn gate_spec(op: &str) -> Option<&'static GateSpec> {
    GATE_CATALOG.iter().find(|s| s.op == op)
}

/// Gate factory drawing uniformly from [`GATE_CATALOG`].
pub struct CatalogGateFactory {
    specs: Vec<&'static GateSpec>,
    step_size: StepSizeConfig,
}

impl CatalogGateFactory {
    /// Factory over the full catalog.
    pub fn new(step_size: StepSizeConfig) -> Self {
        Self {
            specs: GATE_CATALOG.iter().collect(),
            step_size,
        }
    }

    /// Factory restricted to `allowed` operations.
    pub fn with_allowed(
        allowed: &[String],
        step_size: StepSizeConfig,
    ) -> Result<Self, GateFactoryError> {
        let specs = allowed
            .iter()
            .map(|op| gate_spec(op).ok_or_else(|| GateFactoryError::UnknownOperation(op.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { specs, step_size })
    }

    /// Factory configured from circuit settings.
    pub fn from_config(
        circuit: &CircuitConfig,
        step_size: StepSizeConfig,
    ) -> Result<Self, GateFactoryError> {
        match &circuit.allowed_gates {
            Some(allowed) => Self::with_allowed(allowed, step_size),
            None => Ok(Self::new(step_size)),
        }
    }

    fn new_step_size(&self) -> StepSize {
        StepSize::new(
            self.step_size.initial_sigma,
            self.step_size.c,
            self.step_size.window,
        )
    }
}

impl GateFactory for CatalogGateFactory {
    fn build_gate(
        &self,
        available: &[usize],
        adaptive: bool,
        rng: &mut EvolutionRng,
    ) -> Result<Gate, GateFactoryError> {
        let exhausted = GateFactoryError::Exhausted {
            available: available.len(),
        };
        if available.is_empty() {
            return Err(exhausted);
        }

        let pool: Vec<&GateSpec> = self
            .specs
            .iter()
            .copied()
            .filter(|s| s.arity <= available.len())
            .collect();
        if pool.is_empty() {
            return Err(exhausted);
        }
        let spec = pool[rng.index(pool.len())];

        let parameters: Vec<f64> = spec
            .parameters
            .iter()
            .map(|kind| match kind {
                Polar => rng.uniform(0.0, PI),
                Azimuthal => rng.uniform(0.0, TAU),
            })
            .collect();
        let step_sizes = if adaptive {
            parameters.iter().map(|_| self.new_step_size()).collect()
        } else {
            Vec::new()
        };

        let spare = available.len() - spec.arity;
        let extra_controls = if spec.controllable && spare > 0 {
            rng.index(spare + 1)
        } else {
            0
        };
        let qubits = rng
            .sample_indices(available.len(), spec.arity + extra_controls)
            .into_iter()
            .map(|i| available[i])
            .collect();

        let inverted = spec.invertible && rng.coin();

        Ok(Gate {
            op: spec.op.to_string(),
            qubits,
            parameters,
            step_sizes,
            extra_controls,
            inverted,
        })
    }

    fn build_identity(&self, qubit: usize) -> Gate {
        Gate::new("id", vec![qubit])
    }
}

// ============================================================================
// Circuits
// ============================================================================

/// Fill a fresh column gate by gate until the factory is exhausted.
///
/// With `pad`, qubits left free are filled with identity gates.
pub fn fill_column(
    factory: &dyn GateFactory,
    qubit_count: usize,
    adaptive: bool,
    pad: bool,
    rng: &mut EvolutionRng,
) -> Result<Column, GateFactoryError> {
    let mut column = Column::default();
    let mut free: Vec<usize> = (0..qubit_count).collect();

    while !free.is_empty() {
        match factory.build_gate(&free, adaptive, rng) {
            Ok(gate) => {
                free.retain(|q| !gate.qubits.contains(q));
                column.push(gate);
            }
            Err(GateFactoryError::Exhausted { .. }) => break,
            Err(e) => return Err(e),
        }
    }

    if pad {
        for q in free {
            column.push(factory.build_identity(q));
        }
    }

    Ok(column)
}

/// Circuit factory with depth drawn uniformly from `[min_depth, max_depth]`.
pub struct RandomCircuitFactory {
    gate_factory: Arc<dyn GateFactory>,
    adaptive: bool,
    pad_with_identity: bool,
}

impl RandomCircuitFactory {
    pub fn new(gate_factory: Arc<dyn GateFactory>, adaptive: bool) -> Self {
        Self {
            gate_factory,
            adaptive,
            pad_with_identity: false,
        }
    }

    pub fn with_identity_padding(mut self, pad: bool) -> Self {
        self.pad_with_identity = pad;
        self
    }
}

impl CircuitFactory for RandomCircuitFactory {
    fn create_random(
        &self,
        qubit_count: usize,
        max_depth: usize,
        min_depth: usize,
        rng: &mut EvolutionRng,
    ) -> Result<Circuit, EvolutionError> {
        let low = min_depth.min(max_depth);
        let depth = low + rng.index(max_depth - low + 1);

        let columns = (0..depth)
            .map(|_| {
                fill_column(
                    self.gate_factory.as_ref(),
                    qubit_count,
                    self.adaptive,
                    self.pad_with_identity,
                    rng,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Circuit::new(qubit_count, columns))
    }
}
