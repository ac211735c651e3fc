//! Error types for the evolutionary engine.

use std::io;

use crate::schema::ConfigError;

/// Raised by a [`GateFactory`](super::GateFactory).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateFactoryError {
    /// No catalog gate fits the available qubits. Column-filling loops treat
    /// this as the signal to stop.
    #[error("No gate fits the {available} available qubit(s)")]
    Exhausted { available: usize },
    /// An allow-listed operation is not in the catalog.
    #[error("Unknown gate operation '{0}'")]
    UnknownOperation(String),
}

/// Failure reported by a fitness evaluator.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Fitness evaluation failed: {0}")]
pub struct EvaluationError(pub String);

/// Errors that abort an evolutionary run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("Gate factory failed: {0}")]
    Factory(#[from] GateFactoryError),
    #[error("No mutation strategy applies to the selected circuit")]
    NoApplicableMutation,
    #[error("Population is empty")]
    EmptyPopulation,
    #[error("Checkpoint I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Checkpoint format error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Checkpoint contains a malformed circuit at index {0}")]
    MalformedCheckpoint(usize),
}

pub type Result<T> = std::result::Result<T, EvolutionError>;
