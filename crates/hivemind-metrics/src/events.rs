use serde::{Deserialize, Serialize};

use crate::types::{EventInput, NeuralActivationInput, SquadronStatusInput};

/// Record carried by the ingestion bus.
///
/// Records travel unvalidated; the worker validates them on the way to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestMessage {
    Event(EventInput),
    SquadronStatus(SquadronStatusInput),
    NeuralActivation(NeuralActivationInput),
}

impl IngestMessage {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::SquadronStatus(_) => "squadron_status",
            Self::NeuralActivation(_) => "neural_activation",
        }
    }
}

/// Operational notices about the ingestion pipeline itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemEvent {
    StorageError { error: String, message_kind: String },
    WorkerStarted,
    WorkerStopped,
}
