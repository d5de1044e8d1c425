pub mod aggregator;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod service;
pub mod sessions;
pub mod storage;
pub mod types;
pub mod validate;
pub mod worker;

pub use aggregator::{
    aggregate_costs, latest_activations, latest_squadron_snapshots, summarize_session,
};
pub use bus::ObserveBus;
pub use catalog::FilterCatalog;
pub use config::ObserveConfig;
pub use error::{ObserveError, ObserveResult};
pub use events::{IngestMessage, SystemEvent};
pub use service::ObservabilityService;
pub use sessions::{active_sessions, SessionSighting};
pub use storage::{ObservabilityStorage, SqliteObservabilityStorage};
pub use types::{
    CostFilter, CostMetrics, CostQuery, Event, EventFilter, EventInput, EventMetadata,
    EventPayload, EventQuery, EventStatus, EventType, FilterOptions, LlmProvider, LlmUsage,
    NeuralActivation, NeuralActivationInput, NeuralFilter, NeuralNetworkState, NeuralQuery,
    ProviderCost, ScopeQuery, SessionSummary, SourceApp, Squadron, SquadronMetric,
    SquadronMetrics, SquadronQuery, SquadronStatusInput,
};
pub use worker::IngestWorker;
