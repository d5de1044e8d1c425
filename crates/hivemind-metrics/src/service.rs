use std::sync::Arc;

use chrono::Utc;

use crate::aggregator::{
    aggregate_costs, latest_activations, latest_squadron_snapshots, summarize_session,
};
use crate::bus::ObserveBus;
use crate::catalog::FilterCatalog;
use crate::config::ObserveConfig;
use crate::error::{ObserveError, ObserveResult};
use crate::events::IngestMessage;
use crate::sessions::active_sessions;
use crate::storage::{ObservabilityStorage, SqliteObservabilityStorage};
use crate::types::{
    CostMetrics, CostQuery, Event, EventInput, EventQuery, FilterOptions, NeuralActivation,
    NeuralActivationInput, NeuralFilter, NeuralNetworkState, NeuralQuery, ScopeQuery,
    SessionSummary, Squadron, SquadronMetric, SquadronMetrics, SquadronQuery,
    SquadronStatusInput,
};
use crate::validate::{
    identifier, validate_event, validate_neural_activation, validate_squadron_status,
};
use crate::worker::IngestWorker;

/// Read/write entry point shared by every HTTP worker.
#[derive(Clone)]
pub struct ObservabilityService {
    config: Arc<ObserveConfig>,
    storage: Arc<dyn ObservabilityStorage>,
    catalog: Arc<FilterCatalog>,
    bus: ObserveBus,
    worker: Arc<IngestWorker>,
}

impl ObservabilityService {
    /// Open (and migrate) the SQLite store named by `config` and start the
    /// ingestion worker. Must run inside a tokio runtime.
    pub async fn new(config: ObserveConfig) -> ObserveResult<Self> {
        let storage = Arc::new(SqliteObservabilityStorage::new(&config.db_path));
        Self::with_storage(config, storage).await
    }

    /// Same as `new` over a caller-supplied storage backend.
    pub async fn with_storage(
        config: ObserveConfig,
        storage: Arc<dyn ObservabilityStorage>,
    ) -> ObserveResult<Self> {
        storage.init().await?;

        let catalog = Arc::new(FilterCatalog::new(
            Arc::clone(&storage),
            config.catalog_ttl,
            config.max_catalog_sessions,
        ));
        let (bus, receiver) = ObserveBus::new(config.bus_capacity);
        let worker = Arc::new(IngestWorker::new(
            Arc::clone(&storage),
            Arc::clone(&catalog),
            config.clone(),
        ));
        worker.spawn(receiver);

        log::info!("Observability store ready at {}", config.db_path.display());

        Ok(Self {
            config: Arc::new(config),
            storage,
            catalog,
            bus,
            worker,
        })
    }

    /// Validate and durably store one event, returning its id.
    pub async fn record_event(&self, input: EventInput) -> ObserveResult<String> {
        let event = validate_event(input, &self.config, Utc::now())?;
        self.storage.insert_event(&event).await?;
        self.catalog.invalidate().await;
        log::debug!("Recorded {} event {}", event.event_type.as_str(), event.id);
        Ok(event.id)
    }

    /// All-or-nothing: one invalid event rejects the whole batch.
    pub async fn record_events_batch(&self, inputs: Vec<EventInput>) -> ObserveResult<Vec<String>> {
        let now = Utc::now();
        let events = inputs
            .into_iter()
            .map(|input| validate_event(input, &self.config, now))
            .collect::<ObserveResult<Vec<Event>>>()?;

        if events.is_empty() {
            return Ok(Vec::new());
        }

        self.storage.insert_events(&events).await?;
        self.catalog.invalidate().await;
        log::debug!("Recorded batch of {} events", events.len());
        Ok(events.into_iter().map(|event| event.id).collect())
    }

    /// Hand an event to the background worker. Returns false when the bus
    /// is full and the event was dropped.
    pub fn enqueue_event(&self, input: EventInput) -> bool {
        self.bus.emit(IngestMessage::Event(input))
    }

    /// Queue a squadron snapshot for the background worker.
    pub fn enqueue_squadron_status(&self, input: SquadronStatusInput) -> bool {
        self.bus.emit(IngestMessage::SquadronStatus(input))
    }

    /// Queue a neural activation for the background worker.
    pub fn enqueue_neural_activation(&self, input: NeuralActivationInput) -> bool {
        self.bus.emit(IngestMessage::NeuralActivation(input))
    }

    /// Newest-first events matching every supplied filter field.
    pub async fn query_events(&self, query: EventQuery) -> ObserveResult<Vec<Event>> {
        let filter = query.into_filter()?;
        let limit = self.config.effective_limit(filter.limit);
        self.storage.query_events(&filter, limit).await
    }

    /// Sorted distinct session ids among recent events.
    pub async fn list_active_sessions(&self, scope: ScopeQuery) -> ObserveResult<Vec<String>> {
        let org_id = identifier("orgId", scope.org_id)?;
        let sightings = self
            .storage
            .session_sightings(org_id.as_deref(), self.config.session_scan_limit)
            .await?;
        Ok(active_sessions(
            &sightings,
            Utc::now(),
            self.config.active_session_window,
        ))
    }

    /// Values present in the store for each filterable field, cached per scope.
    pub async fn filter_options(&self, scope: ScopeQuery) -> ObserveResult<FilterOptions> {
        let org_id = identifier("orgId", scope.org_id)?;
        self.catalog.options(org_id.as_deref()).await
    }

    /// Per-provider LLM cost and token rollup.
    pub async fn cost_metrics(&self, query: CostQuery) -> ObserveResult<CostMetrics> {
        let filter = query.into_filter()?;
        let usages = self.storage.llm_usage(&filter).await?;
        Ok(aggregate_costs(&usages))
    }

    /// Latest snapshot per squadron plus fleet-wide rollups.
    pub async fn squadron_metrics(&self, query: SquadronQuery) -> ObserveResult<SquadronMetrics> {
        let squadrons = match query.into_squadron()? {
            Some(squadron) => vec![squadron],
            None => Squadron::ALL.to_vec(),
        };
        let snapshots = self.storage.latest_squadron_status(&squadrons).await?;
        Ok(latest_squadron_snapshots(&snapshots))
    }

    pub async fn record_squadron_status(
        &self,
        input: SquadronStatusInput,
    ) -> ObserveResult<SquadronMetric> {
        let snapshot = validate_squadron_status(input, Utc::now())?;
        self.storage.insert_squadron_status(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn record_neural_activations(
        &self,
        inputs: Vec<NeuralActivationInput>,
    ) -> ObserveResult<Vec<NeuralActivation>> {
        let now = Utc::now();
        let activations = inputs
            .into_iter()
            .map(|input| validate_neural_activation(input, now))
            .collect::<ObserveResult<Vec<_>>>()?;

        if !activations.is_empty() {
            self.storage.insert_neural_activations(&activations).await?;
        }
        Ok(activations)
    }

    pub async fn neural_network_state(&self, query: NeuralQuery) -> ObserveResult<NeuralNetworkState> {
        let filter = query.into_filter()?;
        let limit = self.config.effective_limit(filter.limit);
        let activations = self.storage.neural_activations(&filter, limit).await?;
        Ok(latest_activations(activations))
    }

    /// Zero-valued for a session with no recorded activity.
    pub async fn session_summary(&self, session_id: &str) -> ObserveResult<SessionSummary> {
        if session_id.trim().is_empty() {
            return Err(ObserveError::InvalidFilter("sessionId must not be empty".into()));
        }

        let events = self.storage.session_events(session_id).await?;
        let activations = self
            .storage
            .neural_activations(&NeuralFilter::for_session(session_id), u32::MAX)
            .await?;
        Ok(summarize_session(session_id, &events, &activations))
    }

    /// Messages the ingestion bus has dropped because it was full.
    pub fn dropped_count(&self) -> u64 {
        self.bus.dropped_count()
    }

    pub fn worker_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop the ingestion worker. Called once the HTTP server has exited.
    pub fn shutdown(&self) {
        log::info!("Stopping ingestion worker");
        self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::types::{EventStatus, LlmProvider};

    async fn service() -> (tempfile::TempDir, ObservabilityService) {
        let dir = tempdir().expect("temp dir");
        let config = ObserveConfig::default().with_db_path(dir.path().join("service.db"));
        let service = ObservabilityService::new(config).await.expect("service");
        (dir, service)
    }

    fn input(event_type: &str, status: &str, session: &str) -> EventInput {
        EventInput {
            event_type: event_type.to_string(),
            source_app: "hivemind-v3".to_string(),
            action: format!("{} step", event_type),
            status: Some(status.to_string()),
            session_id: Some(session.to_string()),
            ..EventInput::default()
        }
    }

    #[tokio::test]
    async fn recorded_event_is_visible_to_the_next_query() {
        let (_dir, service) = service().await;
        let id = service
            .record_event(input("ToolCall", "completed", "s-1"))
            .await
            .expect("record");

        let events = service
            .query_events(EventQuery {
                session_id: Some("s-1".to_string()),
                ..EventQuery::default()
            })
            .await
            .expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
    }

    #[tokio::test]
    async fn status_filter_returns_exactly_the_failed_events() {
        let (_dir, service) = service().await;
        for i in 0..10 {
            let status = if i < 3 { "failed" } else { "completed" };
            service
                .record_event(input("ToolCall", status, "s-1"))
                .await
                .expect("record");
        }

        let failed = service
            .query_events(EventQuery {
                status: Some("failed".to_string()),
                ..EventQuery::default()
            })
            .await
            .expect("query");
        assert_eq!(failed.len(), 3);
        assert!(failed.iter().all(|e| e.status == EventStatus::Failed));
    }

    #[tokio::test]
    async fn invalid_event_in_batch_writes_nothing() {
        let (_dir, service) = service().await;
        let result = service
            .record_events_batch(vec![
                input("ToolCall", "completed", "s-1"),
                input("Teleport", "completed", "s-1"),
            ])
            .await;
        assert!(matches!(result, Err(ObserveError::InvalidEventKind { .. })));

        let events = service.query_events(EventQuery::default()).await.expect("query");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn empty_store_yields_empty_views() {
        let (_dir, service) = service().await;

        let options = service.filter_options(ScopeQuery::default()).await.expect("options");
        assert_eq!(options, FilterOptions::default());
        assert!(service
            .list_active_sessions(ScopeQuery::default())
            .await
            .expect("sessions")
            .is_empty());

        let costs = service.cost_metrics(CostQuery::default()).await.expect("costs");
        assert!(costs.breakdown.is_empty());
        assert_eq!(costs.total_requests, 0);

        let squadrons = service
            .squadron_metrics(SquadronQuery {
                squadron_name: Some("knowledge".to_string()),
            })
            .await
            .expect("squadrons");
        assert!(squadrons.squadrons.is_empty());

        let summary = service.session_summary("ghost").await.expect("summary");
        assert_eq!(summary.total_events, 0);
        assert!(summary.start_time.is_none());
    }

    #[tokio::test]
    async fn cost_metrics_group_by_provider() {
        let (_dir, service) = service().await;
        for (provider, cost, tokens) in [("openai", 0.01, 100), ("claude", 0.03, 50)] {
            service
                .record_event(EventInput {
                    llm_provider: Some(provider.to_string()),
                    cost_estimate: Some(cost),
                    tokens_used: Some(tokens),
                    ..input("LLMRoute", "completed", "s-1")
                })
                .await
                .expect("record");
        }

        let costs = service.cost_metrics(CostQuery::default()).await.expect("costs");
        assert!((costs.total_cost - 0.04).abs() < 1e-12);
        assert_eq!(costs.total_tokens, 150);
        assert_eq!(costs.breakdown[0].provider, LlmProvider::Claude);
    }

    #[tokio::test]
    async fn cost_metrics_survive_maximal_token_counts() {
        let (_dir, service) = service().await;
        for _ in 0..3 {
            service
                .record_event(EventInput {
                    llm_provider: Some("openai".to_string()),
                    tokens_used: Some(i64::MAX),
                    ..input("LLMRoute", "completed", "s-1")
                })
                .await
                .expect("record");
        }

        let costs = service.cost_metrics(CostQuery::default()).await.expect("costs");
        assert_eq!(costs.total_tokens, u64::MAX);
        assert_eq!(costs.total_requests, 3);

        let summary = service.session_summary("s-1").await.expect("summary");
        assert_eq!(summary.total_tokens, u64::MAX);
    }

    #[tokio::test]
    async fn queued_records_reach_the_store() {
        let (_dir, service) = service().await;
        assert!(service.enqueue_squadron_status(SquadronStatusInput {
            squadron_name: "knowledge".to_string(),
            active_agents: 3,
            total_agents: None,
            performance_score: 80.0,
            current_tasks: vec![],
            timestamp: None,
        }));
        assert!(service.enqueue_neural_activation(NeuralActivationInput {
            session_id: "q-1".to_string(),
            neuron_id: "uce-05".to_string(),
            neuron_name: "memory-recall".to_string(),
            activation_level: 0.3,
            weight: 0.2,
            context: String::new(),
            timestamp: None,
        }));

        let mut stored = false;
        for _ in 0..50 {
            let squadrons = service
                .squadron_metrics(SquadronQuery::default())
                .await
                .expect("squadrons");
            let state = service
                .neural_network_state(NeuralQuery::default())
                .await
                .expect("state");
            if squadrons.squadrons.len() == 1 && state.active_neurons == 1 {
                stored = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(stored);

        service.shutdown();
        assert!(!service.worker_running());
    }

    #[tokio::test]
    async fn active_sessions_and_filters_reflect_writes() {
        let (_dir, service) = service().await;
        service.record_event(input("SessionStart", "completed", "beta")).await.expect("record");
        service.record_event(input("SessionStart", "completed", "alpha")).await.expect("record");

        assert_eq!(
            service.list_active_sessions(ScopeQuery::default()).await.expect("sessions"),
            vec!["alpha", "beta"]
        );
        let options = service.filter_options(ScopeQuery::default()).await.expect("options");
        assert_eq!(options.session_ids, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn neural_state_and_session_summary_count_activations() {
        let (_dir, service) = service().await;
        service.record_event(input("NeuralActivation", "completed", "n-1")).await.expect("record");
        let activation = |neuron: &str, level: f64| NeuralActivationInput {
            session_id: "n-1".to_string(),
            neuron_id: neuron.to_string(),
            neuron_name: format!("neuron {}", neuron),
            activation_level: level,
            weight: 0.5,
            context: String::new(),
            timestamp: None,
        };
        service
            .record_neural_activations(vec![activation("uce-01", 0.2), activation("uce-02", 0.8)])
            .await
            .expect("activations");

        let state = service
            .neural_network_state(NeuralQuery::default())
            .await
            .expect("state");
        assert_eq!(state.active_neurons, 2);
        assert_eq!(state.total_neurons, 35);

        let summary = service.session_summary("n-1").await.expect("summary");
        assert_eq!(summary.total_events, 1);
        assert_eq!(summary.neural_activations, 2);
        assert_eq!(summary.unique_neurons, 2);
    }

    #[tokio::test]
    async fn blank_session_id_is_an_invalid_filter() {
        let (_dir, service) = service().await;
        assert!(matches!(
            service.session_summary("  ").await,
            Err(ObserveError::InvalidFilter(_))
        ));
    }
}
