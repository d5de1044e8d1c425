use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::FilterCatalog;
use crate::config::ObserveConfig;
use crate::events::{IngestMessage, SystemEvent};
use crate::storage::ObservabilityStorage;
use crate::validate::{validate_event, validate_neural_activation, validate_squadron_status};

/// Drains the ingestion bus into storage.
pub struct IngestWorker {
    storage: Arc<dyn ObservabilityStorage>,
    catalog: Arc<FilterCatalog>,
    config: ObserveConfig,
    running: Arc<AtomicBool>,
}

impl IngestWorker {
    /// Create a worker that writes through `storage` and invalidates `catalog`
    /// after event writes.
    pub fn new(
        storage: Arc<dyn ObservabilityStorage>,
        catalog: Arc<FilterCatalog>,
        config: ObserveConfig,
    ) -> Self {
        Self {
            storage,
            catalog,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the consume loop. It ends when every bus handle is gone or
    /// `stop` has been called and the next message arrives.
    pub fn spawn(&self, mut receiver: mpsc::Receiver<IngestMessage>) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let catalog = Arc::clone(&self.catalog);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            Self::report(SystemEvent::WorkerStarted);

            while running.load(Ordering::SeqCst) {
                let Some(message) = receiver.recv().await else {
                    info!("IngestWorker channel closed");
                    break;
                };

                let kind = message.kind();
                if let Err(e) = Self::handle_message(&storage, &catalog, &config, message).await {
                    warn!("Failed to ingest {} message: {}", kind, e);
                    Self::report(SystemEvent::StorageError {
                        error: e.to_string(),
                        message_kind: kind.to_string(),
                    });
                }
            }

            running.store(false, Ordering::SeqCst);
            Self::report(SystemEvent::WorkerStopped);
        })
    }

    async fn handle_message(
        storage: &Arc<dyn ObservabilityStorage>,
        catalog: &FilterCatalog,
        config: &ObserveConfig,
        message: IngestMessage,
    ) -> anyhow::Result<()> {
        let now = Utc::now();
        match message {
            IngestMessage::Event(input) => {
                let event = validate_event(input, config, now)?;
                storage.insert_event(&event).await?;
                catalog.invalidate().await;
                info!("Ingested {} event {}", event.event_type.as_str(), event.id);
            }
            IngestMessage::SquadronStatus(input) => {
                let snapshot = validate_squadron_status(input, now)?;
                storage.insert_squadron_status(&snapshot).await?;
                info!("Ingested squadron status for {}", snapshot.squadron_name.as_str());
            }
            IngestMessage::NeuralActivation(input) => {
                let activation = validate_neural_activation(input, now)?;
                storage
                    .insert_neural_activations(std::slice::from_ref(&activation))
                    .await?;
                info!("Ingested activation of neuron {}", activation.neuron_id);
            }
        }
        Ok(())
    }

    fn report(event: SystemEvent) {
        match event {
            SystemEvent::WorkerStarted => info!("System: WorkerStarted"),
            SystemEvent::WorkerStopped => info!("System: WorkerStopped"),
            SystemEvent::StorageError { error, message_kind } => {
                error!("System: StorageError for {} - {}", message_kind, error);
            }
        }
    }

    /// Ask the loop to exit after the message it is waiting for.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// True between `spawn` and the loop exiting.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::bus::ObserveBus;
    use crate::storage::SqliteObservabilityStorage;
    use crate::types::{
        EventFilter, EventInput, NeuralActivationInput, NeuralFilter, SquadronStatusInput,
    };

    async fn setup() -> (tempfile::TempDir, Arc<dyn ObservabilityStorage>, IngestWorker) {
        let dir = tempdir().expect("temp dir");
        let storage: Arc<dyn ObservabilityStorage> =
            Arc::new(SqliteObservabilityStorage::new(dir.path().join("worker.db")));
        storage.init().await.expect("init storage");
        let catalog = Arc::new(FilterCatalog::new(storage.clone(), Duration::ZERO, 50));
        let worker = IngestWorker::new(storage.clone(), catalog, ObserveConfig::default());
        (dir, storage, worker)
    }

    #[tokio::test]
    async fn worker_writes_valid_messages_and_skips_invalid_ones() {
        let (_dir, storage, worker) = setup().await;
        let (bus, rx) = ObserveBus::new(16);
        let handle = worker.spawn(rx);

        bus.emit(IngestMessage::Event(EventInput {
            event_type: "AgentSpawn".to_string(),
            source_app: "agent-orchestrator".to_string(),
            action: "spawn validator".to_string(),
            squadron: Some("validation".to_string()),
            ..EventInput::default()
        }));
        bus.emit(IngestMessage::Event(EventInput {
            event_type: "Teleport".to_string(),
            source_app: "agent-orchestrator".to_string(),
            action: "nope".to_string(),
            ..EventInput::default()
        }));
        bus.emit(IngestMessage::SquadronStatus(SquadronStatusInput {
            squadron_name: "validation".to_string(),
            active_agents: 2,
            total_agents: None,
            performance_score: 71.0,
            current_tasks: vec![],
            timestamp: None,
        }));
        bus.emit(IngestMessage::NeuralActivation(NeuralActivationInput {
            session_id: "s-1".to_string(),
            neuron_id: "uce-03".to_string(),
            neuron_name: "route-planner".to_string(),
            activation_level: 0.4,
            weight: 0.1,
            context: String::new(),
            timestamp: None,
        }));

        drop(bus);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker finishes")
            .expect("worker task");

        let events = storage
            .query_events(&EventFilter::default(), 10)
            .await
            .expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "spawn validator");

        let snapshots = storage
            .latest_squadron_status(&crate::types::Squadron::ALL)
            .await
            .expect("snapshots");
        assert_eq!(snapshots.len(), 1);

        let activations = storage
            .neural_activations(&NeuralFilter::default(), 10)
            .await
            .expect("activations");
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].neuron_id, "uce-03");
    }

    #[tokio::test]
    async fn closed_channel_clears_running_flag() {
        let (_dir, _storage, worker) = setup().await;
        let (bus, rx) = ObserveBus::new(4);
        let handle = worker.spawn(rx);
        assert!(worker.is_running());

        drop(bus);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker finishes")
            .expect("worker task");

        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn stop_clears_running_flag() {
        let (_dir, _storage, worker) = setup().await;
        let (bus, rx) = ObserveBus::new(4);
        let _handle = worker.spawn(rx);
        assert!(!bus.is_closed());

        assert!(worker.is_running());
        worker.stop();
        assert!(!worker.is_running());
    }
}
