use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};

use crate::error::{ObserveError, ObserveResult};
use crate::sessions::SessionSighting;
use crate::types::{
    CostFilter, Event, EventFilter, EventStatus, EventType, FilterOptions, LlmProvider, LlmUsage,
    NeuralActivation, NeuralFilter, SourceApp, Squadron, SquadronMetric,
};

#[async_trait]
pub trait ObservabilityStorage: Send + Sync {
    /// Create tables and indexes if they do not exist yet.
    async fn init(&self) -> ObserveResult<()>;

    /// Append one event. Committed before returning.
    async fn insert_event(&self, event: &Event) -> ObserveResult<()>;

    /// Insert all events in one transaction.
    async fn insert_events(&self, events: &[Event]) -> ObserveResult<()>;

    /// Newest first by timestamp, then insertion order.
    async fn query_events(&self, filter: &EventFilter, limit: u32) -> ObserveResult<Vec<Event>>;

    /// Every event of a session, oldest first.
    async fn session_events(&self, session_id: &str) -> ObserveResult<Vec<Event>>;

    /// Session ids carried by the `scan_limit` most recent events of the scope.
    async fn session_sightings(
        &self,
        org_id: Option<&str>,
        scan_limit: u32,
    ) -> ObserveResult<Vec<SessionSighting>>;

    /// Distinct values present per filterable field, each sorted.
    async fn observed_values(
        &self,
        org_id: Option<&str>,
        max_sessions: usize,
    ) -> ObserveResult<FilterOptions>;

    /// LLM usage rows in event order.
    async fn llm_usage(&self, filter: &CostFilter) -> ObserveResult<Vec<LlmUsage>>;

    /// Append one squadron snapshot.
    async fn insert_squadron_status(&self, metric: &SquadronMetric) -> ObserveResult<()>;

    /// Latest snapshot of each requested squadron that has one.
    async fn latest_squadron_status(
        &self,
        squadrons: &[Squadron],
    ) -> ObserveResult<Vec<SquadronMetric>>;

    /// Append activations in one transaction.
    async fn insert_neural_activations(
        &self,
        activations: &[NeuralActivation],
    ) -> ObserveResult<()>;

    /// Activations matching `filter`, newest first.
    async fn neural_activations(
        &self,
        filter: &NeuralFilter,
        limit: u32,
    ) -> ObserveResult<Vec<NeuralActivation>>;
}

/// SQLite-backed store. Each call opens its own connection on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteObservabilityStorage {
    db_path: PathBuf,
}

impl SqliteObservabilityStorage {
    /// Point the store at `db_path`. Nothing is opened until the first call.
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    async fn with_connection<T, F>(&self, func: F) -> ObserveResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> ObserveResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let connection = open_connection(&db_path)?;
            func(&connection)
        })
        .await
        .map_err(|error| ObserveError::Task(error.to_string()))?
        .map_err(classify_unavailable)
    }
}

const EVENT_COLUMNS: &str = "event_id, timestamp, event_type, source_app, squadron, status, action, session_id, org_id, agent_name, duration_ms, tokens_used, cost_estimate, llm_provider, llm_model, payload, metadata";

const ACTIVATION_COLUMNS: &str =
    "session_id, neuron_id, neuron_name, activation_level, weight, context, timestamp";

#[async_trait]
impl ObservabilityStorage for SqliteObservabilityStorage {
    async fn init(&self) -> ObserveResult<()> {
        self.with_connection(|connection| {
            connection.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS observability_events (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id TEXT NOT NULL UNIQUE,
                    timestamp INTEGER NOT NULL,
                    event_type TEXT NOT NULL,
                    source_app TEXT NOT NULL,
                    squadron TEXT,
                    status TEXT NOT NULL,
                    action TEXT NOT NULL,
                    session_id TEXT,
                    org_id TEXT,
                    agent_name TEXT,
                    duration_ms INTEGER,
                    tokens_used INTEGER,
                    cost_estimate REAL,
                    llm_provider TEXT,
                    llm_model TEXT,
                    payload TEXT,
                    metadata TEXT
                );

                CREATE TABLE IF NOT EXISTS squadron_status (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    squadron_name TEXT NOT NULL,
                    active_agents INTEGER NOT NULL,
                    total_agents INTEGER NOT NULL,
                    performance_score REAL NOT NULL,
                    current_tasks TEXT NOT NULL,
                    timestamp INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS neural_activations (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    neuron_id TEXT NOT NULL,
                    neuron_name TEXT NOT NULL,
                    activation_level REAL NOT NULL,
                    weight REAL NOT NULL,
                    context TEXT NOT NULL,
                    timestamp INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_events_timestamp ON observability_events(timestamp, seq);
                CREATE INDEX IF NOT EXISTS idx_events_session ON observability_events(session_id);
                CREATE INDEX IF NOT EXISTS idx_events_org ON observability_events(org_id, timestamp);
                CREATE INDEX IF NOT EXISTS idx_events_provider ON observability_events(llm_provider);
                CREATE INDEX IF NOT EXISTS idx_squadron_name ON squadron_status(squadron_name, timestamp);
                CREATE INDEX IF NOT EXISTS idx_neural_session ON neural_activations(session_id);
                CREATE INDEX IF NOT EXISTS idx_neural_neuron ON neural_activations(neuron_id);
                "#,
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_event(&self, event: &Event) -> ObserveResult<()> {
        let event = event.clone();
        self.with_connection(move |connection| insert_event_row(connection, &event))
            .await
    }

    async fn insert_events(&self, events: &[Event]) -> ObserveResult<()> {
        let events = events.to_vec();
        self.with_connection(move |connection| {
            let transaction = connection.unchecked_transaction()?;
            for event in &events {
                insert_event_row(&transaction, event)?;
            }
            transaction.commit()?;
            Ok(())
        })
        .await
    }

    async fn query_events(&self, filter: &EventFilter, limit: u32) -> ObserveResult<Vec<Event>> {
        let filter = filter.clone();
        self.with_connection(move |connection| {
            let mut params_vec = Vec::new();
            let where_clause = build_event_where_clause(&filter, &mut params_vec);
            let sql = format!(
                "SELECT {} FROM observability_events {} ORDER BY timestamp DESC, seq DESC LIMIT {}",
                EVENT_COLUMNS, where_clause, limit
            );

            let mut stmt = connection.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(params_vec.iter()))?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(event_from_row(row)?);
            }
            Ok(events)
        })
        .await
    }

    async fn session_events(&self, session_id: &str) -> ObserveResult<Vec<Event>> {
        let session_id = session_id.to_string();
        self.with_connection(move |connection| {
            let sql = format!(
                "SELECT {} FROM observability_events WHERE session_id = ?1 ORDER BY timestamp ASC, seq ASC",
                EVENT_COLUMNS
            );
            let mut stmt = connection.prepare(&sql)?;
            let mut rows = stmt.query(params![session_id])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(event_from_row(row)?);
            }
            Ok(events)
        })
        .await
    }

    async fn session_sightings(
        &self,
        org_id: Option<&str>,
        scan_limit: u32,
    ) -> ObserveResult<Vec<SessionSighting>> {
        let org_id = org_id.map(str::to_string);
        self.with_connection(move |connection| {
            let mut params_vec = Vec::new();
            let scope = scope_clause(org_id, &mut params_vec);
            let sql = format!(
                r#"
                SELECT session_id, timestamp FROM (
                    SELECT session_id, timestamp FROM observability_events {}
                    ORDER BY timestamp DESC, seq DESC LIMIT {}
                )
                WHERE session_id IS NOT NULL
                "#,
                scope, scan_limit
            );

            let mut stmt = connection.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(params_vec.iter()))?;
            let mut sightings = Vec::new();
            while let Some(row) = rows.next()? {
                sightings.push(SessionSighting {
                    session_id: row.get(0)?,
                    timestamp: millis_to_datetime(row.get(1)?)?,
                });
            }
            Ok(sightings)
        })
        .await
    }

    async fn observed_values(
        &self,
        org_id: Option<&str>,
        max_sessions: usize,
    ) -> ObserveResult<FilterOptions> {
        let org_id = org_id.map(str::to_string);
        self.with_connection(move |connection| {
            let mut source_apps = distinct_column(connection, "source_app", &org_id)?
                .into_iter()
                .map(|raw| parse_stored("source_app", &raw, SourceApp::parse))
                .collect::<ObserveResult<Vec<_>>>()?;
            let mut event_types = distinct_column(connection, "event_type", &org_id)?
                .into_iter()
                .map(|raw| parse_stored("event_type", &raw, EventType::parse))
                .collect::<ObserveResult<Vec<_>>>()?;
            let mut squadrons = distinct_column(connection, "squadron", &org_id)?
                .into_iter()
                .map(|raw| parse_stored("squadron", &raw, Squadron::parse))
                .collect::<ObserveResult<Vec<_>>>()?;
            let mut statuses = distinct_column(connection, "status", &org_id)?
                .into_iter()
                .map(|raw| parse_stored("status", &raw, EventStatus::parse))
                .collect::<ObserveResult<Vec<_>>>()?;

            source_apps.sort();
            event_types.sort();
            squadrons.sort();
            statuses.sort();

            let mut params_vec = Vec::new();
            let mut conditions = vec!["session_id IS NOT NULL".to_string()];
            if let Some(org_id) = org_id {
                conditions.push("org_id = ?".to_string());
                params_vec.push(Value::Text(org_id));
            }
            let sql = format!(
                "SELECT session_id FROM observability_events WHERE {} GROUP BY session_id ORDER BY MAX(timestamp) DESC, MAX(seq) DESC LIMIT {}",
                conditions.join(" AND "),
                max_sessions
            );
            let mut stmt = connection.prepare(&sql)?;
            let mut session_ids = stmt
                .query_map(params_from_iter(params_vec.iter()), |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<String>, _>>()?;
            session_ids.sort();

            Ok(FilterOptions {
                source_apps,
                event_types,
                squadrons,
                statuses,
                session_ids,
            })
        })
        .await
    }

    async fn llm_usage(&self, filter: &CostFilter) -> ObserveResult<Vec<LlmUsage>> {
        let filter = filter.clone();
        self.with_connection(move |connection| {
            let mut params_vec = Vec::new();
            let mut conditions = vec![
                "llm_provider IS NOT NULL".to_string(),
                "(cost_estimate IS NOT NULL OR tokens_used IS NOT NULL)".to_string(),
            ];
            if let Some(session_id) = filter.session_id {
                conditions.push("session_id = ?".to_string());
                params_vec.push(Value::Text(session_id));
            }
            if let Some(org_id) = filter.org_id {
                conditions.push("org_id = ?".to_string());
                params_vec.push(Value::Text(org_id));
            }
            if let Some(start) = filter.start_time {
                conditions.push("timestamp >= ?".to_string());
                params_vec.push(Value::Integer(start.timestamp_millis()));
            }
            if let Some(end) = filter.end_time {
                conditions.push("timestamp <= ?".to_string());
                params_vec.push(Value::Integer(end.timestamp_millis()));
            }

            let sql = format!(
                "SELECT llm_provider, tokens_used, cost_estimate FROM observability_events WHERE {} ORDER BY timestamp ASC, seq ASC",
                conditions.join(" AND ")
            );
            let mut stmt = connection.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(params_vec.iter()))?;
            let mut usages = Vec::new();
            while let Some(row) = rows.next()? {
                usages.push(LlmUsage {
                    provider: LlmProvider::from(row.get::<_, String>(0)?),
                    tokens_used: row.get::<_, Option<i64>>(1)?.map(|tokens| tokens as u64),
                    cost_estimate: row.get(2)?,
                });
            }
            Ok(usages)
        })
        .await
    }

    async fn insert_squadron_status(&self, metric: &SquadronMetric) -> ObserveResult<()> {
        let metric = metric.clone();
        self.with_connection(move |connection| {
            let current_tasks = serde_json::to_string(&metric.current_tasks)?;
            connection.execute(
                r#"
                INSERT INTO squadron_status (
                    squadron_name, active_agents, total_agents, performance_score, current_tasks, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    metric.squadron_name.as_str(),
                    i64::from(metric.active_agents),
                    i64::from(metric.total_agents),
                    metric.performance_score,
                    current_tasks,
                    metric.timestamp.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_squadron_status(
        &self,
        squadrons: &[Squadron],
    ) -> ObserveResult<Vec<SquadronMetric>> {
        let squadrons = squadrons.to_vec();
        self.with_connection(move |connection| {
            let mut stmt = connection.prepare(
                r#"
                SELECT squadron_name, active_agents, total_agents, performance_score, current_tasks, timestamp
                FROM squadron_status
                WHERE squadron_name = ?1
                ORDER BY timestamp DESC, seq DESC
                LIMIT 1
                "#,
            )?;

            let mut latest = Vec::new();
            for squadron in squadrons {
                let mut rows = stmt.query(params![squadron.as_str()])?;
                if let Some(row) = rows.next()? {
                    latest.push(squadron_from_row(row)?);
                }
            }
            Ok(latest)
        })
        .await
    }

    /// Append activations in one transaction.
    async fn insert_neural_activations(
        &self,
        activations: &[NeuralActivation],
    ) -> ObserveResult<()> {
        let activations = activations.to_vec();
        self.with_connection(move |connection| {
            let transaction = connection.unchecked_transaction()?;
            {
                let mut stmt = transaction.prepare(
                    r#"
                    INSERT INTO neural_activations (
                        session_id, neuron_id, neuron_name, activation_level, weight, context, timestamp
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )?;
                for activation in &activations {
                    stmt.execute(params![
                        activation.session_id,
                        activation.neuron_id,
                        activation.neuron_name,
                        activation.activation_level,
                        activation.weight,
                        activation.context,
                        activation.timestamp.timestamp_millis(),
                    ])?;
                }
            }
            transaction.commit()?;
            Ok(())
        })
        .await
    }

    async fn neural_activations(
        &self,
        filter: &NeuralFilter,
        limit: u32,
    ) -> ObserveResult<Vec<NeuralActivation>> {
        let filter = filter.clone();
        self.with_connection(move |connection| {
            let mut params_vec = Vec::new();
            let mut conditions = Vec::new();
            if let Some(session_id) = filter.session_id {
                conditions.push("session_id = ?".to_string());
                params_vec.push(Value::Text(session_id));
            }
            if let Some(neuron_id) = filter.neuron_id {
                conditions.push("neuron_id = ?".to_string());
                params_vec.push(Value::Text(neuron_id));
            }
            let sql = format!(
                "SELECT {} FROM neural_activations {} ORDER BY timestamp DESC, seq DESC LIMIT {}",
                ACTIVATION_COLUMNS,
                where_sql(&conditions),
                limit
            );

            let mut stmt = connection.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(params_vec.iter()))?;
            let mut activations = Vec::new();
            while let Some(row) = rows.next()? {
                activations.push(activation_from_row(row)?);
            }
            Ok(activations)
        })
        .await
    }
}

/// Busy, locked and unopenable databases are transient store outages.
fn classify_unavailable(error: ObserveError) -> ObserveError {
    let unavailable = matches!(
        &error,
        ObserveError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            )
    );

    if unavailable {
        ObserveError::StoreUnavailable(error.to_string())
    } else {
        error
    }
}

fn open_connection(path: &Path) -> ObserveResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            ObserveError::StoreUnavailable(format!(
                "cannot create {}: {}",
                parent.display(),
                error
            ))
        })?;
    }
    let connection = Connection::open(path).map_err(|error| {
        ObserveError::StoreUnavailable(format!("cannot open {}: {}", path.display(), error))
    })?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        "#,
    )?;
    Ok(connection)
}

fn insert_event_row(connection: &Connection, event: &Event) -> ObserveResult<()> {
    let payload = event
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let metadata = event
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    connection.execute(
        &format!(
            "INSERT INTO observability_events ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            EVENT_COLUMNS
        ),
        params![
            event.id,
            event.timestamp.timestamp_millis(),
            event.event_type.as_str(),
            event.source_app.as_str(),
            event.squadron.map(Squadron::as_str),
            event.status.as_str(),
            event.action,
            event.session_id,
            event.org_id,
            event.agent_name,
            event.duration.map(|value| value as i64),
            event.tokens_used.map(|value| value as i64),
            event.cost_estimate,
            event.llm_provider.as_ref().map(LlmProvider::as_str),
            event.llm_model,
            payload,
            metadata,
        ],
    )?;
    Ok(())
}

fn build_event_where_clause(filter: &EventFilter, params_vec: &mut Vec<Value>) -> String {
    let mut conditions = Vec::new();

    let text_filters = [
        ("session_id", filter.session_id.clone()),
        ("org_id", filter.org_id.clone()),
        ("source_app", filter.source_app.map(|v| v.as_str().to_string())),
        ("event_type", filter.event_type.map(|v| v.as_str().to_string())),
        ("squadron", filter.squadron.map(|v| v.as_str().to_string())),
        ("status", filter.status.map(|v| v.as_str().to_string())),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value {
            conditions.push(format!("{} = ?", column));
            params_vec.push(Value::Text(value));
        }
    }

    if let Some(start) = filter.start_time {
        conditions.push("timestamp >= ?".to_string());
        params_vec.push(Value::Integer(start.timestamp_millis()));
    }
    if let Some(end) = filter.end_time {
        conditions.push("timestamp <= ?".to_string());
        params_vec.push(Value::Integer(end.timestamp_millis()));
    }

    where_sql(&conditions)
}

fn scope_clause(org_id: Option<String>, params_vec: &mut Vec<Value>) -> String {
    match org_id {
        Some(org_id) => {
            params_vec.push(Value::Text(org_id));
            "WHERE org_id = ?".to_string()
        }
        None => String::new(),
    }
}

fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn distinct_column(
    connection: &Connection,
    column: &str,
    org_id: &Option<String>,
) -> ObserveResult<Vec<String>> {
    let mut params_vec = Vec::new();
    let mut conditions = vec![format!("{} IS NOT NULL", column)];
    if let Some(org_id) = org_id {
        conditions.push("org_id = ?".to_string());
        params_vec.push(Value::Text(org_id.clone()));
    }
    let sql = format!(
        "SELECT DISTINCT {} FROM observability_events {}",
        column,
        where_sql(&conditions)
    );

    let mut stmt = connection.prepare(&sql)?;
    let values = stmt
        .query_map(params_from_iter(params_vec.iter()), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(values)
}

fn parse_stored<T>(column: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) -> ObserveResult<T> {
    parse(raw).ok_or_else(|| ObserveError::InvalidData(format!("unknown {}: {}", column, raw)))
}

fn millis_to_datetime(millis: i64) -> ObserveResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ObserveError::InvalidData(format!("timestamp out of range: {}", millis)))
}

fn event_from_row(row: &Row<'_>) -> ObserveResult<Event> {
    let event_type_raw: String = row.get(2)?;
    let source_app_raw: String = row.get(3)?;
    let squadron_raw: Option<String> = row.get(4)?;
    let status_raw: String = row.get(5)?;
    let payload: Option<String> = row.get(15)?;
    let metadata: Option<String> = row.get(16)?;

    Ok(Event {
        id: row.get(0)?,
        timestamp: millis_to_datetime(row.get(1)?)?,
        event_type: parse_stored("event_type", &event_type_raw, EventType::parse)?,
        source_app: parse_stored("source_app", &source_app_raw, SourceApp::parse)?,
        squadron: squadron_raw
            .map(|raw| parse_stored("squadron", &raw, Squadron::parse))
            .transpose()?,
        status: parse_stored("status", &status_raw, EventStatus::parse)?,
        action: row.get(6)?,
        session_id: row.get(7)?,
        org_id: row.get(8)?,
        agent_name: row.get(9)?,
        duration: row.get::<_, Option<i64>>(10)?.map(|value| value as u64),
        tokens_used: row.get::<_, Option<i64>>(11)?.map(|value| value as u64),
        cost_estimate: row.get(12)?,
        llm_provider: row.get::<_, Option<String>>(13)?.map(LlmProvider::from),
        llm_model: row.get(14)?,
        payload: payload.map(|raw| serde_json::from_str(&raw)).transpose()?,
        metadata: metadata.map(|raw| serde_json::from_str(&raw)).transpose()?,
    })
}

fn squadron_from_row(row: &Row<'_>) -> ObserveResult<SquadronMetric> {
    let name_raw: String = row.get(0)?;
    let current_tasks: String = row.get(4)?;

    Ok(SquadronMetric {
        squadron_name: parse_stored("squadron_name", &name_raw, Squadron::parse)?,
        active_agents: row.get::<_, i64>(1)? as u32,
        total_agents: row.get::<_, i64>(2)? as u32,
        performance_score: row.get(3)?,
        current_tasks: serde_json::from_str(&current_tasks)?,
        timestamp: millis_to_datetime(row.get(5)?)?,
    })
}

fn activation_from_row(row: &Row<'_>) -> ObserveResult<NeuralActivation> {
    Ok(NeuralActivation {
        session_id: row.get(0)?,
        neuron_id: row.get(1)?,
        neuron_name: row.get(2)?,
        activation_level: row.get(3)?,
        weight: row.get(4)?,
        context: row.get(5)?,
        timestamp: millis_to_datetime(row.get(6)?)?,
    })
}
