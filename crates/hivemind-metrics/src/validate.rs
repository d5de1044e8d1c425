//! Boundary validation: raw inputs and query strings become typed records
//! and filters here, before anything touches the store.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::config::ObserveConfig;
use crate::error::{ObserveError, ObserveResult};
use crate::types::{
    CostFilter, CostQuery, Event, EventFilter, EventInput, EventQuery, EventStatus, EventType,
    LlmProvider, NeuralActivation, NeuralActivationInput, NeuralFilter, NeuralQuery, SourceApp,
    Squadron, SquadronMetric, SquadronQuery, SquadronStatusInput,
};

pub fn validate_event(
    input: EventInput,
    config: &ObserveConfig,
    now: DateTime<Utc>,
) -> ObserveResult<Event> {
    let event_type = EventType::parse(&input.event_type)
        .ok_or_else(|| ObserveError::invalid_kind("eventType", &input.event_type))?;
    let source_app = SourceApp::parse(&input.source_app)
        .ok_or_else(|| ObserveError::invalid_kind("sourceApp", &input.source_app))?;
    let squadron = input
        .squadron
        .as_deref()
        .map(|raw| Squadron::parse(raw).ok_or_else(|| ObserveError::invalid_kind("squadron", raw)))
        .transpose()?;
    let status = input
        .status
        .as_deref()
        .map(|raw| EventStatus::parse(raw).ok_or_else(|| ObserveError::invalid_kind("status", raw)))
        .transpose()?
        .unwrap_or_default();

    if input.action.trim().is_empty() {
        return Err(ObserveError::InvalidInput("action must not be empty".into()));
    }

    let size = payload_size(&input)?;
    if size > config.max_payload_bytes {
        return Err(ObserveError::PayloadTooLarge {
            size,
            max: config.max_payload_bytes,
        });
    }

    let duration = non_negative("duration", input.duration)?;
    let tokens_used = non_negative("tokensUsed", input.tokens_used)?;
    if let Some(cost) = input.cost_estimate {
        if !cost.is_finite() || cost < 0.0 {
            return Err(ObserveError::InvalidInput(format!(
                "costEstimate must be a non-negative number, got {}",
                cost
            )));
        }
    }

    let llm_provider = input
        .llm_provider
        .filter(|provider| !provider.trim().is_empty())
        .map(LlmProvider::from);
    let timestamp = match input.timestamp {
        Some(millis) => millis_to_datetime("timestamp", millis)
            .map_err(|_| ObserveError::InvalidInput(format!("timestamp out of range: {}", millis)))?,
        None => now,
    };

    Ok(Event {
        id: Uuid::new_v4().to_string(),
        timestamp,
        event_type,
        source_app,
        squadron,
        status,
        action: input.action,
        session_id: non_blank(input.session_id),
        org_id: non_blank(input.org_id),
        agent_name: non_blank(input.agent_name),
        duration,
        tokens_used,
        cost_estimate: input.cost_estimate,
        llm_provider,
        llm_model: non_blank(input.llm_model),
        payload: input.payload,
        metadata: input.metadata,
    })
}

pub fn validate_squadron_status(
    input: SquadronStatusInput,
    now: DateTime<Utc>,
) -> ObserveResult<SquadronMetric> {
    let squadron_name = Squadron::parse(&input.squadron_name)
        .ok_or_else(|| ObserveError::invalid_kind("squadronName", &input.squadron_name))?;
    let total_agents = input
        .total_agents
        .unwrap_or(i64::from(Squadron::DEFAULT_CAPACITY));

    if input.active_agents < 0 || total_agents < 0 || input.active_agents > total_agents {
        return Err(ObserveError::InvalidInput(format!(
            "activeAgents must lie within 0..={}, got {}",
            total_agents, input.active_agents
        )));
    }
    if !(0.0..=100.0).contains(&input.performance_score) {
        return Err(ObserveError::InvalidInput(format!(
            "performanceScore must lie within 0..=100, got {}",
            input.performance_score
        )));
    }

    let active_agents = u32::try_from(input.active_agents)
        .map_err(|_| ObserveError::InvalidInput("activeAgents is too large".into()))?;
    let total_agents = u32::try_from(total_agents)
        .map_err(|_| ObserveError::InvalidInput("totalAgents is too large".into()))?;
    let timestamp = match input.timestamp {
        Some(millis) => millis_to_datetime("timestamp", millis)
            .map_err(|_| ObserveError::InvalidInput(format!("timestamp out of range: {}", millis)))?,
        None => now,
    };

    Ok(SquadronMetric {
        squadron_name,
        active_agents,
        total_agents,
        performance_score: input.performance_score,
        current_tasks: input.current_tasks,
        timestamp,
    })
}

pub fn validate_neural_activation(
    input: NeuralActivationInput,
    now: DateTime<Utc>,
) -> ObserveResult<NeuralActivation> {
    if input.session_id.trim().is_empty() || input.neuron_id.trim().is_empty() {
        return Err(ObserveError::InvalidInput(
            "sessionId and neuronId must not be empty".into(),
        ));
    }
    if !(0.0..=1.0).contains(&input.activation_level) {
        return Err(ObserveError::InvalidInput(format!(
            "activationLevel must lie within 0.0..=1.0, got {}",
            input.activation_level
        )));
    }
    if !input.weight.is_finite() {
        return Err(ObserveError::InvalidInput("weight must be finite".into()));
    }
    let timestamp = match input.timestamp {
        Some(millis) => millis_to_datetime("timestamp", millis)
            .map_err(|_| ObserveError::InvalidInput(format!("timestamp out of range: {}", millis)))?,
        None => now,
    };

    Ok(NeuralActivation {
        session_id: input.session_id,
        neuron_id: input.neuron_id,
        neuron_name: input.neuron_name,
        activation_level: input.activation_level,
        weight: input.weight,
        context: input.context,
        timestamp,
    })
}

impl EventQuery {
    pub fn into_filter(self) -> ObserveResult<EventFilter> {
        let (start_time, end_time) = time_range(self.start_time, self.end_time)?;

        Ok(EventFilter {
            session_id: identifier("sessionId", self.session_id)?,
            org_id: identifier("orgId", self.org_id)?,
            source_app: filter_enum("sourceApp", self.source_app, SourceApp::parse)?,
            event_type: filter_enum("eventType", self.event_type, EventType::parse)?,
            squadron: filter_enum("squadron", self.squadron, Squadron::parse)?,
            status: filter_enum("status", self.status, EventStatus::parse)?,
            start_time,
            end_time,
            limit: positive_limit(self.limit)?,
        })
    }
}

impl CostQuery {
    pub fn into_filter(self) -> ObserveResult<CostFilter> {
        let (start_time, end_time) = time_range(self.start_time, self.end_time)?;

        Ok(CostFilter {
            session_id: identifier("sessionId", self.session_id)?,
            org_id: identifier("orgId", self.org_id)?,
            start_time,
            end_time,
        })
    }
}

impl SquadronQuery {
    pub fn into_squadron(self) -> ObserveResult<Option<Squadron>> {
        filter_enum("squadronName", self.squadron_name, Squadron::parse)
    }
}

impl NeuralQuery {
    pub fn into_filter(self) -> ObserveResult<NeuralFilter> {
        Ok(NeuralFilter {
            session_id: identifier("sessionId", self.session_id)?,
            neuron_id: identifier("neuronId", self.neuron_id)?,
            limit: positive_limit(self.limit)?,
        })
    }
}

/// Reject blank identifiers in a filter; absence is fine.
pub fn identifier(field: &str, value: Option<String>) -> ObserveResult<Option<String>> {
    match value {
        Some(raw) if raw.trim().is_empty() => Err(ObserveError::InvalidFilter(format!(
            "{} must not be empty",
            field
        ))),
        other => Ok(other),
    }
}

fn filter_enum<T>(
    field: &str,
    value: Option<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> ObserveResult<Option<T>> {
    value
        .map(|raw| {
            parse(&raw).ok_or_else(|| {
                ObserveError::InvalidFilter(format!("unknown {} '{}'", field, raw))
            })
        })
        .transpose()
}

fn positive_limit(limit: Option<i64>) -> ObserveResult<Option<u32>> {
    match limit {
        None => Ok(None),
        Some(value) if value <= 0 => Err(ObserveError::InvalidFilter(format!(
            "limit must be a positive integer, got {}",
            value
        ))),
        Some(value) => Ok(Some(u32::try_from(value).unwrap_or(u32::MAX))),
    }
}

fn time_range(
    start: Option<i64>,
    end: Option<i64>,
) -> ObserveResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let start = start.map(|ms| millis_to_datetime("startTime", ms)).transpose()?;
    let end = end.map(|ms| millis_to_datetime("endTime", ms)).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ObserveError::InvalidFilter(
                "startTime must not be after endTime".into(),
            ));
        }
    }

    Ok((start, end))
}

fn millis_to_datetime(field: &str, millis: i64) -> ObserveResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        ObserveError::InvalidFilter(format!("{} out of range: {}", field, millis))
    })
}

fn non_negative(field: &str, value: Option<i64>) -> ObserveResult<Option<u64>> {
    value
        .map(|raw| {
            u64::try_from(raw).map_err(|_| {
                ObserveError::InvalidInput(format!("{} must not be negative, got {}", field, raw))
            })
        })
        .transpose()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

fn payload_size(input: &EventInput) -> ObserveResult<usize> {
    let mut size = input.action.len();
    if let Some(payload) = &input.payload {
        size += serde_json::to_vec(payload)?.len();
    }
    if let Some(metadata) = &input.metadata {
        size += serde_json::to_vec(metadata)?.len();
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventPayload;

    fn input(event_type: &str, source_app: &str) -> EventInput {
        EventInput {
            event_type: event_type.to_string(),
            source_app: source_app.to_string(),
            action: "route prompt".to_string(),
            ..EventInput::default()
        }
    }

    #[test]
    fn valid_event_defaults_status_and_timestamp() {
        let now = Utc::now();
        let event = validate_event(input("LLMRoute", "llm-router"), &ObserveConfig::default(), now)
            .expect("valid event");

        assert_eq!(event.event_type, EventType::LlmRoute);
        assert_eq!(event.source_app, SourceApp::LlmRouter);
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.timestamp, now);
        assert!(!event.id.is_empty());
    }

    #[test]
    fn unknown_event_type_is_an_invalid_kind() {
        let error = validate_event(input("Teleport", "llm-router"), &ObserveConfig::default(), Utc::now())
            .expect_err("should reject");
        assert!(matches!(
            error,
            ObserveError::InvalidEventKind { field: "eventType", .. }
        ));
    }

    #[test]
    fn unknown_source_app_is_an_invalid_kind() {
        let error = validate_event(input("ToolCall", "cursor"), &ObserveConfig::default(), Utc::now())
            .expect_err("should reject");
        assert!(matches!(
            error,
            ObserveError::InvalidEventKind { field: "sourceApp", .. }
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let config = ObserveConfig {
            max_payload_bytes: 64,
            ..ObserveConfig::default()
        };
        let mut event = input("ToolCall", "claude-code");
        event.payload = Some(EventPayload {
            output: Some("x".repeat(200)),
            ..EventPayload::default()
        });

        let error = validate_event(event, &config, Utc::now()).expect_err("should reject");
        assert!(matches!(error, ObserveError::PayloadTooLarge { max: 64, .. }));
    }

    #[test]
    fn negative_tokens_are_rejected() {
        let mut event = input("LLMRoute", "llm-router");
        event.tokens_used = Some(-5);
        let error =
            validate_event(event, &ObserveConfig::default(), Utc::now()).expect_err("reject");
        assert!(matches!(error, ObserveError::InvalidInput(_)));
    }

    #[test]
    fn query_with_unknown_status_is_an_invalid_filter() {
        let query = EventQuery {
            status: Some("done".to_string()),
            ..EventQuery::default()
        };
        assert!(matches!(
            query.into_filter(),
            Err(ObserveError::InvalidFilter(_))
        ));
    }

    #[test]
    fn query_rejects_inverted_range_and_zero_limit() {
        let inverted = EventQuery {
            start_time: Some(2_000),
            end_time: Some(1_000),
            ..EventQuery::default()
        };
        assert!(inverted.into_filter().is_err());

        let zero = EventQuery {
            limit: Some(0),
            ..EventQuery::default()
        };
        assert!(zero.into_filter().is_err());
    }

    #[test]
    fn squadron_snapshot_invariants_are_enforced() {
        let over_capacity = SquadronStatusInput {
            squadron_name: "data".to_string(),
            active_agents: 10,
            total_agents: Some(9),
            performance_score: 50.0,
            current_tasks: vec![],
            timestamp: None,
        };
        assert!(validate_squadron_status(over_capacity, Utc::now()).is_err());

        let bad_score = SquadronStatusInput {
            squadron_name: "knowledge".to_string(),
            active_agents: 3,
            total_agents: None,
            performance_score: 101.0,
            current_tasks: vec![],
            timestamp: None,
        };
        assert!(validate_squadron_status(bad_score, Utc::now()).is_err());

        let ok = SquadronStatusInput {
            squadron_name: "validation".to_string(),
            active_agents: 4,
            total_agents: None,
            performance_score: 88.5,
            current_tasks: vec!["verify".to_string()],
            timestamp: Some(1_700_000_000_000),
        };
        let metric = validate_squadron_status(ok, Utc::now()).expect("valid snapshot");
        assert_eq!(metric.total_agents, Squadron::DEFAULT_CAPACITY);
        assert_eq!(metric.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn activation_level_must_be_a_fraction() {
        let activation = NeuralActivationInput {
            session_id: "s".to_string(),
            neuron_id: "uce-01".to_string(),
            neuron_name: "voice-intent-recognition".to_string(),
            activation_level: 1.5,
            weight: 0.3,
            context: String::new(),
            timestamp: None,
        };
        assert!(validate_neural_activation(activation, Utc::now()).is_err());
    }
}
