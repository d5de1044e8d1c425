use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
    VoiceCommand,
    BrowserAction,
    #[serde(rename = "LLMRoute")]
    LlmRoute,
    AgentSpawn,
    NeuralActivation,
    ToolCall,
    Error,
    Metric,
    SessionStart,
    SessionEnd,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        Self::VoiceCommand,
        Self::BrowserAction,
        Self::LlmRoute,
        Self::AgentSpawn,
        Self::NeuralActivation,
        Self::ToolCall,
        Self::Error,
        Self::Metric,
        Self::SessionStart,
        Self::SessionEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VoiceCommand => "VoiceCommand",
            Self::BrowserAction => "BrowserAction",
            Self::LlmRoute => "LLMRoute",
            Self::AgentSpawn => "AgentSpawn",
            Self::NeuralActivation => "NeuralActivation",
            Self::ToolCall => "ToolCall",
            Self::Error => "Error",
            Self::Metric => "Metric",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceApp {
    #[serde(rename = "hivemind-v3")]
    HivemindV3,
    #[serde(rename = "voice-controller")]
    VoiceController,
    #[serde(rename = "browser-validator")]
    BrowserValidator,
    #[serde(rename = "llm-router")]
    LlmRouter,
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "agent-orchestrator")]
    AgentOrchestrator,
}

impl SourceApp {
    pub const ALL: [SourceApp; 6] = [
        Self::HivemindV3,
        Self::VoiceController,
        Self::BrowserValidator,
        Self::LlmRouter,
        Self::ClaudeCode,
        Self::AgentOrchestrator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HivemindV3 => "hivemind-v3",
            Self::VoiceController => "voice-controller",
            Self::BrowserValidator => "browser-validator",
            Self::LlmRouter => "llm-router",
            Self::ClaudeCode => "claude-code",
            Self::AgentOrchestrator => "agent-orchestrator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|app| app.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Squadron {
    Data,
    Knowledge,
    Validation,
}

impl Squadron {
    pub const ALL: [Squadron; 3] = [Self::Data, Self::Knowledge, Self::Validation];

    /// Agents per squadron when a snapshot does not say otherwise.
    pub const DEFAULT_CAPACITY: u32 = 9;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Knowledge => "knowledge",
            Self::Validation => "validation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "data" => Some(Self::Data),
            "knowledge" => Some(Self::Knowledge),
            "validation" => Some(Self::Validation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// LLM provider label. Known providers get their own variant, anything else
/// is carried verbatim so aggregation can still group on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
    Claude,
    Other(String),
}

impl LlmProvider {
    pub fn as_str(&self) -> &str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for LlmProvider {
    fn from(value: String) -> Self {
        match value.as_str() {
            "openai" => Self::OpenAi,
            "gemini" => Self::Gemini,
            "claude" => Self::Claude,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for LlmProvider {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<LlmProvider> for String {
    fn from(value: LlmProvider) -> Self {
        match value {
            LlmProvider::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// An event as submitted by instrumentation, before validation.
///
/// Enum-valued fields stay as raw strings here so that an out-of-range value
/// is reported as an invalid event kind rather than a decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub event_type: String,
    pub source_app: String,
    pub action: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub squadron: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub tokens_used: Option<i64>,
    #[serde(default)]
    pub cost_estimate: Option<f64>,
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub payload: Option<EventPayload>,
    #[serde(default)]
    pub metadata: Option<EventMetadata>,
    /// Caller-assigned time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub source_app: SourceApp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squadron: Option<Squadron>,
    pub status: EventStatus,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<LlmProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

/// Query-string form of an event filter. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub session_id: Option<String>,
    pub org_id: Option<String>,
    pub source_app: Option<String>,
    pub event_type: Option<String>,
    pub squadron: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<i64>,
}

/// Validated, conjunctive event filter. `None` means no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub session_id: Option<String>,
    pub org_id: Option<String>,
    pub source_app: Option<SourceApp>,
    pub event_type: Option<EventType>,
    pub squadron: Option<Squadron>,
    pub status: Option<EventStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl EventFilter {
    pub fn with_status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        fn check<T: PartialEq>(wanted: &Option<T>, actual: Option<&T>) -> bool {
            match wanted {
                Some(value) => actual == Some(value),
                None => true,
            }
        }

        check(&self.session_id, event.session_id.as_ref())
            && check(&self.org_id, event.org_id.as_ref())
            && check(&self.source_app, Some(&event.source_app))
            && check(&self.event_type, Some(&event.event_type))
            && check(&self.squadron, event.squadron.as_ref())
            && check(&self.status, Some(&event.status))
            && self.start_time.map_or(true, |start| event.timestamp >= start)
            && self.end_time.map_or(true, |end| event.timestamp <= end)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    pub org_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CostQuery {
    pub session_id: Option<String>,
    pub org_id: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostFilter {
    pub session_id: Option<String>,
    pub org_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// One LLM call as seen by the cost aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmUsage {
    pub provider: LlmProvider,
    pub tokens_used: Option<u64>,
    pub cost_estimate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCost {
    pub provider: LlmProvider,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub request_count: u64,
    pub avg_tokens_per_request: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostMetrics {
    pub breakdown: Vec<ProviderCost>,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub source_apps: Vec<SourceApp>,
    pub event_types: Vec<EventType>,
    pub squadrons: Vec<Squadron>,
    pub statuses: Vec<EventStatus>,
    pub session_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SquadronStatusInput {
    pub squadron_name: String,
    pub active_agents: i64,
    #[serde(default)]
    pub total_agents: Option<i64>,
    pub performance_score: f64,
    #[serde(default)]
    pub current_tasks: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SquadronMetric {
    pub squadron_name: Squadron,
    pub active_agents: u32,
    pub total_agents: u32,
    pub performance_score: f64,
    pub current_tasks: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SquadronQuery {
    pub squadron_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SquadronMetrics {
    pub squadrons: Vec<SquadronMetric>,
    pub total_squadrons: u32,
    pub total_agents: u32,
    pub active_agents: u32,
    pub avg_performance_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NeuralActivationInput {
    pub session_id: String,
    pub neuron_id: String,
    pub neuron_name: String,
    pub activation_level: f64,
    pub weight: f64,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NeuralActivation {
    pub session_id: String,
    pub neuron_id: String,
    pub neuron_name: String,
    pub activation_level: f64,
    pub weight: f64,
    pub context: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NeuralQuery {
    pub session_id: Option<String>,
    pub neuron_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeuralFilter {
    pub session_id: Option<String>,
    pub neuron_id: Option<String>,
    pub limit: Option<u32>,
}

impl NeuralFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NeuralNetworkState {
    pub activations: Vec<NeuralActivation>,
    pub total_neurons: u32,
    pub active_neurons: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub total_events: u64,
    pub events_by_type: HashMap<EventType, u64>,
    pub events_by_status: HashMap<EventStatus, u64>,
    pub neural_activations: u64,
    pub unique_neurons: u64,
    pub total_duration: u64,
    pub total_cost: f64,
    pub total_tokens: u64,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_enumerations_round_trip_through_their_wire_names() {
        for kind in EventType::ALL {
            assert_eq!(EventType::parse(kind.as_str()), Some(kind));
        }
        for app in SourceApp::ALL {
            assert_eq!(SourceApp::parse(app.as_str()), Some(app));
        }
        assert_eq!(EventType::parse("llmroute"), None);
        assert_eq!(SourceApp::parse("Hivemind-V3"), None);
        assert_eq!(EventStatus::parse("in_progress"), Some(EventStatus::InProgress));
    }

    #[test]
    fn serde_names_match_as_str() {
        let json = serde_json::to_string(&EventType::LlmRoute).expect("serialize");
        assert_eq!(json, "\"LLMRoute\"");
        let json = serde_json::to_string(&SourceApp::HivemindV3).expect("serialize");
        assert_eq!(json, "\"hivemind-v3\"");
        let json = serde_json::to_string(&EventStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn unknown_llm_provider_is_kept_verbatim() {
        let provider: LlmProvider =
            serde_json::from_str("\"mistral\"").expect("deserialize provider");
        assert_eq!(provider, LlmProvider::Other("mistral".to_string()));
        assert_eq!(provider.as_str(), "mistral");

        let known: LlmProvider = serde_json::from_str("\"claude\"").expect("deserialize");
        assert_eq!(known, LlmProvider::Claude);
        assert_eq!(serde_json::to_string(&known).expect("serialize"), "\"claude\"");
    }

    #[test]
    fn session_summary_serializes_missing_bounds_as_null() {
        let summary = SessionSummary {
            session_id: "s-1".to_string(),
            ..SessionSummary::default()
        };
        let value = serde_json::to_value(&summary).expect("serialize");
        assert!(value["startTime"].is_null());
        assert!(value["endTime"].is_null());
        assert_eq!(value["totalEvents"], 0);
    }
}
