use std::collections::{BTreeMap, HashSet};

use crate::config::TOTAL_NEURONS;
use crate::types::{
    CostMetrics, Event, LlmUsage, NeuralActivation, NeuralNetworkState, ProviderCost, Squadron,
    SessionSummary, SquadronMetric, SquadronMetrics,
};

/// Roll LLM usage up per provider.
///
/// `usages` must be in event order; per-provider sums accumulate in that
/// order and the global totals are summed over the breakdown left to right,
/// so the totals always equal the sum of the breakdown. Token counts
/// saturate at `u64::MAX`.
pub fn aggregate_costs(usages: &[LlmUsage]) -> CostMetrics {
    let mut buckets: BTreeMap<String, ProviderCost> = BTreeMap::new();

    for usage in usages {
        let entry = buckets
            .entry(usage.provider.as_str().to_string())
            .or_insert_with(|| ProviderCost {
                provider: usage.provider.clone(),
                total_cost: 0.0,
                total_tokens: 0,
                request_count: 0,
                avg_tokens_per_request: 0.0,
            });

        entry.total_cost += usage.cost_estimate.unwrap_or(0.0);
        entry.total_tokens = entry
            .total_tokens
            .saturating_add(usage.tokens_used.unwrap_or(0));
        entry.request_count += 1;
    }

    let mut breakdown: Vec<ProviderCost> = buckets.into_values().collect();
    for stats in &mut breakdown {
        stats.avg_tokens_per_request = average(stats.total_tokens, stats.request_count);
    }

    let mut metrics = CostMetrics::default();
    for stats in &breakdown {
        metrics.total_cost += stats.total_cost;
        metrics.total_tokens = metrics.total_tokens.saturating_add(stats.total_tokens);
        metrics.total_requests += stats.request_count;
    }
    metrics.breakdown = breakdown;
    metrics
}

/// Latest snapshot per squadron, alphabetical by name.
///
/// Later entries in `snapshots` win timestamp ties.
pub fn latest_squadron_snapshots(snapshots: &[SquadronMetric]) -> SquadronMetrics {
    let mut latest: BTreeMap<&'static str, &SquadronMetric> = BTreeMap::new();

    for snapshot in snapshots {
        let key = snapshot.squadron_name.as_str();
        match latest.get(key) {
            Some(current) if current.timestamp > snapshot.timestamp => {}
            _ => {
                latest.insert(key, snapshot);
            }
        }
    }

    let squadrons: Vec<SquadronMetric> = latest.into_values().cloned().collect();
    let total_agents = squadrons
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.total_agents));
    let active_agents = squadrons
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.active_agents));
    let avg_performance_score = if squadrons.is_empty() {
        0.0
    } else {
        squadrons.iter().map(|s| s.performance_score).sum::<f64>() / squadrons.len() as f64
    };

    SquadronMetrics {
        squadrons,
        total_squadrons: Squadron::ALL.len() as u32,
        total_agents,
        active_agents,
        avg_performance_score,
    }
}

pub fn summarize_session(
    session_id: &str,
    events: &[Event],
    activations: &[NeuralActivation],
) -> SessionSummary {
    let mut summary = SessionSummary {
        session_id: session_id.to_string(),
        ..SessionSummary::default()
    };

    for event in events {
        summary.total_events += 1;
        *summary.events_by_type.entry(event.event_type).or_insert(0) += 1;
        *summary.events_by_status.entry(event.status).or_insert(0) += 1;
        summary.total_duration = summary
            .total_duration
            .saturating_add(event.duration.unwrap_or(0));
        summary.total_cost += event.cost_estimate.unwrap_or(0.0);
        summary.total_tokens = summary
            .total_tokens
            .saturating_add(event.tokens_used.unwrap_or(0));

        summary.start_time = Some(match summary.start_time {
            Some(start) => start.min(event.timestamp),
            None => event.timestamp,
        });
        summary.end_time = Some(match summary.end_time {
            Some(end) => end.max(event.timestamp),
            None => event.timestamp,
        });
    }

    summary.neural_activations = activations.len() as u64;
    summary.unique_neurons = activations
        .iter()
        .map(|activation| activation.neuron_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    summary
}

/// Keep the first activation seen per neuron. `activations` is newest first.
pub fn latest_activations(activations: Vec<NeuralActivation>) -> NeuralNetworkState {
    let mut seen: HashSet<String> = HashSet::new();
    let mut latest = Vec::new();

    for activation in activations {
        if seen.insert(activation.neuron_id.clone()) {
            latest.push(activation);
        }
    }

    NeuralNetworkState {
        active_neurons: latest.len() as u32,
        activations: latest,
        total_neurons: TOTAL_NEURONS,
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
