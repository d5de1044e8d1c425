use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A session id observed on a stored event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSighting {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Distinct session ids seen inside the trailing `window`, sorted.
///
/// The caller bounds `sightings` to the most recent events; with no window
/// every sighting counts.
pub fn active_sessions(
    sightings: &[SessionSighting],
    now: DateTime<Utc>,
    window: Option<Duration>,
) -> Vec<String> {
    let cutoff = window
        .and_then(|window| chrono::Duration::from_std(window).ok())
        .and_then(|window| now.checked_sub_signed(window));

    sightings
        .iter()
        .filter(|sighting| cutoff.map_or(true, |cutoff| sighting.timestamp >= cutoff))
        .map(|sighting| sighting.session_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
