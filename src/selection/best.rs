//! Best-server selection over a registry snapshot.
//!
//! Pure function of `(snapshot, constraints)`. Never probes.

use crate::registry::{ServerConfig, ServerStatus};
use crate::selection::constraints::SelectionConstraints;

/// Pick the best eligible server.
///
/// Candidates are active servers whose last status is healthy. After the
/// capability and token filters, a surviving preferred server wins outright;
/// otherwise exclusions apply and the rest are ordered by priority, then
/// probe latency, then id.
pub fn select_best(
    snapshot: &[(ServerConfig, Option<ServerStatus>)],
    constraints: &SelectionConstraints,
) -> Option<ServerConfig> {
    let candidates: Vec<(&ServerConfig, Option<&ServerStatus>)> = snapshot
        .iter()
        .filter(|(server, status)| server.is_active && status.as_ref().is_some_and(|s| s.is_healthy))
        .filter(|(server, _)| match &constraints.capability {
            Some(cap) => server.has_capability(cap),
            None => true,
        })
        .filter(|(server, _)| match (constraints.max_tokens, server.max_tokens) {
            (Some(requested), Some(limit)) => limit >= requested,
            _ => true,
        })
        .map(|(server, status)| (server, status.as_ref()))
        .collect();

    if let Some(preferred) = &constraints.preferred_server_id {
        if let Some((server, _)) = candidates.iter().find(|(s, _)| &s.id == preferred) {
            return Some((*server).clone());
        }
    }

    candidates
        .into_iter()
        .filter(|(server, _)| !constraints.is_excluded(&server.id))
        .min_by(|(a, sa), (b, sb)| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| latency(*sa).cmp(&latency(*sb)))
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|(server, _)| server.clone())
}

fn latency(status: Option<&ServerStatus>) -> u64 {
    status.map_or(u64::MAX, |s| s.response_time_ms)
}
