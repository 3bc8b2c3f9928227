//! Peer routing — matches a [`Step`](super::plan::Step)'s target skill to
//! a registered peer and breaks ties deterministically.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::types::AgentCard;

/// A peer agent the orchestrator may route steps to.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Friendly name, used in forwarded-event prefixes and logs.
    pub name: String,
    /// Base URL used to construct an [`A2AClient`](crate::client::A2AClient).
    pub base_url: String,
    /// Skill tags this peer handles, overriding whatever its `AgentCard`
    /// advertises when set (the `peers[*].skills_override` config knob).
    pub skills_override: Option<Vec<String>>,
}

#[derive(Default)]
struct PeerStats {
    in_flight: AtomicU32,
    errors: AtomicU64,
    completions: AtomicU64,
}

impl PeerStats {
    fn error_rate(&self) -> f64 {
        let errors = self.errors.load(Ordering::Relaxed) as f64;
        let completions = self.completions.load(Ordering::Relaxed) as f64;
        let total = errors + completions;
        if total == 0.0 { 0.0 } else { errors / total }
    }
}

/// Tracks peers and their advertised skills, selecting a peer for each
/// step and breaking ties by in-flight load, recent error rate, and
/// finally a deterministic hash of the step id.
pub struct PeerRegistry {
    peers: Vec<PeerConfig>,
    stats: HashMap<String, Arc<PeerStats>>,
    /// Skill tags each peer advertises, resolved once from its `AgentCard`
    /// (or from `skills_override`) at registration time.
    skills_by_peer: HashMap<String, Vec<String>>,
}

impl PeerRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self {
            peers: Vec::new(),
            stats: HashMap::new(),
            skills_by_peer: HashMap::new(),
        }
    }

    /// Register a peer with skills resolved from its fetched `AgentCard`,
    /// unless `skills_override` is set on the config.
    pub fn register(&mut self, config: PeerConfig, card: Option<&AgentCard>) {
        let skills = config.skills_override.clone().unwrap_or_else(|| {
            card.map(|c| c.skills.iter().flat_map(|s| s.tags.clone()).collect())
                .unwrap_or_default()
        });
        self.skills_by_peer.insert(config.name.clone(), skills);
        self.stats
            .entry(config.name.clone())
            .or_insert_with(|| Arc::new(PeerStats::default()));
        self.peers.push(config);
    }

    /// Every distinct skill tag any registered peer advertises — fed to
    /// [`Planner::plan`](super::planner::Planner::plan) so the planner
    /// only proposes steps the registry could actually route.
    pub fn available_skills(&self) -> Vec<String> {
        let mut skills: Vec<String> = self
            .skills_by_peer
            .values()
            .flatten()
            .cloned()
            .collect();
        skills.sort();
        skills.dedup();
        skills
    }

    /// Select the best peer advertising `target_skill` for `step_id`.
    ///
    /// Tie-break order: fewer in-flight tasks, then lower
    /// recent error rate, then a deterministic hash of `step_id`.
    pub fn select(&self, target_skill: &str, step_id: &str) -> Option<&PeerConfig> {
        let mut candidates: Vec<&PeerConfig> = self
            .peers
            .iter()
            .filter(|p| {
                self.skills_by_peer
                    .get(&p.name)
                    .is_some_and(|skills| skills.iter().any(|s| s == target_skill))
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| {
            let stats_a = self.stats.get(&a.name);
            let stats_b = self.stats.get(&b.name);
            let in_flight_a = stats_a.map(|s| s.in_flight.load(Ordering::Relaxed)).unwrap_or(0);
            let in_flight_b = stats_b.map(|s| s.in_flight.load(Ordering::Relaxed)).unwrap_or(0);

            in_flight_a
                .cmp(&in_flight_b)
                .then_with(|| {
                    let err_a = stats_a.map(|s| s.error_rate()).unwrap_or(0.0);
                    let err_b = stats_b.map(|s| s.error_rate()).unwrap_or(0.0);
                    err_a.partial_cmp(&err_b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| hash_of((step_id, &a.name)).cmp(&hash_of((step_id, &b.name))))
        });

        candidates.into_iter().next()
    }

    /// Record that a step was just dispatched to `peer_name`.
    pub fn mark_dispatched(&self, peer_name: &str) {
        if let Some(stats) = self.stats.get(peer_name) {
            stats.in_flight.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a step's terminal outcome for `peer_name`.
    pub fn mark_finished(&self, peer_name: &str, succeeded: bool) {
        if let Some(stats) = self.stats.get(peer_name) {
            stats.in_flight.fetch_sub(1, Ordering::Relaxed);
            if succeeded {
                stats.completions.fetch_add(1, Ordering::Relaxed);
            } else {
                stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_of(value: impl Hash) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
