//! Plan and Step types driving the orchestrator's fan-out loop.
//!
//! These never cross the wire — the plan shape is internal to this node
//! — they exist purely to give the coordinator's control flow a
//! concrete, independently testable structure.

use std::time::Duration;

/// A single unit of delegated work within a [`Plan`].
#[derive(Debug, Clone)]
pub struct Step {
    /// Identifier unique within its plan, used for routing tie-breaks and
    /// to prefix forwarded peer events.
    pub step_id: String,
    /// Human-readable description, folded into the planning/synthesis calls.
    pub description: String,
    /// Step IDs that must reach a terminal state before this one may start.
    pub depends_on: Vec<String>,
    /// Skill tag a peer's `AgentCard` must advertise to be eligible.
    pub target_skill: String,
    /// Whether failure of this step (after retries are exhausted) fails
    /// the whole plan, or is merely noted as an omission in the synthesis.
    pub required: bool,
    /// Retry policy for this step; falls back to [`RetryPolicy::default`]
    /// when a planner doesn't set one.
    pub retry_policy: RetryPolicy,
}

impl Step {
    /// Convenience constructor for a required step with the default
    /// retry policy and no dependencies.
    pub fn new(step_id: impl Into<String>, description: impl Into<String>, target_skill: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            description: description.into(),
            depends_on: Vec::new(),
            target_skill: target_skill.into(),
            required: true,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Mark this step optional — its exhausted-retry failure only omits
    /// it from the synthesis rather than failing the outer task.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Attach dependencies by step id.
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// An ordered list of [`Step`]s produced by a [`Planner`](super::planner::Planner).
///
/// "Ordered" here means plan order — the order the planner emitted the
/// steps in, which is also the order aggregation reads outputs back in
/// — aggregation reads outputs in plan order, not completion order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Plan {
    /// An empty plan — used when a planner determines no delegation is needed.
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Look up a step by id.
    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}

/// How many times, and under which failure classes, a step is retried.
///
/// Default failure policy: 1 retry on timeout/unreachable, 0 on
/// remote_failed.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries granted when the peer call timed out or was unreachable.
    pub retries_on_transport_failure: u32,
    /// Retries granted when the peer task itself transitioned to `failed`.
    pub retries_on_remote_failure: u32,
    /// Delay before a retry attempt.
    pub retry_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries_on_transport_failure: 1,
            retries_on_remote_failure: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Why a step ended up in [`StepStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailureKind {
    /// The peer was unreachable or the call timed out.
    TransportFailure,
    /// The peer task itself transitioned to `failed`.
    RemoteFailure,
    /// No peer advertising the required skill could be found.
    NoEligiblePeer,
}

/// Runtime status of a [`Step`] as the coordinator drives it.
#[derive(Debug, Clone)]
pub enum StepStatus {
    /// Waiting on its `depends_on` set.
    Pending,
    /// Dispatched to a peer, awaiting a terminal result.
    InFlight { peer_base_url: String },
    /// The peer bubbled up `input-required` or `auth-required`.
    AwaitingInput { peer_base_url: String, prompt: String },
    /// Completed with output parts from the peer's `final` item.
    Completed { parts: Vec<crate::types::Part> },
    /// Exhausted retries (or no eligible peer); plan execution decides
    /// whether this fails the outer task based on `Step::required`.
    Failed { kind: StepFailureKind, detail: String },
}
