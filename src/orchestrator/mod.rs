//! Orchestrator coordinator — plan → route → execute (fan-out) → aggregate.
//!
//! - [`Plan`] / [`Step`] / [`RetryPolicy`] — the internal plan shape (never
//!   serialized to the wire; see `DESIGN.md`)
//! - [`Planner`] trait + [`StubPlanner`] — the opaque planning/synthesis seam
//! - [`PeerRegistry`] / [`PeerConfig`] — skill-based peer selection
//! - [`OrchestratorWorker`] — the [`Worker`](crate::server::worker::Worker)
//!   implementation driving plan/route/execute/aggregate against peers
//!   through [`A2AClient`](crate::client::A2AClient)

mod coordinator;
mod plan;
mod planner;
mod router;

pub use coordinator::{OrchestratorWorker, PeerTimeouts};
pub use plan::{Plan, RetryPolicy, Step, StepFailureKind, StepStatus};
pub use planner::{Planner, StubPlanner};
pub use router::{PeerConfig, PeerRegistry};
