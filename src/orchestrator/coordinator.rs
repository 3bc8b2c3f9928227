//! Orchestrator Coordinator — a [`Worker`] that decomposes a task across
//! registered peer agents and aggregates their results.
//!
//! Implemented as a plain [`Worker`], it plugs into [`WorkerAdapter`]
//! exactly like any leaf-agent worker; nothing in the dispatcher, event
//! queue, or SSE plumbing needs to know it exists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tracing::warn;

use crate::client::A2AClient;
use crate::error::{A2AError, A2AResult};
use crate::server::worker::{Worker, WorkerItem};
use crate::types::{Message, Part, Role, SendMessageConfiguration, SendMessageParams, StreamResponse, TaskState};

use super::plan::{Plan, StepFailureKind, StepStatus};
use super::planner::Planner;
use super::router::PeerRegistry;

/// Peer call timeouts: connect 3s, total 30s, stream idle 60s, by default.
#[derive(Debug, Clone, Copy)]
pub struct PeerTimeouts {
    pub total: Duration,
    pub stream_idle: Duration,
}

impl Default for PeerTimeouts {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(30),
            stream_idle: Duration::from_secs(60),
        }
    }
}

struct RunState {
    plan: Plan,
    statuses: Vec<StepStatus>,
    /// step index -> (peer name, peer task id, peer base url), recorded
    /// once the peer assigns a task id so resume/cancel can address it.
    peer_tasks: HashMap<usize, (String, String, String)>,
    canceled: Arc<std::sync::atomic::AtomicBool>,
    cancel_notify: Arc<Notify>,
}

impl RunState {
    fn new(plan: Plan) -> Self {
        let statuses = plan.steps.iter().map(|_| StepStatus::Pending).collect();
        Self {
            plan,
            statuses,
            peer_tasks: HashMap::new(),
            canceled: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            cancel_notify: Arc::new(Notify::new()),
        }
    }

    fn ready_step_indices(&self) -> Vec<usize> {
        self.plan
            .steps
            .iter()
            .enumerate()
            .filter(|(i, _)| matches!(self.statuses[*i], StepStatus::Pending))
            .filter(|(_, step)| {
                step.depends_on.iter().all(|dep_id| {
                    self.plan
                        .step(dep_id)
                        .and_then(|dep| self.plan.steps.iter().position(|s| s.step_id == dep.step_id))
                        .is_some_and(|dep_idx| matches!(self.statuses[dep_idx], StepStatus::Completed { .. }))
                })
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn fail_blocked_on_dependency(&mut self) -> bool {
        let mut changed = false;
        for i in 0..self.plan.steps.len() {
            if !matches!(self.statuses[i], StepStatus::Pending) {
                continue;
            }
            let blocked = self.plan.steps[i].depends_on.iter().any(|dep_id| {
                self.plan
                    .step(dep_id)
                    .and_then(|dep| self.plan.steps.iter().position(|s| s.step_id == dep.step_id))
                    .is_some_and(|dep_idx| matches!(self.statuses[dep_idx], StepStatus::Failed { .. }))
            });
            if blocked {
                self.statuses[i] = StepStatus::Failed {
                    kind: StepFailureKind::RemoteFailure,
                    detail: "a dependency failed".to_string(),
                };
                changed = true;
            }
        }
        changed
    }

    fn all_terminal(&self) -> bool {
        self.statuses
            .iter()
            .all(|s| matches!(s, StepStatus::Completed { .. } | StepStatus::Failed { .. }))
    }

    fn any_awaiting(&self) -> Option<usize> {
        self.statuses
            .iter()
            .position(|s| matches!(s, StepStatus::AwaitingInput { .. }))
    }

    fn any_required_failed(&self) -> bool {
        self.statuses.iter().enumerate().any(|(i, s)| {
            matches!(s, StepStatus::Failed { .. }) && self.plan.steps[i].required
        })
    }

    fn outputs_in_plan_order(&self) -> Vec<Option<Vec<Part>>> {
        self.statuses
            .iter()
            .map(|s| match s {
                StepStatus::Completed { parts } => Some(parts.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Outcome of dispatching a single step to a peer, reported back to the
/// driver loop over an internal channel.
enum StepEvent {
    Forward { step_idx: usize, text: String },
    Linked { step_idx: usize, peer_name: String, peer_task_id: String, base_url: String },
    Completed { step_idx: usize, parts: Vec<Part> },
    Awaiting { step_idx: usize, prompt: String },
    Failed { step_idx: usize, kind: StepFailureKind, detail: String },
}

/// Shared, cheaply-cloned state the driver loop needs — split out from
/// [`OrchestratorWorker`] so spawned driver tasks can hold an owned `Arc`
/// of just this instead of needing `Arc<OrchestratorWorker<P>>` (which
/// `&self` in the `Worker` trait methods can't produce).
struct Ctx<P: Planner> {
    planner: Arc<P>,
    registry: Arc<PeerRegistry>,
    concurrency_limit: usize,
    timeouts: PeerTimeouts,
}

/// Orchestrator coordinator — plans, routes, dispatches, and aggregates.
///
/// Construct one per node and share it across tasks via
/// [`WorkerAdapter`](crate::server::worker::WorkerAdapter); it is cheaply
/// `Clone`-able through the same `Arc` wrapping every other `Worker`.
pub struct OrchestratorWorker<P: Planner> {
    ctx: Arc<Ctx<P>>,
    runs: Mutex<HashMap<String, Arc<Mutex<RunState>>>>,
}

impl<P: Planner + 'static> OrchestratorWorker<P> {
    /// Build a coordinator over `planner` and `registry` with the default
    /// fan-out concurrency limit (4) and peer timeouts.
    pub fn new(planner: Arc<P>, registry: Arc<PeerRegistry>) -> Self {
        Self {
            ctx: Arc::new(Ctx {
                planner,
                registry,
                concurrency_limit: 4,
                timeouts: PeerTimeouts::default(),
            }),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Override the fan-out concurrency limit P: dispatch keeps up to P
    /// steps in flight at once.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        let ctx = Arc::get_mut(&mut self.ctx).expect("no clones exist before construction finishes");
        ctx.concurrency_limit = limit.max(1);
        self
    }

    /// Override peer call timeouts.
    pub fn with_timeouts(mut self, timeouts: PeerTimeouts) -> Self {
        let ctx = Arc::get_mut(&mut self.ctx).expect("no clones exist before construction finishes");
        ctx.timeouts = timeouts;
        self
    }

    fn registry(&self) -> &PeerRegistry {
        &self.ctx.registry
    }

    fn planner(&self) -> &P {
        &self.ctx.planner
    }
}

impl<P: Planner> Ctx<P> {
    /// Drive `state` to either a pause point (all runnable work blocked on
    /// input, or no more progress possible) or full completion, streaming
    /// [`WorkerItem`]s to `tx` as it goes. Returns once the run is paused
    /// or finished; callers translate the terminal condition into the
    /// final `WorkerItem`.
    async fn drive(&self, task_id: String, state: Arc<Mutex<RunState>>, tx: mpsc::Sender<WorkerItem>) {
        loop {
            {
                let guard = state.lock().await;
                if guard.canceled.load(std::sync::atomic::Ordering::SeqCst) {
                    return;
                }
                if guard.all_terminal() || guard.any_awaiting().is_some() {
                    break;
                }
            }

            let ready = {
                let mut guard = state.lock().await;
                guard.fail_blocked_on_dependency();
                if guard.all_terminal() {
                    break;
                }
                guard.ready_step_indices()
            };

            if ready.is_empty() {
                // Nothing ready and nothing terminal/awaiting means steps
                // are in flight; wait briefly before re-checking.
                tokio::time::sleep(Duration::from_millis(20)).await;
                continue;
            }

            let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
            let (step_tx, mut step_rx) = mpsc::channel::<StepEvent>(64);

            for idx in ready {
                let step = {
                    let mut guard = state.lock().await;
                    guard.statuses[idx] = StepStatus::InFlight {
                        peer_base_url: String::new(),
                    };
                    guard.plan.steps[idx].clone()
                };

                let peer = self.registry.select(&step.target_skill, &step.step_id).cloned();
                let Some(peer) = peer else {
                    let _ = step_tx
                        .send(StepEvent::Failed {
                            step_idx: idx,
                            kind: StepFailureKind::NoEligiblePeer,
                            detail: format!("no peer advertises skill '{}'", step.target_skill),
                        })
                        .await;
                    continue;
                };

                self.registry.mark_dispatched(&peer.name);
                let permit = semaphore.clone().acquire_owned().await.ok();
                let step_tx = step_tx.clone();
                let timeouts = self.timeouts;
                let registry = self.registry.clone();
                let base_url = peer.base_url.clone();
                let peer_name = peer.name.clone();
                let description = step.description.clone();
                let retry_policy = step.retry_policy;
                let task_id_for_log = task_id.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = dispatch_step(idx, &base_url, &description, timeouts, retry_policy).await;
                    let succeeded = !matches!(outcome.last(), Some(StepEvent::Failed { .. }));
                    registry.mark_finished(&peer_name, succeeded);
                    for event in outcome {
                        if let StepEvent::Linked { step_idx, peer_task_id, .. } = &event {
                            let _ = step_tx
                                .send(StepEvent::Linked {
                                    step_idx: *step_idx,
                                    peer_name: peer_name.clone(),
                                    peer_task_id: peer_task_id.clone(),
                                    base_url: base_url.clone(),
                                })
                                .await;
                            continue;
                        }
                        if step_tx.send(event).await.is_err() {
                            warn!(task_id = %task_id_for_log, "orchestrator step channel closed early");
                            break;
                        }
                    }
                });
            }
            drop(step_tx);

            while let Some(event) = step_rx.recv().await {
                match event {
                    StepEvent::Forward { step_idx, text } => {
                        let step_id = state.lock().await.plan.steps[step_idx].step_id.clone();
                        let _ = tx
                            .send(WorkerItem::Thinking(format!("[{step_id}] {text}")))
                            .await;
                    }
                    StepEvent::Linked { step_idx, peer_name, peer_task_id, base_url } => {
                        state
                            .lock()
                            .await
                            .peer_tasks
                            .insert(step_idx, (peer_name, peer_task_id, base_url));
                    }
                    StepEvent::Completed { step_idx, parts } => {
                        state.lock().await.statuses[step_idx] = StepStatus::Completed { parts };
                    }
                    StepEvent::Awaiting { step_idx, prompt } => {
                        let mut guard = state.lock().await;
                        let peer_base = guard
                            .peer_tasks
                            .get(&step_idx)
                            .map(|(_, _, base_url)| base_url.clone())
                            .unwrap_or_default();
                        guard.statuses[step_idx] = StepStatus::AwaitingInput {
                            peer_base_url: peer_base,
                            prompt: prompt.clone(),
                        };
                        let step_id = guard.plan.steps[step_idx].step_id.clone();
                        drop(guard);
                        let _ = tx
                            .send(WorkerItem::NeedsInput(format!(
                                "step '{step_id}' awaits input: {prompt}"
                            )))
                            .await;
                    }
                    StepEvent::Failed { step_idx, kind, detail } => {
                        state.lock().await.statuses[step_idx] = StepStatus::Failed { kind, detail };
                    }
                }
            }
        }
    }

    /// Turn a finished or paused run into the terminal/pausing `WorkerItem`.
    async fn finalize(&self, state: Arc<Mutex<RunState>>, tx: mpsc::Sender<WorkerItem>) {
        let guard = state.lock().await;

        if guard.canceled.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        if guard.any_awaiting().is_some() {
            // NeedsInput was already forwarded from drive(); nothing more to do.
            return;
        }

        if guard.any_required_failed() {
            let detail = guard
                .statuses
                .iter()
                .enumerate()
                .find_map(|(i, s)| match s {
                    StepStatus::Failed { detail, .. } if guard.plan.steps[i].required => {
                        Some(format!("step '{}' failed: {}", guard.plan.steps[i].step_id, detail))
                    }
                    _ => None,
                })
                .unwrap_or_else(|| "a required step failed".to_string());
            let _ = tx
                .send(WorkerItem::Error {
                    kind: "peer_step_failed".to_string(),
                    detail,
                })
                .await;
            return;
        }

        let outputs = guard.outputs_in_plan_order();
        let plan = guard.plan.clone();
        drop(guard);

        match self.planner.synthesize(&plan, &outputs).await {
            Ok(parts) => {
                let _ = tx.send(WorkerItem::Final(parts)).await;
            }
            Err(e) => {
                let _ = tx
                    .send(WorkerItem::Error {
                        kind: "synthesis_failed".to_string(),
                        detail: e.to_string(),
                    })
                    .await;
            }
        }
    }
}

/// Dispatch one step to the peer at `base_url`, retrying per `retry_policy`
/// (1 retry on transport failure, 0 on a remote failure, by default),
/// and returning the sequence of [`StepEvent`]s observed for the attempt
/// that ultimately stuck (forwards, then exactly one of
/// Completed/Awaiting/Failed).
async fn dispatch_step(
    step_idx: usize,
    base_url: &str,
    description: &str,
    timeouts: PeerTimeouts,
    retry_policy: super::plan::RetryPolicy,
) -> Vec<StepEvent> {
    let mut transport_retries_left = retry_policy.retries_on_transport_failure;
    let mut remote_retries_left = retry_policy.retries_on_remote_failure;

    loop {
        let attempt = tokio::time::timeout(timeouts.total, dispatch_step_inner(step_idx, base_url, description));
        let events = match attempt.await {
            Ok(events) => events,
            Err(_) => vec![StepEvent::Failed {
                step_idx,
                kind: StepFailureKind::TransportFailure,
                detail: format!("peer call to {base_url} timed out after {:?}", timeouts.total),
            }],
        };

        let retry_slot = match events.last() {
            Some(StepEvent::Failed { kind: StepFailureKind::TransportFailure, .. }) => {
                Some(&mut transport_retries_left)
            }
            Some(StepEvent::Failed { kind: StepFailureKind::RemoteFailure, .. }) => {
                Some(&mut remote_retries_left)
            }
            _ => None,
        };

        match retry_slot {
            Some(retries_left) if *retries_left > 0 => {
                *retries_left -= 1;
                tokio::time::sleep(retry_policy.retry_backoff).await;
                continue;
            }
            _ => return events,
        }
    }
}

async fn dispatch_step_inner(step_idx: usize, base_url: &str, description: &str) -> Vec<StepEvent> {
    let client = match A2AClient::from_url(base_url).await {
        Ok(c) => c,
        Err(e) => {
            return vec![StepEvent::Failed {
                step_idx,
                kind: StepFailureKind::TransportFailure,
                detail: e.to_string(),
            }]
        }
    };

    let message = Message {
        message_id: uuid::Uuid::new_v4().to_string(),
        role: Role::User,
        kind: "message".to_string(),
        parts: vec![Part::text(description)],
        context_id: None,
        task_id: None,
        metadata: None,
        extensions: None,
        reference_task_ids: None,
    };

    let params = SendMessageParams {
        message,
        configuration: Some(SendMessageConfiguration {
            accepted_output_modes: None,
            push_notification_config: None,
            history_length: None,
            blocking: Some(false),
        }),
        metadata: None,
        tenant: None,
    };

    let mut stream = match client.send_message_stream(params).await {
        Ok(s) => s,
        Err(e) => {
            return vec![StepEvent::Failed {
                step_idx,
                kind: StepFailureKind::TransportFailure,
                detail: e.to_string(),
            }]
        }
    };

    let mut events = Vec::new();
    let mut collected_parts: Vec<Part> = Vec::new();
    let mut linked = false;

    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamResponse::Task(task)) => {
                if !linked {
                    linked = true;
                    events.push(StepEvent::Linked {
                        step_idx,
                        peer_name: String::new(),
                        peer_task_id: task.id.clone(),
                        base_url: base_url.to_string(),
                    });
                }
                if task.status.state == TaskState::Completed {
                    let parts = task.artifacts.map(|a| a.into_iter().flat_map(|art| art.parts).collect()).unwrap_or(collected_parts.clone());
                    events.push(StepEvent::Completed { step_idx, parts });
                    return events;
                }
            }
            Ok(StreamResponse::Message(msg)) => {
                let text = extract_text(&msg);
                if !text.is_empty() {
                    events.push(StepEvent::Forward { step_idx, text });
                }
            }
            Ok(StreamResponse::ArtifactUpdate(update)) => {
                collected_parts.extend(update.artifact.parts);
            }
            Ok(StreamResponse::StatusUpdate(update)) => {
                if !linked {
                    linked = true;
                    events.push(StepEvent::Linked {
                        step_idx,
                        peer_name: String::new(),
                        peer_task_id: update.task_id.clone(),
                        base_url: base_url.to_string(),
                    });
                }
                match update.status.state {
                    TaskState::Completed => {
                        let parts = if collected_parts.is_empty() {
                            update
                                .status
                                .message
                                .map(|m| m.parts)
                                .unwrap_or_default()
                        } else {
                            collected_parts.clone()
                        };
                        events.push(StepEvent::Completed { step_idx, parts });
                        return events;
                    }
                    TaskState::Failed | TaskState::Canceled | TaskState::Rejected => {
                        let detail = update
                            .status
                            .message
                            .map(|m| extract_text(&m))
                            .unwrap_or_else(|| format!("peer task ended in {:?}", update.status.state));
                        events.push(StepEvent::Failed {
                            step_idx,
                            kind: StepFailureKind::RemoteFailure,
                            detail,
                        });
                        return events;
                    }
                    TaskState::InputRequired | TaskState::AuthRequired => {
                        let prompt = update
                            .status
                            .message
                            .map(|m| extract_text(&m))
                            .unwrap_or_else(|| "peer requires more input".to_string());
                        events.push(StepEvent::Awaiting { step_idx, prompt });
                        return events;
                    }
                    _ => {}
                }
            }
            Err(e) => {
                events.push(StepEvent::Failed {
                    step_idx,
                    kind: StepFailureKind::TransportFailure,
                    detail: e.to_string(),
                });
                return events;
            }
        }
    }

    events.push(StepEvent::Failed {
        step_idx,
        kind: StepFailureKind::TransportFailure,
        detail: "peer stream ended without a terminal status".to_string(),
    });
    events
}

/// Adapts an `mpsc::Receiver<WorkerItem>` into the `BoxStream` the [`Worker`]
/// trait returns, matching the `async_stream` convention used by
/// [`crate::server::worker::EchoWorker`] instead of pulling in `tokio-stream`.
fn receiver_into_stream(mut rx: mpsc::Receiver<WorkerItem>) -> BoxStream<'static, WorkerItem> {
    async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    }
    .boxed()
}

fn extract_text(message: &Message) -> String {
    message
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl<P: Planner + 'static> Worker for OrchestratorWorker<P> {
    async fn start(
        &self,
        task_id: &str,
        initial_message: Message,
        _resumed_state: Option<Vec<u8>>,
    ) -> A2AResult<BoxStream<'static, WorkerItem>> {
        let available_skills = self.registry().available_skills();
        let plan = self.planner().plan(&initial_message, &available_skills).await?;

        if plan.steps.is_empty() {
            let parts = self.planner().synthesize(&plan, &[]).await?;
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.send(WorkerItem::Final(parts)).await;
            return Ok(receiver_into_stream(rx));
        }

        let state = Arc::new(Mutex::new(RunState::new(plan)));
        self.runs.lock().await.insert(task_id.to_string(), state.clone());

        let (tx, rx) = mpsc::channel(256);
        let task_id = task_id.to_string();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            ctx.drive(task_id, state.clone(), tx.clone()).await;
            ctx.finalize(state, tx).await;
        });

        Ok(receiver_into_stream(rx))
    }

    async fn resume(&self, task_id: &str, new_user_message: Message) -> A2AResult<BoxStream<'static, WorkerItem>> {
        let state = {
            let runs = self.runs.lock().await;
            runs.get(task_id).cloned()
        };

        let Some(state) = state else {
            return Err(A2AError::Other(format!(
                "orchestrator has no in-flight run for task {task_id}"
            )));
        };

        let resuming_idx = {
            let guard = state.lock().await;
            guard.any_awaiting()
        };

        if let Some(idx) = resuming_idx {
            let (peer_name, peer_task_id, base_url) = {
                let guard = state.lock().await;
                guard.peer_tasks.get(&idx).cloned().unwrap_or_default()
            };
            let _ = peer_name;

            let client = A2AClient::from_endpoint(&base_url);
            let mut message = new_user_message.clone();
            message.task_id = Some(peer_task_id);

            let params = SendMessageParams {
                message,
                configuration: Some(SendMessageConfiguration {
                    accepted_output_modes: None,
                    push_notification_config: None,
                    history_length: None,
                    blocking: Some(false),
                }),
                metadata: None,
                tenant: None,
            };

            {
                let mut guard = state.lock().await;
                guard.statuses[idx] = StepStatus::InFlight { peer_base_url: base_url.clone() };
            }

            let (step_tx, mut step_rx) = mpsc::channel::<StepEvent>(64);
            tokio::spawn(async move {
                let events = match client.send_message_stream(params).await {
                    Ok(mut stream) => {
                        let mut collected = Vec::new();
                        let mut out = Vec::new();
                        let mut done = false;
                        while let Some(item) = stream.next().await {
                            match item {
                                Ok(StreamResponse::Message(msg)) => {
                                    let text = extract_text(&msg);
                                    if !text.is_empty() {
                                        out.push(StepEvent::Forward { step_idx: idx, text });
                                    }
                                }
                                Ok(StreamResponse::ArtifactUpdate(update)) => {
                                    collected.extend(update.artifact.parts);
                                }
                                Ok(StreamResponse::StatusUpdate(update)) if update.status.state == TaskState::Completed => {
                                    out.push(StepEvent::Completed { step_idx: idx, parts: collected.clone() });
                                    done = true;
                                    break;
                                }
                                Ok(StreamResponse::StatusUpdate(update))
                                    if matches!(update.status.state, TaskState::Failed | TaskState::Canceled | TaskState::Rejected) =>
                                {
                                    out.push(StepEvent::Failed {
                                        step_idx: idx,
                                        kind: StepFailureKind::RemoteFailure,
                                        detail: "peer task failed after resume".to_string(),
                                    });
                                    done = true;
                                    break;
                                }
                                _ => {}
                            }
                        }
                        if !done {
                            out.push(StepEvent::Failed {
                                step_idx: idx,
                                kind: StepFailureKind::TransportFailure,
                                detail: "peer stream ended without a terminal status after resume".to_string(),
                            });
                        }
                        out
                    }
                    Err(e) => vec![StepEvent::Failed {
                        step_idx: idx,
                        kind: StepFailureKind::TransportFailure,
                        detail: e.to_string(),
                    }],
                };
                for event in events {
                    if step_tx.send(event).await.is_err() {
                        break;
                    }
                }
            });

            while let Some(event) = step_rx.recv().await {
                let mut guard = state.lock().await;
                match event {
                    StepEvent::Forward { .. } => {}
                    StepEvent::Completed { step_idx, parts } => {
                        guard.statuses[step_idx] = StepStatus::Completed { parts };
                    }
                    StepEvent::Failed { step_idx, kind, detail } => {
                        guard.statuses[step_idx] = StepStatus::Failed { kind, detail };
                    }
                    _ => {}
                }
            }
        }

        let (tx, rx) = mpsc::channel(256);
        let task_id = task_id.to_string();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            ctx.drive(task_id, state.clone(), tx.clone()).await;
            ctx.finalize(state, tx).await;
        });

        Ok(receiver_into_stream(rx))
    }

    async fn cancel(&self, task_id: &str) {
        let state = {
            let runs = self.runs.lock().await;
            runs.get(task_id).cloned()
        };
        let Some(state) = state else { return };

        let peer_tasks = {
            let guard = state.lock().await;
            guard.canceled.store(true, std::sync::atomic::Ordering::SeqCst);
            guard.cancel_notify.notify_waiters();
            guard.peer_tasks.clone()
        };

        for (_, (_, peer_task_id, base_url)) in peer_tasks {
            tokio::spawn(async move {
                // Best-effort — the peer's own task cleanup still applies
                // even if this particular cancel call doesn't land.
                let client = A2AClient::from_endpoint(&base_url);
                let _ = client.cancel_task_by_id(&peer_task_id).await;
            });
        }
    }
}
