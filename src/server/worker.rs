//! Worker interface and adapter — bridges an opaque reasoning/execution
//! component (a "Worker") to the task/event model.
//!
//! An [`AgentExecutor`] is the integration point the rest of this crate
//! drives requests through; [`WorkerAdapter`] is a generic `AgentExecutor`
//! that wraps anything implementing [`Worker`] and translates its output
//! stream into `TaskUpdater` calls, following the table below. This keeps
//! the node's dispatch, event queue, and SSE plumbing exactly as they are
//! for direct `AgentExecutor` implementors while giving reasoning-graph
//! style workers (including the orchestrator coordinator) a narrower,
//! more structured interface to implement against.
//!
//! | [`WorkerItem`] | Effect |
//! |---|---|
//! | `Thinking` / `ToolInvocation` / `ToolResult` | emit `message` (role=agent) with a text part |
//! | `PartialArtifact { is_last: false, .. }` | emit `artifact-update { append: chunk > 0, last_chunk: false }` |
//! | `PartialArtifact { is_last: true, .. }` | emit `artifact-update { append: true, last_chunk: true }` |
//! | `NeedsInput` | set state -> `input-required` |
//! | `NeedsAuth` | set state -> `auth-required` |
//! | `Final` | append message (role=agent), set state -> `completed` |
//! | `Error` | set state -> `failed` |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::{Message, Part};

use super::agent_executor::{AgentExecutor, RequestContext};
use super::checkpoint::CheckpointStore;
use super::event_queue::EventQueue;
use super::task_updater::TaskUpdater;

/// Default grace period before a worker that ignores cancellation is
/// force-terminated.
pub const DEFAULT_CANCEL_DEADLINE: Duration = Duration::from_secs(5);

/// A single item emitted by a [`Worker`] while it processes a task.
///
/// Tagged variant covering everything a worker can emit. Thinking,
/// tool-invocation, and tool-result items are all translated the same
/// way (a text `message` event) because the protocol itself does not
/// distinguish an agent's scratch narration from its tool chatter — only
/// the final artifact and terminal status carry protocol weight.
#[derive(Debug, Clone)]
pub enum WorkerItem {
    /// Free-form reasoning narration, not yet a final answer.
    Thinking(String),
    /// The worker is invoking a tool.
    ToolInvocation {
        /// Tool name.
        name: String,
        /// Tool input payload.
        input: Value,
    },
    /// A tool call returned.
    ToolResult {
        /// Tool name.
        name: String,
        /// Tool output payload.
        output: Value,
    },
    /// One chunk of an artifact identified by `artifact_id`.
    PartialArtifact {
        /// Stable artifact identifier across chunks.
        artifact_id: String,
        /// The chunk's content.
        part: Part,
        /// Whether this is the final chunk for this artifact.
        is_last: bool,
    },
    /// The worker needs more input from the caller before it can continue.
    NeedsInput(String),
    /// The worker needs the caller to (re-)authenticate.
    NeedsAuth(String),
    /// The worker finished; these are the task's final output parts.
    Final(Vec<Part>),
    /// The worker failed.
    Error {
        /// Coarse failure classification (`tool_failed`, `planning_failed`,
        /// `internal`, `timeout`, ...).
        kind: String,
        /// Human-readable detail. MUST NOT contain stack traces or credentials.
        detail: String,
    },
}

/// Capability set a pluggable reasoning/execution component must satisfy
/// to be driven by [`WorkerAdapter`].
///
/// The Worker interface. `start` is called for a brand-new task
/// (or one rehydrated from a checkpoint, via `resumed_state`); `resume` is
/// called when new user input arrives for a task already in
/// `input-required` or `auth-required`.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Begin processing `initial_message` for `task_id`.
    ///
    /// `resumed_state`, when present, is the opaque blob last returned by
    /// [`Worker::snapshot`] for this task's thread, as persisted by a
    /// [`CheckpointStore`] and supplied back on node recovery.
    async fn start(
        &self,
        task_id: &str,
        initial_message: Message,
        resumed_state: Option<Vec<u8>>,
    ) -> A2AResult<BoxStream<'static, WorkerItem>>;

    /// Continue processing a task that previously yielded `NeedsInput` or
    /// `NeedsAuth`, now that `new_user_message` has arrived.
    async fn resume(
        &self,
        task_id: &str,
        new_user_message: Message,
    ) -> A2AResult<BoxStream<'static, WorkerItem>>;

    /// Request cooperative cancellation of `task_id`.
    ///
    /// The worker should stop as soon as convenient and let its item
    /// stream end; it does not need to yield a final item itself — the
    /// adapter publishes the `canceled` status transition.
    async fn cancel(&self, task_id: &str);

    /// Capture the worker's current conversational state for checkpointing.
    ///
    /// Called by the adapter between items at state-transition boundaries.
    /// Returning `None` means "nothing new to persist".
    async fn snapshot(&self) -> Option<Vec<u8>> {
        None
    }
}

struct CancelState {
    notify: Arc<Notify>,
    done: Arc<std::sync::atomic::AtomicBool>,
}

/// Result of translating one [`WorkerItem`] — distinguishes a true
/// terminal state from a worker pausing to await input, since both end
/// the item stream but only the former means the task is actually done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    /// Keep pulling items from the stream.
    Continue,
    /// The worker paused on `NeedsInput`/`NeedsAuth`; the stream ending
    /// right after this item is expected, not an error.
    Awaiting,
    /// `Final` or `Error` was translated; the task reached a terminal state.
    Terminal,
}

/// Generic [`AgentExecutor`] that drives a [`Worker`] and translates its
/// item stream into task events.
///
/// Construct once per node (it is `Send + Sync` and cheaply `Clone`-able
/// via `Arc`) and hand it to [`DefaultRequestHandler`](super::DefaultRequestHandler)
/// or [`ServerBuilder`](crate::builders::ServerBuilder) exactly like any
/// other `AgentExecutor`.
pub struct WorkerAdapter<W: Worker> {
    worker: Arc<W>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    cancel_deadline: Duration,
    cancel_states: Mutex<HashMap<String, CancelState>>,
}

impl<W: Worker> WorkerAdapter<W> {
    /// Create an adapter around `worker` with no checkpointing.
    pub fn new(worker: Arc<W>) -> Self {
        Self {
            worker,
            checkpoint_store: None,
            cancel_deadline: DEFAULT_CANCEL_DEADLINE,
            cancel_states: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a [`CheckpointStore`] — worker snapshots are persisted keyed
    /// by the task's `context_id`, which this adapter treats as the
    /// thread-id grouping a worker's conversational state. Neither side
    /// holds a strong reference; both are linked by id through the
    /// checkpoint store's task<->thread map.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    /// Override the force-termination deadline (default 5s).
    pub fn with_cancel_deadline(mut self, deadline: Duration) -> Self {
        self.cancel_deadline = deadline;
        self
    }

    async fn persist_snapshot(&self, context_id: &str, task_id: &str) {
        let Some(store) = &self.checkpoint_store else {
            return;
        };
        if let Some(bytes) = self.worker.snapshot().await {
            if let Err(e) = store.link_task_thread(task_id, context_id).await {
                warn!(task_id, error = %e, "failed to link task to thread");
            }
            if let Err(e) = store
                .put_worker_state(context_id, bytes, super::checkpoint::RetentionPolicy::default().active)
                .await
            {
                warn!(task_id, error = %e, "failed to persist worker snapshot");
            }
        }
    }

    async fn translate(
        &self,
        updater: &TaskUpdater,
        context_id: &str,
        task_id: &str,
        item: WorkerItem,
        artifact_chunks: &mut HashMap<String, u64>,
    ) -> A2AResult<ItemOutcome> {
        match item {
            WorkerItem::Thinking(text) => {
                let message = updater.new_agent_message(vec![Part::text(text)], None);
                updater.publish_message(message).await?;
            }
            WorkerItem::ToolInvocation { name, input } => {
                let text = format!("invoking tool `{name}` with {input}");
                let message = updater.new_agent_message(vec![Part::text(text)], None);
                updater.publish_message(message).await?;
            }
            WorkerItem::ToolResult { name, output } => {
                let text = format!("tool `{name}` returned {output}");
                let message = updater.new_agent_message(vec![Part::text(text)], None);
                updater.publish_message(message).await?;
            }
            WorkerItem::PartialArtifact {
                artifact_id,
                part,
                is_last,
            } => {
                let chunk_index = artifact_chunks.entry(artifact_id.clone()).or_insert(0);
                let append = *chunk_index > 0;
                *chunk_index += 1;
                updater
                    .add_artifact(
                        vec![part],
                        Some(artifact_id),
                        None,
                        None,
                        Some(append),
                        Some(is_last),
                        None,
                    )
                    .await?;
            }
            WorkerItem::NeedsInput(prompt) => {
                let message = updater.new_agent_message(vec![Part::text(prompt)], None);
                updater.requires_input(Some(message), false).await?;
                self.persist_snapshot(context_id, task_id).await;
                return Ok(ItemOutcome::Awaiting);
            }
            WorkerItem::NeedsAuth(scheme) => {
                let message =
                    updater.new_agent_message(vec![Part::text(format!("auth required: {scheme}"))], None);
                updater.requires_auth(Some(message), false).await?;
                self.persist_snapshot(context_id, task_id).await;
                return Ok(ItemOutcome::Awaiting);
            }
            WorkerItem::Final(parts) => {
                let message = updater.new_agent_message(parts, None);
                updater.complete(Some(message)).await?;
                return Ok(ItemOutcome::Terminal);
            }
            WorkerItem::Error { kind, detail } => {
                let message = updater.new_agent_message(
                    vec![Part::text(format!("worker error ({kind}): {detail}"))],
                    None,
                );
                updater.failed(Some(message)).await?;
                return Ok(ItemOutcome::Terminal);
            }
        }
        Ok(ItemOutcome::Continue)
    }

    async fn run(&self, context: RequestContext, event_queue: EventQueue, is_resume: bool) -> A2AResult<()> {
        let task_id = context.task_id.clone();
        let context_id = context.context_id.clone();
        let updater = TaskUpdater::new(event_queue, task_id.clone(), context_id.clone());

        let message = context.message.clone().ok_or_else(|| {
            crate::error::A2AError::InvalidParams {
                message: "worker execution requires an incoming message".to_string(),
                data: None,
            }
        })?;

        let notify = Arc::new(Notify::new());
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        {
            let mut states = self.cancel_states.lock().await;
            states.insert(
                task_id.clone(),
                CancelState {
                    notify: notify.clone(),
                    done: done.clone(),
                },
            );
        }

        let resumed_state = if let Some(store) = &self.checkpoint_store {
            store.get_worker_state(&context_id).await.ok().flatten()
        } else {
            None
        };

        let mut stream = if is_resume {
            self.worker.resume(&task_id, message).await?
        } else {
            self.worker.start(&task_id, message, resumed_state).await?
        };

        let mut artifact_chunks: HashMap<String, u64> = HashMap::new();
        let mut reached_terminal = false;
        let mut awaiting = false;

        loop {
            tokio::select! {
                biased;
                _ = notify.notified() => {
                    debug!(task_id = %task_id, "cancellation observed at suspension point");
                    updater.cancel(None).await.ok();
                    reached_terminal = true;
                    break;
                }
                next = stream.next() => {
                    let Some(item) = next else { break };
                    self.persist_snapshot(&context_id, &task_id).await;
                    match self.translate(&updater, &context_id, &task_id, item, &mut artifact_chunks).await {
                        Ok(ItemOutcome::Terminal) => {
                            reached_terminal = true;
                            break;
                        }
                        Ok(ItemOutcome::Awaiting) => {
                            awaiting = true;
                        }
                        Ok(ItemOutcome::Continue) => {}
                        Err(e) => {
                            warn!(task_id = %task_id, error = %e, "worker item translation failed");
                            return Err(e);
                        }
                    }
                }
            }
        }

        if !reached_terminal && !awaiting && !updater.is_terminal().await {
            // The worker's stream ended without an explicit Final/Error/NeedsInput —
            // treat that as an internal worker error rather than leaving the task
            // stuck in `working` forever.
            updater
                .failed(Some(updater.new_agent_message(
                    vec![Part::text("worker ended without a terminal item")],
                    None,
                )))
                .await
                .ok();
        }

        done.store(true, std::sync::atomic::Ordering::SeqCst);
        self.cancel_states.lock().await.remove(&task_id);
        Ok(())
    }
}

#[async_trait]
impl<W: Worker + 'static> AgentExecutor for WorkerAdapter<W> {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let is_resume = context.task.is_some();
        self.run(context, event_queue, is_resume).await
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let task_id = context.task_id.clone();
        self.worker.cancel(&task_id).await;

        let state = {
            let states = self.cancel_states.lock().await;
            states.get(&task_id).map(|s| (s.notify.clone(), s.done.clone()))
        };

        let Some((notify, done)) = state else {
            // No in-flight execution to cancel. Whether this is a no-op depends on
            // the task's actual current state, not a fresh TaskUpdater's local
            // flag (which always starts false) — load it from `context.task`,
            // which the dispatcher populates from the task store.
            let already_terminal = context
                .task
                .as_ref()
                .is_some_and(|task| super::task_manager::is_terminal_state(task.status.state));
            if !already_terminal {
                let updater = TaskUpdater::new(event_queue, task_id, context.context_id.clone());
                updater.cancel(None).await?;
            }
            return Ok(());
        };

        notify.notify_waiters();

        let deadline = self.cancel_deadline;
        let task_id_for_wait = task_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if !done.load(std::sync::atomic::Ordering::SeqCst) {
                warn!(task_id = %task_id_for_wait, "worker did not stop within cancel deadline; force-terminating");
                let updater = TaskUpdater::new(event_queue, task_id_for_wait, context.context_id);
                updater.cancel(None).await.ok();
            }
        });

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EchoWorker — reference Worker implementation exercising the full item
// vocabulary, used by demos and tests instead of a real reasoning graph.
// ---------------------------------------------------------------------------

/// Reference [`Worker`] that narrates, invokes a synthetic tool, streams a
/// chunked artifact, and can round-trip through `input-required` — every
/// branch of the worker-item translation table — without depending on an actual
/// reasoning graph.
///
/// Sending a message whose text is exactly `"need input"` triggers the
/// `NeedsInput` branch; resuming that task with any message then completes
/// it, exercising `Worker::resume`.
#[derive(Debug, Default)]
pub struct EchoWorker;

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

fn echo_item_stream(text: String) -> BoxStream<'static, WorkerItem> {
    async_stream::stream! {
        yield WorkerItem::Thinking(format!("received: {text}"));
        yield WorkerItem::ToolInvocation {
            name: "echo_transform".to_string(),
            input: serde_json::json!({ "text": text }),
        };
        let transformed = text.to_uppercase();
        yield WorkerItem::ToolResult {
            name: "echo_transform".to_string(),
            output: serde_json::json!({ "result": transformed }),
        };

        if text.trim().eq_ignore_ascii_case("need input") {
            yield WorkerItem::NeedsInput(
                "Which format do you want the echo in — upper or lower case?".to_string(),
            );
            return;
        }

        let words: Vec<String> = transformed
            .split_whitespace()
            .map(|w| format!("{w} "))
            .collect();
        if words.is_empty() {
            yield WorkerItem::PartialArtifact {
                artifact_id: "echo-artifact".to_string(),
                part: Part::text(String::new()),
                is_last: true,
            };
        } else {
            let last_idx = words.len() - 1;
            for (i, w) in words.into_iter().enumerate() {
                yield WorkerItem::PartialArtifact {
                    artifact_id: "echo-artifact".to_string(),
                    part: Part::text(w),
                    is_last: i == last_idx,
                };
            }
        }

        yield WorkerItem::Final(vec![Part::text(format!("Echo: {text}"))]);
    }
    .boxed()
}

#[async_trait]
impl Worker for EchoWorker {
    async fn start(
        &self,
        _task_id: &str,
        initial_message: Message,
        _resumed_state: Option<Vec<u8>>,
    ) -> A2AResult<BoxStream<'static, WorkerItem>> {
        Ok(echo_item_stream(extract_text(&initial_message)))
    }

    async fn resume(
        &self,
        _task_id: &str,
        new_user_message: Message,
    ) -> A2AResult<BoxStream<'static, WorkerItem>> {
        let text = extract_text(&new_user_message);
        Ok(async_stream::stream! {
            yield WorkerItem::Final(vec![Part::text(format!("Echo (resumed as {text}): done"))]);
        }
        .boxed())
    }

    async fn cancel(&self, _task_id: &str) {}
}
