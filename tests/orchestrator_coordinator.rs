//! Integration tests for the orchestrator coordinator (C10): fan-out
//! across peers, dependency blocking, optional-step omission, and
//! cancel-cascade. Peers are real HTTP test servers — the coordinator
//! only ever talks to peers through `A2AClient`/`reqwest`, so there is
//! no mocking layer to stand in for one.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use a2a_rs::client::A2AClient;
use a2a_rs::error::A2AResult;
use a2a_rs::orchestrator::{OrchestratorWorker, PeerConfig, PeerRegistry, Plan, Planner, Step, StubPlanner};
use a2a_rs::server::{AgentExecutor, EventQueue, RequestContext, TaskUpdater, Worker};
use a2a_rs::types::{Message, Part, Role, TaskState};
use async_trait::async_trait;
use common::start_test_server;
use futures::StreamExt;
use uuid::Uuid;

fn user_message(text: &str) -> Message {
    Message {
        message_id: Uuid::new_v4().to_string(),
        role: Role::User,
        kind: "message".to_string(),
        parts: vec![Part::text(text)],
        context_id: None,
        task_id: None,
        metadata: None,
        extensions: None,
        reference_task_ids: None,
    }
}

fn final_parts_text(parts: &[Part]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A peer that counts its invocations and replies with a fixed line.
struct CountingAgent {
    calls: Arc<AtomicUsize>,
    reply: String,
    delay: Duration,
}

#[async_trait]
impl AgentExecutor for CountingAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        updater.complete_with_text(&self.reply).await?;
        Ok(())
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.cancel(None).await?;
        Ok(())
    }
}

/// A peer that starts work and then stalls indefinitely, standing in for
/// a long-running step the cancel-cascade test cancels mid-flight.
struct StallingAgent;

#[async_trait]
impl AgentExecutor for StallingAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.start_work(None).await?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        updater.complete_with_text("too late").await?;
        Ok(())
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.cancel(None).await?;
        Ok(())
    }
}

/// Wraps a pre-built [`Plan`], so tests can exercise dependency-blocking
/// and optional-step behavior without depending on [`StubPlanner`]'s
/// clause-splitting guesswork — synthesis still delegates to `StubPlanner`.
struct FixedPlanner(Plan);

#[async_trait]
impl Planner for FixedPlanner {
    async fn plan(&self, _input: &Message, _available_skills: &[String]) -> A2AResult<Plan> {
        Ok(self.0.clone())
    }

    async fn synthesize(&self, plan: &Plan, outputs: &[Option<Vec<Part>>]) -> A2AResult<Vec<Part>> {
        StubPlanner.synthesize(plan, outputs).await
    }
}

async fn drain(worker: &OrchestratorWorker<impl Planner + 'static>, task_id: &str, message: Message) -> Vec<a2a_rs::server::WorkerItem> {
    let stream = worker.start(task_id, message, None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), stream.collect())
        .await
        .expect("orchestrator run did not finish in time")
}

#[tokio::test]
async fn fanout_dispatches_each_clause_to_its_matching_peer() {
    let rate_calls = Arc::new(AtomicUsize::new(0));
    let time_calls = Arc::new(AtomicUsize::new(0));

    let (rate_url, _rate_h) = start_test_server(Arc::new(CountingAgent {
        calls: rate_calls.clone(),
        reply: "RATE:1.23".to_string(),
        delay: Duration::ZERO,
    }))
    .await;
    // The slower peer finishes later; plan order must still win out over
    // completion order when outputs are aggregated.
    let (time_url, _time_h) = start_test_server(Arc::new(CountingAgent {
        calls: time_calls.clone(),
        reply: "TIME:10:00".to_string(),
        delay: Duration::from_millis(60),
    }))
    .await;

    let mut registry = PeerRegistry::new();
    registry.register(
        PeerConfig {
            name: "rate-peer".to_string(),
            base_url: rate_url,
            skills_override: Some(vec!["rate".to_string()]),
        },
        None,
    );
    registry.register(
        PeerConfig {
            name: "time-peer".to_string(),
            base_url: time_url,
            skills_override: Some(vec!["time".to_string()]),
        },
        None,
    );

    let worker = OrchestratorWorker::new(Arc::new(StubPlanner), Arc::new(registry));
    let items = drain(
        &worker,
        "fanout-task",
        user_message("give me the usd rate and give me the tokyo time"),
    )
    .await;

    assert_eq!(rate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(time_calls.load(Ordering::SeqCst), 1);

    let final_item = items
        .iter()
        .find_map(|item| match item {
            a2a_rs::server::WorkerItem::Final(parts) => Some(parts),
            _ => None,
        })
        .expect("expected a Final item");

    let text = final_parts_text(final_item);
    let rate_pos = text.find("RATE:1.23").expect("rate output present");
    let time_pos = text.find("TIME:10:00").expect("time output present");
    assert!(rate_pos < time_pos, "outputs must be ordered by plan order, not completion order");
}

#[tokio::test]
async fn a_step_blocked_on_a_failed_dependency_fails_the_required_step() {
    let ok_calls = Arc::new(AtomicUsize::new(0));
    let (ok_url, _ok_h) = start_test_server(Arc::new(CountingAgent {
        calls: ok_calls.clone(),
        reply: "should never be seen".to_string(),
        delay: Duration::ZERO,
    }))
    .await;

    // Only "ok" has a registered peer; "missing" has none, so step-a fails
    // with NoEligiblePeer and step-b, which depends on it, never dispatches.
    let mut registry = PeerRegistry::new();
    registry.register(
        PeerConfig {
            name: "ok-peer".to_string(),
            base_url: ok_url,
            skills_override: Some(vec!["ok".to_string()]),
        },
        None,
    );

    let plan = Plan {
        steps: vec![
            Step::new("step-a", "the step with no eligible peer", "missing"),
            Step::new("step-b", "depends on step-a", "ok").depends_on(["step-a"]),
        ],
    };

    let worker = OrchestratorWorker::new(Arc::new(FixedPlanner(plan)), Arc::new(registry));
    let items = drain(&worker, "blocked-task", user_message("anything")).await;

    assert_eq!(ok_calls.load(Ordering::SeqCst), 0, "blocked step must never reach its peer");

    let error = items
        .iter()
        .find_map(|item| match item {
            a2a_rs::server::WorkerItem::Error { kind, detail } => Some((kind.clone(), detail.clone())),
            _ => None,
        })
        .expect("expected an Error item for the failed required step");
    assert_eq!(error.0, "peer_step_failed");
    assert!(error.1.contains("step-a"));
}

#[tokio::test]
async fn an_optional_steps_failure_is_omitted_rather_than_failing_the_task() {
    let ok_calls = Arc::new(AtomicUsize::new(0));
    let (ok_url, _ok_h) = start_test_server(Arc::new(CountingAgent {
        calls: ok_calls.clone(),
        reply: "REQUIRED-OK".to_string(),
        delay: Duration::ZERO,
    }))
    .await;

    let mut registry = PeerRegistry::new();
    registry.register(
        PeerConfig {
            name: "ok-peer".to_string(),
            base_url: ok_url,
            skills_override: Some(vec!["ok".to_string()]),
        },
        None,
    );

    let plan = Plan {
        steps: vec![
            Step::new("step-a", "required step", "ok"),
            Step::new("step-b", "optional step with no eligible peer", "missing").optional(),
        ],
    };

    let worker = OrchestratorWorker::new(Arc::new(FixedPlanner(plan)), Arc::new(registry));
    let items = drain(&worker, "optional-task", user_message("anything")).await;

    assert_eq!(ok_calls.load(Ordering::SeqCst), 1);

    let final_item = items
        .iter()
        .find_map(|item| match item {
            a2a_rs::server::WorkerItem::Final(parts) => Some(parts),
            _ => None,
        })
        .expect("an omitted optional step must not prevent a Final result");

    let text = final_parts_text(final_item);
    assert!(text.contains("REQUIRED-OK"));
    assert!(text.contains("omitted"));
    assert!(text.contains("step-b"));
}

#[tokio::test]
async fn canceling_the_outer_task_cancels_every_linked_peer_task() {
    let (peer_a_url, _a_h) = start_test_server(Arc::new(StallingAgent)).await;
    let (peer_b_url, _b_h) = start_test_server(Arc::new(StallingAgent)).await;

    let mut registry = PeerRegistry::new();
    registry.register(
        PeerConfig {
            name: "peer-a".to_string(),
            base_url: peer_a_url.clone(),
            skills_override: Some(vec!["a".to_string()]),
        },
        None,
    );
    registry.register(
        PeerConfig {
            name: "peer-b".to_string(),
            base_url: peer_b_url.clone(),
            skills_override: Some(vec!["b".to_string()]),
        },
        None,
    );

    let plan = Plan {
        steps: vec![Step::new("step-a", "stalls", "a"), Step::new("step-b", "also stalls", "b")],
    };

    let worker = Arc::new(OrchestratorWorker::new(Arc::new(FixedPlanner(plan)), Arc::new(registry)));
    let stream = worker.start("cancel-task", user_message("anything"), None).await.unwrap();
    // Don't drain the stream (it won't finish on its own) — just let both
    // steps reach the peer and link up.
    tokio::spawn(stream.collect::<Vec<_>>());
    tokio::time::sleep(Duration::from_millis(250)).await;

    worker.cancel("cancel-task").await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    for base_url in [&peer_a_url, &peer_b_url] {
        let client = A2AClient::from_endpoint(base_url);
        // The peer task id isn't known to the test directly; list instead
        // of get, since there's exactly one task per peer in this test.
        let tasks = client
            .list_tasks(a2a_rs::types::ListTasksParams {
                context_id: None,
                status: None,
                page_size: None,
                page_token: None,
                history_length: None,
                status_timestamp_after: None,
                include_artifacts: None,
                tenant: None,
            })
            .await
            .expect("peer should be reachable");
        assert_eq!(tasks.tasks.len(), 1, "expected exactly one task on peer {base_url}");
        assert_eq!(
            tasks.tasks[0].status.state,
            TaskState::Canceled,
            "peer task on {base_url} should have been canceled by the cascade"
        );
    }
}
