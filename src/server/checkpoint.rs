//! Checkpoint store — durable persistence for task snapshots and worker
//! conversational state, plus the Synchronizer that keeps them up to date.
//!
//! Keyed stores for `task:<task_id>`, `thread:<thread_id>`,
//! and the `task<->thread` map, each with a TTL determined by
//! [`RetentionPolicy`]. [`InMemoryCheckpointStore`] is the baseline
//! implementation; [`FileCheckpointStore`] follows [`FileTaskStore`]'s
//! JSON-file-per-key pattern for a durable reference backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{Message, Part, StreamResponse, Task, TaskState};

use super::event_queue::EventQueue;
use super::task_store::TaskStore;

/// TTL durations applied to checkpoints depending on the task's state
/// (7 days for active, 30 days for completed, 3 days for failed, by default).
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// TTL for a non-terminal (active) task's checkpoint.
    pub active: Duration,
    /// TTL for a `completed` task's checkpoint.
    pub completed: Duration,
    /// TTL for a `failed` / `canceled` / `rejected` task's checkpoint.
    pub failed: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(7 * 24 * 3600),
            completed: Duration::from_secs(30 * 24 * 3600),
            failed: Duration::from_secs(3 * 24 * 3600),
        }
    }
}

impl RetentionPolicy {
    /// The TTL that applies to a task currently in `state`.
    pub fn ttl_for_state(&self, state: TaskState) -> Duration {
        match state {
            TaskState::Completed => self.completed,
            TaskState::Failed | TaskState::Canceled | TaskState::Rejected => self.failed,
            _ => self.active,
        }
    }
}

fn is_terminal(state: TaskState) -> bool {
    matches!(
        state,
        TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
    )
}

/// Durable keyed store for task snapshots and worker state.
///
/// Keyed by `task:<task_id>`, `thread:<thread_id>`,
/// and the bidirectional `task<->thread` map. Every write carries a TTL;
/// implementations are free to evict lazily (on read) and/or via
/// [`CheckpointStore::evict_expired`].
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist the latest snapshot of `task`, expiring after `ttl`.
    async fn put_task(&self, task: &Task, ttl: Duration) -> A2AResult<()>;

    /// Fetch the latest snapshot for `task_id`, if present and unexpired.
    async fn get_task(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Remove a task's checkpoint entirely.
    async fn delete_task(&self, task_id: &str) -> A2AResult<()>;

    /// IDs of every checkpointed task whose last known state is
    /// non-terminal — the recovery set read back on node start.
    async fn list_nonterminal_task_ids(&self) -> A2AResult<Vec<String>>;

    /// Persist a worker's opaque conversational state for `thread_id`.
    async fn put_worker_state(&self, thread_id: &str, state: Vec<u8>, ttl: Duration) -> A2AResult<()>;

    /// Fetch a worker's opaque state for `thread_id`, if present and unexpired.
    async fn get_worker_state(&self, thread_id: &str) -> A2AResult<Option<Vec<u8>>>;

    /// Remove a worker's persisted state.
    async fn delete_worker_state(&self, thread_id: &str) -> A2AResult<()>;

    /// Record that `task_id` is driven by the worker thread `thread_id`.
    async fn link_task_thread(&self, task_id: &str, thread_id: &str) -> A2AResult<()>;

    /// Look up the thread driving `task_id`, if linked.
    async fn thread_for_task(&self, task_id: &str) -> A2AResult<Option<String>>;

    /// Look up the task currently driven by `thread_id`, if linked.
    async fn task_for_thread(&self, thread_id: &str) -> A2AResult<Option<String>>;

    /// Sweep all expired entries, returning the number removed.
    async fn evict_expired(&self) -> A2AResult<usize>;
}

// ---------------------------------------------------------------------------
// InMemoryCheckpointStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Entry<T> {
    value: T,
    expires_at_ms: i64,
}

impl<T> Entry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at_ms: now_ms() + ttl.as_millis() as i64,
        }
    }

    fn is_expired(&self) -> bool {
        now_ms() > self.expires_at_ms
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// In-memory [`CheckpointStore`] — the baseline backend every node must
/// support.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    tasks: RwLock<HashMap<String, Entry<Task>>>,
    worker_states: RwLock<HashMap<String, Entry<Vec<u8>>>>,
    task_to_thread: RwLock<HashMap<String, String>>,
    thread_to_task: RwLock<HashMap<String, String>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put_task(&self, task: &Task, ttl: Duration) -> A2AResult<()> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), Entry::new(task.clone(), ttl));
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        if let Some(entry) = tasks.get(task_id) {
            if entry.is_expired() {
                tasks.remove(task_id);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn delete_task(&self, task_id: &str) -> A2AResult<()> {
        self.tasks.write().await.remove(task_id);
        Ok(())
    }

    async fn list_nonterminal_task_ids(&self) -> A2AResult<Vec<String>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .filter(|(_, e)| !e.is_expired() && !is_terminal(e.value.status.state))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn put_worker_state(&self, thread_id: &str, state: Vec<u8>, ttl: Duration) -> A2AResult<()> {
        let mut states = self.worker_states.write().await;
        states.insert(thread_id.to_string(), Entry::new(state, ttl));
        Ok(())
    }

    async fn get_worker_state(&self, thread_id: &str) -> A2AResult<Option<Vec<u8>>> {
        let mut states = self.worker_states.write().await;
        if let Some(entry) = states.get(thread_id) {
            if entry.is_expired() {
                states.remove(thread_id);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn delete_worker_state(&self, thread_id: &str) -> A2AResult<()> {
        self.worker_states.write().await.remove(thread_id);
        Ok(())
    }

    async fn link_task_thread(&self, task_id: &str, thread_id: &str) -> A2AResult<()> {
        self.task_to_thread
            .write()
            .await
            .insert(task_id.to_string(), thread_id.to_string());
        self.thread_to_task
            .write()
            .await
            .insert(thread_id.to_string(), task_id.to_string());
        Ok(())
    }

    async fn thread_for_task(&self, task_id: &str) -> A2AResult<Option<String>> {
        Ok(self.task_to_thread.read().await.get(task_id).cloned())
    }

    async fn task_for_thread(&self, thread_id: &str) -> A2AResult<Option<String>> {
        Ok(self.thread_to_task.read().await.get(thread_id).cloned())
    }

    async fn evict_expired(&self) -> A2AResult<usize> {
        let mut removed = 0;
        {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|_, e| !e.is_expired());
            removed += before - tasks.len();
        }
        {
            let mut states = self.worker_states.write().await;
            let before = states.len();
            states.retain(|_, e| !e.is_expired());
            removed += before - states.len();
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// FileCheckpointStore
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct StoredTask {
    task: Task,
    expires_at_ms: i64,
}

#[derive(Serialize, Deserialize)]
struct StoredBytes {
    #[serde(with = "bytes_as_array")]
    bytes: Vec<u8>,
    expires_at_ms: i64,
}

#[derive(Serialize, Deserialize)]
struct StoredLink {
    value: String,
}

/// A JSON-file-per-key durable [`CheckpointStore`], following the same
/// pattern as [`FileTaskStore`](super::file_task_store::FileTaskStore):
/// suitable for development, debugging, and single-node deployments where
/// an external key-value store isn't warranted.
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `root`, creating its subdirectories if needed.
    pub async fn new(root: PathBuf) -> A2AResult<Self> {
        for sub in ["tasks", "threads", "task_to_thread", "thread_to_task"] {
            fs::create_dir_all(root.join(sub))
                .await
                .map_err(|e| A2AError::InternalError {
                    message: format!("failed to create checkpoint directory {sub}: {e}"),
                    data: None,
                })?;
        }
        Ok(Self { root })
    }

    fn task_path(&self, task_id: &str) -> PathBuf {
        self.root.join("tasks").join(format!("{task_id}.json"))
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.root.join("threads").join(format!("{thread_id}.json"))
    }

    fn task_to_thread_path(&self, task_id: &str) -> PathBuf {
        self.root.join("task_to_thread").join(format!("{task_id}.json"))
    }

    fn thread_to_task_path(&self, thread_id: &str) -> PathBuf {
        self.root.join("thread_to_task").join(format!("{thread_id}.json"))
    }

    async fn write_json<T: Serialize>(path: &PathBuf, value: &T) -> A2AResult<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| A2AError::InternalError {
            message: format!("failed to serialize checkpoint entry: {e}"),
            data: None,
        })?;
        fs::write(path, json).await.map_err(|e| A2AError::InternalError {
            message: format!("failed to write checkpoint file {path:?}: {e}"),
            data: None,
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> A2AResult<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str::<T>(&contents) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(path = ?path, error = %e, "failed to parse checkpoint file");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(A2AError::InternalError {
                message: format!("failed to read checkpoint file {path:?}: {e}"),
                data: None,
            }),
        }
    }

    async fn remove_file_if_exists(path: &PathBuf) -> A2AResult<()> {
        match fs::remove_file(path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(A2AError::InternalError {
                message: format!("failed to delete checkpoint file {path:?}: {e}"),
                data: None,
            }),
        }
    }

    async fn list_ids(&self, subdir: &str) -> A2AResult<Vec<String>> {
        let dir = self.root.join(subdir);
        let mut entries = fs::read_dir(&dir).await.map_err(|e| A2AError::InternalError {
            message: format!("failed to read checkpoint directory {subdir}: {e}"),
            data: None,
        })?;
        let mut ids = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put_task(&self, task: &Task, ttl: Duration) -> A2AResult<()> {
        let stored = StoredTask {
            task: task.clone(),
            expires_at_ms: now_ms() + ttl.as_millis() as i64,
        };
        Self::write_json(&self.task_path(&task.id), &stored).await?;
        debug!(task_id = %task.id, "task checkpoint written");
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let path = self.task_path(task_id);
        let Some(stored) = Self::read_json::<StoredTask>(&path).await? else {
            return Ok(None);
        };
        if now_ms() > stored.expires_at_ms {
            Self::remove_file_if_exists(&path).await?;
            return Ok(None);
        }
        Ok(Some(stored.task))
    }

    async fn delete_task(&self, task_id: &str) -> A2AResult<()> {
        Self::remove_file_if_exists(&self.task_path(task_id)).await
    }

    async fn list_nonterminal_task_ids(&self) -> A2AResult<Vec<String>> {
        let ids = self.list_ids("tasks").await?;
        let mut out = Vec::new();
        for id in ids {
            if let Some(task) = self.get_task(&id).await? {
                if !is_terminal(task.status.state) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    async fn put_worker_state(&self, thread_id: &str, state: Vec<u8>, ttl: Duration) -> A2AResult<()> {
        let stored = StoredBytes {
            bytes: state,
            expires_at_ms: now_ms() + ttl.as_millis() as i64,
        };
        Self::write_json(&self.thread_path(thread_id), &stored).await
    }

    async fn get_worker_state(&self, thread_id: &str) -> A2AResult<Option<Vec<u8>>> {
        let path = self.thread_path(thread_id);
        let Some(stored) = Self::read_json::<StoredBytes>(&path).await? else {
            return Ok(None);
        };
        if now_ms() > stored.expires_at_ms {
            Self::remove_file_if_exists(&path).await?;
            return Ok(None);
        }
        Ok(Some(stored.bytes))
    }

    async fn delete_worker_state(&self, thread_id: &str) -> A2AResult<()> {
        Self::remove_file_if_exists(&self.thread_path(thread_id)).await
    }

    async fn link_task_thread(&self, task_id: &str, thread_id: &str) -> A2AResult<()> {
        Self::write_json(
            &self.task_to_thread_path(task_id),
            &StoredLink {
                value: thread_id.to_string(),
            },
        )
        .await?;
        Self::write_json(
            &self.thread_to_task_path(thread_id),
            &StoredLink {
                value: task_id.to_string(),
            },
        )
        .await
    }

    async fn thread_for_task(&self, task_id: &str) -> A2AResult<Option<String>> {
        Ok(Self::read_json::<StoredLink>(&self.task_to_thread_path(task_id))
            .await?
            .map(|l| l.value))
    }

    async fn task_for_thread(&self, thread_id: &str) -> A2AResult<Option<String>> {
        Ok(Self::read_json::<StoredLink>(&self.thread_to_task_path(thread_id))
            .await?
            .map(|l| l.value))
    }

    async fn evict_expired(&self) -> A2AResult<usize> {
        let mut removed = 0;
        for id in self.list_ids("tasks").await? {
            if self.get_task(&id).await?.is_none() {
                removed += 1;
            }
        }
        for id in self.list_ids("threads").await? {
            if self.get_worker_state(&id).await?.is_none() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Serializes `Vec<u8>` as a plain JSON array rather than relying on an
/// external base64 crate the teacher's dependency stack doesn't carry.
mod bytes_as_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        bytes.to_vec().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(deserializer)
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Observes a task's event stream and writes checkpoints through to a
/// [`CheckpointStore`], coalescing writes so they happen at most once per
/// configured interval.
pub struct Synchronizer {
    checkpoint_store: Arc<dyn CheckpointStore>,
    retention: RetentionPolicy,
    coalesce_interval: Duration,
}

impl Synchronizer {
    /// Default coalescing interval: checkpoint writes are coalesced
    /// (default 1/s) for live tasks.
    pub const DEFAULT_COALESCE_INTERVAL: Duration = Duration::from_millis(1000);

    /// Create a synchronizer writing through to `checkpoint_store` with
    /// the default retention policy and a 1s coalescing interval.
    pub fn new(checkpoint_store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            checkpoint_store,
            retention: RetentionPolicy::default(),
            coalesce_interval: Self::DEFAULT_COALESCE_INTERVAL,
        }
    }

    /// Override the retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Override the coalescing interval.
    pub fn with_coalesce_interval(mut self, interval: Duration) -> Self {
        self.coalesce_interval = interval;
        self
    }

    /// Spawn a background task that watches `task_id`'s event queue and
    /// keeps the checkpoint store's task snapshot in sync, until a
    /// `final` status update is observed or the queue closes.
    ///
    /// Every `status-update` flushes immediately; `message` and
    /// `artifact-update` events mark the snapshot dirty and are flushed on
    /// the next coalescing tick: snapshots are flushed at most once
    /// per N ms.
    pub fn watch(
        &self,
        task_id: String,
        queue: EventQueue,
        task_store: Arc<dyn TaskStore>,
    ) -> tokio::task::JoinHandle<()> {
        let checkpoint_store = self.checkpoint_store.clone();
        let retention = self.retention;
        let coalesce_interval = self.coalesce_interval;

        tokio::spawn(async move {
            let mut rx = queue.subscribe();
            let mut dirty = false;
            let mut ticker = tokio::time::interval(coalesce_interval);
            ticker.tick().await; // first tick fires immediately; consume it

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Ok(StreamResponse::StatusUpdate(update)) => {
                                flush(&checkpoint_store, &task_store, &task_id, retention).await;
                                dirty = false;
                                if update.r#final {
                                    break;
                                }
                            }
                            Ok(_) => {
                                dirty = true;
                            }
                            Err(RecvError::Lagged(_)) => {
                                dirty = true;
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                    _ = ticker.tick() => {
                        if dirty {
                            flush(&checkpoint_store, &task_store, &task_id, retention).await;
                            dirty = false;
                        }
                    }
                }
            }
        })
    }
}

async fn flush(
    checkpoint_store: &Arc<dyn CheckpointStore>,
    task_store: &Arc<dyn TaskStore>,
    task_id: &str,
    retention: RetentionPolicy,
) {
    match task_store.get(task_id).await {
        Ok(Some(task)) => {
            let ttl = retention.ttl_for_state(task.status.state);
            if let Err(e) = checkpoint_store.put_task(&task, ttl).await {
                warn!(task_id, error = %e, "checkpoint flush failed");
            }
        }
        Ok(None) => warn!(task_id, "checkpoint flush skipped: task not found in store"),
        Err(e) => warn!(task_id, error = %e, "checkpoint flush failed reading task store"),
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// A task recovered from checkpoints at node startup, with whatever worker
/// state could be found for it.
#[derive(Debug, Clone)]
pub struct RecoveredTask {
    /// The last-checkpointed task snapshot.
    pub task: Task,
    /// The worker thread previously driving this task, if linked.
    pub thread_id: Option<String>,
    /// The worker's last-persisted conversational state, if any.
    pub worker_state: Option<Vec<u8>>,
}

/// Read every non-terminal checkpoint back at node start.
///
/// Callers rehydrate each [`RecoveredTask`] into their task store and
/// resume its worker by supplying `worker_state` to
/// [`Worker::start`](super::worker::Worker::start). A task with no
/// recoverable worker state should be failed with `WorkerUnrecoverable`
/// (see [`mark_unrecoverable`]) rather than silently restarted from
/// scratch, since that would replay side effects the worker already
/// performed.
pub async fn recover_nonterminal(
    checkpoint_store: &dyn CheckpointStore,
) -> A2AResult<Vec<RecoveredTask>> {
    let ids = checkpoint_store.list_nonterminal_task_ids().await?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(task) = checkpoint_store.get_task(&id).await? else {
            continue;
        };
        let thread_id = checkpoint_store.thread_for_task(&id).await?;
        let worker_state = if let Some(ref thread_id) = thread_id {
            checkpoint_store.get_worker_state(thread_id).await?
        } else {
            None
        };
        out.push(RecoveredTask {
            task,
            thread_id,
            worker_state,
        });
    }
    Ok(out)
}

/// Produce the `failed` snapshot a recovered task should transition to
/// when its worker state could not be recovered — the task transitions to
/// `failed` with cause `WorkerUnrecoverable`.
///
/// Returns a new [`Task`] value — callers are responsible for writing it
/// back to their task store and checkpoint store and for publishing the
/// corresponding `status-update` once a fresh event queue exists for the
/// task (recovery happens before any subscriber could be listening).
pub fn mark_unrecoverable(task: &Task) -> Task {
    let mut task = task.clone();
    let message = Message {
        message_id: uuid::Uuid::new_v4().to_string(),
        role: crate::types::Role::Agent,
        kind: "message".to_string(),
        parts: vec![Part::text(
            "task could not be resumed after restart: worker state unrecoverable",
        )],
        context_id: Some(task.context_id.clone()),
        task_id: Some(task.id.clone()),
        metadata: None,
        extensions: None,
        reference_task_ids: None,
    };
    task.status = crate::types::TaskStatus {
        state: TaskState::Failed,
        message: Some(message),
        timestamp: Some(Utc::now().to_rfc3339()),
    };
    task
}
