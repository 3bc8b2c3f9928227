//! Typed runtime configuration for an A2A node.
//!
//! [`NodeConfig`] collects the options a deployed node needs — network
//! binding, worker concurrency, queue sizing, checkpoint backend, peer
//! endpoints, timeouts, authentication, and checkpoint retention — into one
//! serde-deserializable struct with a [`Default`] impl. It can be loaded from
//! a TOML file, overridden by environment variables, or constructed directly
//! in code for tests and embedding.
//!
//! This has no equivalent in the Python SDK, which reads most of these knobs
//! from framework-level constructor arguments scattered across
//! `A2AStarletteApplication` and friends — here they're collected into one
//! struct so a node can be configured from a single file.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level node configuration.
///
/// All fields have defaults, so `NodeConfig::default()` produces a usable
/// single-process, in-memory, unauthenticated configuration suitable for
/// local development.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the HTTP server binds to (default `"127.0.0.1"`).
    pub host: String,

    /// Port the HTTP server binds to (default `8080`).
    pub port: u16,

    /// Worker execution limits.
    pub worker: WorkerConfig,

    /// Per-task event queue sizing.
    pub queue: QueueConfig,

    /// Checkpoint store backend selection and write cadence.
    pub checkpoint: CheckpointConfig,

    /// Peer agents this node can route sub-tasks to (orchestrator use).
    pub peers: Vec<PeerConfig>,

    /// Outbound and inbound timeout budgets.
    pub timeouts: TimeoutsConfig,

    /// Inbound request authentication.
    pub auth: AuthConfig,

    /// Checkpoint eviction windows by task outcome.
    pub retention: RetentionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker: WorkerConfig::default(),
            queue: QueueConfig::default(),
            checkpoint: CheckpointConfig::default(),
            peers: Vec::new(),
            timeouts: TimeoutsConfig::default(),
            auth: AuthConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Worker execution limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of tasks the node will run concurrently across all
    /// workers (default `100`).
    pub max_concurrent_tasks: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 100,
        }
    }
}

/// Per-task event queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Ring buffer capacity per task, shared by the broadcast channel and
    /// the replay history used for `tasks/resubscribe` (default `1024`).
    pub capacity_per_task: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity_per_task: 1024,
        }
    }
}

/// Which [`CheckpointStore`](crate::server::CheckpointStore) backend a node uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    /// In-process, non-durable store. Lost on restart.
    #[default]
    Memory,
    /// A durable external store (e.g. the file-backed reference implementation).
    External,
}

impl fmt::Display for CheckpointBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointBackend::Memory => write!(f, "memory"),
            CheckpointBackend::External => write!(f, "external"),
        }
    }
}

/// Checkpoint store backend selection and write cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Which backend to use.
    pub backend: CheckpointBackend,

    /// How often coalesced checkpoint writes flush to the backend, in
    /// milliseconds (default `1000`). Status-update events force an
    /// immediate flush regardless of this interval.
    pub interval_ms: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            interval_ms: 1000,
        }
    }
}

impl CheckpointConfig {
    /// The configured interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// A peer agent this node can route sub-tasks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// Short local name used to address this peer from orchestration logic.
    pub name: String,

    /// Base URL of the peer's A2A endpoint.
    pub base_url: String,

    /// Credential string (e.g. a bearer token) sent with outbound requests
    /// to this peer. Absent for peers that don't require authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,

    /// Skill names this peer is trusted for, overriding whatever its agent
    /// card advertises. `None` means trust the agent card as published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_override: Option<Vec<String>>,
}

/// Outbound and inbound timeout budgets, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Time budget to establish a connection to a peer (default `2000`).
    pub peer_connect_ms: u64,

    /// Total time budget for a single peer request, connect included
    /// (default `30000`).
    pub peer_total_ms: u64,

    /// How long an SSE stream may go without any event (including
    /// heartbeat comments) before the client treats it as dead
    /// (default `20000`).
    pub stream_idle_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            peer_connect_ms: 2_000,
            peer_total_ms: 30_000,
            stream_idle_ms: 20_000,
        }
    }
}

impl TimeoutsConfig {
    /// Connect-timeout as a [`Duration`].
    pub fn peer_connect(&self) -> Duration {
        Duration::from_millis(self.peer_connect_ms)
    }

    /// Total-request-timeout as a [`Duration`].
    pub fn peer_total(&self) -> Duration {
        Duration::from_millis(self.peer_total_ms)
    }

    /// Stream-idle-timeout as a [`Duration`].
    pub fn stream_idle(&self) -> Duration {
        Duration::from_millis(self.stream_idle_ms)
    }
}

/// Where an inbound request's credential is read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// No credential source configured — authentication is disabled and
    /// every request to a non-public endpoint is accepted.
    #[default]
    None,
    /// Read from the `Authorization: Bearer <token>` header and compare
    /// against a fixed token.
    StaticBearer,
}

/// Inbound request authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Authentication schemes this node advertises in its agent card and
    /// is willing to accept (e.g. `["bearer"]`).
    pub schemes: Vec<String>,

    /// Where the node reads the expected credential from.
    pub token_source: TokenSource,

    /// The bearer token to compare incoming `Authorization` headers
    /// against when `token_source = static_bearer`. Left unset when
    /// `token_source = none`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

/// Checkpoint eviction windows by task outcome, in days.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Retention for tasks still in a non-terminal state (default `7`).
    pub active_days: u32,
    /// Retention for tasks that completed successfully (default `30`).
    pub completed_days: u32,
    /// Retention for tasks that failed, were canceled, or were rejected
    /// (default `3`).
    pub failed_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            active_days: 7,
            completed_days: 30,
            failed_days: 3,
        }
    }
}

/// Errors raised while loading or validating [`NodeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file's contents were not valid TOML, or didn't match
    /// [`NodeConfig`]'s shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment variable override held a value of the wrong type
    /// (e.g. `A2A_PORT=not-a-number`).
    #[error("invalid value for environment variable {var}: {value:?}")]
    InvalidEnvValue {
        /// The environment variable name.
        var: String,
        /// The value that failed to parse.
        value: String,
    },

    /// `token_source = static_bearer` but no `bearer_token` was supplied.
    #[error("auth.token_source is static_bearer but auth.bearer_token is not set")]
    MissingBearerToken,
}

impl NodeConfig {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides on top (env always wins — matches the precedence order
    /// described in the configuration section: defaults < file < env).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        config.with_env_overrides()
    }

    /// Start from defaults and apply only environment variable overrides —
    /// useful when there is no config file, just env-driven deployment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply recognized `A2A_*` environment variables on top of `self`,
    /// validate the result, and return it.
    ///
    /// Recognized variables: `A2A_HOST`, `A2A_PORT`,
    /// `A2A_WORKER_MAX_CONCURRENT_TASKS`, `A2A_AUTH_BEARER_TOKEN`. Anything
    /// else (peers, timeouts, retention, checkpoint backend) is file- or
    /// code-configured only — these four are the ones operators most
    /// commonly need to override per-deployment without editing a file.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(host) = std::env::var("A2A_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("A2A_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnvValue {
                var: "A2A_PORT".to_string(),
                value: port,
            })?;
        }
        if let Ok(n) = std::env::var("A2A_WORKER_MAX_CONCURRENT_TASKS") {
            self.worker.max_concurrent_tasks =
                n.parse().map_err(|_| ConfigError::InvalidEnvValue {
                    var: "A2A_WORKER_MAX_CONCURRENT_TASKS".to_string(),
                    value: n,
                })?;
        }
        if let Ok(token) = std::env::var("A2A_AUTH_BEARER_TOKEN") {
            self.auth.bearer_token = Some(token);
            if self.auth.token_source == TokenSource::None {
                self.auth.token_source = TokenSource::StaticBearer;
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Check cross-field invariants that serde's per-field defaults can't
    /// express on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_source == TokenSource::StaticBearer && self.auth.bearer_token.is_none()
        {
            return Err(ConfigError::MissingBearerToken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_unauthenticated_in_memory() {
        let config = NodeConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
        assert_eq!(config.auth.token_source, TokenSource::None);
        assert!(config.auth.bearer_token.is_none());
        assert_eq!(config.retention.active_days, 7);
        assert_eq!(config.retention.completed_days, 30);
        assert_eq!(config.retention.failed_days, 3);
    }

    #[test]
    fn parses_partial_toml_with_defaults_filled_in() {
        let toml_src = r#"
            port = 9090

            [worker]
            max_concurrent_tasks = 16

            [[peers]]
            name = "sidekick"
            base_url = "http://localhost:9001"
        "#;
        let config: NodeConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.worker.max_concurrent_tasks, 16);
        assert_eq!(config.queue.capacity_per_task, 1024);
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].name, "sidekick");
        assert!(config.peers[0].credentials.is_none());
    }

    #[test]
    fn static_bearer_without_token_fails_validation() {
        let mut config = NodeConfig::default();
        config.auth.token_source = TokenSource::StaticBearer;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingBearerToken)
        ));
    }

    #[test]
    fn checkpoint_interval_and_timeouts_convert_to_duration() {
        let config = NodeConfig::default();
        assert_eq!(config.checkpoint.interval(), Duration::from_millis(1000));
        assert_eq!(
            config.timeouts.peer_connect(),
            Duration::from_millis(2_000)
        );
        assert_eq!(config.timeouts.peer_total(), Duration::from_millis(30_000));
        assert_eq!(
            config.timeouts.stream_idle(),
            Duration::from_millis(20_000)
        );
    }

    #[test]
    fn round_trips_through_serialization() {
        let mut config = NodeConfig::default();
        config.peers.push(PeerConfig {
            name: "p1".to_string(),
            base_url: "http://localhost:1".to_string(),
            credentials: Some("secret".to_string()),
            skills_override: Some(vec!["search".to_string()]),
        });
        let serialized = toml::to_string(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config, parsed);
    }
}
