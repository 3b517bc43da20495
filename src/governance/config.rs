//! Polling and voting settings.
//!
//! Intervals and budgets are configuration, not protocol. They live in the
//! `[governance]` section of the operator config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_COMMIT_POLL_MS: u64 = 100;
const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_NODE_POLL_MS: u64 = 1_000;
const DEFAULT_NODE_ATTEMPTS: u32 = 10;

/// Shortest interval used between polls. A configured zero is raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub commit: CommitWaitConfig,

    #[serde(default)]
    pub node_status: NodeStatusConfig,

    #[serde(default)]
    pub voting: VotingConfig,
}

/// Commit Waiter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitWaitConfig {
    #[serde(default = "default_commit_poll_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_commit_timeout_ms")]
    pub timeout_ms: u64,

    /// Ask the node for a signature before polling.
    #[serde(default = "default_true")]
    pub request_signature: bool,
}

/// Node Lifecycle Verifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusConfig {
    #[serde(default = "default_node_poll_ms")]
    pub poll_interval_ms: u64,

    /// Default attempt budget for `wait_for_node_status`.
    #[serde(default = "default_node_attempts")]
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingConfig {
    #[serde(default)]
    pub policy: VotingPolicy,
}

/// What `vote_until_majority` does once a proposal resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingPolicy {
    /// Stop at the first vote that resolves the proposal.
    #[default]
    StopOnResolution,
    /// Keep casting accepting votes until `quorum` members have voted.
    CastFullQuorum,
}

fn default_commit_poll_ms() -> u64 {
    DEFAULT_COMMIT_POLL_MS
}

fn default_commit_timeout_ms() -> u64 {
    DEFAULT_COMMIT_TIMEOUT_MS
}

fn default_node_poll_ms() -> u64 {
    DEFAULT_NODE_POLL_MS
}

fn default_node_attempts() -> u32 {
    DEFAULT_NODE_ATTEMPTS
}

fn default_true() -> bool {
    true
}

impl Default for CommitWaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_COMMIT_POLL_MS,
            timeout_ms: DEFAULT_COMMIT_TIMEOUT_MS,
            request_signature: true,
        }
    }
}

impl CommitWaitConfig {
    /// Interval between commit queries, never below `MIN_POLL_INTERVAL`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Number of commit queries that fit in the timeout (at least one).
    pub fn max_attempts(&self) -> u32 {
        let interval_ms = self.poll_interval().as_millis() as u64;
        let attempts = self.timeout_ms.div_ceil(interval_ms).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl Default for NodeStatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_NODE_POLL_MS,
            attempts: DEFAULT_NODE_ATTEMPTS,
        }
    }
}

impl NodeStatusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}
