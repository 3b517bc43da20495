//! Governance vocabulary shared with the service.
//!
//! Status values and action names form a closed, versioned contract.
//! Anything outside it fails to decode instead of being passed through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Consortium member identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub u32);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member{}", self.0)
    }
}

/// User identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user{}", self.0)
    }
}

/// Service node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proposal identifier assigned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a transaction in the replicated log.
///
/// There is no total order: a watermark only covers a transaction when
/// neither its term nor its index is behind. See [`TxId::covers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId {
    pub term: u64,
    pub index: u64,
}

impl TxId {
    pub fn new(term: u64, index: u64) -> Self {
        Self { term, index }
    }

    /// True once this watermark covers `target`.
    ///
    /// Both fields must reach the target. A later term at an earlier
    /// index, such as 3.5 against 2.10, does not cover it.
    pub fn covers(&self, target: &TxId) -> bool {
        self.index >= target.index && self.term >= target.term
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.term, self.index)
    }
}

/// Ballot decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

/// A single ballot. Not retained after the service records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub member_id: MemberId,
    pub proposal_id: ProposalId,
    pub decision: Decision,
    pub signed: bool,
}

impl Vote {
    /// Signed accepting vote.
    pub fn accept(member_id: MemberId, proposal_id: ProposalId) -> Self {
        Self {
            member_id,
            proposal_id,
            decision: Decision::Accept,
            signed: true,
        }
    }
}

/// Application flavour for `SetApplication`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Lua,
    Js,
}

impl FromStr for AppKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lua" => Ok(Self::Lua),
            "js" => Ok(Self::Js),
            other => Err(format!("unknown application kind: {}", other)),
        }
    }
}

/// Named governance action with typed parameters.
///
/// Serialized as `{"action": "<name>", "parameter": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "parameter", rename_all = "snake_case")]
pub enum Action {
    NewMember { cert: Vec<u8> },
    NewUser { cert: Vec<u8> },
    TrustNode { node_id: NodeId },
    RetireNode { node_id: NodeId },
    OpenNetwork,
    RekeyLedger,
    SetLuaApp { source: String },
    SetJsApp { source: String },
    AcceptRecovery { sealed_secrets: Vec<u8> },
    NewCode { digest: Vec<u8> },
}

impl Action {
    /// Build the application action for the given kind.
    pub fn set_app(kind: AppKind, source: String) -> Self {
        match kind {
            AppKind::Lua => Self::SetLuaApp { source },
            AppKind::Js => Self::SetJsApp { source },
        }
    }

    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMember { .. } => "new_member",
            Self::NewUser { .. } => "new_user",
            Self::TrustNode { .. } => "trust_node",
            Self::RetireNode { .. } => "retire_node",
            Self::OpenNetwork => "open_network",
            Self::RekeyLedger => "rekey_ledger",
            Self::SetLuaApp { .. } => "set_lua_app",
            Self::SetJsApp { .. } => "set_js_app",
            Self::AcceptRecovery { .. } => "accept_recovery",
            Self::NewCode { .. } => "new_code",
        }
    }
}

/// Lifecycle of a proposal as recorded by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalState {
    Open,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ProposalState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Returned by the Proposal Engine on successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalResult {
    pub id: ProposalId,
    pub state: ProposalState,
}

/// Outcome of a single vote.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub state: ProposalState,
    /// True when this vote observed the proposal resolve as accepted.
    pub accepted: bool,
    pub result: Option<serde_json::Value>,
    pub tx: TxId,
}

/// Service status, read from the service record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Opening,
    Open,
    WaitingForRecoveryShares,
    Closed,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opening => "OPENING",
            Self::Open => "OPEN",
            Self::WaitingForRecoveryShares => "WAITING_FOR_RECOVERY_SHARES",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Node lifecycle status: PENDING -> TRUSTED -> RETIRED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Pending,
    Trusted,
    Retired,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Trusted => "TRUSTED",
            Self::Retired => "RETIRED",
        };
        f.write_str(name)
    }
}

/// Node entry in the service's node table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub status: NodeStatus,
}

/// Singleton service record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub status: ServiceStatus,
    pub cert: Vec<u8>,
}

/// Proposal entry in the service's proposal table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub id: ProposalId,
    pub proposer: MemberId,
    pub action: String,
    pub state: ProposalState,
    pub accepts: u32,
    pub rejects: u32,
}
