//! Trait abstraction for the replicated service.
//!
//! The governance core never talks to a node directly. Everything goes
//! through `ServiceClient`, which lets tests swap in `MockService`.

use crate::credentials::Member;
use crate::governance::types::{MemberId, ProposalId, ProposalState, TxId, Vote, Action};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key-value tables the core reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Nodes,
    Service,
    Proposals,
}

impl Table {
    /// Table name as registered in the service's store.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nodes => "ccf.nodes",
            Self::Service => "ccf.service",
            Self::Proposals => "ccf.proposals",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Response to a successful proposal submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalReceipt {
    pub id: ProposalId,
    pub state: ProposalState,
    pub tx: TxId,
}

/// Response to a successful vote.
///
/// `result` is set only on the vote that resolved the proposal as accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub state: ProposalState,
    pub result: Option<serde_json::Value>,
    pub tx: TxId,
}

/// Answer to a commit query for a given index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Current globally committed watermark.
    pub global: TxId,
    /// Term recorded for the queried index, if the node knows it.
    pub term_at_index: Option<u64>,
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized caller: {0}")]
    Unauthorized(String),

    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error("Proposal {id} is {state:?}")]
    ProposalNotOpen { id: ProposalId, state: ProposalState },

    #[error("Vote from {0} must be signed")]
    UnsignedVote(MemberId),

    #[error("Rejected by service: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Transport and authentication failures, as opposed to service-level rejections.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unauthorized(_))
    }
}

/// Remote service client.
///
/// Calls that change governance state are authenticated as a member.
/// Reads and commit queries go to the node frontend.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Submit a proposal on behalf of `caller`.
    async fn propose(&self, caller: &Member, action: &Action) -> ServiceResult<ProposalReceipt>;

    /// Cast a ballot. `vote.member_id` must match `caller`.
    async fn vote(&self, caller: &Member, vote: &Vote) -> ServiceResult<VoteReceipt>;

    /// Withdraw an open proposal. Only the proposer may do this.
    async fn withdraw(&self, caller: &Member, proposal: ProposalId) -> ServiceResult<ProposalState>;

    /// Acknowledge the current service state.
    async fn ack(&self, caller: &Member) -> ServiceResult<()>;

    /// Read a single entry. `Ok(None)` when the key is absent.
    async fn query(&self, table: Table, key: u64) -> ServiceResult<Option<serde_json::Value>>;

    /// Read every entry of a table, ordered by key.
    async fn scan(&self, table: Table) -> ServiceResult<Vec<(u64, serde_json::Value)>>;

    /// Global commit watermark, plus the term recorded at `index`.
    async fn get_commit(&self, index: u64) -> ServiceResult<CommitStatus>;

    /// Ask the node to emit a signature so pending transactions commit sooner.
    async fn request_signature(&self) -> ServiceResult<()>;
}
