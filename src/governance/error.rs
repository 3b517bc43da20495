//! Governance error taxonomy.
//!
//! Transport and rejection errors come from the service seam unchanged.
//! Verification and timeout errors always carry what was expected.

use super::types::{MemberId, NodeId, NodeStatus, ProposalId, ServiceStatus, TxId};
use crate::credentials::CredentialError;
use crate::service::traits::{ServiceError, Table};

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("Vote by {member} on proposal {proposal} failed: {source}")]
    VoteFailed {
        member: MemberId,
        proposal: ProposalId,
        #[source]
        source: ServiceError,
    },

    #[error("Proposal {0} was rejected")]
    ProposalRejected(ProposalId),

    #[error("Proposal {0} was withdrawn")]
    ProposalWithdrawn(ProposalId),

    #[error("Quorum of {votes} votes on proposal {proposal} produced no resolution")]
    NoResolution { proposal: ProposalId, votes: usize },

    #[error("Consortium has no members")]
    NoMembers,

    #[error("{0} is not a consortium member")]
    UnknownMember(MemberId),

    #[error("Node {node_id} is {} (expected {expected})", display_status(.actual))]
    UnexpectedNodeStatus {
        node_id: NodeId,
        expected: NodeStatus,
        actual: Option<NodeStatus>,
    },

    #[error("Service status {actual} (expected {expected})")]
    UnexpectedServiceStatus {
        expected: ServiceStatus,
        actual: ServiceStatus,
    },

    #[error("Current service certificate did not match the expected network certificate")]
    CertificateMismatch,

    #[error("Service record is missing")]
    MissingServiceRecord,

    #[error("Transaction {target} was not globally committed after {attempts} attempts (last seen {last_seen})")]
    CommitTimeout {
        target: TxId,
        last_seen: TxId,
        attempts: u32,
    },

    #[error("Index of transaction {target} was committed in term {actual_term}")]
    CommitTermMismatch { target: TxId, actual_term: u64 },

    #[error("Node {node_id} has not been recorded in the store{} after {attempts} attempts", with_status(.expected))]
    NodeStatusTimeout {
        node_id: NodeId,
        expected: Option<NodeStatus>,
        attempts: u32,
    },

    #[error("Invalid code digest: {0}")]
    InvalidCodeDigest(String),

    #[error("Unrecognized value in {table} entry {key}: {reason}")]
    UnrecognizedValue {
        table: Table,
        key: u64,
        reason: String,
    },
}

fn display_status(status: &Option<NodeStatus>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "absent".to_string(),
    }
}

fn with_status(status: &Option<NodeStatus>) -> String {
    match status {
        Some(status) => format!(" with status {}", status),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_status_timeout_names_node_and_status() {
        let err = GovernanceError::NodeStatusTimeout {
            node_id: NodeId(4),
            expected: Some(NodeStatus::Trusted),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Node 4"));
        assert!(msg.contains("with status TRUSTED"));
        assert!(msg.contains("3 attempts"));

        let err = GovernanceError::NodeStatusTimeout {
            node_id: NodeId(4),
            expected: None,
            attempts: 1,
        };
        assert!(!err.to_string().contains("with status"));
    }

    #[test]
    fn test_unexpected_node_status_names_both_states() {
        let err = GovernanceError::UnexpectedNodeStatus {
            node_id: NodeId(2),
            expected: NodeStatus::Pending,
            actual: Some(NodeStatus::Trusted),
        };
        assert_eq!(err.to_string(), "Node 2 is TRUSTED (expected PENDING)");

        let err = GovernanceError::UnexpectedNodeStatus {
            node_id: NodeId(2),
            expected: NodeStatus::Pending,
            actual: None,
        };
        assert_eq!(err.to_string(), "Node 2 is absent (expected PENDING)");
    }

    #[test]
    fn test_service_error_is_transparent() {
        let err: GovernanceError = ServiceError::Transport("reset".to_string()).into();
        assert_eq!(err.to_string(), "Transport error: reset");
    }

    #[test]
    fn test_commit_errors() {
        let err = GovernanceError::CommitTermMismatch {
            target: TxId::new(2, 10),
            actual_term: 3,
        };
        assert_eq!(
            err.to_string(),
            "Index of transaction 2.10 was committed in term 3"
        );

        let err = GovernanceError::CommitTimeout {
            target: TxId::new(2, 10),
            last_seen: TxId::new(2, 8),
            attempts: 30,
        };
        assert!(err.to_string().contains("2.10"));
        assert!(err.to_string().contains("2.8"));
    }
}
