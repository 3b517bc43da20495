//! Governance protocol client.
//!
//! Members propose changes to a replicated service, vote them to a
//! majority, and confirm each change is globally committed and visible in
//! the store before treating it as effective.

pub mod commit;
pub mod config;
pub mod consortium;
pub mod error;
pub mod lifecycle;
pub mod proposal;
pub mod types;
pub mod voting;

pub use commit::CommitWaiter;
pub use config::{CommitWaitConfig, GovernanceConfig, NodeStatusConfig, VotingConfig, VotingPolicy};
pub use consortium::{code_digest, Consortium};
pub use error::{GovernanceError, GovernanceResult};
pub use lifecycle::NodeLifecycleVerifier;
pub use types::*;
pub use voting::{quorum, VotingCoordinator};
