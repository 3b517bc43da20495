//! Remote service seam.
//!
//! The governance core talks to the replicated service only through
//! [`ServiceClient`], so tests and the simulator can substitute
//! [`MockService`].

pub mod mock;
pub mod traits;

pub use mock::MockService;
pub use traits::{
    CommitStatus, ProposalReceipt, ServiceClient, ServiceError, ServiceResult, Table, VoteReceipt,
};
