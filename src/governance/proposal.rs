//! Proposal Engine.
//!
//! Submits a single named action for a member. Proposals are never
//! retried here: a resubmission is a new proposal with a new id.

use super::error::GovernanceResult;
use super::types::{Action, ProposalId, ProposalResult, ProposalState};
use crate::credentials::Member;
use crate::service::traits::ServiceClient;
use tracing::{info, warn};

/// Submit `action` on behalf of `member`.
pub async fn propose<C: ServiceClient + ?Sized>(
    client: &C,
    member: &Member,
    action: &Action,
) -> GovernanceResult<ProposalResult> {
    match client.propose(member, action).await {
        Ok(receipt) => {
            info!(
                member = %member.id,
                action = action.name(),
                proposal_id = %receipt.id,
                tx = %receipt.tx,
                "proposal submitted"
            );
            Ok(ProposalResult {
                id: receipt.id,
                state: receipt.state,
            })
        }
        Err(e) => {
            warn!(member = %member.id, action = action.name(), error = %e, "proposal failed");
            Err(e.into())
        }
    }
}

/// Withdraw an open proposal. Only its proposer may do this.
pub async fn withdraw<C: ServiceClient + ?Sized>(
    client: &C,
    member: &Member,
    proposal: ProposalId,
) -> GovernanceResult<ProposalState> {
    let state = client.withdraw(member, proposal).await?;
    info!(member = %member.id, proposal_id = %proposal, state = ?state, "proposal withdrawn");
    Ok(state)
}
