//! Voting Coordinator.
//!
//! Casts ballots for consortium members and drives a proposal to
//! resolution by majority. Members vote in registration order.

use super::commit::CommitWaiter;
use super::config::VotingPolicy;
use super::error::{GovernanceError, GovernanceResult};
use super::types::{MemberId, ProposalId, ProposalState, Vote, VoteOutcome};
use crate::clock::Sleeper;
use crate::credentials::Member;
use crate::service::traits::ServiceClient;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Accepting votes needed to ratify a proposal among `members` voters.
pub fn quorum(members: usize) -> usize {
    members / 2 + 1
}

pub struct VotingCoordinator<C: ?Sized, S: ?Sized> {
    client: Arc<C>,
    waiter: CommitWaiter<C, S>,
    members: Vec<Member>,
    policy: VotingPolicy,
}

impl<C, S> VotingCoordinator<C, S>
where
    C: ServiceClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(
        client: Arc<C>,
        waiter: CommitWaiter<C, S>,
        members: Vec<Member>,
        policy: VotingPolicy,
    ) -> Self {
        Self {
            client,
            waiter,
            members,
            policy,
        }
    }

    /// Members in voting order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, id: MemberId) -> GovernanceResult<&Member> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .ok_or(GovernanceError::UnknownMember(id))
    }

    pub fn quorum(&self) -> usize {
        quorum(self.members.len())
    }

    /// Cast one ballot.
    ///
    /// When the ballot resolves the proposal with a result and
    /// `wait_for_commit` is set, blocks until that transaction is
    /// globally committed.
    pub async fn vote(&self, vote: &Vote, wait_for_commit: bool) -> GovernanceResult<VoteOutcome> {
        let member = self.member(vote.member_id)?;

        let receipt = self.client.vote(member, vote).await.map_err(|source| {
            warn!(
                member = %vote.member_id,
                proposal_id = %vote.proposal_id,
                error = %source,
                "vote failed"
            );
            GovernanceError::VoteFailed {
                member: vote.member_id,
                proposal: vote.proposal_id,
                source,
            }
        })?;

        info!(
            member = %vote.member_id,
            proposal_id = %vote.proposal_id,
            decision = ?vote.decision,
            state = ?receipt.state,
            tx = %receipt.tx,
            "vote recorded"
        );

        if receipt.result.is_some() && wait_for_commit {
            self.waiter.wait_for_global_commit(receipt.tx, true).await?;
        }

        Ok(VoteOutcome {
            state: receipt.state,
            accepted: receipt.state == ProposalState::Accepted && receipt.result.is_some(),
            result: receipt.result,
            tx: receipt.tx,
        })
    }

    /// Cast accepting votes until the proposal resolves.
    ///
    /// At most `quorum` members vote. Any failed ballot aborts the round.
    /// Under `CastFullQuorum` the remaining votes up to `quorum` are still
    /// cast after resolution and must succeed; the first resolution wins.
    pub async fn vote_until_majority(
        &self,
        proposal: ProposalId,
        wait_for_commit: bool,
    ) -> GovernanceResult<serde_json::Value> {
        if self.members.is_empty() {
            return Err(GovernanceError::NoMembers);
        }

        let majority = self.quorum();
        let mut resolution = None;
        let mut cast = 0;

        for member in self.members.iter().take(majority) {
            let outcome = self
                .vote(&Vote::accept(member.id, proposal), wait_for_commit)
                .await?;
            cast += 1;

            match outcome.state {
                ProposalState::Rejected => return Err(GovernanceError::ProposalRejected(proposal)),
                ProposalState::Withdrawn => {
                    return Err(GovernanceError::ProposalWithdrawn(proposal))
                }
                _ => {}
            }

            if resolution.is_none() {
                if let Some(result) = outcome.result {
                    info!(proposal_id = %proposal, votes = cast, "proposal resolved");
                    resolution = Some(result);
                    if self.policy == VotingPolicy::StopOnResolution {
                        break;
                    }
                }
            }
        }

        resolution.ok_or_else(|| {
            error!(proposal_id = %proposal, votes = cast, "quorum reached without resolution");
            GovernanceError::NoResolution {
                proposal,
                votes: cast,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingSleeper;
    use crate::credentials::{CredentialProvider, StaticCredentials};
    use crate::governance::config::CommitWaitConfig;
    use crate::governance::types::{Action, Decision};
    use crate::service::mock::MockService;
    use crate::service::traits::ServiceError;
    use proptest::prelude::*;
    use serde_json::json;

    fn ids(n: u32) -> Vec<MemberId> {
        (1..=n).map(MemberId).collect()
    }

    fn coordinator(
        service: &MockService,
        n: u32,
        policy: VotingPolicy,
    ) -> VotingCoordinator<MockService, RecordingSleeper> {
        let client = Arc::new(service.clone());
        let waiter = CommitWaiter::new(
            client.clone(),
            Arc::new(RecordingSleeper::new()),
            CommitWaitConfig::default(),
        );
        let members = StaticCredentials::generated(n, b"net")
            .members(&ids(n))
            .unwrap();
        VotingCoordinator::new(client, waiter, members, policy)
    }

    async fn open_proposal(service: &MockService) -> ProposalId {
        let proposer = StaticCredentials::generated(1, b"net")
            .member(MemberId(1))
            .unwrap();
        service
            .propose(&proposer, &Action::RekeyLedger)
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_quorum_values() {
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 2);
        assert_eq!(quorum(3), 2);
        assert_eq!(quorum(4), 3);
        assert_eq!(quorum(5), 3);
    }

    #[tokio::test]
    async fn test_stops_on_resolution() {
        let service = MockService::new(&ids(5), b"net");
        let coord = coordinator(&service, 5, VotingPolicy::StopOnResolution);
        let id = open_proposal(&service).await;

        let result = coord.vote_until_majority(id, true).await.unwrap();

        assert_eq!(result, json!({ "ledger_secret_version": 1 }));
        assert_eq!(service.ballot_counts(id), (3, 0));
        assert_eq!(service.vote_calls(), 3);
    }

    #[tokio::test]
    async fn test_cast_full_quorum_tolerates_late_votes() {
        // Two members already accepted out of band; the third crosses quorum.
        let service = MockService::new(&ids(5), b"net");
        let coord = coordinator(&service, 5, VotingPolicy::CastFullQuorum);
        let id = open_proposal(&service).await;
        for m in [4, 5] {
            coord
                .vote(&Vote::accept(MemberId(m), id), false)
                .await
                .unwrap();
        }

        let result = coord.vote_until_majority(id, false).await.unwrap();

        assert_eq!(result, json!({ "ledger_secret_version": 1 }));
        assert_eq!(service.ballot_counts(id), (5, 0));
        assert_eq!(service.ledger_secret_version(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_resolution_after_out_of_band_votes() {
        let service = MockService::new(&ids(5), b"net");
        let coord = coordinator(&service, 5, VotingPolicy::StopOnResolution);
        let id = open_proposal(&service).await;
        for m in [4, 5] {
            coord
                .vote(&Vote::accept(MemberId(m), id), false)
                .await
                .unwrap();
        }

        coord.vote_until_majority(id, false).await.unwrap();
        assert_eq!(service.ballot_counts(id), (3, 0));
    }

    #[tokio::test]
    async fn test_failed_vote_is_fatal() {
        let service = MockService::new(&ids(3), b"net");
        let coord = coordinator(&service, 3, VotingPolicy::StopOnResolution);
        let id = open_proposal(&service).await;
        service.fail_next(ServiceError::Transport("reset".to_string()));

        let err = coord.vote_until_majority(id, true).await.unwrap_err();

        assert!(matches!(
            err,
            GovernanceError::VoteFailed { member, source: ServiceError::Transport(_), .. }
                if member == MemberId(1)
        ));
        assert_eq!(service.vote_calls(), 1);
        assert_eq!(service.ballot_counts(id), (0, 0));
    }

    #[tokio::test]
    async fn test_rejected_proposal_aborts() {
        let service = MockService::new(&ids(3), b"net");
        let coord = coordinator(&service, 3, VotingPolicy::StopOnResolution);
        let id = open_proposal(&service).await;
        for m in [2, 3] {
            let vote = Vote {
                member_id: MemberId(m),
                proposal_id: id,
                decision: Decision::Reject,
                signed: true,
            };
            let outcome = coord.vote(&vote, true).await.unwrap();
            assert!(!outcome.accepted);
        }

        let err = coord.vote_until_majority(id, true).await.unwrap_err();
        assert!(matches!(err, GovernanceError::ProposalRejected(p) if p == id));
    }

    #[tokio::test]
    async fn test_no_resolution_is_an_error() {
        // Service electorate is larger than the coordinator's member list.
        let service = MockService::new(&ids(5), b"net");
        let coord = coordinator(&service, 2, VotingPolicy::StopOnResolution);
        let id = open_proposal(&service).await;

        let err = coord.vote_until_majority(id, false).await.unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::NoResolution { votes: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_vote_waits_for_commit_only_on_resolution() {
        let service = MockService::new(&ids(3), b"net");
        let coord = coordinator(&service, 3, VotingPolicy::StopOnResolution);
        let id = open_proposal(&service).await;

        let first = coord.vote(&Vote::accept(MemberId(1), id), true).await.unwrap();
        assert!(!first.accepted);
        assert_eq!(service.commit_queries(), 0);

        let second = coord.vote(&Vote::accept(MemberId(2), id), true).await.unwrap();
        assert!(second.accepted);
        assert!(service.commit_queries() >= 1);
    }

    #[tokio::test]
    async fn test_unknown_member() {
        let service = MockService::new(&ids(3), b"net");
        let coord = coordinator(&service, 3, VotingPolicy::StopOnResolution);

        let err = coord
            .vote(&Vote::accept(MemberId(7), ProposalId(0)), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::UnknownMember(MemberId(7))));
    }

    proptest! {
        /// Quorum is a strict majority for every electorate size.
        #[test]
        fn prop_quorum_is_strict_majority(n in 1usize..1000) {
            let q = quorum(n);
            prop_assert_eq!(q, n / 2 + 1);
            prop_assert!(2 * q > n);
            prop_assert!(q <= n);
        }

        /// No proposal resolves before quorum accepting ballots, and the
        /// coordinator never casts more than quorum of them.
        #[test]
        fn prop_votes_bounded_by_quorum(n in 1u32..12, full in any::<bool>()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let service = MockService::new(&ids(n), b"net");
                let policy = if full {
                    VotingPolicy::CastFullQuorum
                } else {
                    VotingPolicy::StopOnResolution
                };
                let coord = coordinator(&service, n, policy);
                let id = open_proposal(&service).await;
                let q = quorum(n as usize);

                for m in 1..q as u32 {
                    let outcome = coord
                        .vote(&Vote::accept(MemberId(m), id), false)
                        .await
                        .unwrap();
                    assert_eq!(outcome.state, ProposalState::Open);
                }

                coord.vote_until_majority(id, false).await.unwrap();
                let (accepts, _) = service.ballot_counts(id);
                assert_eq!(accepts, q);
                // q - 1 ballots up front, then at most q from the coordinator.
                assert_eq!(service.vote_calls(), 2 * q - 1);
            });
        }
    }
}
