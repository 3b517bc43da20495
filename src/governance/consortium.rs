//! Governance operations.
//!
//! Each operation is a fixed sequence: propose, vote to majority, then
//! verify the effect where one is observable.

use super::commit::CommitWaiter;
use super::config::GovernanceConfig;
use super::error::{GovernanceError, GovernanceResult};
use super::lifecycle::NodeLifecycleVerifier;
use super::proposal;
use super::types::{
    Action, AppKind, Decision, MemberId, NodeId, NodeStatus, ProposalId, ProposalRecord,
    ProposalResult, ProposalState, ServiceStatus, TxId, UserId, Vote, VoteOutcome,
};
use super::voting::VotingCoordinator;
use crate::clock::{Sleeper, TokioSleeper};
use crate::credentials::{CredentialProvider, Member};
use crate::service::traits::{ServiceClient, Table};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Hex-encoded SHA-256 digest of a binary, as accepted by `add_new_code`.
pub fn code_digest(binary: &[u8]) -> String {
    hex::encode(Sha256::digest(binary))
}

/// Governance client for a fixed set of members.
pub struct Consortium<C: ?Sized, S: ?Sized = TokioSleeper> {
    client: Arc<C>,
    coordinator: VotingCoordinator<C, S>,
    waiter: CommitWaiter<C, S>,
    verifier: NodeLifecycleVerifier<C, S>,
    network_cert: Vec<u8>,
}

impl<C, S> Consortium<C, S>
where
    C: ServiceClient + ?Sized,
    S: Sleeper + ?Sized,
{
    /// Members vote in the order given here.
    pub fn new(
        client: Arc<C>,
        sleeper: Arc<S>,
        members: Vec<Member>,
        network_cert: Vec<u8>,
        config: GovernanceConfig,
    ) -> Self {
        let coordinator = VotingCoordinator::new(
            client.clone(),
            CommitWaiter::new(client.clone(), sleeper.clone(), config.commit.clone()),
            members,
            config.voting.policy,
        );
        let waiter = CommitWaiter::new(client.clone(), sleeper.clone(), config.commit);
        let verifier = NodeLifecycleVerifier::new(client.clone(), sleeper, config.node_status);

        Self {
            client,
            coordinator,
            waiter,
            verifier,
            network_cert,
        }
    }

    /// Load members and the network certificate from `credentials`.
    pub fn from_credentials(
        client: Arc<C>,
        sleeper: Arc<S>,
        credentials: &dyn CredentialProvider,
        member_ids: &[MemberId],
        config: GovernanceConfig,
    ) -> GovernanceResult<Self> {
        let members = credentials.members(member_ids)?;
        let network_cert = credentials.network_cert()?;
        Ok(Self::new(client, sleeper, members, network_cert, config))
    }

    pub fn member_ids(&self) -> Vec<MemberId> {
        self.coordinator.members().iter().map(|m| m.id).collect()
    }

    pub fn quorum(&self) -> usize {
        self.coordinator.quorum()
    }

    pub fn verifier(&self) -> &NodeLifecycleVerifier<C, S> {
        &self.verifier
    }

    fn first_member(&self) -> GovernanceResult<MemberId> {
        self.coordinator
            .members()
            .first()
            .map(|m| m.id)
            .ok_or(GovernanceError::NoMembers)
    }

    pub async fn propose(
        &self,
        member: MemberId,
        action: &Action,
    ) -> GovernanceResult<ProposalResult> {
        let member = self.coordinator.member(member)?;
        proposal::propose(self.client.as_ref(), member, action).await
    }

    pub async fn vote(
        &self,
        member: MemberId,
        proposal_id: ProposalId,
        decision: Decision,
        force_unsigned: bool,
        wait_for_commit: bool,
    ) -> GovernanceResult<VoteOutcome> {
        let vote = Vote {
            member_id: member,
            proposal_id,
            decision,
            signed: !force_unsigned,
        };
        self.coordinator.vote(&vote, wait_for_commit).await
    }

    pub async fn vote_using_majority(
        &self,
        proposal_id: ProposalId,
        wait_for_commit: bool,
    ) -> GovernanceResult<serde_json::Value> {
        self.coordinator
            .vote_until_majority(proposal_id, wait_for_commit)
            .await
    }

    pub async fn withdraw(
        &self,
        member: MemberId,
        proposal_id: ProposalId,
    ) -> GovernanceResult<ProposalState> {
        let member = self.coordinator.member(member)?;
        proposal::withdraw(self.client.as_ref(), member, proposal_id).await
    }

    pub async fn ack(&self, member: MemberId) -> GovernanceResult<()> {
        let member = self.coordinator.member(member)?;
        self.client.ack(member).await?;
        info!(member = %member.id, "acknowledged service state");
        Ok(())
    }

    /// Every proposal recorded by the service.
    pub async fn get_proposals(&self) -> GovernanceResult<Vec<ProposalRecord>> {
        self.client
            .scan(Table::Proposals)
            .await?
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_value(value).map_err(|e| GovernanceError::UnrecognizedValue {
                    table: Table::Proposals,
                    key,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    pub async fn wait_for_global_commit(&self, target: TxId, strict: bool) -> GovernanceResult<()> {
        self.waiter.wait_for_global_commit(target, strict).await
    }

    async fn ratify(
        &self,
        member: MemberId,
        action: Action,
        wait_for_commit: bool,
    ) -> GovernanceResult<serde_json::Value> {
        let proposal = self.propose(member, &action).await?;
        let result = self
            .vote_using_majority(proposal.id, wait_for_commit)
            .await?;
        info!(action = action.name(), proposal_id = %proposal.id, "action ratified");
        Ok(result)
    }

    /// PENDING or TRUSTED -> RETIRED. Proposed by the first member.
    pub async fn retire_node(&self, node_id: NodeId) -> GovernanceResult<()> {
        let member = self.first_member()?;
        self.ratify(member, Action::RetireNode { node_id }, true)
            .await?;
        self.verifier
            .confirm_node_status(node_id, NodeStatus::Retired)
            .await
    }

    /// PENDING -> TRUSTED. Nothing is proposed unless the node is PENDING.
    pub async fn trust_node(&self, member: MemberId, node_id: NodeId) -> GovernanceResult<()> {
        self.verifier
            .require_node_status(node_id, NodeStatus::Pending)
            .await?;
        self.ratify(member, Action::TrustNode { node_id }, true)
            .await?;
        self.verifier
            .confirm_node_status(node_id, NodeStatus::Trusted)
            .await
    }

    /// OPENING -> OPEN, then check the service presents the network certificate.
    ///
    /// `wait_for_commit` is set when the consensus mode only runs the
    /// service hook once the transaction is globally committed.
    pub async fn open_network(&self, member: MemberId, wait_for_commit: bool) -> GovernanceResult<()> {
        self.ratify(member, Action::OpenNetwork, wait_for_commit)
            .await?;
        self.check_for_service(ServiceStatus::Open).await
    }

    /// Always waits for global commit: ledger secrets are only disclosed
    /// to nodes once the rekey transaction is globally committed.
    pub async fn rekey_ledger(&self, member: MemberId) -> GovernanceResult<serde_json::Value> {
        self.ratify(member, Action::RekeyLedger, true).await
    }

    pub async fn add_member(
        &self,
        member: MemberId,
        new_member_cert: &[u8],
    ) -> GovernanceResult<serde_json::Value> {
        let action = Action::NewMember {
            cert: new_member_cert.to_vec(),
        };
        self.ratify(member, action, true).await
    }

    /// One proposal per user certificate.
    pub async fn add_users(&self, member: MemberId, user_certs: &[Vec<u8>]) -> GovernanceResult<()> {
        for cert in user_certs {
            self.ratify(member, Action::NewUser { cert: cert.clone() }, true)
                .await?;
        }
        Ok(())
    }

    /// Add users whose certificates come from `credentials`.
    ///
    /// Every certificate is read before anything is proposed.
    pub async fn add_users_from_credentials(
        &self,
        member: MemberId,
        credentials: &dyn CredentialProvider,
        users: &[UserId],
    ) -> GovernanceResult<()> {
        let certs = users
            .iter()
            .map(|id| credentials.user_cert(*id))
            .collect::<Result<Vec<_>, _>>()?;
        self.add_users(member, &certs).await
    }

    pub async fn set_app(
        &self,
        member: MemberId,
        kind: AppKind,
        source: &str,
    ) -> GovernanceResult<()> {
        self.ratify(member, Action::set_app(kind, source.to_string()), true)
            .await?;
        Ok(())
    }

    pub async fn accept_recovery(
        &self,
        member: MemberId,
        sealed_secrets: &[u8],
    ) -> GovernanceResult<()> {
        let action = Action::AcceptRecovery {
            sealed_secrets: sealed_secrets.to_vec(),
        };
        self.ratify(member, action, true).await?;
        Ok(())
    }

    /// Trust a new code version, given its hex-encoded digest.
    pub async fn add_new_code(&self, member: MemberId, code_id: &str) -> GovernanceResult<()> {
        let digest =
            hex::decode(code_id).map_err(|e| GovernanceError::InvalidCodeDigest(e.to_string()))?;
        self.ratify(member, Action::NewCode { digest }, true)
            .await?;
        Ok(())
    }

    /// Check the service status and that it presents the network certificate.
    pub async fn check_for_service(&self, status: ServiceStatus) -> GovernanceResult<()> {
        self.verifier
            .check_for_service(status, &self.network_cert)
            .await
    }

    pub async fn wait_for_node_in_store(
        &self,
        node_id: NodeId,
        attempts: u32,
        status: Option<NodeStatus>,
    ) -> GovernanceResult<()> {
        self.verifier
            .wait_for_node_status(node_id, status, attempts)
            .await
    }
}
