//! In-memory service for tests and simulation.
//!
//! Tracks members, proposals with per-member ballots, the node table,
//! the service record and a (term, index) log whose global commit
//! watermark can be made to lag or freeze.

use super::traits::*;
use crate::credentials::Member;
use crate::governance::types::{
    Action, AppKind, Decision, MemberId, NodeId, NodeStatus, ProposalId, ProposalRecord,
    ProposalState, ServiceStatus, TxId, Vote,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Mock replicated service.
#[derive(Clone)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
}

struct MockProposal {
    proposer: MemberId,
    action: Action,
    ballots: BTreeMap<MemberId, Decision>,
    state: ProposalState,
}

impl MockProposal {
    fn count(&self, decision: Decision) -> usize {
        self.ballots.values().filter(|d| **d == decision).count()
    }
}

struct MockState {
    members: Vec<MemberId>,
    acked: Vec<MemberId>,
    users: Vec<Vec<u8>>,
    nodes: BTreeMap<NodeId, String>,
    service_status: String,
    service_cert: Vec<u8>,
    proposals: BTreeMap<ProposalId, MockProposal>,
    next_proposal: u64,
    app: Option<(AppKind, String)>,
    code_ids: Vec<Vec<u8>>,
    sealed_secrets: Option<Vec<u8>>,
    ledger_secret_version: u64,

    // Log: terms[i] is the term of index i + 1.
    term: u64,
    terms: Vec<u64>,
    committed: u64,
    commit_lag: u32,
    pending_lag: u32,
    commit_frozen: bool,

    require_signed_votes: bool,
    fail_next: Option<ServiceError>,

    vote_calls: usize,
    query_calls: HashMap<Table, usize>,
    commit_queries: usize,
    signature_requests: usize,
}

impl MockState {
    fn append_tx(&mut self) -> TxId {
        self.terms.push(self.term);
        self.pending_lag = self.commit_lag;
        TxId::new(self.term, self.terms.len() as u64)
    }

    fn term_at(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        self.terms.get(index as usize - 1).copied()
    }

    fn take_failure(&mut self) -> ServiceResult<()> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn authorize(&self, caller: &Member) -> ServiceResult<()> {
        if self.members.contains(&caller.id) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(caller.id.to_string()))
        }
    }

    fn quorum(&self) -> usize {
        self.members.len() / 2 + 1
    }

    fn node_status(&self, node_id: NodeId) -> Result<NodeStatus, String> {
        let raw = self
            .nodes
            .get(&node_id)
            .ok_or_else(|| format!("node {} does not exist", node_id))?;
        serde_json::from_value(json!(raw)).map_err(|e| e.to_string())
    }

    /// Apply a ratified action and return its result payload.
    fn apply(&mut self, action: &Action) -> Result<serde_json::Value, String> {
        match action {
            Action::NewMember { .. } => {
                let id = self.members.iter().map(|m| m.0).max().unwrap_or(0) + 1;
                self.members.push(MemberId(id));
                Ok(json!({ "member_id": id }))
            }
            Action::NewUser { cert } => {
                self.users.push(cert.clone());
                Ok(json!({ "user_id": self.users.len() - 1 }))
            }
            Action::TrustNode { node_id } => match self.node_status(*node_id)? {
                NodeStatus::Pending => {
                    self.nodes.insert(*node_id, NodeStatus::Trusted.to_string());
                    Ok(json!(true))
                }
                other => Err(format!("node {} is {}, not PENDING", node_id, other)),
            },
            Action::RetireNode { node_id } => match self.node_status(*node_id)? {
                NodeStatus::Retired => Err(format!("node {} is already RETIRED", node_id)),
                _ => {
                    self.nodes.insert(*node_id, NodeStatus::Retired.to_string());
                    Ok(json!(true))
                }
            },
            Action::OpenNetwork => {
                if self.service_status != ServiceStatus::Opening.to_string() {
                    return Err(format!("service is {}, not OPENING", self.service_status));
                }
                self.service_status = ServiceStatus::Open.to_string();
                Ok(json!(true))
            }
            Action::RekeyLedger => {
                self.ledger_secret_version += 1;
                Ok(json!({ "ledger_secret_version": self.ledger_secret_version }))
            }
            Action::SetLuaApp { source } => {
                self.app = Some((AppKind::Lua, source.clone()));
                Ok(json!(true))
            }
            Action::SetJsApp { source } => {
                self.app = Some((AppKind::Js, source.clone()));
                Ok(json!(true))
            }
            Action::AcceptRecovery { sealed_secrets } => {
                if self.service_status != ServiceStatus::WaitingForRecoveryShares.to_string() {
                    return Err(format!(
                        "service is {}, not WAITING_FOR_RECOVERY_SHARES",
                        self.service_status
                    ));
                }
                self.sealed_secrets = Some(sealed_secrets.clone());
                self.service_status = ServiceStatus::Open.to_string();
                Ok(json!(true))
            }
            Action::NewCode { digest } => {
                self.code_ids.push(digest.clone());
                Ok(json!({ "code_ids": self.code_ids.len() }))
            }
        }
    }

    fn proposal_record(&self, id: ProposalId, p: &MockProposal) -> ProposalRecord {
        ProposalRecord {
            id,
            proposer: p.proposer,
            action: p.action.name().to_string(),
            state: p.state,
            accepts: p.count(Decision::Accept) as u32,
            rejects: p.count(Decision::Reject) as u32,
        }
    }

    fn read(&self, table: Table, key: u64) -> ServiceResult<Option<serde_json::Value>> {
        let value = match table {
            Table::Nodes => self
                .nodes
                .get(&NodeId(key))
                .map(|status| json!({ "status": status })),
            Table::Service => (key == 0).then(|| {
                json!({
                    "status": self.service_status,
                    "cert": self.service_cert,
                })
            }),
            Table::Proposals => match self.proposals.get(&ProposalId(key)) {
                Some(p) => Some(
                    serde_json::to_value(self.proposal_record(ProposalId(key), p))
                        .map_err(|e| ServiceError::Transport(e.to_string()))?,
                ),
                None => None,
            },
        };
        Ok(value)
    }
}

impl MockService {
    /// Service in OPENING status with the given members and certificate.
    pub fn new(members: &[MemberId], network_cert: &[u8]) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                members: members.to_vec(),
                acked: Vec::new(),
                users: Vec::new(),
                nodes: BTreeMap::new(),
                service_status: ServiceStatus::Opening.to_string(),
                service_cert: network_cert.to_vec(),
                proposals: BTreeMap::new(),
                next_proposal: 0,
                app: None,
                code_ids: Vec::new(),
                sealed_secrets: None,
                ledger_secret_version: 0,
                term: 2,
                terms: Vec::new(),
                committed: 0,
                commit_lag: 0,
                pending_lag: 0,
                commit_frozen: false,
                require_signed_votes: false,
                fail_next: None,
                vote_calls: 0,
                query_calls: HashMap::new(),
                commit_queries: 0,
                signature_requests: 0,
            })),
        }
    }

    /// Register a node with the given status (for test setup).
    pub fn add_node(&self, node_id: NodeId, status: NodeStatus) {
        self.set_node_status_raw(node_id, &status.to_string());
    }

    /// Store an arbitrary status string for a node.
    pub fn set_node_status_raw(&self, node_id: NodeId, status: &str) {
        let mut s = self.state.lock().unwrap();
        s.nodes.insert(node_id, status.to_string());
    }

    pub fn node_status(&self, node_id: NodeId) -> Option<String> {
        self.state.lock().unwrap().nodes.get(&node_id).cloned()
    }

    pub fn set_service_status(&self, status: ServiceStatus) {
        self.state.lock().unwrap().service_status = status.to_string();
    }

    pub fn set_service_status_raw(&self, status: &str) {
        self.state.lock().unwrap().service_status = status.to_string();
    }

    pub fn service_status(&self) -> String {
        self.state.lock().unwrap().service_status.clone()
    }

    /// Replace the certificate the service presents.
    pub fn set_service_cert(&self, cert: &[u8]) {
        self.state.lock().unwrap().service_cert = cert.to_vec();
    }

    /// Refuse unsigned ballots.
    pub fn require_signed_votes(&self, required: bool) {
        self.state.lock().unwrap().require_signed_votes = required;
    }

    /// Fail the next call with `err`.
    pub fn fail_next(&self, err: ServiceError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// Number of commit queries after each write before the watermark catches up.
    pub fn set_commit_lag(&self, polls: u32) {
        let mut s = self.state.lock().unwrap();
        s.commit_lag = polls;
        s.pending_lag = polls;
    }

    /// Stop the global commit watermark from advancing.
    pub fn freeze_commit(&self) {
        self.state.lock().unwrap().commit_frozen = true;
    }

    /// Start a new term and rewrite every entry from `index` onwards,
    /// as if a new leader replaced them.
    pub fn supersede_from(&self, index: u64) {
        let mut s = self.state.lock().unwrap();
        s.term += 1;
        let term = s.term;
        let start = index.saturating_sub(1) as usize;
        for t in s.terms.iter_mut().skip(start) {
            *t = term;
        }
    }

    /// Current log head.
    pub fn head(&self) -> TxId {
        let s = self.state.lock().unwrap();
        TxId::new(s.term, s.terms.len() as u64)
    }

    pub fn members(&self) -> Vec<MemberId> {
        self.state.lock().unwrap().members.clone()
    }

    pub fn acked(&self) -> Vec<MemberId> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn users(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn app(&self) -> Option<(AppKind, String)> {
        self.state.lock().unwrap().app.clone()
    }

    pub fn code_ids(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().code_ids.clone()
    }

    pub fn sealed_secrets(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().sealed_secrets.clone()
    }

    pub fn ledger_secret_version(&self) -> u64 {
        self.state.lock().unwrap().ledger_secret_version
    }

    pub fn proposal_count(&self) -> usize {
        self.state.lock().unwrap().proposals.len()
    }

    pub fn proposal_state(&self, id: ProposalId) -> Option<ProposalState> {
        self.state.lock().unwrap().proposals.get(&id).map(|p| p.state)
    }

    /// Recorded (accepts, rejects) for a proposal.
    pub fn ballot_counts(&self, id: ProposalId) -> (usize, usize) {
        let s = self.state.lock().unwrap();
        s.proposals
            .get(&id)
            .map(|p| (p.count(Decision::Accept), p.count(Decision::Reject)))
            .unwrap_or((0, 0))
    }

    /// Total vote calls received, including rejected ones.
    pub fn vote_calls(&self) -> usize {
        self.state.lock().unwrap().vote_calls
    }

    pub fn query_calls(&self, table: Table) -> usize {
        *self
            .state
            .lock()
            .unwrap()
            .query_calls
            .get(&table)
            .unwrap_or(&0)
    }

    pub fn commit_queries(&self) -> usize {
        self.state.lock().unwrap().commit_queries
    }

    pub fn signature_requests(&self) -> usize {
        self.state.lock().unwrap().signature_requests
    }
}

#[async_trait]
impl ServiceClient for MockService {
    async fn propose(&self, caller: &Member, action: &Action) -> ServiceResult<ProposalReceipt> {
        let mut s = self.state.lock().unwrap();
        s.take_failure()?;
        s.authorize(caller)?;

        let id = ProposalId(s.next_proposal);
        s.next_proposal += 1;
        s.proposals.insert(
            id,
            MockProposal {
                proposer: caller.id,
                action: action.clone(),
                ballots: BTreeMap::new(),
                state: ProposalState::Open,
            },
        );
        let tx = s.append_tx();

        Ok(ProposalReceipt {
            id,
            state: ProposalState::Open,
            tx,
        })
    }

    async fn vote(&self, caller: &Member, vote: &Vote) -> ServiceResult<VoteReceipt> {
        let mut s = self.state.lock().unwrap();
        s.vote_calls += 1;
        s.take_failure()?;
        s.authorize(caller)?;
        if caller.id != vote.member_id {
            return Err(ServiceError::Unauthorized(format!(
                "{} cannot vote as {}",
                caller.id, vote.member_id
            )));
        }
        if s.require_signed_votes && !vote.signed {
            return Err(ServiceError::UnsignedVote(vote.member_id));
        }

        let quorum = s.quorum();
        let proposal = s
            .proposals
            .get_mut(&vote.proposal_id)
            .ok_or(ServiceError::UnknownProposal(vote.proposal_id))?;

        match proposal.state {
            ProposalState::Withdrawn => {
                return Err(ServiceError::ProposalNotOpen {
                    id: vote.proposal_id,
                    state: proposal.state,
                });
            }
            ProposalState::Accepted | ProposalState::Rejected => {
                // Late ballots are recorded but change nothing.
                proposal.ballots.insert(vote.member_id, vote.decision);
                let state = proposal.state;
                let tx = s.append_tx();
                return Ok(VoteReceipt {
                    state,
                    result: None,
                    tx,
                });
            }
            ProposalState::Open => {}
        }

        proposal.ballots.insert(vote.member_id, vote.decision);
        let accepts = proposal.count(Decision::Accept);
        let rejects = proposal.count(Decision::Reject);
        let action = proposal.action.clone();

        let (state, result) = if accepts >= quorum {
            match s.apply(&action) {
                Ok(payload) => (ProposalState::Accepted, Some(payload)),
                Err(reason) => {
                    if let Some(p) = s.proposals.get_mut(&vote.proposal_id) {
                        p.state = ProposalState::Rejected;
                    }
                    s.append_tx();
                    return Err(ServiceError::Rejected(reason));
                }
            }
        } else if rejects >= quorum {
            (ProposalState::Rejected, None)
        } else {
            (ProposalState::Open, None)
        };

        if let Some(p) = s.proposals.get_mut(&vote.proposal_id) {
            p.state = state;
        }
        let tx = s.append_tx();

        Ok(VoteReceipt { state, result, tx })
    }

    async fn withdraw(&self, caller: &Member, proposal: ProposalId) -> ServiceResult<ProposalState> {
        let mut s = self.state.lock().unwrap();
        s.take_failure()?;
        s.authorize(caller)?;

        let p = s
            .proposals
            .get_mut(&proposal)
            .ok_or(ServiceError::UnknownProposal(proposal))?;
        if p.proposer != caller.id {
            return Err(ServiceError::Rejected(format!(
                "{} is not the proposer of {}",
                caller.id, proposal
            )));
        }
        if p.state != ProposalState::Open {
            return Err(ServiceError::ProposalNotOpen {
                id: proposal,
                state: p.state,
            });
        }
        p.state = ProposalState::Withdrawn;
        s.append_tx();

        Ok(ProposalState::Withdrawn)
    }

    async fn ack(&self, caller: &Member) -> ServiceResult<()> {
        let mut s = self.state.lock().unwrap();
        s.take_failure()?;
        s.authorize(caller)?;
        if !s.acked.contains(&caller.id) {
            s.acked.push(caller.id);
        }
        s.append_tx();
        Ok(())
    }

    async fn query(&self, table: Table, key: u64) -> ServiceResult<Option<serde_json::Value>> {
        let mut s = self.state.lock().unwrap();
        *s.query_calls.entry(table).or_insert(0) += 1;
        s.take_failure()?;
        s.read(table, key)
    }

    async fn scan(&self, table: Table) -> ServiceResult<Vec<(u64, serde_json::Value)>> {
        let mut s = self.state.lock().unwrap();
        *s.query_calls.entry(table).or_insert(0) += 1;
        s.take_failure()?;

        let keys: Vec<u64> = match table {
            Table::Nodes => s.nodes.keys().map(|k| k.0).collect(),
            Table::Service => vec![0],
            Table::Proposals => s.proposals.keys().map(|k| k.0).collect(),
        };
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = s.read(table, key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    async fn get_commit(&self, index: u64) -> ServiceResult<CommitStatus> {
        let mut s = self.state.lock().unwrap();
        s.commit_queries += 1;
        s.take_failure()?;

        if !s.commit_frozen {
            if s.pending_lag > 0 {
                s.pending_lag -= 1;
            } else {
                s.committed = s.terms.len() as u64;
            }
        }

        let committed = s.committed;
        let global = TxId::new(s.term_at(committed).unwrap_or(0), committed);
        Ok(CommitStatus {
            global,
            term_at_index: s.term_at(index),
        })
    }

    async fn request_signature(&self) -> ServiceResult<()> {
        let mut s = self.state.lock().unwrap();
        s.signature_requests += 1;
        s.take_failure()?;
        s.append_tx();
        Ok(())
    }
}
