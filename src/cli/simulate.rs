//! Run the full governance lifecycle against an in-process service.

use super::config::ConsortiumConfig;
use consortium::clock::TokioSleeper;
use consortium::credentials::StaticCredentials;
use consortium::governance::{
    code_digest, AppKind, Consortium, GovernanceConfig, MemberId, NodeId, NodeStatus,
    ServiceStatus, UserId,
};
use consortium::service::MockService;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const NETWORK_CERT: &[u8] = b"-----BEGIN CERTIFICATE-----\nsimulated network\n-----END CERTIFICATE-----\n";
const SIMULATED_NODE: NodeId = NodeId(1);
const LUA_APP: &str = "return { ping = function() return \"pong\" end }";

/// Simulate a consortium of `members` members.
///
/// `commit_lag` is the number of commit polls each transaction stays
/// uncommitted for, so the commit wait is exercised.
pub async fn execute(
    members: Option<u32>,
    config: Option<String>,
    poll_interval: Option<Duration>,
    commit_lag: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConsortiumConfig::load_or_default(config.as_deref().map(Path::new))?;
    let members = members.unwrap_or(config.consortium.members.len() as u32);
    if members == 0 {
        return Err("A consortium needs at least one member".into());
    }

    let mut governance = config.governance;
    if let Some(interval) = poll_interval {
        let interval_ms = u64::try_from(interval.as_millis())
            .map_err(|_| format!("Poll interval {:?} is too long", interval))?;
        governance.commit.poll_interval_ms = interval_ms;
        governance.node_status.poll_interval_ms = interval_ms;
    }

    let records = run(members, governance, commit_lag).await?;

    println!("Simulated consortium of {} members", members);
    for record in records {
        println!(
            "  proposal {:>2}  {:<16} {:<9} by {} ({} for, {} against)",
            record.id,
            record.action,
            format!("{:?}", record.state),
            record.proposer,
            record.accepts,
            record.rejects
        );
    }

    Ok(())
}

/// Drive every governance operation once and return the proposal log.
pub async fn run(
    members: u32,
    config: GovernanceConfig,
    commit_lag: u32,
) -> Result<Vec<consortium::governance::ProposalRecord>, Box<dyn std::error::Error>> {
    let ids: Vec<MemberId> = (1..=members).map(MemberId).collect();
    let service = MockService::new(&ids, NETWORK_CERT);
    service.set_commit_lag(commit_lag);
    let credentials = StaticCredentials::generated(members, NETWORK_CERT);
    let node_attempts = config.node_status.attempts;

    let consortium = Consortium::from_credentials(
        Arc::new(service.clone()),
        Arc::new(TokioSleeper),
        &credentials,
        &ids,
        config,
    )?;
    let proposer = *ids.first().ok_or("A consortium needs at least one member")?;
    info!(members, quorum = consortium.quorum(), "starting simulation");

    consortium.open_network(proposer, true).await?;
    info!("network opened");

    for id in &ids {
        consortium.ack(*id).await?;
    }

    let users: Vec<UserId> = (0..2).map(UserId).collect();
    let user_credentials = users.iter().fold(StaticCredentials::new(), |creds, id| {
        creds.with_user(*id, format!("{}-cert", id).into_bytes())
    });
    consortium
        .add_users_from_credentials(proposer, &user_credentials, &users)
        .await?;

    consortium.set_app(proposer, AppKind::Lua, LUA_APP).await?;
    consortium
        .add_new_code(proposer, &code_digest(b"simulated enclave image"))
        .await?;

    service.add_node(SIMULATED_NODE, NodeStatus::Pending);
    consortium
        .wait_for_node_in_store(SIMULATED_NODE, node_attempts, Some(NodeStatus::Pending))
        .await?;
    consortium.trust_node(proposer, SIMULATED_NODE).await?;

    let rekey = consortium.rekey_ledger(proposer).await?;
    info!(result = %rekey, "ledger rekeyed");

    consortium.retire_node(SIMULATED_NODE).await?;
    consortium.check_for_service(ServiceStatus::Open).await?;

    // Grows the electorate, so it goes last.
    let added = consortium
        .add_member(proposer, format!("member{}-cert", members + 1).as_bytes())
        .await?;
    info!(result = %added, "member added");

    Ok(consortium.get_proposals().await?)
}
