//! Node Lifecycle Verifier.
//!
//! Reads node and service records and asserts they reached the expected
//! status. Polling is bounded by an attempt budget.

use super::config::NodeStatusConfig;
use super::error::{GovernanceError, GovernanceResult};
use super::types::{NodeId, NodeRecord, NodeStatus, ServiceRecord, ServiceStatus};
use crate::clock::Sleeper;
use crate::service::traits::{ServiceClient, Table};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key of the singleton service record.
const SERVICE_KEY: u64 = 0;

#[derive(Deserialize)]
struct NodeEntry {
    status: NodeStatus,
}

pub struct NodeLifecycleVerifier<C: ?Sized, S: ?Sized> {
    client: Arc<C>,
    sleeper: Arc<S>,
    config: NodeStatusConfig,
}

impl<C, S> NodeLifecycleVerifier<C, S>
where
    C: ServiceClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(client: Arc<C>, sleeper: Arc<S>, config: NodeStatusConfig) -> Self {
        Self {
            client,
            sleeper,
            config,
        }
    }

    pub fn config(&self) -> &NodeStatusConfig {
        &self.config
    }

    /// Read a node record. `Ok(None)` if the node is not in the store.
    pub async fn node_record(&self, node_id: NodeId) -> GovernanceResult<Option<NodeRecord>> {
        let Some(value) = self.client.query(Table::Nodes, node_id.0).await? else {
            return Ok(None);
        };
        let entry: NodeEntry =
            serde_json::from_value(value).map_err(|e| GovernanceError::UnrecognizedValue {
                table: Table::Nodes,
                key: node_id.0,
                reason: e.to_string(),
            })?;
        Ok(Some(NodeRecord {
            node_id,
            status: entry.status,
        }))
    }

    /// Single-shot check. False if the node is absent or, when `expected`
    /// is given, in a different status.
    pub async fn check_node_status(
        &self,
        node_id: NodeId,
        expected: Option<NodeStatus>,
    ) -> GovernanceResult<bool> {
        let found = match (self.node_record(node_id).await?, expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(record), Some(status)) => record.status == status,
        };
        Ok(found)
    }

    /// Fail with the actual status unless the node is in `expected` now.
    pub async fn require_node_status(
        &self,
        node_id: NodeId,
        expected: NodeStatus,
    ) -> GovernanceResult<()> {
        let actual = self.node_record(node_id).await?.map(|r| r.status);
        if actual == Some(expected) {
            return Ok(());
        }
        warn!(node_id = %node_id, %expected, actual = ?actual, "unexpected node status");
        Err(GovernanceError::UnexpectedNodeStatus {
            node_id,
            expected,
            actual,
        })
    }

    /// Poll `check_node_status` up to `attempts` times, sleeping one poll
    /// interval between attempts. The node is always checked at least once.
    pub async fn wait_for_node_status(
        &self,
        node_id: NodeId,
        expected: Option<NodeStatus>,
        attempts: u32,
    ) -> GovernanceResult<()> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if self.check_node_status(node_id, expected).await? {
                debug!(node_id = %node_id, attempt, "node status confirmed");
                return Ok(());
            }
            if attempt < attempts {
                self.sleeper.sleep(self.config.poll_interval()).await;
            }
        }

        warn!(node_id = %node_id, expected = ?expected, attempts, "timed out waiting for node");
        Err(GovernanceError::NodeStatusTimeout {
            node_id,
            expected,
            attempts,
        })
    }

    /// Wait for `expected` within the configured attempt budget.
    ///
    /// On timeout the error names the status the node actually has.
    pub async fn confirm_node_status(
        &self,
        node_id: NodeId,
        expected: NodeStatus,
    ) -> GovernanceResult<()> {
        match self
            .wait_for_node_status(node_id, Some(expected), self.config.attempts)
            .await
        {
            Err(GovernanceError::NodeStatusTimeout { .. }) => {
                let actual = self.node_record(node_id).await?.map(|r| r.status);
                Err(GovernanceError::UnexpectedNodeStatus {
                    node_id,
                    expected,
                    actual,
                })
            }
            other => other,
        }
    }

    /// Read the service record.
    pub async fn service_record(&self) -> GovernanceResult<ServiceRecord> {
        let value = self
            .client
            .query(Table::Service, SERVICE_KEY)
            .await?
            .ok_or(GovernanceError::MissingServiceRecord)?;
        serde_json::from_value(value).map_err(|e| GovernanceError::UnrecognizedValue {
            table: Table::Service,
            key: SERVICE_KEY,
            reason: e.to_string(),
        })
    }

    /// Verify the service certificate and status.
    ///
    /// The certificate is compared byte for byte with `expected_cert`.
    pub async fn check_for_service(
        &self,
        status: ServiceStatus,
        expected_cert: &[u8],
    ) -> GovernanceResult<()> {
        let record = self.service_record().await?;

        if record.cert != expected_cert {
            warn!("service certificate mismatch");
            return Err(GovernanceError::CertificateMismatch);
        }
        if record.status != status {
            warn!(expected = %status, actual = %record.status, "unexpected service status");
            return Err(GovernanceError::UnexpectedServiceStatus {
                expected: status,
                actual: record.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingSleeper;
    use crate::governance::types::MemberId;
    use crate::service::mock::MockService;
    use crate::service::traits::ServiceError;
    use std::time::Duration;

    fn verifier(
        service: &MockService,
        sleeper: &RecordingSleeper,
    ) -> NodeLifecycleVerifier<MockService, RecordingSleeper> {
        NodeLifecycleVerifier::new(
            Arc::new(service.clone()),
            Arc::new(sleeper.clone()),
            NodeStatusConfig::default(),
        )
    }

    fn service() -> MockService {
        MockService::new(&[MemberId(1)], b"network-cert")
    }

    #[tokio::test]
    async fn test_check_node_status() {
        let service = service();
        let v = verifier(&service, &RecordingSleeper::new());
        service.add_node(NodeId(1), NodeStatus::Pending);

        assert!(v.check_node_status(NodeId(1), None).await.unwrap());
        assert!(v
            .check_node_status(NodeId(1), Some(NodeStatus::Pending))
            .await
            .unwrap());
        assert!(!v
            .check_node_status(NodeId(1), Some(NodeStatus::Trusted))
            .await
            .unwrap());
        assert!(!v.check_node_status(NodeId(2), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_an_error() {
        let service = service();
        let v = verifier(&service, &RecordingSleeper::new());
        service.set_node_status_raw(NodeId(1), "SUSPENDED");

        let err = v.check_node_status(NodeId(1), None).await.unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::UnrecognizedValue { table: Table::Nodes, key: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let service = service();
        let v = verifier(&service, &RecordingSleeper::new());
        service.fail_next(ServiceError::Transport("timeout".to_string()));

        let err = v.check_node_status(NodeId(1), None).await.unwrap_err();
        assert!(matches!(err, GovernanceError::Service(ServiceError::Transport(_))));
    }

    #[tokio::test]
    async fn test_wait_times_out_after_exact_attempts() {
        let service = service();
        let sleeper = RecordingSleeper::new();
        let v = verifier(&service, &sleeper);
        service.add_node(NodeId(5), NodeStatus::Pending);

        let err = v
            .wait_for_node_status(NodeId(5), Some(NodeStatus::Trusted), 3)
            .await
            .unwrap_err();

        match &err {
            GovernanceError::NodeStatusTimeout {
                node_id,
                expected,
                attempts,
            } => {
                assert_eq!(*node_id, NodeId(5));
                assert_eq!(*expected, Some(NodeStatus::Trusted));
                assert_eq!(*attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("TRUSTED"));
        assert_eq!(service.query_calls(Table::Nodes), 3);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn test_wait_returns_when_node_appears() {
        let service = service();
        let sleeper = RecordingSleeper::new();
        let v = verifier(&service, &sleeper);
        service.add_node(NodeId(5), NodeStatus::Trusted);

        v.wait_for_node_status(NodeId(5), Some(NodeStatus::Trusted), 3)
            .await
            .unwrap();
        assert_eq!(service.query_calls(Table::Nodes), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_checks_once() {
        let service = service();
        let sleeper = RecordingSleeper::new();
        let v = verifier(&service, &sleeper);
        service.add_node(NodeId(5), NodeStatus::Trusted);

        v.wait_for_node_status(NodeId(5), Some(NodeStatus::Trusted), 0)
            .await
            .unwrap();
        assert_eq!(service.query_calls(Table::Nodes), 1);

        let err = v
            .wait_for_node_status(NodeId(6), None, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::NodeStatusTimeout { attempts: 1, .. }
        ));
        assert_eq!(service.query_calls(Table::Nodes), 2);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_uses_configured_attempts() {
        let service = service();
        let sleeper = RecordingSleeper::new();
        let v = NodeLifecycleVerifier::new(
            Arc::new(service.clone()),
            Arc::new(sleeper.clone()),
            NodeStatusConfig {
                poll_interval_ms: 50,
                attempts: 4,
            },
        );
        assert_eq!(v.config().attempts, 4);
        service.add_node(NodeId(2), NodeStatus::Pending);

        let err = v
            .confirm_node_status(NodeId(2), NodeStatus::Trusted)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GovernanceError::UnexpectedNodeStatus {
                expected: NodeStatus::Trusted,
                actual: Some(NodeStatus::Pending),
                ..
            }
        ));
        // Four polls, then one read for the error.
        assert_eq!(service.query_calls(Table::Nodes), 5);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(50); 3]);
    }

    #[tokio::test]
    async fn test_require_node_status_reports_actual() {
        let service = service();
        let v = verifier(&service, &RecordingSleeper::new());
        service.add_node(NodeId(3), NodeStatus::Retired);

        let err = v
            .require_node_status(NodeId(3), NodeStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::UnexpectedNodeStatus {
                actual: Some(NodeStatus::Retired),
                expected: NodeStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_check_for_service() {
        let service = service();
        let v = verifier(&service, &RecordingSleeper::new());

        v.check_for_service(ServiceStatus::Opening, b"network-cert")
            .await
            .unwrap();

        let err = v
            .check_for_service(ServiceStatus::Open, b"network-cert")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::UnexpectedServiceStatus {
                expected: ServiceStatus::Open,
                actual: ServiceStatus::Opening
            }
        ));

        let err = v
            .check_for_service(ServiceStatus::Opening, b"other-cert")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::CertificateMismatch));
    }

    #[tokio::test]
    async fn test_unrecognized_service_status() {
        let service = service();
        let v = verifier(&service, &RecordingSleeper::new());
        service.set_service_status_raw("PAUSED");

        let err = v.service_record().await.unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::UnrecognizedValue { table: Table::Service, .. }
        ));
    }
}
