//! Commit Waiter.
//!
//! Blocks until a transaction is globally committed so that state changes
//! look linearizable to the caller. Bounded by `CommitWaitConfig`.

use super::config::CommitWaitConfig;
use super::error::{GovernanceError, GovernanceResult};
use super::types::TxId;
use crate::clock::Sleeper;
use crate::service::traits::ServiceClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CommitWaiter<C: ?Sized, S: ?Sized> {
    client: Arc<C>,
    sleeper: Arc<S>,
    config: CommitWaitConfig,
}

impl<C, S> CommitWaiter<C, S>
where
    C: ServiceClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(client: Arc<C>, sleeper: Arc<S>, config: CommitWaitConfig) -> Self {
        Self {
            client,
            sleeper,
            config,
        }
    }

    /// Wait until the global commit watermark covers `target`.
    ///
    /// With `strict`, the term recorded at `target.index` must equal
    /// `target.term`. A different term means the transaction was replaced
    /// and will never commit, so that fails at once.
    pub async fn wait_for_global_commit(&self, target: TxId, strict: bool) -> GovernanceResult<()> {
        if self.config.request_signature {
            self.client.request_signature().await?;
        }

        let attempts = self.config.max_attempts();
        let mut last_seen = TxId::default();

        for attempt in 1..=attempts {
            let status = self.client.get_commit(target.index).await?;
            last_seen = status.global;

            if status.global.index >= target.index {
                match status.term_at_index {
                    Some(term) if strict && term != target.term => {
                        warn!(%target, actual_term = term, "transaction superseded");
                        return Err(GovernanceError::CommitTermMismatch {
                            target,
                            actual_term: term,
                        });
                    }
                    _ if status.global.covers(&target) => {
                        info!(%target, attempt, "globally committed");
                        return Ok(());
                    }
                    _ => {}
                }
            }

            debug!(%target, global = %status.global, attempt, "waiting for global commit");
            if attempt < attempts {
                self.sleeper.sleep(self.config.poll_interval()).await;
            }
        }

        warn!(%target, %last_seen, attempts, "timed out waiting for global commit");
        Err(GovernanceError::CommitTimeout {
            target,
            last_seen,
            attempts,
        })
    }
}
