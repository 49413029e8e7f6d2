//! Applies reward deltas to a learner's cumulative ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::config::LedgerRetryConfig;
use crate::error::{EngineError, Result};
use crate::records::{LearnerRewardLedger, LedgerDelta, RewardBreakdown};
use crate::storage::LedgerStore;
use crate::types::LearnerId;

/// Applies reward deltas through a [`LedgerStore`].
///
/// The store applies each delta as one atomic additive write. A failed
/// write is retried as a whole; it is never split or re-read and
/// overwritten. Deduplication of submissions is the caller's job.
#[derive(Clone)]
pub struct RewardLedgerUpdater {
    store: Arc<dyn LedgerStore>,
    retry: LedgerRetryConfig,
}

impl RewardLedgerUpdater {
    pub fn new(store: Arc<dyn LedgerStore>, retry: LedgerRetryConfig) -> Self {
        Self { store, retry }
    }

    /// Credit one completed test to the learner.
    #[instrument(skip(self, reward), fields(xp = reward.xp_earned, currency = reward.currency_earned))]
    pub async fn apply(
        &self,
        learner_id: &LearnerId,
        reward: &RewardBreakdown,
        recorded_at: DateTime<Utc>,
    ) -> Result<LearnerRewardLedger> {
        let delta = LedgerDelta::for_reward(reward, recorded_at);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.store.upsert_ledger(learner_id, &delta).await {
                Ok(ledger) => {
                    info!(
                        %learner_id,
                        total_xp = ledger.total_xp,
                        currency_balance = ledger.currency_balance,
                        tests_completed = ledger.tests_completed,
                        "ledger updated"
                    );
                    return Ok(ledger);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(%learner_id, attempt, error = %err, "ledger update failed, retrying");
                    let backoff = self.retry.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    if backoff > 0 {
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    attempt += 1;
                }
                Err(source) => {
                    return Err(EngineError::PartialLedgerUpdate {
                        learner_id: learner_id.clone(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    /// Current ledger state, if the learner has one.
    pub async fn fetch(&self, learner_id: &LearnerId) -> Result<Option<LearnerRewardLedger>> {
        self.store
            .fetch_ledger(learner_id)
            .await
            .map_err(EngineError::dependency("fetch_ledger"))
    }
}
