//! Post-deployment readiness checks against the marketplace index.

use std::time::Duration;

use alloy_core::primitives::Address;

use crate::MarketplaceApi;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: usize = 30;

/// Polls the marketplace until a deployed collection is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPoller {
    pub interval: Duration,
    pub max_attempts: usize,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReadinessPoller {
    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Overall deadline of one polling run, `interval * max_attempts`.
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(u32::try_from(self.max_attempts).unwrap_or(u32::MAX))
    }

    /// `true` once the collection reports ready, `false` after `max_attempts`
    /// or when [`Self::budget`] elapses, whichever comes first.
    ///
    /// A failed poll counts as not ready. Slow or hung requests are cut off by
    /// the budget.
    pub async fn poll_until_ready<M: MarketplaceApi>(
        &self,
        api: &M,
        contract: Address,
        chain_id: u64,
    ) -> bool {
        let budget = self.budget();
        match tokio::time::timeout(budget, self.poll(api, contract, chain_id)).await {
            Ok(ready) => ready,
            Err(_) => {
                tracing::warn!(
                    %contract,
                    budget_secs = budget.as_secs(),
                    "Readiness polling timed out"
                );
                false
            }
        }
    }

    async fn poll<M: MarketplaceApi>(&self, api: &M, contract: Address, chain_id: u64) -> bool {
        for attempt in 1..=self.max_attempts {
            match api.collection_ready(contract, chain_id).await {
                Ok(true) => {
                    tracing::info!(%contract, attempt, "Collection is ready");
                    return true;
                }
                Ok(false) => {
                    tracing::debug!(%contract, attempt, max = self.max_attempts, "Collection not ready yet");
                }
                Err(e) => {
                    tracing::debug!(%contract, attempt, error = %e, "Readiness check failed");
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        tracing::warn!(
            %contract,
            attempts = self.max_attempts,
            "Collection not ready after maximum attempts"
        );
        false
    }
}
