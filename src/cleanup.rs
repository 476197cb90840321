use dashmap::DashMap;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::game_match::{MatchId, MatchOutcome};
use crate::registry::{MatchRegistry, RegistryError};
use crate::store::{MatchStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("match {0} has no winner yet")]
    NotConcluded(MatchId),
}

/// Tears down finished matches.
///
/// A concluded match stays readable for `delay` so clients can poll the final
/// state, then its outcome is persisted and it leaves the registry. Pending
/// timers are cancellable for matches torn down some other way.
pub struct CleanupScheduler {
    delay: Duration,
    registry: Arc<MatchRegistry>,
    store: Arc<dyn MatchStore>,
    pending: DashMap<MatchId, CancellationToken>,
}

impl CleanupScheduler {
    pub fn new(delay: Duration, registry: Arc<MatchRegistry>, store: Arc<dyn MatchStore>) -> Self {
        Self { delay, registry, store, pending: DashMap::new() }
    }

    pub fn schedule(self: &Arc<Self>, match_id: MatchId) {
        let token = CancellationToken::new();
        if let Some(previous) = self.pending.insert(match_id, token.clone()) {
            previous.cancel();
        }

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Cleanup of match {} cancelled", match_id);
                }
                _ = tokio::time::sleep(scheduler.delay) => {
                    // a replacement timer cancels this token before taking the slot
                    scheduler.pending.remove_if(&match_id, |_, current| !current.is_cancelled());
                    if let Err(err) = scheduler.finalize(match_id).await {
                        error!("Deferred cleanup of match {} failed: {}", match_id, err);
                    }
                }
            }
        });
        debug!("Cleanup of match {} scheduled in {:?}", match_id, self.delay);
    }

    /// Returns true if a pending timer was stopped.
    pub fn cancel(&self, match_id: MatchId) -> bool {
        match self.pending.remove(&match_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, match_id: MatchId) -> bool {
        self.pending.contains_key(&match_id)
    }

    /// Persists the outcome and evicts the match, both or neither.
    ///
    /// Runs under the match's write lock so an in-flight move finishes first.
    /// If persistence fails the match stays in the registry.
    pub async fn finalize(&self, match_id: MatchId) -> Result<MatchOutcome, CleanupError> {
        let mut game_match = self.registry.write(match_id).await?;
        let outcome = game_match.outcome().ok_or(CleanupError::NotConcluded(match_id))?;

        self.store.record_outcome(&outcome).await?;

        game_match.mark_evicted();
        self.registry.remove_and_return(match_id)?;
        info!("Match {} finished, {} beat {}", match_id, outcome.winner, outcome.loser);
        Ok(outcome)
    }

    /// Administrative teardown: no outcome is recorded.
    pub async fn terminate(&self, match_id: MatchId) -> Result<(), CleanupError> {
        self.cancel(match_id);
        let mut game_match = self.registry.write(match_id).await?;

        self.store.discard_match(match_id).await?;

        game_match.mark_evicted();
        self.registry.remove_and_return(match_id)?;
        info!("Match {} terminated", match_id);
        Ok(())
    }
}
