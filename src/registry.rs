use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::models::game_match::{Match, MatchId};

pub type SharedMatch = Arc<RwLock<Match>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("match {0} already exists")]
    DuplicateMatch(MatchId),
    #[error("match {0} not found")]
    NotFound(MatchId),
}

/// Concurrent store of the live matches hosted by this instance.
///
/// Each entry carries its own lock, so mutations of one match never wait on
/// another. Callers hold a match's write lock for every state change,
/// including the final removal.
#[derive(Default)]
pub struct MatchRegistry {
    matches: DashMap<MatchId, SharedMatch>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, game_match: Match) -> Result<SharedMatch, RegistryError> {
        let match_id = game_match.id();
        match self.matches.entry(match_id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateMatch(match_id)),
            Entry::Vacant(vacant) => {
                let shared = Arc::new(RwLock::new(game_match));
                vacant.insert(Arc::clone(&shared));
                Ok(shared)
            }
        }
    }

    pub fn get(&self, match_id: MatchId) -> Result<SharedMatch, RegistryError> {
        self.matches
            .get(&match_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::NotFound(match_id))
    }

    /// Removes the entry; a second call for the same id observes `NotFound`.
    pub fn remove_and_return(&self, match_id: MatchId) -> Result<SharedMatch, RegistryError> {
        self.matches
            .remove(&match_id)
            .map(|(_, shared)| shared)
            .ok_or(RegistryError::NotFound(match_id))
    }

    /// Takes the match out of service: any task still holding its handle
    /// observes `NotFound` once it gets the lock.
    pub async fn discard(&self, match_id: MatchId) -> Result<(), RegistryError> {
        let mut guard = self.write(match_id).await?;
        guard.mark_evicted();
        self.remove_and_return(match_id)?;
        Ok(())
    }

    /// Exclusive access to a match that is still live.
    pub async fn write(&self, match_id: MatchId) -> Result<OwnedRwLockWriteGuard<Match>, RegistryError> {
        let guard = self.get(match_id)?.write_owned().await;
        // the entry may have been evicted while we waited for the lock
        if guard.is_evicted() {
            return Err(RegistryError::NotFound(match_id));
        }
        Ok(guard)
    }

    pub async fn read(&self, match_id: MatchId) -> Result<OwnedRwLockReadGuard<Match>, RegistryError> {
        let guard = self.get(match_id)?.read_owned().await;
        if guard.is_evicted() {
            return Err(RegistryError::NotFound(match_id));
        }
        Ok(guard)
    }

    pub fn contains(&self, match_id: MatchId) -> bool {
        self.matches.contains_key(&match_id)
    }
}
