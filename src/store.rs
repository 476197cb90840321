use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use sqlx::MySqlPool;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::game_match::{MatchId, MatchMeta, MatchOutcome, PlayerIdentity};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for match metadata and finished-match outcomes.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Inserts the metadata row, or moves the host address of an existing one.
    async fn record_match(&self, meta: &MatchMeta) -> Result<(), StoreError>;

    /// Address of the instance that holds the live match, if it is still known.
    async fn host_of(&self, match_id: MatchId) -> Result<Option<String>, StoreError>;

    /// Writes a win row and a loss row and drops the match metadata, atomically.
    async fn record_outcome(&self, outcome: &MatchOutcome) -> Result<(), StoreError>;

    /// Drops the match metadata without recording a result.
    async fn discard_match(&self, match_id: MatchId) -> Result<(), StoreError>;
}

pub struct MySqlMatchStore {
    pool: MySqlPool,
}

impl MySqlMatchStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for MySqlMatchStore {
    async fn record_match(&self, meta: &MatchMeta) -> Result<(), StoreError> {
        // a hydrated match moves its host address to the new instance
        let sql = "INSERT INTO match_meta (match_id, participant_one, participant_two, host_address) VALUES (?, ?, ?, ?) \
                   ON DUPLICATE KEY UPDATE host_address = VALUES(host_address)";
        sqlx::query(sql)
            .bind(meta.match_id.to_string())
            .bind(&meta.participant_one)
            .bind(&meta.participant_two)
            .bind(&meta.host_address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn host_of(&self, match_id: MatchId) -> Result<Option<String>, StoreError> {
        let sql = "SELECT host_address FROM match_meta WHERE match_id = ?";
        let host: Option<(String,)> = sqlx::query_as(sql)
            .bind(match_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(host.map(|(address,)| address))
    }

    async fn record_outcome(&self, outcome: &MatchOutcome) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = "INSERT INTO match_outcome (user_name, match_id, won) VALUES (?, ?, ?)";
        for (user_name, won) in [(&outcome.winner, true), (&outcome.loser, false)] {
            sqlx::query(sql)
                .bind(user_name)
                .bind(outcome.match_id.to_string())
                .bind(won)
                .execute(&mut tx)
                .await?;
        }

        sqlx::query("DELETE FROM match_meta WHERE match_id = ?")
            .bind(outcome.match_id.to_string())
            .execute(&mut tx)
            .await?;

        // dropping tx without commit rolls back
        tx.commit().await?;
        debug!("Outcome for match {} committed", outcome.match_id);
        Ok(())
    }

    async fn discard_match(&self, match_id: MatchId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM match_meta WHERE match_id = ?")
            .bind(match_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemoryMatchStore {
    meta: DashMap<MatchId, MatchMeta>,
    outcomes: DashMap<(PlayerIdentity, MatchId), bool>,
    unavailable: AtomicBool,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail until switched back.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn outcome(&self, user_name: &str, match_id: MatchId) -> Option<bool> {
        self.outcomes.get(&(user_name.to_string(), match_id)).map(|won| *won)
    }

    #[cfg(test)]
    pub fn has_meta(&self, match_id: MatchId) -> bool {
        self.meta.contains_key(&match_id)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn record_match(&self, meta: &MatchMeta) -> Result<(), StoreError> {
        self.check()?;
        self.meta.insert(meta.match_id, meta.clone());
        Ok(())
    }

    async fn host_of(&self, match_id: MatchId) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.meta.get(&match_id).map(|meta| meta.host_address.clone()))
    }

    async fn record_outcome(&self, outcome: &MatchOutcome) -> Result<(), StoreError> {
        self.check()?;
        self.outcomes.insert((outcome.winner.clone(), outcome.match_id), true);
        self.outcomes.insert((outcome.loser.clone(), outcome.match_id), false);
        self.meta.remove(&outcome.match_id);
        Ok(())
    }

    async fn discard_match(&self, match_id: MatchId) -> Result<(), StoreError> {
        self.check()?;
        self.meta.remove(&match_id);
        Ok(())
    }
}
