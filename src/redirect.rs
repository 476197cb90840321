use log::{info, warn};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::errors::CustomError;
use crate::models::game_match::MatchId;
use crate::store::MatchStore;

/// Whether something accepts TCP connections at `host` within `timeout`.
pub async fn probe(host: &str, timeout: Duration) -> bool {
    matches!(tokio::time::timeout(timeout, TcpStream::connect(host)).await, Ok(Ok(_)))
}

/// Explains a match id that is not live in the local registry.
///
/// Gives a redirect when the match is recorded on another reachable instance,
/// otherwise the match is reported as missing or its host as unreachable.
pub async fn not_local(
    store: &dyn MatchStore,
    public_address: &str,
    match_id: MatchId,
    probe_timeout: Duration,
) -> CustomError {
    let host = match store.host_of(match_id).await {
        Ok(Some(host)) => host,
        Ok(None) => return CustomError::MatchNotFound,
        Err(err) => return err.into(),
    };

    // recorded here but gone from memory: already finished or evicted
    if host == public_address {
        return CustomError::MatchNotFound;
    }

    if !probe(&host, probe_timeout).await {
        warn!("Match {} lives on {} which does not answer", match_id, host);
        return CustomError::HostUnreachable;
    }

    info!("Redirecting match {} to {}", match_id, host);
    CustomError::Redirect { host, match_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_match::MatchMeta;
    use crate::store::MemoryMatchStore;
    use tokio::net::TcpListener;
    use uuid::Uuid;

    const TIMEOUT: Duration = Duration::from_millis(200);

    async fn store_with(match_id: MatchId, host: &str) -> MemoryMatchStore {
        let store = MemoryMatchStore::new();
        let meta = MatchMeta {
            match_id,
            participant_one: "alice".to_string(),
            participant_two: "bob".to_string(),
            host_address: host.to_string(),
        };
        store.record_match(&meta).await.unwrap();
        store
    }

    #[tokio::test]
    async fn live_remote_host_gets_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap().to_string();
        let match_id = Uuid::new_v4();
        let store = store_with(match_id, &remote).await;

        match not_local(&store, "127.0.0.1:1", match_id, TIMEOUT).await {
            CustomError::Redirect { host, match_id: id } => {
                assert_eq!(host, remote);
                assert_eq!(id, match_id);
            }
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dead_remote_host_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap().to_string();
        drop(listener);
        let match_id = Uuid::new_v4();
        let store = store_with(match_id, &remote).await;

        assert!(matches!(
            not_local(&store, "127.0.0.1:1", match_id, TIMEOUT).await,
            CustomError::HostUnreachable
        ));
    }

    #[tokio::test]
    async fn unknown_or_local_match_is_not_found() {
        let match_id = Uuid::new_v4();
        let store = store_with(match_id, "10.1.1.1:3000").await;

        assert!(matches!(
            not_local(&store, "10.1.1.1:3000", match_id, TIMEOUT).await,
            CustomError::MatchNotFound
        ));
        assert!(matches!(
            not_local(&store, "10.1.1.1:3000", Uuid::new_v4(), TIMEOUT).await,
            CustomError::MatchNotFound
        ));
    }
}
