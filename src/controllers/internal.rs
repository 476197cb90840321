use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use log::{error, info, warn};
use serde_json::json;

use crate::controllers::game::parse_match_id;
use crate::errors::CustomError;
use crate::models::game::TurnState;
use crate::models::game_match::{Match, MatchSnapshot};
use crate::AppState;

pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

// Peers prove themselves with the shared secret
fn check_internal(state: &AppState, headers: &HeaderMap) -> Result<(), CustomError> {
    match headers.get(INTERNAL_SECRET_HEADER).and_then(|value| value.to_str().ok()) {
        Some(secret) if secret == state.config.internal_secret => Ok(()),
        _ => {
            warn!("Internal request without a valid secret");
            Err(CustomError::Forbidden)
        }
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for loading a full match snapshot into this instance. The match becomes live here
// and the stored host address is pointed at this instance.
/////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn hydrate_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    snapshot: Result<Json<MatchSnapshot>, JsonRejection>,
) -> Result<impl IntoResponse, CustomError> {
    info!("hydrate match request");

    check_internal(&state, &headers)?;
    let Json(snapshot) = snapshot?;

    let match_id = snapshot.match_id;
    let game_match = Match::from_snapshot(snapshot).map_err(|err| {
        error!("Rejected snapshot for match {}: {}", match_id, err);
        CustomError::BadRequest
    })?;
    let meta = game_match.meta(&state.config.public_address);
    let concluded = game_match.turn_state() == TurnState::Concluded;
    state.registry.create(game_match)?;

    if let Err(err) = state.store.record_match(&meta).await {
        if let Err(rollback) = state.registry.discard(match_id).await {
            error!("Rolling back match {} failed: {}", match_id, rollback);
        }
        return Err(err.into());
    }

    if concluded {
        // the snapshot was taken after the winning hit
        state.cleanup.schedule(match_id);
    }

    Ok((StatusCode::CREATED, Json(json!({"matchID": match_id}))))
}

// Handler answering which instance holds a match
pub async fn match_host(
    Path(match_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, CustomError> {
    info!("match host request");

    check_internal(&state, &headers)?;
    let match_id = parse_match_id(&match_id)?;

    let host = if state.registry.contains(match_id) {
        state.config.public_address.clone()
    } else {
        state.store.host_of(match_id).await?.ok_or(CustomError::MatchNotFound)?
    };

    Ok((StatusCode::OK, Json(json!({"host": host, "matchID": match_id}))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::{GameError, PlayerRole};
    use crate::models::game_match::tests::one_ship_match;
    use crate::test_support::{test_state, INTERNAL_SECRET, PUBLIC_ADDRESS};
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn send(state: &AppState, method: Method, uri: &str, secret: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            request = request.header(INTERNAL_SECRET_HEADER, secret);
        }
        let body = body.map(|json| Body::from(json.to_string())).unwrap_or_else(Body::empty);

        let response = crate::app(state.clone()).oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn snapshot_json() -> (Uuid, Value) {
        let game_state = one_ship_match().game().clone();
        let match_id = Uuid::new_v4();
        let json = json!({
            "matchID": match_id,
            "host": "alice",
            "guest": "bob",
            "gameState": game_state,
        });
        (match_id, json)
    }

    #[tokio::test]
    async fn hydrate_makes_match_live_here() {
        let (state, _) = test_state();
        let (match_id, snapshot) = snapshot_json();

        let (status, _) = send(&state, Method::POST, "/internal/match", Some(INTERNAL_SECRET), Some(snapshot.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let game_match = state.registry.read(match_id).await.unwrap();
        assert_eq!(game_match.identity(PlayerRole::Guest), "bob");
        drop(game_match);

        let (status, _) = send(&state, Method::POST, "/internal/match", Some(INTERNAL_SECRET), Some(snapshot)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/internal/match/{}/host", match_id);
        let (status, json) = send(&state, Method::GET, &uri, Some(INTERNAL_SECRET), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["host"], PUBLIC_ADDRESS);
    }

    #[tokio::test]
    async fn internal_routes_need_the_secret() {
        let (state, _) = test_state();
        let (match_id, snapshot) = snapshot_json();

        let (status, _) = send(&state, Method::POST, "/internal/match", None, Some(snapshot.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&state, Method::POST, "/internal/match", Some("guess"), Some(snapshot)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!state.registry.contains(match_id));
    }

    #[tokio::test]
    async fn malformed_snapshot_is_rejected() {
        let (state, _) = test_state();
        let (match_id, mut snapshot) = snapshot_json();
        snapshot["gameState"]["boardGuest"]["width"] = json!(10);

        let (status, _) = send(&state, Method::POST, "/internal/match", Some(INTERNAL_SECRET), Some(snapshot)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.registry.contains(match_id));

        let (status, json) = send(&state, Method::POST, "/internal/match", Some(INTERNAL_SECRET), Some(json!({"matchID": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Bad Request");
    }

    #[tokio::test]
    async fn won_snapshot_is_scheduled_for_cleanup() {
        let (state, _) = test_state();
        let mut won = one_ship_match();
        won.attack("alice", 3, 2).unwrap();
        let match_id = Uuid::new_v4();
        let snapshot = json!({"matchID": match_id, "host": "alice", "guest": "bob", "gameState": won.game()});

        let (status, _) = send(&state, Method::POST, "/internal/match", Some(INTERNAL_SECRET), Some(snapshot)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(state.cleanup.is_pending(match_id));

        let mut game_match = state.registry.write(match_id).await.unwrap();
        assert_eq!(game_match.turn_state(), TurnState::Concluded);
        assert_eq!(game_match.attack("bob", 0, 0), Err(GameError::MatchConcluded));
        drop(game_match);
        state.cleanup.cancel(match_id);
    }

    #[tokio::test]
    async fn failed_store_write_rolls_back_hydration() {
        let (state, store) = test_state();
        let (match_id, snapshot) = snapshot_json();
        store.set_unavailable(true);

        let (status, _) = send(&state, Method::POST, "/internal/match", Some(INTERNAL_SECRET), Some(snapshot)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!state.registry.contains(match_id));
    }

    #[tokio::test]
    async fn unknown_host_is_not_found() {
        let (state, _) = test_state();
        let uri = format!("/internal/match/{}/host", Uuid::new_v4());
        let (status, _) = send(&state, Method::GET, &uri, Some(INTERNAL_SECRET), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
