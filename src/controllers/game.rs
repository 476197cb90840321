use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    headers::{authorization::Bearer, Authorization},
    http::StatusCode,
    response::IntoResponse,
    Json, TypedHeader,
};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use uuid::Uuid;

use crate::check_access;
use crate::cleanup::CleanupError;
use crate::errors::CustomError;
use crate::models::game::GameState;
use crate::models::game_match::{Match, MatchId, MoveOutcome};
use crate::redirect;
use crate::registry::RegistryError;
use crate::AppState;

// The struct used for addressing an existing match
#[derive(Deserialize, Serialize, Debug)]
pub struct MatchToken {
    #[serde(rename = "matchToken")]
    pub match_token: String,
}

// The struct used for receiving an attack
#[derive(Deserialize, Serialize, Debug)]
pub struct PostMove {
    #[serde(rename = "matchToken")]
    pub match_token: String,
    pub x: i32,
    pub y: i32,
}

type MaybeBearer = Option<TypedHeader<Authorization<Bearer>>>;

pub(crate) fn parse_match_id(token: &str) -> Result<MatchId, CustomError> {
    Uuid::parse_str(token).map_err(|_| {
        info!("Malformed match token: {:?}", token);
        CustomError::InvalidMatchToken
    })
}

// Lock a match held here, or explain where it went
async fn write_match(state: &AppState, match_id: MatchId) -> Result<OwnedRwLockWriteGuard<Match>, CustomError> {
    match state.registry.write(match_id).await {
        Ok(guard) => Ok(guard),
        Err(RegistryError::NotFound(_)) => Err(not_local(state, match_id).await),
        Err(err) => Err(err.into()),
    }
}

async fn read_match(state: &AppState, match_id: MatchId) -> Result<OwnedRwLockReadGuard<Match>, CustomError> {
    match state.registry.read(match_id).await {
        Ok(guard) => Ok(guard),
        Err(RegistryError::NotFound(_)) => Err(not_local(state, match_id).await),
        Err(err) => Err(err.into()),
    }
}

async fn not_local(state: &AppState, match_id: MatchId) -> CustomError {
    redirect::not_local(state.store.as_ref(), &state.config.public_address, match_id, state.config.probe_timeout).await
}

//handler for offering to host a match
pub async fn host_match(State(state): State<AppState>, bearer: MaybeBearer) -> Result<impl IntoResponse, CustomError> {
    info!("host match request");

    let session = check_access(&state, &bearer, false).await?;

    if !state.lobby.host(&session.identity) {
        return Err(CustomError::AlreadyHosting);
    }
    Ok((StatusCode::OK, Json(json!({"message": "user now looking for other players"}))))
}

pub async fn unhost_match(State(state): State<AppState>, bearer: MaybeBearer) -> Result<impl IntoResponse, CustomError> {
    info!("unhost match request");

    let session = check_access(&state, &bearer, false).await?;

    if !state.lobby.unhost(&session.identity) {
        return Err(CustomError::NotHosting);
    }
    Ok((StatusCode::OK, Json(json!({"message": "user no longer hosting"}))))
}

/////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for joining a match. The caller is paired with a random host from the lobby,
// both get a freshly generated board and the match goes live on this instance.
/////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn join_match(State(state): State<AppState>, bearer: MaybeBearer) -> Result<impl IntoResponse, CustomError> {
    info!("join match request");

    let session = check_access(&state, &bearer, false).await?;

    let host = state.lobby.take_random_host(&session.identity).ok_or(CustomError::NoHostsAvailable)?;

    let generated = GameState::new_random(&mut rand::thread_rng());
    let game_state = match generated {
        Ok(game_state) => game_state,
        Err(err) => {
            // give the host its place back
            state.lobby.host(&host);
            return Err(err.into());
        }
    };

    let match_id = Uuid::new_v4();
    let game_match = Match::new(match_id, host, session.identity, game_state);
    let meta = game_match.meta(&state.config.public_address);
    state.registry.create(game_match)?;

    if let Err(err) = state.store.record_match(&meta).await {
        error!("Error recording match {}: {}", match_id, err);
        if let Err(rollback) = state.registry.discard(match_id).await {
            error!("Rolling back match {} failed: {}", match_id, rollback);
        }
        state.lobby.host(&meta.participant_one);
        return Err(CustomError::InternalServerError);
    }

    info!("Match {} started: {} hosts {}", match_id, meta.participant_one, meta.participant_two);
    Ok((StatusCode::CREATED, Json(json!({"matchID": match_id}))))
}

/////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for an attack. Runs under the match's write lock; a winning hit schedules the
// deferred cleanup of the match.
/////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn post_move(
    State(state): State<AppState>,
    bearer: MaybeBearer,
    body: Result<Json<PostMove>, JsonRejection>,
) -> Result<impl IntoResponse, CustomError> {
    info!("post move request");

    //check if user is logged in, bail out if not
    let session = check_access(&state, &bearer, false).await?;
    let Json(body) = body?;
    let match_id = parse_match_id(&body.match_token)?;

    let mut game_match = write_match(&state, match_id).await?;
    let outcome: MoveOutcome = game_match.attack(&session.identity, body.x, body.y)?;
    debug!("Match {} move {} at ({}, {}): {:?}", match_id, game_match.game().moves().len(), body.x, body.y, outcome);
    drop(game_match);

    if outcome.win {
        info!("{} won match {}", session.identity, match_id);
        state.cleanup.schedule(match_id);
    }

    Ok((StatusCode::OK, Json(outcome)))
}

// Handler for the caller's censored view of the match
pub async fn game_state(
    State(state): State<AppState>,
    bearer: MaybeBearer,
    query: Result<Query<MatchToken>, QueryRejection>,
) -> Result<impl IntoResponse, CustomError> {
    info!("game state request");

    let session = check_access(&state, &bearer, false).await?;
    let Query(query) = query?;
    let match_id = parse_match_id(&query.match_token)?;

    let game_match = read_match(&state, match_id).await?;
    let view = game_match.censored_for(&session.identity)?;
    debug!("Match {} is {:?}", match_id, game_match.turn_state());

    Ok((StatusCode::OK, Json(view)))
}

// Handler for conceding. The opponent wins and the match is finalised right away.
pub async fn forfeit(
    State(state): State<AppState>,
    bearer: MaybeBearer,
    body: Result<Json<MatchToken>, JsonRejection>,
) -> Result<impl IntoResponse, CustomError> {
    info!("forfeit request");

    let session = check_access(&state, &bearer, false).await?;
    let Json(body) = body?;
    let match_id = parse_match_id(&body.match_token)?;

    let mut game_match = write_match(&state, match_id).await?;
    game_match.forfeit(&session.identity)?;
    drop(game_match);

    state.cleanup.cancel(match_id);
    let outcome = match state.cleanup.finalize(match_id).await {
        Ok(outcome) => outcome,
        Err(err @ CleanupError::Store(_)) => {
            // leave it to the deferred cleanup to try again
            state.cleanup.schedule(match_id);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    Ok((StatusCode::OK, Json(json!({"winner": outcome.winner}))))
}

// Handler for administrative termination. No result is recorded.
pub async fn terminate_match(
    Path(match_id): Path<String>,
    State(state): State<AppState>,
    bearer: MaybeBearer,
) -> Result<impl IntoResponse, CustomError> {
    info!("terminate match request");

    //check if user is logged in and has the mandatory ADMIN role, bail out if not
    check_access(&state, &bearer, true).await?;
    let match_id = parse_match_id(&match_id)?;

    state.cleanup.terminate(match_id).await?;
    Ok((StatusCode::OK, Json(json!({"message": "match terminated"}))))
}
