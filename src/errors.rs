use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use log::{error, info};
use serde_json::json;

use crate::cleanup::CleanupError;
use crate::models::game::GameError;
use crate::models::game_match::MatchId;
use crate::registry::RegistryError;
use crate::session::SessionError;
use crate::store::StoreError;

// Custom Errors used in handlers
#[derive(Debug)]
pub enum CustomError {
    BadRequest,
    InvalidMatchToken,
    MissingToken,
    InvalidToken,
    ExpiredToken,
    NotAdmin,
    Forbidden,
    PlayerNotInMatch,
    OutOfTurn,
    OutOfBounds,
    MatchConcluded,
    MatchNotFound,
    DuplicateMatch,
    AlreadyHosting,
    NotHosting,
    NoHostsAvailable,
    HostUnreachable,
    Redirect { host: String, match_id: MatchId },
    InternalServerError,
}

//implementation of custom errors that are used in handlers
impl IntoResponse for CustomError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Self::Redirect { host, match_id } => {
                let location = HeaderValue::from_str(&format!("http://{}", host)).ok();
                let mut response = (
                    StatusCode::TEMPORARY_REDIRECT,
                    Json(json!({"redirect": host, "matchID": match_id})),
                )
                    .into_response();
                if let Some(location) = location {
                    response.headers_mut().insert(LOCATION, location);
                }
                return response;
            }
            Self::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            Self::BadRequest => (StatusCode::BAD_REQUEST, "Bad Request"),
            Self::InvalidMatchToken => (StatusCode::BAD_REQUEST, "Match token is not a valid match id"),
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "No token supplied"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Token is not valid"),
            Self::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token expired"),
            Self::NotAdmin => (StatusCode::UNAUTHORIZED, "You need to be an administrator for this request"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Internal endpoint"),
            Self::PlayerNotInMatch => (StatusCode::FORBIDDEN, "You are not a player in this match"),
            Self::OutOfTurn => (StatusCode::CONFLICT, "Incorrect player order, wait for your turn"),
            Self::OutOfBounds => (StatusCode::BAD_REQUEST, "Hit is out of bounds"),
            Self::MatchConcluded => (StatusCode::CONFLICT, "Match is already concluded"),
            Self::MatchNotFound => (StatusCode::NOT_FOUND, "Match not found"),
            Self::DuplicateMatch => (StatusCode::CONFLICT, "Match already exists"),
            Self::AlreadyHosting => (StatusCode::CONFLICT, "User already trying to host match"),
            Self::NotHosting => (StatusCode::NOT_FOUND, "User not trying to host match"),
            Self::NoHostsAvailable => (StatusCode::NOT_FOUND, "No match hosts found, consider hosting"),
            Self::HostUnreachable => (StatusCode::SERVICE_UNAVAILABLE, "Match host is unreachable"),
        };
        (status, Json(json!({"error": error_message}))).into_response()
    }
}

impl From<GameError> for CustomError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::OutOfTurn => CustomError::OutOfTurn,
            GameError::OutOfBounds { .. } => CustomError::OutOfBounds,
            GameError::MatchConcluded => CustomError::MatchConcluded,
            GameError::PlayerNotInMatch => CustomError::PlayerNotInMatch,
            GameError::MismatchedBoards => CustomError::BadRequest,
            GameError::Board(err) => {
                error!("Board error: {}", err);
                CustomError::InternalServerError
            }
        }
    }
}

impl From<SessionError> for CustomError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingToken => CustomError::MissingToken,
            SessionError::InvalidToken => CustomError::InvalidToken,
            SessionError::ExpiredToken => CustomError::ExpiredToken,
        }
    }
}

impl From<RegistryError> for CustomError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateMatch(_) => CustomError::DuplicateMatch,
            RegistryError::NotFound(_) => CustomError::MatchNotFound,
        }
    }
}

impl From<StoreError> for CustomError {
    fn from(err: StoreError) -> Self {
        error!("Store error: {}", err);
        CustomError::InternalServerError
    }
}

impl From<CleanupError> for CustomError {
    fn from(err: CleanupError) -> Self {
        match err {
            CleanupError::Registry(err) => err.into(),
            CleanupError::Store(err) => err.into(),
            CleanupError::NotConcluded(match_id) => {
                error!("Match {} finalized without a winner", match_id);
                CustomError::InternalServerError
            }
        }
    }
}

impl From<JsonRejection> for CustomError {
    fn from(rejection: JsonRejection) -> Self {
        info!("Rejected request body: {}", rejection.body_text());
        CustomError::BadRequest
    }
}

impl From<QueryRejection> for CustomError {
    fn from(rejection: QueryRejection) -> Self {
        info!("Rejected query string: {}", rejection.body_text());
        CustomError::BadRequest
    }
}
