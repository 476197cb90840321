use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use log::error;
use serde::{Deserialize, Serialize};

use crate::models::game_match::PlayerIdentity;

// The claims carried by a session bearer token
#[derive(Deserialize, Serialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub admin: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no token supplied")]
    MissingToken,
    #[error("token invalid")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub identity: PlayerIdentity,
    pub admin: bool,
}

/// Turns an opaque session token into a player identity.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: Option<&str>) -> Result<Session, SessionError>;
}

/// Validates HS256 tokens issued by the account service and tracks when each
/// identity was last active.
pub struct JwtSessions {
    secret: String,
    last_activity: DashMap<PlayerIdentity, DateTime<Utc>>,
}

impl JwtSessions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), last_activity: DashMap::new() }
    }

    /// Forgets identities idle since before `cutoff`, keeping the activity map
    /// bounded by the players seen recently. Returns how many were dropped.
    pub fn prune_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.last_activity.len();
        self.last_activity.retain(|_, at| *at >= cutoff);
        before.saturating_sub(self.last_activity.len())
    }

    #[cfg(test)]
    pub fn last_activity(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.last_activity.get(identity).map(|at| *at)
    }
}

#[async_trait]
impl SessionValidator for JwtSessions {
    async fn validate(&self, token: Option<&str>) -> Result<Session, SessionError> {
        let token = token.ok_or(SessionError::MissingToken)?;

        match decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &Validation::default()) {
            Ok(token_data) => {
                let identity = token_data.claims.sub;
                self.last_activity.insert(identity.clone(), Utc::now());
                Ok(Session { identity, admin: token_data.claims.admin })
            }
            Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => Err(SessionError::ExpiredToken),
            Err(err) => {
                error!("Invalid token: {:?}", err.kind());
                Err(SessionError::InvalidToken)
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, identity: &str, admin: bool, valid_for: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: identity.to_string(),
        iat: now as usize,
        exp: (now + valid_for) as usize,
        admin,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_token_yields_identity_and_touches_activity() {
        let sessions = JwtSessions::new("secret");
        let token = issue_token("secret", "alice", false, 3600);

        assert!(sessions.last_activity("alice").is_none());
        let session = sessions.validate(Some(&token)).await.unwrap();
        assert_eq!(session, Session { identity: "alice".to_string(), admin: false });
        assert!(sessions.last_activity("alice").is_some());
    }

    #[tokio::test]
    async fn idle_identities_are_pruned() {
        let sessions = JwtSessions::new("secret");
        sessions.validate(Some(&issue_token("secret", "alice", false, 3600))).await.unwrap();

        assert_eq!(sessions.prune_idle(Utc::now() - chrono::Duration::hours(1)), 0);
        assert!(sessions.last_activity("alice").is_some());

        assert_eq!(sessions.prune_idle(Utc::now() + chrono::Duration::seconds(1)), 1);
        assert!(sessions.last_activity("alice").is_none());
    }

    #[tokio::test]
    async fn missing_bad_and_expired_tokens_are_distinguished() {
        let sessions = JwtSessions::new("secret");
        assert_eq!(sessions.validate(None).await, Err(SessionError::MissingToken));

        let forged = issue_token("other-secret", "alice", true, 3600);
        assert_eq!(sessions.validate(Some(&forged)).await, Err(SessionError::InvalidToken));
        assert_eq!(sessions.validate(Some("garbage")).await, Err(SessionError::InvalidToken));

        // past the default 60s leeway
        let stale = issue_token("secret", "alice", false, -600);
        assert_eq!(sessions.validate(Some(&stale)).await, Err(SessionError::ExpiredToken));
    }
}
