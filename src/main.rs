use axum::{
    headers::{authorization::Bearer, Authorization},
    routing::{get, post},
    Router, TypedHeader,
};
use log::{debug, info, warn};
use simplelog::{Config as LogConfig, SimpleLogger};
use sqlx::mysql::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
mod cleanup;
mod config;
mod controllers;
mod errors;
mod lobby;
mod models;
mod redirect;
mod registry;
mod session;
mod store;
use crate::cleanup::CleanupScheduler;
use crate::config::Config;
use crate::errors::CustomError;
use crate::lobby::Lobby;
use crate::registry::MatchRegistry;
use crate::session::{JwtSessions, Session, SessionValidator};
use crate::store::{MatchStore, MemoryMatchStore, MySqlMatchStore};

// Shared state handed to every handler. Nothing here is process-global;
// each instance builds its own.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionValidator>,
    pub registry: Arc<MatchRegistry>,
    pub store: Arc<dyn MatchStore>,
    pub cleanup: Arc<CleanupScheduler>,
    pub lobby: Arc<Lobby>,
}

impl AppState {
    pub fn new(config: Config, sessions: Arc<dyn SessionValidator>, store: Arc<dyn MatchStore>) -> Self {
        let registry = Arc::new(MatchRegistry::new());
        let cleanup = Arc::new(CleanupScheduler::new(config.cleanup_delay, Arc::clone(&registry), Arc::clone(&store)));
        AppState {
            config: Arc::new(config),
            sessions,
            registry,
            store,
            cleanup,
            lobby: Arc::new(Lobby::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // set up logging facility
    let _ = SimpleLogger::init(config.log_level, LogConfig::default());
    info!("Starting..");

    let store: Arc<dyn MatchStore> = match &config.database_url {
        Some(database_url) => {
            let pool = MySqlPool::connect(database_url).await?;
            Arc::new(MySqlMatchStore::new(pool))
        }
        None => {
            warn!("$DATABASE_URL is not set, match results are kept in memory only");
            Arc::new(MemoryMatchStore::new())
        }
    };

    let sessions = Arc::new(JwtSessions::new(config.jwt_secret.clone()));
    spawn_activity_pruner(Arc::clone(&sessions), config.session_idle);
    let addr = config.bind_address;
    let state = AppState::new(config, sessions, store);

    // Start the server
    debug!("Listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await?;

    Ok(())
}

// Periodically drops last-activity entries of players gone quiet
fn spawn_activity_pruner(sessions: Arc<JwtSessions>, idle: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(idle);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::from_std(idle).unwrap_or_else(|_| chrono::Duration::zero());
            let pruned = sessions.prune_idle(cutoff);
            if pruned > 0 {
                debug!("Pruned {} idle sessions", pruned);
            }
        }
    });
}

// Define routes
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/hostMatch", post(controllers::game::host_match).delete(controllers::game::unhost_match))
        .route("/joinMatch", post(controllers::game::join_match))
        .route("/postMove", post(controllers::game::post_move))
        .route("/gameState", get(controllers::game::game_state))
        .route("/forfeit", post(controllers::game::forfeit))
        .route("/match/:match_id", axum::routing::delete(controllers::game::terminate_match))
        .route("/internal/match", post(controllers::internal::hydrate_match))
        .route("/internal/match/:match_id/host", get(controllers::internal::match_host))
        .with_state(state)
}

// Helper to validate the caller's bearer token through the session collaborator,
// and to insist on the admin claim when needed.
async fn check_access(
    state: &AppState,
    bearer: &Option<TypedHeader<Authorization<Bearer>>>,
    admin_needed: bool,
) -> Result<Session, CustomError> {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let session = state.sessions.validate(token).await?;

    if admin_needed && !session.admin {
        warn!("User {} is not admin, request denied", session.identity);
        return Err(CustomError::NotAdmin);
    }
    Ok(session)
}
