//! Slidecraft backend: the REST API behind the presentation generator.
//!
//! [`AppState`] bundles the shared services and [`app`] assembles the axum
//! router. The binary in `main.rs` only loads the configuration, opens the
//! database and serves this router.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod middleware;
pub mod services;
pub mod utils;

use adapters::IdentityProvider;
use auth::{auth_routes, require_auth, AuthService};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use config::Config;
use database::Database;
use services::ai_registry::{AiRegistry, ProviderFactory, RemoteProviders};
use services::file_service::FileService;
use services::task_manager::TaskManager;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub auth: Arc<AuthService>,
    pub ai: Arc<AiRegistry>,
    pub files: Arc<FileService>,
    pub tasks: TaskManager,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        identity: Option<Arc<dyn IdentityProvider>>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        let config = Arc::new(config);
        let files = Arc::new(FileService::new(config.upload_folder.clone()));
        Self {
            auth: Arc::new(AuthService::new(&config, identity, db.clone())),
            ai: Arc::new(AiRegistry::new(
                Arc::clone(&config),
                providers,
                Arc::clone(&files),
            )),
            tasks: TaskManager::new(db.clone()),
            files,
            db,
            config,
        }
    }

    /// State wired to the real identity provider and AI clients.
    pub fn from_config(config: Config, db: Database) -> Self {
        let auth = AuthService::from_config(&config, db.clone());
        let mut state = Self::new(config, db, None, Arc::new(RemoteProviders));
        state.auth = Arc::new(auth);
        state
    }
}

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let protected = api::api_routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        require_auth,
    ));
    let api = protected.nest("/auth", auth_routes());

    Router::new()
        .nest("/api", api)
        .nest_service("/files", ServeDir::new(state.files.upload_folder()))
        .layer(DefaultBodyLimit::max(state.config.max_content_length))
        .layer(middleware::trace_layer())
        .layer(middleware::cors_layer(&state.config))
        .with_state(state)
}
