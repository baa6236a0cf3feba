pub mod config;
pub mod controllers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod session;
pub mod validation;
pub mod view;

use axum::{response::Response, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use config::{SessionBackendKind, SessionConfig};
use services::upstream::UpstreamClient;
use session::{MemoryStore, RedisStore, SessionError, SessionStore};
use view::{View, ViewRenderer};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub upstream: UpstreamClient,
    pub sessions: SessionStore,
    pub renderer: Arc<dyn ViewRenderer>,
}

impl AppState {
    pub fn new(
        config: config::Config,
        sessions: SessionStore,
        renderer: Arc<dyn ViewRenderer>,
    ) -> Result<Arc<Self>, reqwest::Error> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        Ok(Arc::new(Self {
            config,
            upstream,
            sessions,
            renderer,
        }))
    }

    pub fn render(&self, view: View) -> Response {
        view::render(self.renderer.as_ref(), view)
    }
}

/// Поднимает хранилище сессий, выбранное в конфиге.
pub async fn connect_sessions(config: &SessionConfig) -> Result<SessionStore, SessionError> {
    match (config.backend, config.redis_url.as_deref()) {
        (SessionBackendKind::Redis, Some(url)) => Ok(SessionStore::Redis(
            RedisStore::connect(url, config.ttl_seconds).await?,
        )),
        _ => Ok(SessionStore::Memory(MemoryStore::new(config.ttl_seconds))),
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Mount the routes from the controllers module
        .nest("/books", controllers::books::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_layer,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
