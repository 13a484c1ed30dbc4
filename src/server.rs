use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{Res, api, config::Settings, types::PkceToken};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pkce: Arc<Mutex<Option<PkceToken>>>,
    pub jobs: api::JobStore,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            pkce: Arc::new(Mutex::new(None)),
            jobs: api::JobStore::default(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback))
        .route("/api/auth/status", get(api::auth_status))
        .route("/api/auth/url", get(api::auth_url))
        .route("/api/preview", post(api::preview))
        .route("/api/process", post(api::process))
        .route("/api/job/{id}", get(api::job_status))
        .route("/api/job/{id}/events", get(api::job_events))
        .route("/api/job/{id}/publish", post(api::publish))
        .layer(Extension(state))
}

pub async fn serve(listener: TcpListener, state: AppState) -> Res<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn start_api_server(state: AppState) -> Res<()> {
    let addr = SocketAddr::from_str(&state.settings.server_addr)?;
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    serve(listener, state).await
}
