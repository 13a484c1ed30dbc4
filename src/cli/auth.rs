use std::sync::Arc;

use crate::{
    config::Settings,
    error,
    server::{AppState, start_api_server},
    success, youtube,
};

pub async fn auth(settings: Settings) {
    let state = AppState::new(settings);
    let settings = Arc::clone(&state.settings);
    let pkce = Arc::clone(&state.pkce);

    // the callback handler exchanges the code and caches the token
    tokio::spawn(async move {
        if let Err(e) = start_api_server(state).await {
            error!("Failed to start callback server: {}", e);
        }
    });

    match youtube::auth::auth(&settings, pkce).await {
        Ok(_) => success!(
            "Authorization complete. Token cached at {}",
            settings.token_path.display()
        ),
        Err(e) => error!("{}", e.actionable()),
    }
}
