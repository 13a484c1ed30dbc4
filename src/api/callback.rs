use std::collections::HashMap;

use axum::{Extension, extract::Query, response::Html};
use reqwest::Client;

use crate::{management::TokenManager, server::AppState, warning, youtube::auth::exchange_code_pkce};

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(state): Extension<AppState>,
) -> Html<&'static str> {
    let Some(code) = params.get("code") else {
        return Html("<h4>Missing authorization code.</h4>");
    };

    let mut pkce = state.pkce.lock().await;
    let Some(pkce_state) = pkce.as_mut() else {
        return Html("<h4>Missing PKCE code verifier.</h4>");
    };
    let verifier = pkce_state.code_verifier.clone();

    match exchange_code_pkce(&Client::new(), &state.settings.oauth, code, &verifier).await {
        Ok(token) => {
            let manager = TokenManager::new(token.clone(), &state.settings.token_path);
            if let Err(e) = manager.persist().await {
                warning!("Failed to save token to cache: {}", e);
                return Html("<h4>Login succeeded but the token could not be saved.</h4>");
            }
            pkce_state.token = Some(token);
            Html("<h2>Authentication successful.</h2><p>Close this browser window.</p>")
        }
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            Html("<h4>Login failed.</h4>")
        }
    }
}
