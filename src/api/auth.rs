use axum::{Extension, response::Json};
use serde_json::{Value, json};

use super::ApiResult;
use crate::{management::TokenManager, server::AppState, youtube::auth::begin};

pub async fn auth_status(Extension(state): Extension<AppState>) -> Json<Value> {
    let configured = state.settings.oauth.require_client().is_ok();
    let authenticated = configured && TokenManager::load(&state.settings.token_path).await.is_ok();
    Json(json!({
        "authenticated": authenticated,
        "client_configured": configured,
    }))
}

pub async fn auth_url(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    let url = begin(&state.settings.oauth, &state.pkce).await?;
    Ok(Json(json!({ "url": url })))
}
