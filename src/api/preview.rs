use axum::{Extension, Json};
use reqwest::Client;

use super::{ApiError, ApiResult, UrlRequest};
use crate::{archive, pipeline::build_preview, server::AppState, types::Preview};

pub async fn preview(
    Extension(state): Extension<AppState>,
    Json(req): Json<UrlRequest>,
) -> ApiResult<Json<Preview>> {
    let client = Client::builder()
        .timeout(state.settings.http_timeout)
        .build()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let collection = archive::fetch_collection(&client, &state.settings, &req.url).await?;
    Ok(Json(build_preview(&collection)))
}
