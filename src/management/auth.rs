use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::Client;

use crate::{
    config::OAuthSettings,
    error::{PipelineError, PipelineResult},
    types::Token,
    youtube::auth::refresh_token,
};

/// Seconds before expiry at which the access token is refreshed.
const REFRESH_MARGIN_SECS: u64 = 240;

pub struct TokenManager {
    token: Token,
    path: PathBuf,
}

impl TokenManager {
    pub fn new(token: Token, path: impl Into<PathBuf>) -> Self {
        TokenManager {
            token,
            path: path.into(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self, String> {
        let content = async_fs::read_to_string(path)
            .await
            .map_err(|e| e.to_string())?;
        let token: Token = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self {
            token,
            path: path.to_path_buf(),
        })
    }

    pub async fn persist(&self) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(&self.token).map_err(|e| e.to_string())?;
        async_fs::write(&self.path, json)
            .await
            .map_err(|e| e.to_string())
    }

    /// Current access token, refreshed first when it is about to expire.
    ///
    /// Google omits the refresh token from refresh responses; the stored one
    /// is kept in that case.
    pub async fn get_valid_token(
        &mut self,
        client: &Client,
        oauth: &OAuthSettings,
    ) -> PipelineResult<String> {
        if self.is_expired() {
            if self.token.refresh_token.is_empty() {
                return Err(PipelineError::Auth(
                    "access token expired and no refresh token is stored".to_string(),
                ));
            }

            let mut new_token = refresh_token(client, oauth, &self.token.refresh_token).await?;
            if new_token.refresh_token.is_empty() {
                new_token.refresh_token = self.token.refresh_token.clone();
            }
            self.token = new_token;
            if let Err(e) = self.persist().await {
                tracing::warn!("cannot persist refreshed token: {}", e);
            }
        }

        Ok(self.token.access_token.clone())
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as u64;
        now + REFRESH_MARGIN_SECS >= self.token.obtained_at + self.token.expires_in
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }
}
