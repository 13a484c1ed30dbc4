use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    config::{OAuthSettings, Settings},
    error::{PipelineError, PipelineResult},
    types::{PkceToken, Token},
    utils,
};

/// How long the CLI waits for the browser round trip.
const CALLBACK_WAIT: Duration = Duration::from_secs(180);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    scope: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl From<TokenResponse> for Token {
    fn from(res: TokenResponse) -> Self {
        Token {
            access_token: res.access_token,
            refresh_token: res.refresh_token.unwrap_or_default(),
            scope: res.scope.unwrap_or_default(),
            expires_in: res.expires_in.unwrap_or(3600),
            obtained_at: Utc::now().timestamp() as u64,
        }
    }
}

/// Google consent page URL for the PKCE flow.
pub fn authorize_url(oauth: &OAuthSettings, code_challenge: &str) -> PipelineResult<String> {
    let url = Url::parse_with_params(
        &oauth.auth_url,
        &[
            ("client_id", oauth.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
            ("scope", oauth.scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| PipelineError::Config(format!("invalid GOOGLE_AUTH_URL: {}", e)))?;
    Ok(url.to_string())
}

/// Creates a fresh verifier, stores it in `shared_state` and returns the
/// consent URL to send the user to.
pub async fn begin(
    oauth: &OAuthSettings,
    shared_state: &Arc<Mutex<Option<PkceToken>>>,
) -> PipelineResult<String> {
    oauth.require_client()?;

    let code_verifier = utils::generate_code_verifier();
    let code_challenge = utils::generate_code_challenge(&code_verifier);
    let url = authorize_url(oauth, &code_challenge)?;

    let mut lock = shared_state.lock().await;
    *lock = Some(PkceToken {
        code_verifier,
        token: None,
    });
    Ok(url)
}

/// Interactive flow: opens the browser and waits for the callback server to
/// store the token.
pub async fn auth(
    settings: &Settings,
    shared_state: Arc<Mutex<Option<PkceToken>>>,
) -> PipelineResult<Token> {
    let auth_url = begin(&settings.oauth, &shared_state).await?;

    if webbrowser::open(&auth_url).is_err() {
        crate::warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        )
    }

    wait_for_token(shared_state, CALLBACK_WAIT)
        .await
        .ok_or_else(|| PipelineError::Auth("authorization timed out".to_string()))
}

async fn wait_for_token(
    shared_state: Arc<Mutex<Option<PkceToken>>>,
    max_wait: Duration,
) -> Option<Token> {
    use std::time::Instant;

    let start = Instant::now();
    while start.elapsed() < max_wait {
        let lock = shared_state.lock().await;
        if let Some(token) = lock.as_ref().and_then(|p| p.token.as_ref()) {
            return Some(token.clone());
        }
        drop(lock);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    None
}

pub async fn exchange_code_pkce(
    client: &Client,
    oauth: &OAuthSettings,
    code: &str,
    verifier: &str,
) -> PipelineResult<Token> {
    let res = client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", oauth.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    token_from_response(res).await
}

pub async fn refresh_token(
    client: &Client,
    oauth: &OAuthSettings,
    refresh_token: &str,
) -> PipelineResult<Token> {
    let res = client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ])
        .send()
        .await?;

    token_from_response(res).await
}

async fn token_from_response(res: reqwest::Response) -> PipelineResult<Token> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        let reason = serde_json::from_str::<TokenErrorResponse>(&body)
            .map(|e| match e.error_description {
                Some(desc) => format!("{}: {}", e.error, desc),
                None => e.error,
            })
            .unwrap_or_else(|_| format!("token endpoint returned {}", status));
        return Err(PipelineError::Auth(reason));
    }

    let token: TokenResponse = serde_json::from_str(&body)?;
    Ok(token.into())
}
