//! Lightweight OAuth2 Authorization Code flow for desktop apps.
//!
//! 1. Opens browser to authorization URL
//! 2. Starts a tiny localhost HTTP server to receive the callback
//! 3. Exchanges the code for an access token (+ refresh token)
//! 4. Stores tokens in OS keyring

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::TcpListener;

use super::keyring_store;
use crate::error::OAuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>, // Unix timestamp
    pub token_type: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Keyring entry the tokens are stored under.
    pub service_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

impl OAuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    pub fn auth_url_full(&self) -> Result<String, OAuthError> {
        let scopes = self.scopes.join(" ");
        let redirect_uri = self.redirect_uri();
        let url = url::Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scopes.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;
        Ok(url.into())
    }
}

/// Run the full OAuth2 flow: open browser -> listen for callback -> exchange code.
pub async fn authorize(config: &OAuthConfig) -> Result<OAuthTokens, OAuthError> {
    let auth_url = config.auth_url_full()?;
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.redirect_port))
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;

    if open::that(&auth_url).is_err() {
        tracing::warn!("could not open a browser, visit this URL to continue: {auth_url}");
    }

    let code = receive_code(&listener)?;
    drop(listener);

    let tokens = exchange_code(config, &code).await?;
    store_tokens(&config.service_name, &tokens)?;
    Ok(tokens)
}

fn receive_code(listener: &TcpListener) -> Result<String, OAuthError> {
    let callback_failed = |e: std::io::Error| OAuthError::InvalidCallback(e.to_string());

    let (mut stream, _) = listener.accept().map_err(callback_failed)?;
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).map_err(callback_failed)?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let code = extract_code(&request)
        .ok_or_else(|| OAuthError::InvalidCallback("no code in callback".to_string()))?;

    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body><h2>Authentication successful!</h2><p>You can close this tab.</p><script>window.close()</script></body></html>";
    stream
        .write_all(response.as_bytes())
        .map_err(callback_failed)?;
    Ok(code)
}

/// Exchange authorization code for tokens.
pub async fn exchange_code(config: &OAuthConfig, code: &str) -> Result<OAuthTokens, OAuthError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let body = post_form(&config.token_url, &params)
        .await
        .map_err(OAuthError::TokenExchangeFailed)?;
    tokens_from_response(&body, None).map_err(OAuthError::TokenExchangeFailed)
}

/// Refresh an access token using a refresh token and store the result.
pub async fn refresh_token(config: &OAuthConfig, refresh: &str) -> Result<OAuthTokens, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let body = post_form(&config.token_url, &params)
        .await
        .map_err(OAuthError::TokenRefreshFailed)?;
    let tokens = tokens_from_response(&body, Some(refresh)).map_err(OAuthError::TokenRefreshFailed)?;
    store_tokens(&config.service_name, &tokens)?;
    Ok(tokens)
}

async fn post_form(url: &str, params: &[(&str, &str)]) -> Result<serde_json::Value, String> {
    let resp = Client::new()
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    resp.json().await.map_err(|e| e.to_string())
}

/// Build tokens from a token endpoint response.
///
/// Google omits the refresh token on refresh; `previous_refresh` is kept then.
fn tokens_from_response(
    body: &serde_json::Value,
    previous_refresh: Option<&str>,
) -> Result<OAuthTokens, String> {
    if let Some(error) = body.get("error") {
        return Err(error.to_string());
    }

    let access_token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "missing access_token".to_string())?;

    let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
    let expires_at = expires_in.map(|ei| chrono::Utc::now().timestamp() + ei);

    Ok(OAuthTokens {
        access_token: access_token.to_string(),
        refresh_token: body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| previous_refresh.map(String::from)),
        expires_at,
        token_type: body
            .get("token_type")
            .and_then(|v| v.as_str())
            .unwrap_or("Bearer")
            .to_string(),
        scope: body.get("scope").and_then(|v| v.as_str()).map(String::from),
    })
}

fn store_tokens(service_name: &str, tokens: &OAuthTokens) -> Result<(), OAuthError> {
    let tokens_json =
        serde_json::to_string(tokens).map_err(|e| OAuthError::Keyring(e.to_string()))?;
    keyring_store::set(service_name, &tokens_json)
}

/// Load stored tokens from keyring.
pub fn load_tokens(service_name: &str) -> Option<OAuthTokens> {
    keyring_store::get(service_name)
        .ok()
        .flatten()
        .and_then(|json| serde_json::from_str(&json).ok())
}

/// Check if stored tokens are expired (with 60s buffer).
pub fn is_expired(tokens: &OAuthTokens) -> bool {
    match tokens.expires_at {
        Some(exp) => chrono::Utc::now().timestamp() > exp - 60,
        None => false,
    }
}

fn extract_code(request: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let path = first_line.split_whitespace().nth(1)?;
    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
}
