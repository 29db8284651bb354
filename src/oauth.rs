//! Yandex OAuth: authorize link and verification code exchange.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{YandexConfig, DEFAULT_REDIRECT_URI};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Link the user opens to grant access and receive a verification code
pub fn authorize_url(config: &YandexConfig) -> Result<String> {
    let url = Url::parse_with_params(
        &format!("{}/authorize", config.oauth_base.trim_end_matches('/')),
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ],
    )
    .context("Invalid OAuth base URL")?;
    Ok(url.into())
}

/// Form fields of the `authorization_code` grant
///
/// `redirect_uri` is only sent when a custom one was used to obtain the code.
pub fn token_request_form(config: &YandexConfig, code: &str) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.trim().to_string()),
        ("client_id", config.client_id.clone()),
        ("client_secret", config.client_secret.clone()),
    ];
    if config.redirect_uri != DEFAULT_REDIRECT_URI {
        form.push(("redirect_uri", config.redirect_uri.clone()));
    }
    form
}

/// Exchange a verification code for an access token
pub async fn exchange_code(client: &Client, config: &YandexConfig, code: &str) -> Result<String> {
    let url = format!("{}/token", config.oauth_base.trim_end_matches('/'));
    let response = client
        .post(&url)
        .form(&token_request_form(config, code))
        .send()
        .await
        .context("Token request failed")?;

    let status = response.status();
    let body: TokenResponse = response
        .json()
        .await
        .with_context(|| format!("Unexpected token response (HTTP {status})"))?;

    match body.access_token {
        Some(token) if !token.is_empty() => {
            info!("OAuth code exchanged for token");
            Ok(token)
        }
        _ => {
            let reason = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!(%status, reason = %reason, "OAuth code exchange rejected");
            Err(anyhow!("Token not received: {reason}"))
        }
    }
}
