//! OAuth 2.0 authorization-code client for external sign-in.
//!
//! # Flow
//!
//! 1. Build the provider URL with [`OAuthClient::authorization_url`]
//! 2. The provider redirects back with `code` and `state`
//! 3. Exchange the code with [`OAuthClient::exchange_code`]
//! 4. Read the identity with [`OAuthClient::fetch_profile`]

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, instrument};
use url::Url;
use vivero_core::Email;

use crate::config::OAuthConfig;
use crate::models::OAuthProfile;

/// Errors from the provider round trips.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request: {0}")]
    Provider(String),

    #[error("provider did not return a usable email")]
    MissingEmail,

    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Client for one configured OAuth provider.
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<OAuthClientInner>,
}

struct OAuthClientInner {
    client: reqwest::Client,
    provider_name: String,
    client_id: String,
    client_secret: SecretString,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    scopes: String,
}

impl OAuthClient {
    #[must_use]
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            inner: Arc::new(OAuthClientInner {
                client: reqwest::Client::new(),
                provider_name: config.provider_name.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                authorize_url: config.authorize_url.clone(),
                token_url: config.token_url.clone(),
                userinfo_url: config.userinfo_url.clone(),
                scopes: config.scopes.clone(),
            }),
        }
    }

    /// Label for the login button.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.inner.provider_name
    }

    /// The provider URL to send the browser to.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Url` if the configured authorize URL is invalid.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, OAuthError> {
        let mut url = Url::parse(&self.inner.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.inner.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.inner.scopes)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    #[instrument(skip_all, fields(provider = %self.inner.provider_name))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .inner
            .client
            .post(&self.inner.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text.chars().take(200).collect::<String>(), "Token exchange failed");
            return Err(OAuthError::Provider(format!("token exchange returned {status}")));
        }

        let token: TokenResponse = response.json().await?;
        Ok(SecretString::from(token.access_token))
    }

    /// Read the signed-in identity from the userinfo endpoint.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::MissingEmail` when the provider has no verified email.
    #[instrument(skip_all, fields(provider = %self.inner.provider_name))]
    pub async fn fetch_profile(&self, access_token: &SecretString) -> Result<OAuthProfile, OAuthError> {
        let response = self
            .inner
            .client
            .get(&self.inner.userinfo_url)
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Provider(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        let info: UserInfo = response.json().await?;
        profile_from_userinfo(&self.inner.provider_name, info)
    }
}

fn profile_from_userinfo(provider: &str, info: UserInfo) -> Result<OAuthProfile, OAuthError> {
    // An absent claim counts as unverified.
    if info.email_verified != Some(true) {
        return Err(OAuthError::MissingEmail);
    }
    let email = info
        .email
        .as_deref()
        .and_then(|e| Email::parse(e).ok())
        .ok_or(OAuthError::MissingEmail)?;

    Ok(OAuthProfile {
        provider: provider.to_owned(),
        subject: info.sub,
        email,
        name: info.name.filter(|n| !n.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(&OAuthConfig {
            provider_name: "Google".to_owned(),
            client_id: "client-123".to_owned(),
            client_secret: SecretString::from("s3cr3t"),
            authorize_url: "https://accounts.example.com/o/oauth2/auth".to_owned(),
            token_url: "https://accounts.example.com/token".to_owned(),
            userinfo_url: "https://accounts.example.com/userinfo".to_owned(),
            scopes: "openid email profile".to_owned(),
        })
    }

    #[test]
    fn test_authorization_url_carries_state_and_redirect() {
        let url = client()
            .authorization_url("http://localhost:3000/auth/oauth/callback", "abc")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("state".to_owned(), "abc".to_owned())));
        assert!(pairs.contains(&("client_id".to_owned(), "client-123".to_owned())));
        assert!(pairs.contains(&(
            "redirect_uri".to_owned(),
            "http://localhost:3000/auth/oauth/callback".to_owned()
        )));
        assert!(pairs.contains(&("scope".to_owned(), "openid email profile".to_owned())));
    }

    #[test]
    fn test_profile_requires_verified_email() {
        let info = UserInfo {
            sub: "1".to_owned(),
            email: Some("Ana@Example.com".to_owned()),
            email_verified: Some(true),
            name: Some("Ana".to_owned()),
        };
        let profile = profile_from_userinfo("Google", info).unwrap();
        assert_eq!(profile.email.as_str(), "ana@example.com");

        let unverified = UserInfo {
            sub: "2".to_owned(),
            email: Some("bob@example.com".to_owned()),
            email_verified: Some(false),
            name: None,
        };
        assert!(matches!(
            profile_from_userinfo("Google", unverified),
            Err(OAuthError::MissingEmail)
        ));

        let missing = UserInfo {
            sub: "3".to_owned(),
            email: None,
            email_verified: None,
            name: None,
        };
        assert!(profile_from_userinfo("Google", missing).is_err());
    }

    #[test]
    fn test_profile_without_verification_claim_is_rejected() {
        let info = UserInfo {
            sub: "4".to_owned(),
            email: Some("carla@example.com".to_owned()),
            email_verified: None,
            name: Some("Carla".to_owned()),
        };
        assert!(matches!(
            profile_from_userinfo("Google", info),
            Err(OAuthError::MissingEmail)
        ));
    }
}
