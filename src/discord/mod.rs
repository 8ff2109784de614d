//! Discord `OAuth2` client.
//!
//! Covers the authorization-code grant (authorize URL, code exchange), the
//! refresh grant, and `GET /users/@me`. All endpoints hang off a single API
//! base URL so the whole provider can be swapped in tests.

mod error;
pub mod oauth;
pub mod user;

pub use self::error::Error;
pub use self::oauth::{Token, TokenResponse};
pub use self::user::User;

use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://discord.com/api";
pub const DEFAULT_SCOPE: &str = "identify";

const ENDPOINT_TOKEN: &str = "oauth2/token";
const ENDPOINT_ME: &str = "users/@me";

/// Discord application credentials and endpoints.
#[derive(Clone)]
pub struct DiscordConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: Url,
    authorize_url: Url,
    token_url: Url,
    me_url: Url,
    scopes: Vec<String>,
}

impl DiscordConfig {
    /// Build the configuration for an API base such as `https://discord.com/api`.
    ///
    /// # Errors
    /// Returns an error if `api_url` does not produce valid endpoint URLs.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: Url,
        api_url: &str,
    ) -> Result<Self, url::ParseError> {
        let base = api_url.trim_end_matches('/');
        Ok(Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri,
            authorize_url: Url::parse(&format!("{base}/oauth2/authorize"))?,
            token_url: Url::parse(&format!("{base}/{ENDPOINT_TOKEN}"))?,
            me_url: Url::parse(&format!("{base}/{ENDPOINT_ME}"))?,
            scopes: vec![DEFAULT_SCOPE.to_string()],
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("me_url", &self.me_url.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Outcome of [`DiscordClient::ensure_fresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The stored token is still valid.
    Current(Token),
    /// The token was refreshed and must be written back to the session.
    Refreshed(Token),
}

#[derive(Clone, Debug)]
pub struct DiscordClient {
    config: Arc<DiscordConfig>,
    http: Client,
}

impl DiscordClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: DiscordConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .map_err(Error::Client)?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    /// Authorization URL the browser is sent to, bound to `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        url
    }

    /// Exchange an authorization code for a token.
    ///
    /// # Errors
    /// Returns an error if the token endpoint is unreachable, rejects the code
    /// or answers with an unexpected body.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<Token, Error> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let response: TokenResponse = self.post_token(&form).await?;
        debug!("authorization code exchanged");
        Ok(Token::from_response(response, Utc::now().timestamp()))
    }

    /// Use the refresh token to obtain a new access token.
    ///
    /// # Errors
    /// Returns [`Error::MissingRefreshToken`] if the token cannot be refreshed,
    /// otherwise the same errors as [`Self::exchange_code`].
    #[instrument(skip_all)]
    pub async fn refresh(&self, token: &Token) -> Result<Token, Error> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or(Error::MissingRefreshToken)?;
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response: TokenResponse = self.post_token(&form).await?;
        debug!("access token refreshed");
        Ok(token.refreshed(response, Utc::now().timestamp()))
    }

    /// Refresh `token` if it is expired.
    ///
    /// # Errors
    /// Returns an error if a refresh was needed and failed.
    pub async fn ensure_fresh(&self, token: Token) -> Result<Freshness, Error> {
        if token.is_expired_at(Utc::now().timestamp()) {
            self.refresh(&token).await.map(Freshness::Refreshed)
        } else {
            Ok(Freshness::Current(token))
        }
    }

    /// Fetch the profile of the token's owner.
    ///
    /// # Errors
    /// Returns an error if the request fails or the profile is malformed.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &Token) -> Result<User, Error> {
        let response = self
            .http
            .get(self.config.me_url.clone())
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|source| Error::Transport {
                endpoint: ENDPOINT_ME,
                source,
            })?;
        let profile: Value = read_json(ENDPOINT_ME, response).await?;
        User::from_profile(profile)
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|source| Error::Transport {
                endpoint: ENDPOINT_TOKEN,
                source,
            })?;
        read_json(ENDPOINT_TOKEN, response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        warn!("{endpoint} returned {status}");
        return Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Error::Rejected { endpoint, status }
            }
            _ => Error::Status { endpoint, status },
        });
    }
    response
        .json()
        .await
        .map_err(|source| Error::Body { endpoint, source })
}
