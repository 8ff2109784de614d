//! Discord login: start, callback and logout.

use crate::api::{
    error::AuthError,
    templates::{LoginPage, render},
};
use crate::discord::DiscordClient;
use crate::session::Session;
use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use serde::Deserialize;
use tracing::{error, info, instrument};

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Create a fresh anti-forgery nonce for one login attempt.
pub(crate) fn generate_state() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate oauth state")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[instrument(skip_all)]
pub async fn login(
    Extension(session): Extension<Session>,
    Extension(discord): Extension<DiscordClient>,
) -> Response {
    let state = match generate_state() {
        Ok(state) => state,
        Err(err) => {
            error!("Failed to start login: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let oauth2_link = discord.authorization_url(&state).to_string();
    session.begin_login(state).await;

    render(&LoginPage {
        title: "로그인",
        user: None,
        oauth2_link,
    })
}

/// `OAuth2` redirect target.
///
/// The session only changes once the code is exchanged and the resulting
/// token has been used to read the profile.
#[instrument(skip_all)]
pub async fn callback(
    Query(query): Query<CallbackQuery>,
    Extension(session): Extension<Session>,
    Extension(discord): Extension<DiscordClient>,
) -> Result<Redirect, AuthError> {
    if let Some(error) = query.error {
        return Err(AuthError::AuthorizationDenied(error));
    }

    let expected = session.oauth_state().await;
    match (query.state.as_deref(), expected.as_deref()) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => return Err(AuthError::InvalidState),
    }

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or(AuthError::TokenExchangeFailed(None))?;

    let token = discord
        .exchange_code(code)
        .await
        .map_err(|err| AuthError::TokenExchangeFailed(Some(err)))?;

    let user = discord
        .current_user(&token)
        .await
        .map_err(|err| AuthError::TokenExchangeFailed(Some(err)))?;

    info!(user_id = %user.id, "login completed");

    let next = session.complete_login(token).await;
    Ok(Redirect::to(&next))
}

#[instrument(skip_all)]
pub async fn logout(Extension(session): Extension<Session>) -> Redirect {
    let next = session.logout().await;
    Redirect::to(&next)
}
