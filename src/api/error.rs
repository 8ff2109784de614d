use crate::discord;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider reported an error on the callback (user declined, etc).
    #[error("{0}")]
    AuthorizationDenied(String),
    #[error("Invalid state")]
    InvalidState,
    /// Code exchange or the post-exchange profile check failed.
    #[error("token exchange failed")]
    TokenExchangeFailed(#[source] Option<discord::Error>),
}

/// The session token could not be turned into a user.
///
/// Never reaches the client: [`crate::api::identity::resolve`] turns it into
/// an anonymous view.
#[derive(Debug, Error)]
#[error("identity resolution failed: {0}")]
pub struct IdentityResolutionFailed(#[from] pub discord::Error);

impl IdentityResolutionFailed {
    /// The provider refused the token itself, so keeping it is pointless.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        self.0.is_permanent()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthorizationDenied(error) => (StatusCode::FORBIDDEN, error).into_response(),
            Self::InvalidState => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::TokenExchangeFailed(source) => {
                match source {
                    Some(err) => warn!("Login failed: {err}"),
                    None => warn!("Login failed: callback without code"),
                }
                // The user may simply retry.
                Redirect::to("/login").into_response()
            }
        }
    }
}
