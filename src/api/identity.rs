//! Per-request identity resolution.

use super::error::IdentityResolutionFailed;
use crate::discord::{DiscordClient, Freshness, User};
use crate::session::Session;
use tracing::{debug, warn};

/// Who is looking at the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// No token in the session.
    Anonymous,
    Authenticated(User),
    /// A token exists but could not be turned into a user right now.
    Unavailable,
}

impl Identity {
    /// The user to show, if any. Unavailable identities render as anonymous.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous | Self::Unavailable => None,
        }
    }
}

/// Resolve the session's token into a user.
///
/// Never fails: provider errors degrade to [`Identity::Unavailable`]. A token
/// the provider rejects outright is removed from the session, a transient
/// failure leaves it in place for the next request.
pub async fn resolve(session: &Session, discord: &DiscordClient) -> Identity {
    match lookup(session, discord).await {
        Ok(Some(user)) => Identity::Authenticated(user),
        Ok(None) => Identity::Anonymous,
        Err(err) if err.is_permanent() => {
            warn!("Dropping rejected token: {err}");
            session.forget_token().await;
            Identity::Unavailable
        }
        Err(err) => {
            warn!("Showing anonymous view: {err}");
            Identity::Unavailable
        }
    }
}

async fn lookup(
    session: &Session,
    discord: &DiscordClient,
) -> Result<Option<User>, IdentityResolutionFailed> {
    let Some(token) = session.token().await else {
        return Ok(None);
    };

    let token = match discord.ensure_fresh(token).await? {
        Freshness::Current(token) => token,
        Freshness::Refreshed(token) => {
            debug!("storing refreshed token");
            session.store_token(token.clone()).await;
            token
        }
    };

    discord
        .current_user(&token)
        .await
        .map(Some)
        .map_err(IdentityResolutionFailed::from)
}
