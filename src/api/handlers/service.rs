//! Redirect pages for HTLab services.

use super::pages::{self, DISCORD_INVITE_URL};
use crate::api::{
    identity,
    templates::{RedirectPage, render},
};
use crate::discord::DiscordClient;
use crate::session::Session;
use axum::{
    extract::{Extension, Path},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub id: &'static str,
    pub title: &'static str,
    pub url: &'static str,
}

// Retired services (herbbot) are intentionally absent and answer 404.
const SERVICES: &[Service] = &[Service {
    id: "happytreebot",
    title: "서비스: 해피트리봇",
    url: "https://htb.htlab.kr",
}];

#[must_use]
pub fn find(id: &str) -> Option<&'static Service> {
    SERVICES.iter().find(|service| service.id == id)
}

#[instrument(skip_all)]
pub async fn list(
    Extension(session): Extension<Session>,
    Extension(discord): Extension<DiscordClient>,
) -> Response {
    let user = identity::resolve(&session, &discord).await.into_user();
    render(&RedirectPage {
        title: "디스코드 이동하기",
        user,
        redirect_url: DISCORD_INVITE_URL,
    })
}

/// `/service/` with an empty id.
pub async fn bare() -> Redirect {
    Redirect::to("/service")
}

#[instrument(skip(session, discord))]
pub async fn show(
    Path(service_id): Path<String>,
    Extension(session): Extension<Session>,
    Extension(discord): Extension<DiscordClient>,
) -> Response {
    let Some(service) = find(&service_id) else {
        debug!("unknown service");
        return pages::not_found(Extension(session), Extension(discord))
            .await
            .into_response();
    };

    let user = identity::resolve(&session, &discord).await.into_user();
    render(&RedirectPage {
        title: service.title,
        user,
        redirect_url: service.url,
    })
}
