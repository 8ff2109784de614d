use crate::api::{
    identity,
    templates::{IndexPage, NotFoundPage, RedirectPage, render},
};
use crate::discord::DiscordClient;
use crate::session::Session;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

pub const DISCORD_INVITE_URL: &str = "https://discord.gg/TD9BvMxhP6";

#[instrument(skip_all)]
pub async fn index(
    Extension(session): Extension<Session>,
    Extension(discord): Extension<DiscordClient>,
) -> Response {
    let user = identity::resolve(&session, &discord).await.into_user();
    render(&IndexPage {
        title: "메인",
        user,
    })
}

#[instrument(skip_all)]
pub async fn discord(
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

/// Fallback for unknown routes.
#[instrument(skip_all)]
pub async fn not_found(
    Extension(session): Extension<Session>,
    Extension(discord): Extension<DiscordClient>,
) -> Response {
    let user = identity::resolve(&session, &discord).await.into_user();
    (
        StatusCode::NOT_FOUND,
        render(&NotFoundPage { title: "404", user }),
    )
        .into_response()
}
