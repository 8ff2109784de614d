use crate::{
    api::{self, SessionSettings, SiteConfig},
    cli::commands::{discord, session},
    discord::{DiscordClient, DiscordConfig},
    session::SessionKey,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub static_dir: PathBuf,
    pub discord: discord::Options,
    pub session: session::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the Discord client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    // Session cookies only get `Secure` when the public site is served over https.
    let secure_cookies = args.discord.redirect_uri.scheme() == "https";

    let session_key = match args.session.secret {
        Some(secret) => SessionKey::new(secret),
        None => {
            debug!("no session secret configured, signing with the Discord client secret");
            SessionKey::new(args.discord.client_secret.clone())
        }
    };

    let config = DiscordConfig::new(
        args.discord.client_id,
        args.discord.client_secret,
        args.discord.redirect_uri,
        &args.discord.api_url,
    )
    .with_context(|| format!("invalid Discord API URL: {}", args.discord.api_url))?;

    let discord = DiscordClient::new(config).context("failed to build Discord HTTP client")?;

    if !args.static_dir.is_dir() {
        warn!(
            "static directory {} not found, assets will return 404",
            args.static_dir.display()
        );
    }

    info!(
        client_id = discord.config().client_id(),
        redirect_uri = %discord.config().redirect_uri(),
        scopes = ?discord.config().scopes(),
        session_ttl_seconds = args.session.ttl_seconds,
        secure_cookies,
        "starting htlab {} ({})",
        env!("CARGO_PKG_VERSION"),
        crate::GIT_COMMIT_HASH
    );

    let site = SiteConfig {
        discord,
        session: SessionSettings::new(session_key, args.session.ttl_seconds, secure_cookies),
        static_dir: args.static_dir,
    };

    api::new(args.port, site).await
}
