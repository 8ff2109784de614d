use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

use crate::discord::DEFAULT_API_URL;

pub const ARG_CLIENT_ID: &str = "discord-client-id";
pub const ARG_CLIENT_SECRET: &str = "discord-client-secret";
pub const ARG_REDIRECT_URI: &str = "discord-redirect-uri";
pub const ARG_API_URL: &str = "discord-api-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Url,
    pub api_url: String,
}

impl Options {
    /// Parse Discord application arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing or the redirect URI is invalid.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        let redirect_uri = read_required(ARG_REDIRECT_URI)?;
        let redirect_uri = Url::parse(&redirect_uri)
            .with_context(|| format!("invalid --{ARG_REDIRECT_URI}: {redirect_uri}"))?;

        Ok(Self {
            client_id: read_required(ARG_CLIENT_ID)?,
            client_secret: SecretString::from(read_required(ARG_CLIENT_SECRET)?),
            redirect_uri,
            api_url: matches
                .get_one::<String>(ARG_API_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Discord application client id")
                .env("HTLAB_DISCORD_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_SECRET)
                .long(ARG_CLIENT_SECRET)
                .help("Discord application client secret")
                .env("HTLAB_DISCORD_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_URI)
                .long(ARG_REDIRECT_URI)
                .help("OAuth2 redirect URI registered with Discord, example: https://htlab.kr/auth/callback")
                .env("HTLAB_DISCORD_REDIRECT_URI")
                .required(true),
        )
        .arg(
            Arg::new(ARG_API_URL)
                .long(ARG_API_URL)
                .help("Discord API base URL")
                .env("HTLAB_DISCORD_API_URL")
                .default_value(DEFAULT_API_URL),
        )
}
