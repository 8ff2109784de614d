use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    /// `None` falls back to the Discord client secret.
    pub secret: Option<SecretString>,
    pub ttl_seconds: i64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL)
            .copied()
            .unwrap_or(crate::session::DEFAULT_SESSION_TTL_SECONDS);
        if ttl_seconds <= 0 {
            return Err(anyhow!("--{ARG_SESSION_TTL} must be > 0"));
        }

        Ok(Self {
            secret: matches
                .get_one::<String>(ARG_SESSION_SECRET)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone())),
            ttl_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Key used to sign session cookies (default: Discord client secret)")
                .env("HTLAB_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session cookie TTL in seconds")
                .env("HTLAB_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
}
