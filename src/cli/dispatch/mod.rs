//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, ARG_STATIC_DIR, discord, session};
use anyhow::Result;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(5000);
    let static_dir = matches
        .get_one::<String>(ARG_STATIC_DIR)
        .map_or_else(|| PathBuf::from("static"), PathBuf::from);

    Ok(Action::Server(Args {
        port,
        static_dir,
        discord: discord::Options::parse(matches)?,
        session: session::Options::parse(matches)?,
    }))
}
