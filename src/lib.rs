//! # htlab (website & Discord login)
//!
//! `htlab` serves the HTLab website: a few rendered pages, redirect pages for
//! community links and services, and a Discord `OAuth2` login.
//!
//! ## Session as token store
//!
//! There is no server-side storage. All durable state lives in a signed cookie
//! (see [`session`]) holding:
//!
//! - `last_page`: the last non-auth path visited, used to return after login.
//! - `oauth_state`: the single-use anti-forgery nonce of an in-flight login.
//! - `oauth_token`: the Discord access/refresh token pair.
//!
//! The cookie payload is `HMAC-SHA256` signed and carries its own expiry. A
//! tampered, expired or unreadable cookie is treated as an empty session.
//!
//! ## Identity
//!
//! The Discord profile is fetched fresh on every page render and never cached.
//! Expired access tokens are refreshed transparently and the refreshed token is
//! written back to the session. Identity is best-effort: any provider failure
//! renders the anonymous view instead of failing the page.

pub mod api;
pub mod cli;
pub mod discord;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
