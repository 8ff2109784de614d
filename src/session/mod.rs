//! Signed, client-held session.
//!
//! The whole session is a typed [`SessionState`] serialized into the
//! `htlab_session` cookie:
//!
//! ```text
//! base64url(json payload) "." base64url(HMAC-SHA256(key, first part))
//! ```
//!
//! The payload carries its own `exp` (unix seconds). Decoding fails on a bad
//! signature, an unreadable payload, or a past `exp`; callers treat every
//! failure as "no session" and start over.

mod codec;
mod cookie;
mod handle;

pub use self::codec::{SessionKey, decode, encode};
pub use self::cookie::{SESSION_COOKIE_NAME, clear_cookie, read_cookie, session_cookie};
pub use self::handle::Session;

use crate::discord::Token;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60 * 24 * 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid session format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid session signature")]
    Signature,
    #[error("invalid session payload: {0}")]
    Payload(String),
    #[error("session expired")]
    Expired,
}

/// Everything the site keeps about one browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    /// Last non-auth path visited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_page: Option<String>,
    /// Anti-forgery nonce of the login currently in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<Token>,
}

impl SessionState {
    /// Where to send the user after logging in or out.
    #[must_use]
    pub fn return_to(&self) -> &str {
        self.last_page
            .as_deref()
            .filter(|page| is_local_path(page))
            .unwrap_or("/")
    }
}

// Only same-site absolute paths are valid redirect targets.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
