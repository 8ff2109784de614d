//! Session middleware.
//!
//! Opens the session cookie into a [`Session`] handle for the handler, records
//! the visited page, and writes the cookie back when the request changed it.

use crate::session::{self, Session, SessionKey, SessionState};
use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error};

// Paths that must not overwrite `last_page`.
const UNTRACKED_PREFIXES: [&str; 6] = [
    "/login",
    "/logout",
    "/auth",
    "/static",
    "/favicon.ico",
    "/health",
];

#[derive(Clone, Debug)]
pub struct SessionSettings {
    key: SessionKey,
    ttl_seconds: i64,
    secure: bool,
}

impl SessionSettings {
    #[must_use]
    pub fn new(key: SessionKey, ttl_seconds: i64, secure: bool) -> Self {
        Self {
            key,
            ttl_seconds,
            secure,
        }
    }

    /// Open a cookie value; anything unreadable is an empty session.
    #[must_use]
    pub fn open(&self, cookie: Option<&str>, now: i64) -> SessionState {
        let Some(value) = cookie else {
            return SessionState::default();
        };
        session::decode(value, &self.key, now).unwrap_or_else(|err| {
            debug!("discarding session cookie: {err}");
            SessionState::default()
        })
    }

    /// Seal a state into a cookie value.
    ///
    /// # Errors
    /// Returns an error if the state cannot be encoded.
    pub fn seal(&self, state: &SessionState, now: i64) -> Result<String, session::Error> {
        session::encode(state, &self.key, now, self.ttl_seconds)
    }
}

/// Whether visiting `path` should update `last_page`.
#[must_use]
pub fn tracks_page(path: &str) -> bool {
    !UNTRACKED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

pub async fn session_layer(
    State(settings): State<Arc<SessionSettings>>,
    mut request: Request,
    next: Next,
) -> Response {
    let now = Utc::now().timestamp();
    let cookie = session::read_cookie(request.headers());
    let session = Session::new(settings.open(cookie.as_deref(), now));

    let path = request.uri().path().to_string();
    if tracks_page(&path) {
        session.record_page(&path).await;
    }

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if let Some(state) = session.changes().await {
        let cookie = if state == SessionState::default() {
            session::clear_cookie(settings.secure).map_err(|err| err.to_string())
        } else {
            settings
                .seal(&state, now)
                .map_err(|err| err.to_string())
                .and_then(|value| {
                    session::session_cookie(&value, settings.ttl_seconds, settings.secure)
                        .map_err(|err| err.to_string())
                })
        };
        match cookie {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to write session cookie: {err}"),
        }
    }

    response
}
