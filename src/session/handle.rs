use super::SessionState;
use crate::discord::Token;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    dirty: bool,
}

impl Inner {
    fn set<T: PartialEq>(field: &mut T, value: T, dirty: &mut bool) {
        if *field != value {
            *field = value;
            *dirty = true;
        }
    }
}

/// Request-scoped handle on the session, shared between the session
/// middleware and the handler through request extensions.
#[derive(Clone, Debug, Default)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    #[must_use]
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                dirty: false,
            })),
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn token(&self) -> Option<Token> {
        self.inner.lock().await.state.oauth_token.clone()
    }

    pub async fn oauth_state(&self) -> Option<String> {
        self.inner.lock().await.state.oauth_state.clone()
    }

    pub async fn record_page(&self, path: &str) {
        let mut guard = self.inner.lock().await;
        let Inner { state, dirty } = &mut *guard;
        Inner::set(&mut state.last_page, Some(path.to_string()), dirty);
    }

    /// Remember the nonce of a login that is about to start.
    pub async fn begin_login(&self, nonce: String) {
        let mut guard = self.inner.lock().await;
        let Inner { state, dirty } = &mut *guard;
        Inner::set(&mut state.oauth_state, Some(nonce), dirty);
    }

    /// Commit a successful login: store the token and consume the nonce in
    /// one step. Returns where the user should be sent next.
    pub async fn complete_login(&self, token: Token) -> String {
        let mut guard = self.inner.lock().await;
        let Inner { state, dirty } = &mut *guard;
        Inner::set(&mut state.oauth_token, Some(token), dirty);
        Inner::set(&mut state.oauth_state, None, dirty);
        state.return_to().to_string()
    }

    /// Persist a refreshed token.
    pub async fn store_token(&self, token: Token) {
        let mut guard = self.inner.lock().await;
        let Inner { state, dirty } = &mut *guard;
        Inner::set(&mut state.oauth_token, Some(token), dirty);
    }

    /// Drop a token the provider no longer accepts.
    pub async fn forget_token(&self) {
        let mut guard = self.inner.lock().await;
        let Inner { state, dirty } = &mut *guard;
        Inner::set(&mut state.oauth_token, None, dirty);
    }

    /// Log out. Returns where the user should be sent next.
    pub async fn logout(&self) -> String {
        let mut guard = self.inner.lock().await;
        let Inner { state, dirty } = &mut *guard;
        Inner::set(&mut state.oauth_token, None, dirty);
        Inner::set(&mut state.oauth_state, None, dirty);
        state.return_to().to_string()
    }

    /// The state to write back, if anything changed during the request.
    pub async fn changes(&self) -> Option<SessionState> {
        let guard = self.inner.lock().await;
        guard.dirty.then(|| guard.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Token {
        Token {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: None,
            scope: Some("identify".to_string()),
        }
    }

    #[tokio::test]
    async fn untouched_session_has_no_changes() {
        let session = Session::new(SessionState {
            last_page: Some("/".to_string()),
            ..SessionState::default()
        });
        session.record_page("/").await;
        assert_eq!(session.changes().await, None);
    }

    #[tokio::test]
    async fn complete_login_consumes_nonce() {
        let session = Session::default();
        session.record_page("/service/happytreebot").await;
        session.begin_login("nonce".to_string()).await;
        assert_eq!(session.oauth_state().await.as_deref(), Some("nonce"));

        let next = session.complete_login(token()).await;
        assert_eq!(next, "/service/happytreebot");

        let state = session.changes().await.unwrap_or_default();
        assert_eq!(state.oauth_state, None);
        assert_eq!(state.oauth_token, Some(token()));
    }

    #[tokio::test]
    async fn logout_drops_token_and_nonce() {
        let session = Session::new(SessionState {
            last_page: None,
            oauth_state: Some("nonce".to_string()),
            oauth_token: Some(token()),
        });
        assert_eq!(session.logout().await, "/");
        let state = session.snapshot().await;
        assert_eq!(state.oauth_token, None);
        assert_eq!(state.oauth_state, None);
        assert!(session.changes().await.is_some());
    }

    #[tokio::test]
    async fn forget_token_keeps_last_page() {
        let session = Session::new(SessionState {
            last_page: Some("/discord".to_string()),
            oauth_state: None,
            oauth_token: Some(token()),
        });
        session.forget_token().await;
        let state = session.snapshot().await;
        assert_eq!(state.oauth_token, None);
        assert_eq!(state.last_page.as_deref(), Some("/discord"));
    }
}
