//! Token record kept in the session.

use serde::{Deserialize, Serialize};

// Refresh slightly early so a token does not expire mid-request.
const EXPIRY_LEEWAY_SECONDS: i64 = 30;

/// Token endpoint response (`authorization_code` and `refresh_token` grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Access/refresh token pair with its absolute expiry.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds; `None` means the provider did not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    #[must_use]
    pub fn from_response(response: TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            expires_at: response.expires_in.map(|secs| now.saturating_add(secs)),
            scope: response.scope,
        }
    }

    /// Apply a refresh response, keeping the old refresh token if the
    /// provider did not rotate it.
    #[must_use]
    pub fn refreshed(&self, response: TokenResponse, now: i64) -> Self {
        let mut token = Self::from_response(response, now);
        if token.refresh_token.is_none() {
            token.refresh_token.clone_from(&self.refresh_token);
        }
        if token.scope.is_none() {
            token.scope.clone_from(&self.scope);
        }
        token
    }

    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now.saturating_add(EXPIRY_LEEWAY_SECONDS) >= expires_at)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}
