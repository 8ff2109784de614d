//! Discord profile mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Error;

pub const CDN_URL: &str = "https://cdn.discordapp.com";

// Default avatars repeat every five discriminators: 0/5, 1/6, 2/7, 3/8, 4/9.
const DEFAULT_AVATARS: [&str; 5] = [
    "https://cdn.discordapp.com/embed/avatars/0.png",
    "https://cdn.discordapp.com/embed/avatars/1.png",
    "https://cdn.discordapp.com/embed/avatars/2.png",
    "https://cdn.discordapp.com/embed/avatars/3.png",
    "https://cdn.discordapp.com/embed/avatars/4.png",
];

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
    discriminator: String,
    #[serde(default)]
    avatar: Option<String>,
}

/// Display-ready identity of a logged in Discord user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    /// Profile exactly as returned by `GET /users/@me`.
    pub profile: Value,
}

impl User {
    /// Map a raw `/users/@me` payload into a display identity.
    ///
    /// # Errors
    /// Returns an error if `id`, `username` or `discriminator` is missing.
    pub fn from_profile(profile: Value) -> Result<Self, Error> {
        let raw: RawUser = serde_json::from_value(profile.clone())?;
        let avatar_url = avatar_url(&raw.id, &raw.discriminator, raw.avatar.as_deref());

        Ok(Self {
            name: format!("{}#{}", raw.username, raw.discriminator),
            id: raw.id,
            avatar_url,
            profile,
        })
    }
}

/// Avatar URL for a user, preferring the uploaded avatar.
#[must_use]
pub fn avatar_url(id: &str, discriminator: &str, avatar: Option<&str>) -> String {
    match avatar {
        Some(hash) => format!("{CDN_URL}/avatars/{id}/{hash}.png"),
        None => default_avatar_url(discriminator).to_string(),
    }
}

/// Default avatar picked by the last digit of the discriminator.
#[must_use]
pub fn default_avatar_url(discriminator: &str) -> &'static str {
    let digit = discriminator
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .unwrap_or(0);
    DEFAULT_AVATARS[digit as usize % DEFAULT_AVATARS.len()]
}
