use super::{Error, SessionState};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SESSION_VERSION: u8 = 1;

/// Key used to sign session cookies.
#[derive(Clone)]
pub struct SessionKey(SecretString);

impl SessionKey {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self(secret)
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail.
        match HmacSha256::new_from_slice(self.0.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC can take key of any size"),
        }
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(***)")
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    v: u8,
    exp: i64,
    state: &'a SessionState,
}

#[derive(Deserialize)]
struct Envelope {
    v: u8,
    exp: i64,
    state: SessionState,
}

/// Sign `state` into a cookie value valid until `now + ttl_seconds`.
///
/// # Errors
/// Returns an error if the state cannot be serialized.
pub fn encode(
    state: &SessionState,
    key: &SessionKey,
    now: i64,
    ttl_seconds: i64,
) -> Result<String, Error> {
    let envelope = EnvelopeRef {
        v: SESSION_VERSION,
        exp: now.saturating_add(ttl_seconds),
        state,
    };
    let json = serde_json::to_vec(&envelope).map_err(|e| Error::Payload(e.to_string()))?;
    let payload = Base64UrlUnpadded::encode_string(&json);

    let mut mac = key.mac();
    mac.update(payload.as_bytes());
    let signature = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{payload}.{signature}"))
}

/// Verify and open a cookie value produced by [`encode`].
///
/// # Errors
/// Returns an error if the value is malformed, tampered with, or expired.
pub fn decode(value: &str, key: &SessionKey, now: i64) -> Result<SessionState, Error> {
    let (payload, signature) = value.split_once('.').ok_or(Error::Format)?;
    let signature = Base64UrlUnpadded::decode_vec(signature).map_err(|_| Error::Base64)?;

    let mut mac = key.mac();
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).map_err(|_| Error::Signature)?;

    let json = Base64UrlUnpadded::decode_vec(payload).map_err(|_| Error::Base64)?;
    let envelope: Envelope =
        serde_json::from_slice(&json).map_err(|e| Error::Payload(e.to_string()))?;

    if envelope.v != SESSION_VERSION {
        return Err(Error::Payload(format!(
            "unsupported version {}",
            envelope.v
        )));
    }
    if envelope.exp <= now {
        return Err(Error::Expired);
    }
    Ok(envelope.state)
}
