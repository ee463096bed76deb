use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Single-use identifier authenticating messages for one overlay lifetime.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Randomness used to mint a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Operating-system CSPRNG.
    Os,
    /// Clock-and-pid seeded generator. Weaker: predictable to anyone who can
    /// estimate the mint time. Only used when the OS source fails.
    Fallback,
}

/// Mints a fresh token. Prefers the OS random source.
pub fn create_token() -> (SessionToken, TokenSource) {
    let mut bytes = [0u8; TOKEN_BYTES];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => (encode(&bytes), TokenSource::Os),
        Err(err) => {
            tracing::warn!("[Session] OS random source unavailable ({err}); using weaker fallback");
            fallback_fill(&mut bytes);
            (encode(&bytes), TokenSource::Fallback)
        }
    }
}

fn fallback_fill(bytes: &mut [u8]) {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default() as u64;
    let seed = nanos ^ (u64::from(std::process::id()) << 32);
    StdRng::seed_from_u64(seed).fill_bytes(bytes);
}

fn encode(bytes: &[u8]) -> SessionToken {
    SessionToken(URL_SAFE_NO_PAD.encode(bytes))
}

/// Issues and checks session tokens for one content context.
///
/// At most one token is current. Rotating mints a new one, which makes every
/// message tagged with the previous token inert.
#[derive(Debug, Default)]
pub struct TokenAuthority {
    current: Option<SessionToken>,
    last_source: Option<TokenSource>,
}

impl TokenAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a new token and makes it current.
    pub fn rotate(&mut self) -> SessionToken {
        let (mut token, mut source) = create_token();
        while self.current.as_ref() == Some(&token) {
            (token, source) = create_token();
        }
        self.current = Some(token.clone());
        self.last_source = Some(source);
        token
    }

    /// Drops the current token; nothing validates until the next rotation.
    pub fn revoke(&mut self) -> Option<SessionToken> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&SessionToken> {
        self.current.as_ref()
    }

    pub fn last_source(&self) -> Option<TokenSource> {
        self.last_source
    }

    pub fn validate(&self, token: &SessionToken) -> bool {
        validate(token, self.current.as_ref())
    }
}

/// True iff `current` is set and equals `token`.
pub fn validate(token: &SessionToken, current: Option<&SessionToken>) -> bool {
    current.is_some_and(|current| current == token)
}
