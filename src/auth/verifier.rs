//! Basic-scheme token verification against a stored digest.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use tracing::debug;

use crate::error::{GateError, Result};

/// Digests shorter than this cannot be real hash output.
pub const MIN_DIGEST_LEN: usize = 8;

/// Proof that a request carried the configured API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorized;

/// Verifies `Authorization: Basic <token>` headers against one shared secret.
///
/// Holds only the digest and never mutates it, so a single instance can be
/// shared by any number of concurrent requests.
pub struct CredentialVerifier {
    digest: String,
}

impl CredentialVerifier {
    /// Create a verifier from an Argon2 PHC digest.
    pub fn new(digest: impl Into<String>) -> Result<Self> {
        let digest = digest.into();
        if digest.len() < MIN_DIGEST_LEN {
            return Err(GateError::Config(format!(
                "token hash must have at least {} characters",
                MIN_DIGEST_LEN
            )));
        }
        PasswordHash::new(&digest)
            .map_err(|e| GateError::Config(format!("token hash is not a PHC string: {}", e)))?;

        Ok(Self { digest })
    }

    /// Decide whether a raw `Authorization` header value grants access.
    pub fn authenticate(&self, header: &str) -> Result<Authorized> {
        let Some(token) = parse_basic(header) else {
            debug!(reason = "malformed_header", "Credential check failed");
            return Err(GateError::Unauthorized);
        };

        // Parsed once in `new`, so this only fails if the digest was tampered with.
        let parsed = PasswordHash::new(&self.digest).map_err(|_| GateError::Unauthorized)?;

        match Argon2::default().verify_password(token.as_bytes(), &parsed) {
            Ok(()) => Ok(Authorized),
            Err(_) => {
                debug!(reason = "token_mismatch", "Credential check failed");
                Err(GateError::Unauthorized)
            }
        }
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("digest", &"<redacted>")
            .finish()
    }
}

/// Extract the token from a `Basic <token>` header value.
///
/// The scheme is matched case-insensitively and everything after the first
/// space is the token. Returns `None` when the header is empty, uses another
/// scheme or has no token.
pub fn parse_basic(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") || token.is_empty() {
        return None;
    }
    Some(token)
}
