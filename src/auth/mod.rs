//! Shared-secret credential verification.

mod digest;
mod verifier;

pub use digest::hash_token;
pub use verifier::{parse_basic, Authorized, CredentialVerifier, MIN_DIGEST_LEN};
