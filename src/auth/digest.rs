//! Digest generation for the shared API token.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::HashCost;
use crate::error::{GateError, Result};

/// Hash a token into a salted Argon2id PHC string.
///
/// Every call draws a fresh salt, so two digests of the same token differ
/// while both verify.
pub fn hash_token(token: &str, cost: &HashCost) -> Result<String> {
    let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
        .map_err(|e| GateError::Config(format!("invalid hash cost: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(token.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GateError::Hash(format!("Failed to hash token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> HashCost {
        HashCost {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_digest_is_argon2id_phc() {
        let digest = hash_token("s3cr3t", &cheap()).unwrap();
        assert!(digest.starts_with("$argon2id$v=19$m=64,t=1,p=1$"));
    }

    #[test]
    fn test_digest_is_salted() {
        let first = hash_token("s3cr3t", &cheap()).unwrap();
        let second = hash_token("s3cr3t", &cheap()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_digest_does_not_contain_token() {
        let digest = hash_token("plaintext-token", &cheap()).unwrap();
        assert!(!digest.contains("plaintext-token"));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let cost = HashCost {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(hash_token("x", &cost), Err(GateError::Config(_))));
    }
}
