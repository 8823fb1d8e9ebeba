//! Password hashing, timing-safe failure paths, and opaque token handling.
//!
//! Passwords are hashed with Argon2id at parameters chosen to cost roughly
//! 100 ms on a modern core (`time_cost=3, memory_cost=64MiB, parallelism=4`).
//! The parameters are embedded in the stored hash string itself, so
//! [`needs_rehash`] can detect and upgrade stale hashes on next successful
//! login without a schema migration.

use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::{Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::CredentialError;

const TIME_COST: u32 = 3;
const MEMORY_COST_KIB: u32 = 65_536;
const PARALLELISM: u32 = 4;
const HASH_LEN: usize = 32;

fn hasher() -> Argon2<'static> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(HASH_LEN))
        .unwrap_or_else(|_| Params::default());
    Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a plaintext password with Argon2id. Returns the full encoded string
/// (algorithm, version, parameters, salt and digest) suitable for storage.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::HashFailed {
            reason: e.to_string(),
        })
}

/// Verify a plaintext password against a stored Argon2id hash.
///
/// Never panics on a malformed stored hash — it is treated as a mismatch, the
/// same way a wrong password would be, so callers can always fall through to
/// [`timing_dummy_verify`] on the failure path.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => hasher().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// `true` if the stored hash was produced with parameters other than the
/// ones [`hasher`] currently uses — the caller should recompute and replace
/// it after a successful login.
#[must_use]
pub fn needs_rehash(stored_hash: &str) -> bool {
    if PasswordHash::new(stored_hash).is_err() {
        // Malformed hash in storage — treat as stale so it gets replaced.
        return true;
    }
    let current_params = format!("m={MEMORY_COST_KIB},t={TIME_COST},p={PARALLELISM}");
    !stored_hash.contains(&current_params)
}

/// A pre-encoded, valid Argon2id hash used only as a fallback in the
/// astronomically unlikely case hashing the sentinel below fails at runtime.
/// Never used to protect a real credential.
const FALLBACK_DUMMY_HASH: &str =
    "$argon2id$v=19$m=65536,t=3,p=4$d2F0dGd1YXJkZmFsbGJhY2s$Mut1OTnAAC0vqIF2yuN54vVhmAzPybs2fqnUsQZ+2qI";

/// A precomputed Argon2id hash of a fixed, non-secret sentinel, computed once
/// at process start.
///
/// Every login path that rejects a request *without* reaching a real
/// password verification (unknown username, disabled account, locked
/// account) must call [`timing_dummy_verify`] before returning 401. Without
/// it those paths return in microseconds while a genuine wrong-password
/// rejection takes ~100 ms, letting an attacker enumerate valid usernames by
/// timing alone.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("__wattguard_timing_dummy_do_not_use__")
        .unwrap_or_else(|_| FALLBACK_DUMMY_HASH.to_owned())
});

/// Burn the same ~100 ms a real failed-password check would, against a fixed
/// dummy hash. The result is always a mismatch; only the CPU time matters.
pub fn timing_dummy_verify() {
    let _ = verify_password("__wattguard_timing_dummy_input__", &DUMMY_HASH);
}

/// Generate `n` random bytes from the OS CSPRNG, URL-safe-base64 encoded.
fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a token. The only form a refresh or agent token is
/// ever persisted in.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Generate a 48-byte random refresh token. Returns `(raw, digest)`; only
/// `digest` should ever reach storage.
#[must_use]
pub fn generate_refresh_token() -> (String, String) {
    let raw = random_token(48);
    let hash = hash_token(&raw);
    (raw, hash)
}

/// Generate a 32-byte random agent token, prefixed `agt_` for log triage.
/// Returns `(raw, digest)`; only `digest` should ever reach storage.
#[must_use]
pub fn generate_agent_token() -> (String, String) {
    let raw = format!("agt_{}", random_token(32));
    let hash = hash_token(&raw);
    (raw, hash)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn freshly_hashed_password_does_not_need_rehash() {
        let hash = hash_password("hunter2").unwrap();
        assert!(!needs_rehash(&hash));
    }

    #[test]
    fn malformed_hash_needs_rehash() {
        assert!(needs_rehash("not-a-real-hash"));
    }

    #[test]
    fn verify_against_malformed_hash_is_false_not_panic() {
        assert!(!verify_password("anything", "not-a-real-hash"));
    }

    #[test]
    fn timing_dummy_verify_does_not_panic() {
        timing_dummy_verify();
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_deterministically() {
        let (raw_a, hash_a) = generate_refresh_token();
        let (raw_b, hash_b) = generate_refresh_token();
        assert_ne!(raw_a, raw_b);
        assert_ne!(hash_a, hash_b);
        assert_eq!(hash_token(&raw_a), hash_a);
    }

    #[test]
    fn agent_tokens_carry_the_log_triage_prefix() {
        let (raw, _hash) = generate_agent_token();
        assert!(raw.starts_with("agt_"));
    }

    #[test]
    fn stored_hash_never_contains_the_plaintext_password() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$argon2id$"));
    }
}
