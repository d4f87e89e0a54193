//! Password hashing, bearer tokens and file URL signing.
//!
//! ## Password hash format
//!
//! `base64(salt):base64(digest)` where
//! - salt: 16 random bytes
//! - digest: PBKDF2-HMAC-SHA256, 256-bit output
//!
//! The iteration count is not part of the stored string; it comes from
//! [`Config::password_iterations`](crate::Config).
//!
//! ## Tokens
//!
//! Bearer tokens are 32 random bytes, base64url-encoded without padding.
//! Only their SHA-256 digest is kept server-side.

use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;
/// Derived key length in bytes.
pub const DIGEST_LEN: usize = 32;
/// Random bytes per bearer token.
pub const TOKEN_BYTES: usize = 32;

/// Returns `len` bytes from the OS random source.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Compares two byte slices without short-circuiting on the first mismatch.
///
/// Slices of different length compare unequal immediately; the length of a
/// derived digest is public, so this leaks nothing.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

/// PBKDF2-SHA256 password hasher.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    /// Creates a hasher with the given iteration count.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Returns the configured iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hashes a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let digest = self.derive(password, &salt);
        format!("{}:{}", STANDARD.encode(salt), STANDARD.encode(digest))
    }

    /// Checks a password against a stored hash.
    ///
    /// A malformed stored hash never verifies.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let Some((salt_b64, digest_b64)) = stored.split_once(':') else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(digest_b64))
        else {
            return false;
        };
        let actual = self.derive(password, &salt);
        constant_time_eq(&actual, &expected)
    }

    fn derive(&self, password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
        let mut out = [0u8; DIGEST_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut out);
        out
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PASSWORD_ITERATIONS)
    }
}

/// Generates a new opaque bearer token.
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(TOKEN_BYTES))
}

/// Digest under which a token is stored and looked up.
pub fn token_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Signs and verifies time-limited file URLs.
///
/// The signature is HMAC-SHA256 over `path\nexpires`, base64url-encoded.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    /// Creates a signer with the given key.
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Returns the signature for `path` valid until `expires` (unix seconds).
    pub fn sign(&self, path: &str, expires: i64) -> CoreResult<String> {
        let mac = self.mac(path, expires)?;
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Verifies a signature and that `now` (unix seconds) is before `expires`.
    pub fn verify(&self, path: &str, expires: i64, signature: &str, now: i64) -> CoreResult<()> {
        if now >= expires {
            return Err(CoreError::unauthorized("Link expired"));
        }
        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CoreError::unauthorized("Invalid signature"))?;
        self.mac(path, expires)?
            .verify_slice(&provided)
            .map_err(|_| CoreError::unauthorized("Invalid signature"))
    }

    fn mac(&self, path: &str, expires: i64) -> CoreResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CoreError::Internal(format!("invalid signing key: {e}")))?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    #[test]
    fn hash_format() {
        let hash = fast_hasher().hash("CorrectHorse42");
        let (salt, digest) = hash.split_once(':').unwrap();
        assert_eq!(STANDARD.decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(digest).unwrap().len(), DIGEST_LEN);
    }

    #[test]
    fn verify_roundtrip() {
        let hasher = fast_hasher();
        let hash = hasher.hash("CorrectHorse42");
        assert!(hasher.verify("CorrectHorse42", &hash));
        assert!(!hasher.verify("CorrectHorse43", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn salts_differ() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("SamePassword1"), hasher.hash("SamePassword1"));
    }

    #[test]
    fn default_iterations_verify() {
        let hasher = PasswordHasher::default();
        assert_eq!(hasher.iterations(), 100_000);
        let hash = hasher.hash("Str0ngPassword");
        assert!(hasher.verify("Str0ngPassword", &hash));
    }

    #[test]
    fn different_iteration_counts_do_not_verify() {
        let hash = PasswordHasher::new(1_000).hash("Str0ngPassword");
        assert!(!PasswordHasher::new(2_000).verify("Str0ngPassword", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("x", "no-colon-here"));
        assert!(!hasher.verify("x", "!!!:???"));
        assert!(!hasher.verify("x", ""));
    }

    #[test]
    fn constant_time_compare() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"xbc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn tokens_are_unique_and_digestible() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert_eq!(token_digest(&a), token_digest(&a));
        assert_ne!(token_digest(&a), token_digest(&b));
    }

    #[test]
    fn url_signing() {
        let signer = UrlSigner::new(b"signing-key".to_vec());
        let sig = signer.sign("s1/file.png", 1_000).unwrap();
        assert!(signer.verify("s1/file.png", 1_000, &sig, 999).is_ok());
        assert!(signer.verify("s1/file.png", 1_000, &sig, 1_000).is_err());
        assert!(signer.verify("s1/other.png", 1_000, &sig, 999).is_err());
        assert!(signer.verify("s1/file.png", 2_000, &sig, 999).is_err());
        assert!(signer.verify("s1/file.png", 1_000, "garbage!", 999).is_err());

        let other = UrlSigner::new(b"other-key".to_vec());
        assert!(other.verify("s1/file.png", 1_000, &sig, 999).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn verify_accepts_only_original(password in "[ -~]{1,40}", other in "[ -~]{1,40}") {
            let hasher = PasswordHasher::new(64);
            let hash = hasher.hash(&password);
            prop_assert!(hasher.verify(&password, &hash));
            if other != password {
                prop_assert!(!hasher.verify(&other, &hash));
            }
        }
    }
}
