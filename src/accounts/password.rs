//! Password hashing.
//!
//! Hashes are stored as PHC strings (`$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`).
//! The round count travels with the hash so it can be raised later without
//! breaking existing accounts.

use pbkdf2::password_hash::{
    self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Hash a plaintext password with a fresh random salt.
///
/// CPU bound; async callers run it on the blocking pool.
pub fn hash_password(password: &str, rounds: u32) -> Result<String, password_hash::Error> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)?;
    let params = Params {
        rounds,
        output_length: KEY_LEN,
    };
    let hash = Pbkdf2.hash_password_customized(password.as_bytes(), None, None, params, &salt)?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored hash.
///
/// Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Short digest of a stored hash. Embedded in reset tokens so that a token
/// stops working once the password it was issued against has been replaced.
pub fn fingerprint(stored: &str) -> String {
    let digest = Sha256::digest(stored.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("pw1", 1_000).unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$i=1000,l=32$"));
        assert!(!hash.contains("pw1"));
        assert!(verify_password("pw1", &hash));
        assert!(!verify_password("pw2", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_salt_differs_per_hash() {
        let a = hash_password("same", 1_000).unwrap();
        let b = hash_password("same", 1_000).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn test_rounds_come_from_stored_hash() {
        let low = hash_password("pw", 1_000).unwrap();
        let high = hash_password("pw", 2_000).unwrap();
        assert!(high.contains("i=2000"));
        assert!(verify_password("pw", &low));
        assert!(verify_password("pw", &high));
    }

    #[test]
    fn test_malformed_hashes_rejected() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "pw"));
        assert!(!verify_password("pw", "pbkdf2-sha256$1000$00$00"));
        assert!(!verify_password("pw", "$bcrypt$i=10$aaaa$bbbb"));

        let hash = hash_password("pw", 1_000).unwrap();
        assert!(!verify_password("pw", &format!("{}$extra", hash)));
    }

    #[test]
    fn test_fingerprint_tracks_hash() {
        let a = hash_password("pw", 1_000).unwrap();
        let b = hash_password("pw", 1_000).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 16);
    }
}
