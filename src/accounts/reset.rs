//! Password reset tokens.
//!
//! A token is an HS256 JWT carrying the user id, a purpose marker, and a
//! fingerprint of the password hash it was issued against. Nothing is stored
//! server-side: verification recomputes the signature and checks expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const PURPOSE: &str = "password_reset";

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    /// User id
    sub: String,
    /// Always `password_reset`
    purpose: String,
    /// Fingerprint of the password hash at issue time
    pwd: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// The parts of a token that survived signature and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedReset {
    pub user_id: i64,
    pub fingerprint: String,
}

/// Issues and checks reset tokens with a fixed validity window.
#[derive(Clone)]
pub struct ResetTokens {
    secret: String,
    ttl: Duration,
}

impl ResetTokens {
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::seconds(ttl_secs.max(1)),
        }
    }

    pub fn issue(
        &self,
        user_id: i64,
        fingerprint: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, fingerprint, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: i64,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = ResetClaims {
            sub: user_id.to_string(),
            purpose: PURPOSE.to_string(),
            pwd: fingerprint.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    pub fn verify(&self, token: &str) -> Option<VerifiedReset> {
        self.verify_at(token, Utc::now())
    }

    /// Expiry is checked here against `now` (no leeway) rather than by the
    /// JWT library, so the window is exact and testable.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<VerifiedReset> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = match jsonwebtoken::decode::<ResetClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!("Rejected reset token: {}", e);
                return None;
            }
        };

        if claims.purpose != PURPOSE || now.timestamp() >= claims.exp {
            return None;
        }

        Some(VerifiedReset {
            user_id: claims.sub.parse().ok()?,
            fingerprint: claims.pwd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_resolves_to_issuing_user() {
        let tokens = ResetTokens::new("secret", 1800);
        let token = tokens.issue(7, "abcd").unwrap();
        let verified = tokens.verify(&token).unwrap();
        assert_eq!(verified.user_id, 7);
        assert_eq!(verified.fingerprint, "abcd");
    }

    #[test]
    fn test_token_expires_after_window() {
        let tokens = ResetTokens::new("secret", 1800);
        let issued = Utc::now();
        let token = tokens.issue_at(1, "fp", issued).unwrap();

        assert!(tokens
            .verify_at(&token, issued + Duration::seconds(1799))
            .is_some());
        assert!(tokens
            .verify_at(&token, issued + Duration::seconds(1800))
            .is_none());
        assert!(tokens.verify_at(&token, issued + Duration::hours(5)).is_none());
    }

    #[test]
    fn test_token_signed_with_other_key_rejected() {
        let ours = ResetTokens::new("secret", 1800);
        let theirs = ResetTokens::new("other-secret", 1800);
        let token = theirs.issue(1, "fp").unwrap();
        assert!(ours.verify(&token).is_none());
    }

    #[test]
    fn test_tampered_and_garbage_tokens_rejected() {
        let tokens = ResetTokens::new("secret", 1800);
        let token = tokens.issue(1, "fp").unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(tokens.verify(&tampered).is_none());
        assert!(tokens.verify("").is_none());
        assert!(tokens.verify("not.a.token").is_none());
    }

    #[test]
    fn test_other_purpose_rejected() {
        #[derive(Serialize)]
        struct Other {
            sub: String,
            purpose: String,
            pwd: String,
            iat: i64,
            exp: i64,
        }
        let now = Utc::now();
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &Other {
                sub: "1".to_string(),
                purpose: "session".to_string(),
                pwd: "fp".to_string(),
                iat: now.timestamp(),
                exp: (now + Duration::minutes(5)).timestamp(),
            },
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(ResetTokens::new("secret", 1800).verify(&token).is_none());
    }
}
